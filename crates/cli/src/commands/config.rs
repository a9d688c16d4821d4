use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use promobundle_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in effective_values(&config) {
        let source = field_source(
            entry.key_path,
            entry.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(entry.key_path, &entry.value, source));
    }

    lines.join("\n")
}

struct ConfigEntry {
    key_path: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn entry(key_path: &'static str, value: String, env_keys: &'static [&'static str]) -> ConfigEntry {
    ConfigEntry { key_path, value, env_keys }
}

fn effective_values(config: &AppConfig) -> Vec<ConfigEntry> {
    vec![
        entry("database.url", config.database.url.clone(), &["PROMOBUNDLE_DATABASE_URL"]),
        entry(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["PROMOBUNDLE_DATABASE_MAX_CONNECTIONS"],
        ),
        entry(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["PROMOBUNDLE_DATABASE_TIMEOUT_SECS"],
        ),
        entry("server.bind_address", config.server.bind_address.clone(), &["PROMOBUNDLE_SERVER_BIND_ADDRESS"]),
        entry("server.port", config.server.port.to_string(), &["PROMOBUNDLE_SERVER_PORT"]),
        entry(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["PROMOBUNDLE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        entry(
            "logging.level",
            config.logging.level.clone(),
            &["PROMOBUNDLE_LOGGING_LEVEL", "PROMOBUNDLE_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["PROMOBUNDLE_LOGGING_FORMAT", "PROMOBUNDLE_LOG_FORMAT"],
        ),
        entry(
            "promo.anchor_search_limit",
            config.promo.anchor_search_limit.to_string(),
            &["PROMOBUNDLE_PROMO_ANCHOR_SEARCH_LIMIT"],
        ),
        entry(
            "promo.semantic_fallback_k",
            config.promo.semantic_fallback_k.to_string(),
            &["PROMOBUNDLE_PROMO_SEMANTIC_FALLBACK_K"],
        ),
        entry(
            "promo.candidate_pool_limit",
            config.promo.candidate_pool_limit.to_string(),
            &["PROMOBUNDLE_PROMO_CANDIDATE_POOL_LIMIT"],
        ),
        entry(
            "promo.top_candidates",
            config.promo.top_candidates.to_string(),
            &["PROMOBUNDLE_PROMO_TOP_CANDIDATES"],
        ),
        entry(
            "promo.max_bundles",
            config.promo.max_bundles.to_string(),
            &["PROMOBUNDLE_PROMO_MAX_BUNDLES"],
        ),
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("promobundle.toml"), PathBuf::from("config/promobundle.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
