use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bundles::engine::RetrievalLimits;
use crate::bundles::rules::{PromoRules, SelectionRules};

#[derive(Clone, Debug, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub promo: PromoConfig,
}

#[derive(Clone, Debug, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Retrieval sizes and selection caps for the recommendation pipeline.
#[derive(Clone, Debug, Serialize)]
pub struct PromoConfig {
    pub anchor_search_limit: usize,
    pub semantic_fallback_k: usize,
    pub candidate_pool_limit: usize,
    pub top_candidates: usize,
    pub max_bundles: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        let selection = SelectionRules::default();
        let retrieval = RetrievalLimits::default();
        Self {
            database: DatabaseConfig {
                url: "sqlite://promobundle.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            promo: PromoConfig {
                anchor_search_limit: retrieval.anchor_search_limit,
                semantic_fallback_k: retrieval.semantic_fallback_k,
                candidate_pool_limit: selection.candidate_pool_limit,
                top_candidates: selection.top_candidates,
                max_bundles: selection.max_bundles,
            },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl PromoConfig {
    pub fn retrieval_limits(&self) -> RetrievalLimits {
        RetrievalLimits {
            anchor_search_limit: self.anchor_search_limit,
            semantic_fallback_k: self.semantic_fallback_k,
        }
    }

    pub fn selection_rules(&self) -> SelectionRules {
        SelectionRules {
            candidate_pool_limit: self.candidate_pool_limit,
            top_candidates: self.top_candidates,
            max_bundles: self.max_bundles,
        }
    }

    /// Default rule tables with this config's selection caps.
    pub fn rules(&self) -> PromoRules {
        PromoRules { selection: self.selection_rules(), ..PromoRules::default() }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("promobundle.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(promo) = patch.promo {
            if let Some(anchor_search_limit) = promo.anchor_search_limit {
                self.promo.anchor_search_limit = anchor_search_limit;
            }
            if let Some(semantic_fallback_k) = promo.semantic_fallback_k {
                self.promo.semantic_fallback_k = semantic_fallback_k;
            }
            if let Some(candidate_pool_limit) = promo.candidate_pool_limit {
                self.promo.candidate_pool_limit = candidate_pool_limit;
            }
            if let Some(top_candidates) = promo.top_candidates {
                self.promo.top_candidates = top_candidates;
            }
            if let Some(max_bundles) = promo.max_bundles {
                self.promo.max_bundles = max_bundles;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PROMOBUNDLE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("PROMOBUNDLE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("PROMOBUNDLE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("PROMOBUNDLE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("PROMOBUNDLE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PROMOBUNDLE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PROMOBUNDLE_SERVER_PORT") {
            self.server.port = parse_u16("PROMOBUNDLE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("PROMOBUNDLE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PROMOBUNDLE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("PROMOBUNDLE_LOGGING_LEVEL").or_else(|| read_env("PROMOBUNDLE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PROMOBUNDLE_LOGGING_FORMAT").or_else(|| read_env("PROMOBUNDLE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        if let Some(value) = read_env("PROMOBUNDLE_PROMO_ANCHOR_SEARCH_LIMIT") {
            self.promo.anchor_search_limit =
                parse_usize("PROMOBUNDLE_PROMO_ANCHOR_SEARCH_LIMIT", &value)?;
        }
        if let Some(value) = read_env("PROMOBUNDLE_PROMO_SEMANTIC_FALLBACK_K") {
            self.promo.semantic_fallback_k =
                parse_usize("PROMOBUNDLE_PROMO_SEMANTIC_FALLBACK_K", &value)?;
        }
        if let Some(value) = read_env("PROMOBUNDLE_PROMO_CANDIDATE_POOL_LIMIT") {
            self.promo.candidate_pool_limit =
                parse_usize("PROMOBUNDLE_PROMO_CANDIDATE_POOL_LIMIT", &value)?;
        }
        if let Some(value) = read_env("PROMOBUNDLE_PROMO_TOP_CANDIDATES") {
            self.promo.top_candidates = parse_usize("PROMOBUNDLE_PROMO_TOP_CANDIDATES", &value)?;
        }
        if let Some(value) = read_env("PROMOBUNDLE_PROMO_MAX_BUNDLES") {
            self.promo.max_bundles = parse_usize("PROMOBUNDLE_PROMO_MAX_BUNDLES", &value)?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        validate_promo(&self.promo)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("promobundle.toml"), PathBuf::from("config/promobundle.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_promo(promo: &PromoConfig) -> Result<(), ConfigError> {
    if promo.anchor_search_limit == 0 {
        return Err(ConfigError::Validation(
            "promo.anchor_search_limit must be greater than zero".to_string(),
        ));
    }

    if promo.semantic_fallback_k == 0 {
        return Err(ConfigError::Validation(
            "promo.semantic_fallback_k must be greater than zero".to_string(),
        ));
    }

    if !(2..=50).contains(&promo.candidate_pool_limit) {
        return Err(ConfigError::Validation(
            "promo.candidate_pool_limit must be in range 2..=50".to_string(),
        ));
    }

    // Pair enumeration is quadratic in this value.
    if !(2..=12).contains(&promo.top_candidates) {
        return Err(ConfigError::Validation(
            "promo.top_candidates must be in range 2..=12".to_string(),
        ));
    }

    if promo.top_candidates > promo.candidate_pool_limit {
        return Err(ConfigError::Validation(
            "promo.top_candidates must not exceed promo.candidate_pool_limit".to_string(),
        ));
    }

    if promo.max_bundles == 0 {
        return Err(ConfigError::Validation(
            "promo.max_bundles must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
    promo: Option<PromoPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct PromoPatch {
    anchor_search_limit: Option<usize>,
    semantic_fallback_k: Option<usize>,
    candidate_pool_limit: Option<usize>,
    top_candidates: Option<usize>,
    max_bundles: Option<usize>,
}
