use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use promobundle_cli::commands::{
    co_purchases, config, doctor, features, import, migrate, recommend, seed,
};
use promobundle_core::config::LoadOptions;
use serde_json::Value;

#[test]
fn migrate_returns_success_with_memory_database() {
    with_env(&[("PROMOBUNDLE_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run(&LoadOptions::default());
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["message"], "schema at migration version 1");
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_promo_caps() {
    with_env(
        &[("PROMOBUNDLE_DATABASE_URL", "sqlite::memory:"), ("PROMOBUNDLE_PROMO_MAX_BUNDLES", "0")],
        || {
            let result = migrate::run(&LoadOptions::default());
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("PROMOBUNDLE_DATABASE_URL", url.as_str())], || {
        let first = seed::run(&LoadOptions::default());
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let second = seed::run(&LoadOptions::default());
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        let first_payload = parse_payload(&first.output);
        let second_payload = parse_payload(&second.output);
        assert_eq!(first_payload["command"], "seed");
        assert_eq!(first_payload["message"], second_payload["message"]);
        assert_eq!(
            first_payload["message"],
            "seeded demo catalog: 5 departments, 10 aisles, 24 products, 29 affinity pairs"
        );
    });
}

#[test]
fn recommend_renders_text_after_seed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("PROMOBUNDLE_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run(&LoadOptions::default()).exit_code, 0);

        let result = recommend::run(&LoadOptions::default(), "banana", false);
        assert_eq!(result.exit_code, 0);
        assert!(result.output.starts_with("Promotion Recommendation (Top 3 Bundles)"));
        assert!(result.output.contains("- Banana (Anchor)"));
    });
}

#[test]
fn recommend_json_reports_structured_bundles() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("PROMOBUNDLE_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run(&LoadOptions::default()).exit_code, 0);

        let result = recommend::run(&LoadOptions::default(), "Organic Hass Avocado", true);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "bundles");
        assert_eq!(payload["anchor"]["product_id"], 47209);
        let bundles = payload["bundles"].as_array().expect("bundles array");
        assert!(!bundles.is_empty() && bundles.len() <= 3);
    });
}

#[test]
fn recommend_rejects_blank_queries() {
    with_env(&[("PROMOBUNDLE_DATABASE_URL", "sqlite::memory:")], || {
        let result = recommend::run(&LoadOptions::default(), "   ", false);
        assert_eq!(result.exit_code, 6);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "recommend");
        assert_eq!(payload["error_class"], "invalid_query");
    });
}

#[test]
fn recommend_reports_persistence_failure_without_schema() {
    with_env(&[("PROMOBUNDLE_DATABASE_URL", "sqlite::memory:")], || {
        let result = recommend::run(&LoadOptions::default(), "banana", false);
        assert_eq!(result.exit_code, 5);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "persistence");
    });
}

#[test]
fn features_without_order_history_is_a_noop() {
    with_env(&[("PROMOBUNDLE_DATABASE_URL", "sqlite::memory:")], || {
        let result = features::run(&LoadOptions::default());
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["message"], "no order lines found; feature tables left unchanged");
    });
}

#[test]
fn import_then_features_feeds_co_purchase_lookups() {
    let dir = tempfile::tempdir().expect("tempdir");
    let export = tempfile::tempdir().expect("export dir");
    write_export(export.path());
    let url = database_url(&dir);
    with_env(&[("PROMOBUNDLE_DATABASE_URL", url.as_str())], || {
        let imported = import::run(&LoadOptions::default(), export.path());
        assert_eq!(imported.exit_code, 0, "import failed: {}", imported.output);
        assert_eq!(
            parse_payload(&imported.output)["message"],
            "imported 2 departments, 2 aisles, 3 products, 3 orders, 6 order lines; run `promobundle features` next"
        );

        let rebuilt = features::run(&LoadOptions::default());
        assert_eq!(
            parse_payload(&rebuilt.output)["message"],
            "rebuilt features from 6 order lines: 3 velocity rows, 2 affinity pairs"
        );

        let lookup = co_purchases::run(&LoadOptions::default(), "banana", false);
        assert_eq!(lookup.exit_code, 0);
        let lines: Vec<&str> = lookup.output.lines().collect();
        assert_eq!(lines[7], "Frequently bought together (based on basket affinity) for product_id=1:");
        assert_eq!(&lines[8..], ["- Limes, Organic (co_purchase_count=2)", "- Whole Milk (co_purchase_count=1)"]);
    });
}

#[test]
fn import_reports_missing_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let export = tempfile::tempdir().expect("export dir");
    let url = database_url(&dir);
    with_env(&[("PROMOBUNDLE_DATABASE_URL", url.as_str())], || {
        let result = import::run(&LoadOptions::default(), export.path());
        assert_eq!(result.exit_code, 7);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "import");
        assert_eq!(payload["error_class"], "import_input");
    });
}

#[test]
fn co_purchases_fall_back_to_department_favourites() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("PROMOBUNDLE_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run(&LoadOptions::default()).exit_code, 0);

        let text = co_purchases::run(&LoadOptions::default(), "eggs", false);
        assert_eq!(text.exit_code, 0);
        assert!(text.output.contains("- No strong co-purchase pairs found in affinity table."));

        let json = co_purchases::run(&LoadOptions::default(), "eggs", true);
        let payload = parse_payload(&json.output);
        assert_eq!(payload["status"], "popular_alternatives");
        assert_eq!(payload["alternatives"][0]["product_id"], 27845);
    });
}

#[test]
fn co_purchases_report_unmatched_queries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("PROMOBUNDLE_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run(&LoadOptions::default()).exit_code, 0);

        let result = co_purchases::run(&LoadOptions::default(), "xylophone", false);
        assert_eq!(result.exit_code, 0);
        assert_eq!(
            result.output,
            "No matching products found. Try a different query (e.g., 'banana', 'yogurt', 'almond milk')."
        );
    });
}

#[test]
fn doctor_passes_on_seeded_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("PROMOBUNDLE_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run(&LoadOptions::default()).exit_code, 0);

        let payload = parse_payload(&doctor::run(&LoadOptions::default(), true));
        assert_eq!(payload["overall_status"], "pass");
        assert_eq!(payload["checks"].as_array().map(Vec::len), Some(4));
    });
}

#[test]
fn doctor_flags_unmigrated_database() {
    with_env(&[("PROMOBUNDLE_DATABASE_URL", "sqlite::memory:")], || {
        let payload = parse_payload(&doctor::run(&LoadOptions::default(), true));
        assert_eq!(payload["overall_status"], "fail");

        let checks = payload["checks"].as_array().expect("checks array");
        let schema = checks.iter().find(|check| check["name"] == "schema_version").expect("schema check");
        assert_eq!(schema["status"], "fail");
    });
}

#[test]
fn config_attributes_sources() {
    with_env(&[("PROMOBUNDLE_LOG_LEVEL", "debug")], || {
        let output = config::run(&LoadOptions::default());
        assert!(output.contains("- logging.level = debug (source: env (PROMOBUNDLE_LOG_LEVEL))"));
        assert!(output.contains("- promo.max_bundles = 3 (source: default)"));
    });
}

fn database_url(dir: &tempfile::TempDir) -> String {
    format!("sqlite://{}", dir.path().join("promobundle.db").display())
}

fn write_export(dir: &Path) {
    let files = [
        ("departments.csv", "department_id,department\n4,produce\n16,dairy eggs\n"),
        ("aisles.csv", "aisle_id,aisle\n24,fresh fruits\n84,milk\n"),
        (
            "products.csv",
            "product_id,product_name,aisle_id,department_id\n1,Banana,24,4\n2,\"Limes, Organic\",24,4\n3,Whole Milk,84,16\n",
        ),
        (
            "orders.csv",
            "order_id,user_id,eval_set,order_number,order_dow,order_hour_of_day,days_since_prior_order\n\
             10,1,prior,1,2,8,\n11,1,prior,2,3,9,7.0\n12,2,train,1,4,10,\n",
        ),
        (
            "order_products__prior.csv",
            "order_id,product_id,add_to_cart_order,reordered\n10,1,1,0\n10,2,2,0\n11,1,1,1\n11,3,2,0\n",
        ),
        ("order_products__train.csv", "order_id,product_id,add_to_cart_order,reordered\n12,1,1,1\n12,2,2,1\n"),
    ];
    for (name, contents) in files {
        fs::write(dir.join(name), contents).expect("write csv");
    }
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PROMOBUNDLE_DATABASE_URL",
        "PROMOBUNDLE_DATABASE_MAX_CONNECTIONS",
        "PROMOBUNDLE_DATABASE_TIMEOUT_SECS",
        "PROMOBUNDLE_SERVER_BIND_ADDRESS",
        "PROMOBUNDLE_SERVER_PORT",
        "PROMOBUNDLE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "PROMOBUNDLE_LOGGING_LEVEL",
        "PROMOBUNDLE_LOGGING_FORMAT",
        "PROMOBUNDLE_LOG_LEVEL",
        "PROMOBUNDLE_LOG_FORMAT",
        "PROMOBUNDLE_PROMO_ANCHOR_SEARCH_LIMIT",
        "PROMOBUNDLE_PROMO_SEMANTIC_FALLBACK_K",
        "PROMOBUNDLE_PROMO_CANDIDATE_POOL_LIMIT",
        "PROMOBUNDLE_PROMO_TOP_CANDIDATES",
        "PROMOBUNDLE_PROMO_MAX_BUNDLES",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
