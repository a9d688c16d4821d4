use promobundle_core::config::{AppConfig, LoadOptions};
use promobundle_db::{connect_with_config, migrations, CatalogStats, DbPool, SqlPromoCatalog};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DATABASE_CHECKS: [&str; 3] = ["database_connectivity", "schema_version", "catalog_populated"];

pub fn run(options: &LoadOptions, json_output: bool) -> String {
    let report = build_report(options);

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(skipped(&DATABASE_CHECKS, "skipped because configuration did not load"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            let mut checks = vec![DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            }];
            checks.extend(skipped(&DATABASE_CHECKS[1..], "skipped because the runtime did not start"));
            return checks;
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                let mut checks = vec![DoctorCheck {
                    name: "database_connectivity",
                    status: CheckStatus::Fail,
                    details: format!("failed to connect to database: {error}"),
                }];
                checks.extend(skipped(&DATABASE_CHECKS[1..], "skipped because the database is unreachable"));
                return checks;
            }
        };

        let checks = vec![
            DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Pass,
                details: format!("connected using `{}`", config.database.url),
            },
            check_schema_version(&pool).await,
            check_catalog_populated(&pool).await,
        ];
        pool.close().await;
        checks
    })
}

async fn check_schema_version(pool: &DbPool) -> DoctorCheck {
    let latest = migrations::MIGRATOR.iter().map(|migration| migration.version).max();
    match migrations::current_version(pool).await {
        Ok(Some(applied)) if Some(applied) == latest => DoctorCheck {
            name: "schema_version",
            status: CheckStatus::Pass,
            details: format!("schema at migration version {applied}"),
        },
        Ok(applied) => DoctorCheck {
            name: "schema_version",
            status: CheckStatus::Fail,
            details: format!(
                "schema at version {}, latest is {}; run `promobundle migrate`",
                applied.map_or_else(|| "none".to_string(), |v| v.to_string()),
                latest.map_or_else(|| "none".to_string(), |v| v.to_string()),
            ),
        },
        Err(error) => DoctorCheck {
            name: "schema_version",
            status: CheckStatus::Fail,
            details: format!("failed to read migration history: {error}"),
        },
    }
}

async fn check_catalog_populated(pool: &DbPool) -> DoctorCheck {
    match SqlPromoCatalog::new(pool.clone()).stats().await {
        Ok(CatalogStats { products, affinity_pairs: pairs }) if products > 0 && pairs > 0 => DoctorCheck {
            name: "catalog_populated",
            status: CheckStatus::Pass,
            details: format!("{products} products, {pairs} affinity pairs"),
        },
        Ok(CatalogStats { products, affinity_pairs: pairs }) => DoctorCheck {
            name: "catalog_populated",
            status: CheckStatus::Fail,
            details: format!(
                "{products} products, {pairs} affinity pairs; run `promobundle seed` or `promobundle features`"
            ),
        },
        Err(error) => DoctorCheck {
            name: "catalog_populated",
            status: CheckStatus::Fail,
            details: format!("failed to read catalog tables: {error}"),
        },
    }
}

fn skipped(names: &[&'static str], reason: &str) -> Vec<DoctorCheck> {
    names
        .iter()
        .map(|name| DoctorCheck { name: *name, status: CheckStatus::Skipped, details: reason.to_string() })
        .collect()
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
