use crate::commands::recommend::classify;
use crate::commands::{prepare, with_pool, CommandResult};
use promobundle_core::bundles::PromoEngine;
use promobundle_core::config::LoadOptions;
use promobundle_db::SqlPromoCatalog;

/// Frequently-bought-together listing for the product a query resolves to.
pub fn run(options: &LoadOptions, query: &str, json_output: bool) -> CommandResult {
    let (config, runtime) = match prepare("co-purchases", options) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let (rules, limits) = (config.promo.rules(), config.promo.retrieval_limits());
    let result = runtime.block_on(with_pool(&config, |pool| async move {
        let engine = PromoEngine::new(SqlPromoCatalog::new(pool), rules, limits);
        engine.co_purchases(query).await.map_err(classify)
    }));

    let report = match result {
        Ok(report) => report,
        Err(failure) => return CommandResult::from_step("co-purchases", failure),
    };

    if !json_output {
        return CommandResult { exit_code: 0, output: report.result_text };
    }

    match serde_json::to_string_pretty(&report) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("co-purchases", "serialization", error.to_string(), 5),
    }
}
