use crate::commands::{prepare, with_pool, CommandResult, StepFailure};
use promobundle_core::bundles::PromoEngine;
use promobundle_core::config::LoadOptions;
use promobundle_core::errors::{ApplicationError, DomainError};
use promobundle_db::SqlPromoCatalog;

/// Plain output is the rendered recommendation text; `--json` prints the
/// structured recommendation instead. Failures use the standard envelope.
pub fn run(options: &LoadOptions, query: &str, json_output: bool) -> CommandResult {
    let (config, runtime) = match prepare("recommend", options) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let (rules, limits) = (config.promo.rules(), config.promo.retrieval_limits());
    let result = runtime.block_on(with_pool(&config, |pool| async move {
        let engine = PromoEngine::new(SqlPromoCatalog::new(pool), rules, limits);
        engine.recommend(query).await.map_err(classify)
    }));

    let recommendation = match result {
        Ok(recommendation) => recommendation,
        Err(failure) => return CommandResult::from_step("recommend", failure),
    };

    if !json_output {
        return CommandResult { exit_code: 0, output: recommendation.result_text };
    }

    match serde_json::to_string_pretty(&recommendation) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("recommend", "serialization", error.to_string(), 5),
    }
}

pub(crate) fn classify(error: ApplicationError) -> StepFailure {
    match error {
        ApplicationError::Domain(DomainError::InvalidQuery(message)) => ("invalid_query", message, 6),
        ApplicationError::Domain(error @ DomainError::DataContractViolation { .. }) => {
            ("data_contract", error.to_string(), 7)
        }
        ApplicationError::Persistence(message) => ("persistence", message, 5),
        ApplicationError::Integration(message) => ("integration", message, 5),
        ApplicationError::Configuration(message) => ("config_validation", message, 2),
    }
}
