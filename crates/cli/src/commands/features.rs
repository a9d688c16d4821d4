use crate::commands::{prepare, with_pool, CommandResult, StepFailure};
use promobundle_core::config::LoadOptions;
use promobundle_db::{features, migrations};

pub fn run(options: &LoadOptions) -> CommandResult {
    let (config, runtime) = match prepare("features", options) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(with_pool(&config, |pool| async move {
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        features::rebuild(&pool)
            .await
            .map_err(|error| -> StepFailure { ("feature_rebuild", error.to_string(), 5) })
    }));

    match result {
        Ok(report) if report.source_lines == 0 => CommandResult::success(
            "features",
            "no order lines found; feature tables left unchanged",
        ),
        Ok(report) => CommandResult::success(
            "features",
            format!(
                "rebuilt features from {} order lines: {} velocity rows, {} affinity pairs",
                report.source_lines, report.velocity_rows, report.affinity_rows
            ),
        ),
        Err(failure) => CommandResult::from_step("features", failure),
    }
}
