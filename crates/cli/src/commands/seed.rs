use crate::commands::{prepare, with_pool, CommandResult, StepFailure};
use promobundle_core::config::LoadOptions;
use promobundle_db::{migrations, seed_demo_catalog};

pub fn run(options: &LoadOptions) -> CommandResult {
    let (config, runtime) = match prepare("seed", options) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(with_pool(&config, |pool| async move {
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        seed_demo_catalog(&pool)
            .await
            .map_err(|error| -> StepFailure { ("seed_execution", error.to_string(), 5) })
    }));

    match result {
        Ok(report) => CommandResult::success(
            "seed",
            format!(
                "seeded demo catalog: {} departments, {} aisles, {} products, {} affinity pairs",
                report.departments, report.aisles, report.products, report.affinity_pairs
            ),
        ),
        Err(failure) => CommandResult::from_step("seed", failure),
    }
}
