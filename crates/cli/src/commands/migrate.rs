use crate::commands::{prepare, with_pool, CommandResult, StepFailure};
use promobundle_core::config::LoadOptions;
use promobundle_db::migrations;

pub fn run(options: &LoadOptions) -> CommandResult {
    let (config, runtime) = match prepare("migrate", options) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(with_pool(&config, |pool| async move {
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        migrations::current_version(&pool)
            .await
            .map_err(|error| -> StepFailure { ("migration", error.to_string(), 5) })
    }));

    match result {
        Ok(Some(version)) => {
            CommandResult::success("migrate", format!("schema at migration version {version}"))
        }
        Ok(None) => CommandResult::success("migrate", "no migrations to apply"),
        Err(failure) => CommandResult::from_step("migrate", failure),
    }
}
