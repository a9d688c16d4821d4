use std::path::Path;

use crate::commands::{prepare, with_pool, CommandResult, StepFailure};
use promobundle_core::config::LoadOptions;
use promobundle_db::{import_instacart, migrations, IngestError};

/// Loads an Instacart CSV export into a migrated database. Feature tables are
/// emptied by the import and rebuilt by `features`.
pub fn run(options: &LoadOptions, dir: &Path) -> CommandResult {
    let (config, runtime) = match prepare("import", options) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(with_pool(&config, |pool| async move {
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        import_instacart(&pool, dir).await.map_err(classify)
    }));

    match result {
        Ok(report) => CommandResult::success(
            "import",
            format!(
                "imported {} departments, {} aisles, {} products, {} orders, {} order lines; run `promobundle features` next",
                report.departments, report.aisles, report.products, report.orders, report.order_lines
            ),
        ),
        Err(failure) => CommandResult::from_step("import", failure),
    }
}

fn classify(error: IngestError) -> StepFailure {
    match error {
        IngestError::MissingFile(_) | IngestError::Csv { .. } => ("import_input", error.to_string(), 7),
        IngestError::Database(_) => ("persistence", error.to_string(), 5),
    }
}
