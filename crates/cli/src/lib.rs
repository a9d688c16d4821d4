pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use promobundle_core::config::LoadOptions;

#[derive(Debug, Parser)]
#[command(
    name = "promobundle",
    about = "Promobundle operator CLI",
    long_about = "Build promotion bundles from the catalog, manage the schema and feature tables, and check runtime readiness.",
    after_help = "Examples:\n  promobundle seed\n  promobundle import data/raw/instacart\n  promobundle recommend banana\n  promobundle co-purchases eggs\n  promobundle recommend \"hass avocado\" --json\n  promobundle doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a promobundle.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Recommend up to three anchor + two add-on promotion bundles for a product query")]
    Recommend {
        #[arg(help = "Free-text product query, e.g. \"banana\"")]
        query: String,
        #[arg(long, help = "Emit the structured recommendation as JSON")]
        json: bool,
    },
    #[command(about = "List products frequently bought together with the product a query resolves to")]
    CoPurchases {
        #[arg(help = "Free-text product query, e.g. \"eggs\"")]
        query: String,
        #[arg(long, help = "Emit the structured lookup as JSON")]
        json: bool,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo grocery catalog (idempotent)")]
    Seed,
    #[command(about = "Replace catalog and order history with an Instacart CSV export")]
    Import {
        #[arg(help = "Directory holding aisles.csv, departments.csv, products.csv, orders.csv and order_products__{prior,train}.csv")]
        dir: PathBuf,
    },
    #[command(about = "Rebuild velocity and basket-affinity features from order history")]
    Features,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, database connectivity, schema and catalog readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config,
        ..LoadOptions::default()
    };

    let result = match cli.command {
        Command::Recommend { query, json } => commands::recommend::run(&options, &query, json),
        Command::CoPurchases { query, json } => commands::co_purchases::run(&options, &query, json),
        Command::Migrate => commands::migrate::run(&options),
        Command::Seed => commands::seed::run(&options),
        Command::Import { dir } => commands::import::run(&options, &dir),
        Command::Features => commands::features::run(&options),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(&options) }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(&options, json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
