pub mod connection;
pub mod features;
pub mod fixtures;
pub mod ingest;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use features::FeatureRebuild;
pub use fixtures::{seed_demo_catalog, SeedReport};
pub use ingest::{import_instacart, IngestError, IngestReport};
pub use repositories::{CatalogStats, InMemoryPromoCatalog, RepositoryError, SqlPromoCatalog};
