use thiserror::Error;

use promobundle_core::errors::{ApplicationError, DomainError};

pub mod catalog;
pub mod memory;

pub use catalog::{CatalogStats, SqlPromoCatalog};
pub use memory::InMemoryPromoCatalog;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    /// A stored row is readable but breaks the catalog contract (NULL or negative counts).
    #[error("catalog contract violation on `{field}`: {reason}")]
    Contract { field: String, reason: String },
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => ApplicationError::Persistence(error.to_string()),
            RepositoryError::Decode(message) => ApplicationError::Persistence(message),
            RepositoryError::Contract { field, reason } => {
                ApplicationError::Domain(DomainError::DataContractViolation { field, reason })
            }
        }
    }
}
