use speakerbob_provider::ProviderError;
use speakerbob_store::StoreError;
use thiserror::Error;

/// Errors produced by domain operations.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid {entity}: {reason}")]
    Validation { entity: &'static str, reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}

pub type ModelResult<T> = Result<T, ModelError>;
