//! Error types for the inference and normalization passes.

use shapesense_core::StoreError;
use thiserror::Error;

/// Errors that can occur during an engine pass.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A document or field could not be traversed or interpreted.
    ///
    /// During sampling and sweeping this is handled per document and never
    /// aborts the surrounding pass.
    #[error("malformed payload: {details}")]
    MalformedPayload { details: String },

    /// A store contract failed; conflicts and outages both land here.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn malformed(details: impl Into<String>) -> Self {
        Self::MalformedPayload {
            details: details.into(),
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
