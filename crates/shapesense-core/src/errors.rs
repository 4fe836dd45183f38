use std::borrow::Cow;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the store contracts.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Persistence is unreachable. Aborts the current attempt; the caller
    /// retries on its next trigger.
    #[error("store unavailable: {details}")]
    Unavailable { details: Cow<'static, str> },

    /// The ledger moved past the version the committer observed.
    #[error(
        "schema version conflict: expected prior {expected:?}, ledger at {actual:?}"
    )]
    VersionConflict {
        expected: Option<u32>,
        actual: Option<u32>,
    },

    /// A normalized record already references this raw record.
    #[error("normalized record already exists for raw {raw_id}")]
    DuplicateNormalized { raw_id: Uuid },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn unavailable(details: impl Into<Cow<'static, str>>) -> Self {
        Self::Unavailable {
            details: details.into(),
        }
    }

    /// True for the two atomic-constraint violations; useful when a caller
    /// wants to treat a lost race differently from an outage.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::VersionConflict { .. }
                | StoreError::DuplicateNormalized { .. }
        )
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
