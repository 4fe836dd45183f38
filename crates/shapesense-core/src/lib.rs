//! Shapesense Core Types
//!
//! This crate defines the record types and store contracts shared by the
//! shapesense engine and its collaborators. Ingestion, persistence and any
//! outer transport live behind the three store traits; the engine only ever
//! sees these contracts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

pub mod errors;
pub use errors::{StoreError, StoreResult};

// ============================================================================
// Type Tags
// ============================================================================

/// JSON value type observed at a field path.
///
/// The derived `Ord` follows declaration order; that order is the canonical
/// one used whenever a set of tags is serialized or compared, so two type
/// sets accumulated in different orders always compare equal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl TypeTag {
    /// Classify a JSON value. Whole-number floats still count as `number`;
    /// only values serde parsed as integers are tagged `integer`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Boolean,
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    TypeTag::Integer
                } else {
                    TypeTag::Number
                }
            }
            Value::String(_) => TypeTag::String,
            Value::Array(_) => TypeTag::Array,
            Value::Object(_) => TypeTag::Object,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Null => "null",
            TypeTag::Boolean => "boolean",
            TypeTag::Integer => "integer",
            TypeTag::Number => "number",
            TypeTag::String => "string",
            TypeTag::Array => "array",
            TypeTag::Object => "object",
        }
    }
}

// ============================================================================
// Schema Field Map
// ============================================================================

/// Committed per-path field specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Observed types in canonical (sorted) order.
    pub types: Vec<TypeTag>,

    /// Number of sampled documents in which the path was present.
    pub present_count: u64,

    /// True when the path was missing from more than the configured
    /// fraction of the sampled population.
    pub optional: bool,
}

/// Dotted path → field spec. A `BTreeMap` keeps iteration, serialization
/// and equality deterministic regardless of accumulation order.
pub type SchemaFields = BTreeMap<String, FieldSpec>;

// ============================================================================
// Records
// ============================================================================

/// Metadata captured for file-backed ingests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileMetadata {
    pub filename: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

/// A raw ingested document. Created by an ingestion collaborator, owned by
/// the raw store, immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: Uuid,

    /// Arbitrary nested value: object, array, scalar or null.
    pub payload: Value,

    /// Where the document came from ("ingest", "upload", ...).
    pub source: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_metadata: Option<FileMetadata>,

    pub ingested_at: DateTime<Utc>,
}

impl RawRecord {
    pub fn new(payload: Value, source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            source: source.into(),
            file_metadata: None,
            ingested_at: Utc::now(),
        }
    }

    pub fn with_file_metadata(mut self, meta: FileMetadata) -> Self {
        self.file_metadata = Some(meta);
        self
    }
}

/// One committed entry of the schema ledger.
///
/// Versions start at 1 and increase strictly with no gaps; entries are
/// immutable once committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub fields: SchemaFields,
    pub total_samples: u64,
    pub notes: String,
}

/// Flat canonical projection of one raw record.
///
/// `canonical` maps top-level field names to scalars only; the store
/// guarantees at most one normalized record per raw record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub id: Uuid,
    pub canonical: Map<String, Value>,
    pub raw_id: Uuid,
    pub schema_version: Option<u32>,
    pub normalized_at: DateTime<Utc>,
}

// ============================================================================
// Store Contracts
// ============================================================================

/// Append-only store of raw documents. Many concurrent writers and readers.
#[async_trait]
pub trait RawStore: Send + Sync {
    /// Persist a freshly ingested record.
    async fn append(&self, record: RawRecord) -> StoreResult<()>;

    /// The `n` most recently ingested records, newest first.
    async fn sample_recent(&self, n: usize) -> StoreResult<Vec<RawRecord>>;

    /// The most recent `limit` records, newest first. Same ordering as
    /// `sample_recent`; kept separate because sweep windows and inference
    /// samples are tuned independently.
    async fn scan_recent(&self, limit: usize) -> StoreResult<Vec<RawRecord>>;
}

/// Append-only ledger of committed schema versions.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// The highest committed version, if any.
    async fn latest(&self) -> StoreResult<Option<SchemaVersion>>;

    /// Full ledger, oldest first.
    async fn history(&self) -> StoreResult<Vec<SchemaVersion>>;

    /// Atomically commit a new version.
    ///
    /// `expected_prior` is the version the caller observed as latest (None
    /// for an empty ledger). The store assigns `expected_prior + 1` (or 1)
    /// and MUST fail with [`StoreError::VersionConflict`] when the ledger
    /// has moved past `expected_prior`, so overlapping committers can never
    /// duplicate or reorder version numbers.
    async fn commit(
        &self,
        fields: SchemaFields,
        total_samples: u64,
        notes: &str,
        expected_prior: Option<u32>,
    ) -> StoreResult<SchemaVersion>;
}

/// Store of normalized records, unique per raw record.
#[async_trait]
pub trait NormalizedStore: Send + Sync {
    /// Whether a normalized record already references `raw_id`.
    async fn exists_for_raw(&self, raw_id: Uuid) -> StoreResult<bool>;

    /// Insert-if-absent keyed on `raw_id`.
    ///
    /// MUST fail with [`StoreError::DuplicateNormalized`] on a second
    /// creation for the same raw record; callers treat that as a lost race,
    /// not a defect.
    async fn create(
        &self,
        canonical: Map<String, Value>,
        raw_id: Uuid,
        schema_version: Option<u32>,
    ) -> StoreResult<NormalizedRecord>;
}

pub type ArcRawStore = Arc<dyn RawStore>;
pub type ArcSchemaStore = Arc<dyn SchemaStore>;
pub type ArcNormalizedStore = Arc<dyn NormalizedStore>;

// ============================================================================
// Tests
// ============================================================================
