//! Shapesense Engine - schema inference and canonical normalization for
//! semi-structured documents.
//!
//! The engine watches a population of recently ingested JSON documents,
//! infers a statistical schema over them, commits an immutable new schema
//! version whenever that schema drifts, and flattens each raw document into
//! a canonical scalar record stamped with the version in force at the time.
//!
//! # Components
//!
//! - [`FieldStatsCollector`]: flattens one document into per-path
//!   type/presence observations
//! - [`build_schema`]: aggregates observations into a candidate schema
//! - [`InferenceCoordinator`]: sampling → stats → candidate → drift
//!   comparison → versioned commit
//! - [`CanonicalTransformer`]: flattens one raw payload into a normalized
//!   record
//! - [`NormalizationSweeper`]: scans unnormalized raw records and persists
//!   their canonical form
//! - [`Engine`]: facade bundling both passes plus explicit background
//!   task submission
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use shapesense_config::EngineConfig;
//! use shapesense_engine::{Engine, Trigger};
//! use shapesense_stores::{MemNormalizedStore, MemRawStore, MemSchemaStore};
//!
//! let engine = Arc::new(Engine::new(
//!     Arc::new(MemRawStore::new()),
//!     Arc::new(MemSchemaStore::new()),
//!     Arc::new(MemNormalizedStore::new()),
//!     EngineConfig::default(),
//! ));
//!
//! // Request paths hand work off without awaiting it:
//! let task = Arc::clone(&engine).submit(Trigger::Ingest);
//! // ...while schedulers can drive a full pass inline:
//! let summary = engine.run_once(Trigger::Schedule).await?;
//! ```

mod canonical;
mod dispatch;
mod errors;
mod field_stats;
mod fingerprint;
mod inference;
mod schema_builder;
mod sweeper;

pub use canonical::CanonicalTransformer;
pub use dispatch::{Engine, EngineTask, LastRun, RunSummary, Trigger};
pub use errors::{EngineError, EngineResult};
pub use field_stats::{FieldStat, FieldStatsCollector, FieldStatsMap};
pub use fingerprint::compute_fingerprint;
pub use inference::InferenceCoordinator;
pub use schema_builder::build_schema;
pub use sweeper::{NormalizationSweeper, SweepOutcome, SweepReport, SweepStatus};

pub use shapesense_config::EngineConfig;
