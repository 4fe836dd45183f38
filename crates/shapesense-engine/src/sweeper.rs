//! Normalization sweep: scan recent raw records, flatten the ones that have
//! no normalized counterpart yet, stamp them with the current schema
//! version.

use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shapesense_config::EngineConfig;
use shapesense_core::{
    ArcNormalizedStore, ArcRawStore, ArcSchemaStore, StoreError,
};

use crate::canonical::CanonicalTransformer;
use crate::errors::EngineResult;

/// Outcome for one scanned raw record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStatus {
    /// A new normalized record was persisted.
    Normalized,

    /// A normalized record already referenced this raw record, either
    /// before the sweep or via a concurrent sweep that won the insert.
    AlreadyNormalized,

    /// Transform or persistence failed; the record stays eligible for the
    /// next sweep because nothing was written for it.
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepOutcome {
    pub raw_id: Uuid,
    pub status: SweepStatus,
}

/// Per-record outcomes of one sweep, plus derived counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub outcomes: Vec<SweepOutcome>,
}

impl SweepReport {
    pub fn normalized(&self) -> usize {
        self.count(|s| matches!(s, SweepStatus::Normalized))
    }

    pub fn already_normalized(&self) -> usize {
        self.count(|s| matches!(s, SweepStatus::AlreadyNormalized))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, SweepStatus::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&SweepStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Scans the recent raw window and normalizes pending records.
///
/// Safe to run concurrently with itself: the existence pre-check is only an
/// optimization, and a lost race on the store's insert-if-absent counts as
/// already-normalized rather than producing a duplicate.
pub struct NormalizationSweeper {
    raw: ArcRawStore,
    schemas: ArcSchemaStore,
    normalized: ArcNormalizedStore,
    transformer: CanonicalTransformer,
    scan_window: usize,
}

impl NormalizationSweeper {
    pub fn new(
        raw: ArcRawStore,
        schemas: ArcSchemaStore,
        normalized: ArcNormalizedStore,
        cfg: &EngineConfig,
    ) -> Self {
        Self {
            raw,
            schemas,
            normalized,
            transformer: CanonicalTransformer::new(cfg.transform.clone()),
            scan_window: cfg.scan_window,
        }
    }

    /// Normalize every record in the recent window that has no normalized
    /// counterpart yet.
    ///
    /// Records older than the window are out of scope for this pass. A
    /// single record's failure is recorded and the sweep moves on; only a
    /// failure to read the window or resolve the ledger aborts the sweep.
    /// Idempotent: with no new raw records a repeat sweep writes nothing.
    pub async fn normalize_pending(&self) -> EngineResult<SweepReport> {
        let schema_version =
            self.schemas.latest().await?.map(|v| v.version);

        let window = self.raw.scan_recent(self.scan_window).await?;
        let mut report = SweepReport::default();

        for record in window {
            let status = self.normalize_one(&record, schema_version).await;
            report.outcomes.push(SweepOutcome {
                raw_id: record.id,
                status,
            });
        }

        info!(
            normalized = report.normalized(),
            already_normalized = report.already_normalized(),
            failed = report.failed(),
            schema_version,
            "normalization sweep complete"
        );
        counter!("shapesense_records_normalized_total")
            .increment(report.normalized() as u64);
        if report.failed() > 0 {
            counter!("shapesense_sweep_failures_total")
                .increment(report.failed() as u64);
        }

        Ok(report)
    }

    async fn normalize_one(
        &self,
        record: &shapesense_core::RawRecord,
        schema_version: Option<u32>,
    ) -> SweepStatus {
        match self.normalized.exists_for_raw(record.id).await {
            Ok(true) => return SweepStatus::AlreadyNormalized,
            Ok(false) => {}
            Err(e) => {
                warn!(raw_id = %record.id, error = %e, "existence check failed");
                return SweepStatus::Failed {
                    reason: e.to_string(),
                };
            }
        }

        let canonical = match self.transformer.transform(&record.payload) {
            Ok(c) => c,
            Err(e) => {
                warn!(raw_id = %record.id, error = %e, "record failed to normalize");
                return SweepStatus::Failed {
                    reason: e.to_string(),
                };
            }
        };

        match self
            .normalized
            .create(canonical, record.id, schema_version)
            .await
        {
            Ok(created) => {
                debug!(
                    raw_id = %record.id,
                    normalized_id = %created.id,
                    schema_version,
                    "normalized raw record"
                );
                SweepStatus::Normalized
            }
            // A concurrent sweep got there first between our check and the
            // insert; the store's uniqueness guarantee makes this a skip.
            Err(StoreError::DuplicateNormalized { .. }) => {
                SweepStatus::AlreadyNormalized
            }
            Err(e) => {
                warn!(raw_id = %record.id, error = %e, "failed to persist normalized record");
                SweepStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shapesense_core::{RawRecord, RawStore, SchemaFields, SchemaStore};
    use shapesense_stores::{MemNormalizedStore, MemRawStore, MemSchemaStore};
    use std::sync::Arc;

    struct Fixture {
        raw: Arc<MemRawStore>,
        schemas: Arc<MemSchemaStore>,
        normalized: Arc<MemNormalizedStore>,
        sweeper: NormalizationSweeper,
    }

    fn fixture() -> Fixture {
        let raw = Arc::new(MemRawStore::new());
        let schemas = Arc::new(MemSchemaStore::new());
        let normalized = Arc::new(MemNormalizedStore::new());
        let sweeper = NormalizationSweeper::new(
            raw.clone(),
            schemas.clone(),
            normalized.clone(),
            &EngineConfig::default(),
        );
        Fixture {
            raw,
            schemas,
            normalized,
            sweeper,
        }
    }

    #[tokio::test]
    async fn sweep_normalizes_pending_records() {
        let f = fixture();
        let rec = RawRecord::new(json!({"age": "42", "tags": ["a", "b"]}), "t");
        let raw_id = rec.id;
        f.raw.append(rec).await.unwrap();

        let report = f.sweeper.normalize_pending().await.unwrap();
        assert_eq!(report.normalized(), 1);

        let stored = f.normalized.get_for_raw(raw_id).await.unwrap();
        assert_eq!(stored.canonical["age"], json!(42));
        assert_eq!(stored.canonical["tags"], json!("a,b"));
        // No committed schema yet → stamped with no version.
        assert_eq!(stored.schema_version, None);
    }

    #[tokio::test]
    async fn records_are_stamped_with_latest_version() {
        let f = fixture();
        f.schemas
            .commit(SchemaFields::new(), 5, "auto", None)
            .await
            .unwrap();

        let rec = RawRecord::new(json!({"x": 1}), "t");
        let raw_id = rec.id;
        f.raw.append(rec).await.unwrap();

        f.sweeper.normalize_pending().await.unwrap();
        let stored = f.normalized.get_for_raw(raw_id).await.unwrap();
        assert_eq!(stored.schema_version, Some(1));
    }

    #[tokio::test]
    async fn repeat_sweep_writes_nothing() {
        let f = fixture();
        f.raw
            .append(RawRecord::new(json!({"x": 1}), "t"))
            .await
            .unwrap();

        let first = f.sweeper.normalize_pending().await.unwrap();
        assert_eq!(first.normalized(), 1);

        let second = f.sweeper.normalize_pending().await.unwrap();
        assert_eq!(second.normalized(), 0);
        assert_eq!(second.already_normalized(), 1);
        assert_eq!(f.normalized.len().await, 1);
    }

    #[tokio::test]
    async fn failures_do_not_abort_the_sweep() {
        let f = fixture();
        // A payload the transformer rejects, sandwiched between good ones.
        f.raw
            .append(RawRecord::new(json!({"a": 1}), "t"))
            .await
            .unwrap();
        f.raw
            .append(RawRecord::new(json!("not an object"), "t"))
            .await
            .unwrap();
        f.raw
            .append(RawRecord::new(json!({"b": 2}), "t"))
            .await
            .unwrap();

        let report = f.sweeper.normalize_pending().await.unwrap();
        assert_eq!(report.normalized(), 2);
        assert_eq!(report.failed(), 1);

        // The failed record wrote nothing, so it stays eligible.
        let again = f.sweeper.normalize_pending().await.unwrap();
        assert_eq!(again.failed(), 1);
        assert_eq!(again.normalized(), 0);
    }

    #[tokio::test]
    async fn window_bounds_the_scan() {
        let raw = Arc::new(MemRawStore::new());
        let schemas = Arc::new(MemSchemaStore::new());
        let normalized = Arc::new(MemNormalizedStore::new());
        let cfg = EngineConfig {
            scan_window: 2,
            ..Default::default()
        };
        let sweeper = NormalizationSweeper::new(
            raw.clone(),
            schemas.clone(),
            normalized.clone(),
            &cfg,
        );

        for i in 0..5 {
            raw.append(RawRecord::new(json!({"n": i}), "t"))
                .await
                .unwrap();
        }

        let report = sweeper.normalize_pending().await.unwrap();
        // Only the newest two records are in scope for this pass.
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.normalized(), 2);
        assert_eq!(normalized.len().await, 2);
    }

    #[tokio::test]
    async fn concurrent_sweeps_never_duplicate() {
        let f = fixture();
        for i in 0..20 {
            f.raw
                .append(RawRecord::new(json!({"n": i}), "t"))
                .await
                .unwrap();
        }

        let sweeper = Arc::new(f.sweeper);
        let mut handles = Vec::new();
        for _ in 0..4 {
            let s = Arc::clone(&sweeper);
            handles.push(tokio::spawn(
                async move { s.normalize_pending().await },
            ));
        }

        let mut total_normalized = 0;
        for h in handles {
            total_normalized += h.await.unwrap().unwrap().normalized();
        }

        assert_eq!(total_normalized, 20);
        assert_eq!(f.normalized.len().await, 20);
    }
}
