//! Inference pass: sample → stats → candidate schema → drift comparison →
//! versioned commit.

use metrics::counter;
use tracing::{debug, info, warn};

use shapesense_config::EngineConfig;
use shapesense_core::{ArcRawStore, ArcSchemaStore, SchemaVersion};

use crate::errors::EngineResult;
use crate::field_stats::{FieldStatsCollector, FieldStatsMap};
use crate::fingerprint::compute_fingerprint;
use crate::schema_builder::build_schema;

/// Orchestrates one schema inference attempt over the recent sample.
///
/// Safe to run concurrently with itself: drift detection is a read, and the
/// commit is a compare-and-swap against the version this pass observed, so
/// overlapping passes that detect the same drift produce exactly one new
/// ledger entry — the loser surfaces a version conflict and retries on its
/// next trigger.
pub struct InferenceCoordinator {
    raw: ArcRawStore,
    schemas: ArcSchemaStore,
    collector: FieldStatsCollector,
}

impl InferenceCoordinator {
    pub fn new(
        raw: ArcRawStore,
        schemas: ArcSchemaStore,
        cfg: &EngineConfig,
    ) -> Self {
        Self {
            raw,
            schemas,
            collector: FieldStatsCollector::from_config(cfg),
        }
    }

    /// Sample the newest `sample_size` raw records, build a candidate
    /// schema, and commit a new version iff the candidate differs
    /// structurally from the latest committed one.
    ///
    /// Returns `Ok(None)` when no version was created: empty store, or no
    /// drift. Store failures abort the attempt with no partial commit.
    pub async fn infer_and_maybe_create_version(
        &self,
        sample_size: usize,
        optional_threshold: f64,
        notes: &str,
    ) -> EngineResult<Option<SchemaVersion>> {
        let samples = self.raw.sample_recent(sample_size).await?;
        if samples.is_empty() {
            debug!("no raw records to sample, skipping inference");
            return Ok(None);
        }
        let total = samples.len() as u64;

        let mut stats = FieldStatsMap::new();
        let mut malformed = 0usize;
        for record in &samples {
            if let Err(e) = self.collector.collect(&record.payload, &mut stats, "")
            {
                warn!(
                    record_id = %record.id,
                    error = %e,
                    "malformed payload in sample, continuing pass"
                );
                malformed += 1;
            }
        }

        let candidate = build_schema(&stats, total, optional_threshold);

        let latest = self.schemas.latest().await?;
        let drifted = match &latest {
            Some(prior) => prior.fields != candidate,
            None => true,
        };
        if !drifted {
            debug!(
                version = latest.as_ref().map(|l| l.version),
                samples = total,
                "no schema drift detected"
            );
            return Ok(None);
        }

        let expected_prior = latest.as_ref().map(|l| l.version);
        let fingerprint = compute_fingerprint(&candidate);

        let created = self
            .schemas
            .commit(candidate, total, notes, expected_prior)
            .await
            .inspect_err(|e| {
                counter!("shapesense_inference_commit_failures_total")
                    .increment(1);
                warn!(error = %e, "schema version commit aborted");
            })?;

        info!(
            version = created.version,
            fingerprint = %fingerprint,
            fields = created.fields.len(),
            samples = total,
            malformed,
            notes,
            "committed new schema version"
        );
        counter!("shapesense_schema_versions_total").increment(1);

        Ok(Some(created))
    }
}
