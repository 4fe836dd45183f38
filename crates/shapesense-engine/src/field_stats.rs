//! Per-path type and presence observation over arbitrary documents.
//!
//! One collector pass flattens a document into dotted-path observations;
//! repeated passes over a sample accumulate into the same map, so a path's
//! type set ends up as the union of every tag observed for it across the
//! whole sample. Conflicting types are retained, never coerced away.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use shapesense_core::TypeTag;
use shapesense_config::EngineConfig;

use crate::errors::{EngineError, EngineResult};

/// Observation state for one dotted path. Ephemeral: lives only inside an
/// in-progress aggregation and is rebuilt on every inference run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldStat {
    /// Every type tag observed at this path across the sample.
    pub types: BTreeSet<TypeTag>,

    /// Number of observations in which the path was present.
    pub present_count: u64,
}

/// Shared accumulator for one sampling pass. A `BTreeMap` keeps iteration
/// deterministic for a fixed input sequence.
pub type FieldStatsMap = BTreeMap<String, FieldStat>;

/// Flattens one document into per-path observations.
#[derive(Debug, Clone)]
pub struct FieldStatsCollector {
    /// Array elements inspected per path.
    array_sample: usize,

    /// Nesting depth above which the document is reported malformed.
    max_depth: usize,
}

impl FieldStatsCollector {
    pub fn new(array_sample: usize, max_depth: usize) -> Self {
        Self {
            array_sample,
            max_depth,
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(cfg.array_sample, cfg.max_depth)
    }

    /// Record one document's observations into `stats`.
    ///
    /// Does not modify the input value. Deterministic for a fixed input
    /// sequence. A nesting depth beyond the configured bound is reported as
    /// a malformed payload for this document; observations accumulated
    /// before the bound was hit remain in `stats`.
    pub fn collect(
        &self,
        value: &Value,
        stats: &mut FieldStatsMap,
        path_prefix: &str,
    ) -> EngineResult<()> {
        self.collect_at(value, stats, path_prefix, 0)
    }

    fn collect_at(
        &self,
        value: &Value,
        stats: &mut FieldStatsMap,
        prefix: &str,
        depth: usize,
    ) -> EngineResult<()> {
        if depth > self.max_depth {
            return Err(EngineError::malformed(format!(
                "nesting exceeds {} levels at '{}'",
                self.max_depth, prefix
            )));
        }

        match value {
            // A null document contributes nothing.
            Value::Null => Ok(()),

            Value::Object(map) => {
                for (key, child) in map {
                    let path = join_path(prefix, key);
                    match child {
                        Value::Null => observe(stats, &path, TypeTag::Null),
                        Value::Array(items) => {
                            observe(stats, &path, TypeTag::Array);
                            // Characterize inner shape from a bounded
                            // element sample; elements land under `path[]`.
                            let inner = format!("{path}[]");
                            for item in items.iter().take(self.array_sample) {
                                self.collect_at(
                                    item,
                                    stats,
                                    &inner,
                                    depth + 1,
                                )?;
                            }
                        }
                        Value::Object(_) => {
                            observe(stats, &path, TypeTag::Object);
                            self.collect_at(child, stats, &path, depth + 1)?;
                        }
                        scalar => {
                            observe(stats, &path, TypeTag::of(scalar));
                        }
                    }
                }
                Ok(())
            }

            // Scalars and arrays outside an object key: recorded at the
            // prefix itself, or under the synthetic path `value` for a
            // bare top-level document. Arrays here are tagged without
            // recursing further, mirroring how element samples are
            // characterized one level at a time.
            other => {
                let path = if prefix.is_empty() { "value" } else { prefix };
                observe(stats, path, TypeTag::of(other));
                Ok(())
            }
        }
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn observe(stats: &mut FieldStatsMap, path: &str, tag: TypeTag) {
    let stat = stats.entry(path.to_string()).or_default();
    stat.types.insert(tag);
    stat.present_count += 1;
}
