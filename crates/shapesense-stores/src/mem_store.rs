use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use shapesense_core::{
    NormalizedRecord, NormalizedStore, RawRecord, RawStore, SchemaFields,
    SchemaStore, SchemaVersion, StoreError, StoreResult,
};

// ============================================================================
// Raw records
// ============================================================================

/// Append-only raw record store. Records are held in ingest order; recency
/// queries walk the tail, so ties in `ingested_at` resolve to arrival order.
#[derive(Default)]
pub struct MemRawStore {
    records: RwLock<Vec<RawRecord>>,
}

impl MemRawStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RawStore for MemRawStore {
    async fn append(&self, record: RawRecord) -> StoreResult<()> {
        let mut records = self.records.write().await;
        records.push(record);
        Ok(())
    }

    async fn sample_recent(&self, n: usize) -> StoreResult<Vec<RawRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().rev().take(n).cloned().collect())
    }

    async fn scan_recent(&self, limit: usize) -> StoreResult<Vec<RawRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }
}

// ============================================================================
// Schema ledger
// ============================================================================

/// Append-only schema ledger with CAS commit semantics.
#[derive(Default)]
pub struct MemSchemaStore {
    ledger: RwLock<Vec<SchemaVersion>>,
}

impl MemSchemaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchemaStore for MemSchemaStore {
    async fn latest(&self) -> StoreResult<Option<SchemaVersion>> {
        let ledger = self.ledger.read().await;
        Ok(ledger.last().cloned())
    }

    async fn history(&self) -> StoreResult<Vec<SchemaVersion>> {
        Ok(self.ledger.read().await.clone())
    }

    async fn commit(
        &self,
        fields: SchemaFields,
        total_samples: u64,
        notes: &str,
        expected_prior: Option<u32>,
    ) -> StoreResult<SchemaVersion> {
        // Single write lock covers the compare and the append, so version
        // numbers stay strictly increasing with no gaps under overlapping
        // committers.
        let mut ledger = self.ledger.write().await;

        let actual = ledger.last().map(|v| v.version);
        if actual != expected_prior {
            return Err(StoreError::VersionConflict {
                expected: expected_prior,
                actual,
            });
        }

        let created = SchemaVersion {
            version: expected_prior.unwrap_or(0) + 1,
            created_at: Utc::now(),
            fields,
            total_samples,
            notes: notes.to_string(),
        };
        ledger.push(created.clone());
        Ok(created)
    }
}

// ============================================================================
// Normalized records
// ============================================================================

/// Normalized record store keyed by raw record id; creation is
/// insert-if-absent, so at most one normalized record ever references a
/// given raw record no matter how sweeps interleave.
#[derive(Default)]
pub struct MemNormalizedStore {
    by_raw: RwLock<HashMap<Uuid, NormalizedRecord>>,
}

impl MemNormalizedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.by_raw.read().await.len()
    }

    pub async fn get_for_raw(&self, raw_id: Uuid) -> Option<NormalizedRecord> {
        self.by_raw.read().await.get(&raw_id).cloned()
    }
}

#[async_trait]
impl NormalizedStore for MemNormalizedStore {
    async fn exists_for_raw(&self, raw_id: Uuid) -> StoreResult<bool> {
        Ok(self.by_raw.read().await.contains_key(&raw_id))
    }

    async fn create(
        &self,
        canonical: Map<String, Value>,
        raw_id: Uuid,
        schema_version: Option<u32>,
    ) -> StoreResult<NormalizedRecord> {
        let mut by_raw = self.by_raw.write().await;

        if by_raw.contains_key(&raw_id) {
            return Err(StoreError::DuplicateNormalized { raw_id });
        }

        let record = NormalizedRecord {
            id: Uuid::new_v4(),
            canonical,
            raw_id,
            schema_version,
            normalized_at: Utc::now(),
        };
        by_raw.insert(raw_id, record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shapesense_core::{FieldSpec, TypeTag};

    fn fields_with(path: &str) -> SchemaFields {
        let mut fields = SchemaFields::new();
        fields.insert(
            path.to_string(),
            FieldSpec {
                types: vec![TypeTag::Integer],
                present_count: 1,
                optional: false,
            },
        );
        fields
    }

    #[tokio::test]
    async fn raw_store_returns_newest_first() {
        let store = MemRawStore::new();
        for i in 0..5 {
            store
                .append(RawRecord::new(json!({"n": i}), "test"))
                .await
                .unwrap();
        }

        let sampled = store.sample_recent(3).await.unwrap();
        assert_eq!(sampled.len(), 3);
        assert_eq!(sampled[0].payload["n"], 4);
        assert_eq!(sampled[2].payload["n"], 2);

        let scanned = store.scan_recent(100).await.unwrap();
        assert_eq!(scanned.len(), 5);
        assert_eq!(scanned[0].payload["n"], 4);
    }

    #[tokio::test]
    async fn schema_commit_assigns_sequential_versions() {
        let store = MemSchemaStore::new();

        let v1 = store
            .commit(fields_with("a"), 10, "auto", None)
            .await
            .unwrap();
        assert_eq!(v1.version, 1);

        let v2 = store
            .commit(fields_with("b"), 10, "auto", Some(1))
            .await
            .unwrap();
        assert_eq!(v2.version, 2);

        let history = store.history().await.unwrap();
        assert_eq!(
            history.iter().map(|v| v.version).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn schema_commit_rejects_stale_prior() {
        let store = MemSchemaStore::new();
        store
            .commit(fields_with("a"), 10, "auto", None)
            .await
            .unwrap();

        // A second committer that also observed an empty ledger loses.
        let err = store
            .commit(fields_with("b"), 10, "auto", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                expected: None,
                actual: Some(1)
            }
        ));

        assert_eq!(store.latest().await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn normalized_create_is_insert_if_absent() {
        let store = MemNormalizedStore::new();
        let raw_id = Uuid::new_v4();

        store
            .create(Map::new(), raw_id, Some(1))
            .await
            .unwrap();
        assert!(store.exists_for_raw(raw_id).await.unwrap());

        let err = store
            .create(Map::new(), raw_id, Some(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::DuplicateNormalized { raw_id: id } if id == raw_id
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_normalized_creates_keep_one_record() {
        use std::sync::Arc;

        let store = Arc::new(MemNormalizedStore::new());
        let raw_id = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.create(Map::new(), raw_id, None).await
            }));
        }

        let mut created = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.len().await, 1);
    }
}
