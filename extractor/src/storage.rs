//! Storage contracts (spec §6): `ObjectStore` and `RecordStore` are
//! trait boundaries only — a production backend (S3, Postgres) is
//! external per §1. In-memory reference implementations back the CLI
//! and tests, grounded in original_source
//! `backend/app/services/storage.py`'s `generate_key`/bucket-ensure
//! shape.

use crate::error::PipelineError;
use crate::types::AuctionRecord;
use std::collections::HashMap;
use std::sync::Mutex;

/// Key/value object store contract (spec §6): `head/put/get/copy`.
pub trait ObjectStore: Send + Sync {
    fn ensure_bucket(&self, bucket: &str) -> Result<(), PipelineError>;
    fn head(&self, bucket: &str, key: &str) -> Result<bool, PipelineError>;
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), PipelineError>;
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, PipelineError>;
    fn copy(&self, bucket: &str, src_key: &str, dst_key: &str) -> Result<(), PipelineError>;
}

/// In-process reference `ObjectStore`, keyed by `(bucket, key)`.
#[derive(Default)]
pub struct InMemoryObjectStore {
    buckets: Mutex<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        InMemoryObjectStore::default()
    }

    /// Content-hash-derived key per spec §5's upload-dedup contract
    /// (`generate_key` in original_source).
    pub fn generate_key(prefix: &str, sha256_hex: &str, ext: &str) -> String {
        format!("{prefix}/{sha256_hex}.{ext}")
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn ensure_bucket(&self, bucket: &str) -> Result<(), PipelineError> {
        self.buckets.lock().unwrap().entry(bucket.to_string()).or_default();
        Ok(())
    }

    fn head(&self, bucket: &str, key: &str) -> Result<bool, PipelineError> {
        let buckets = self.buckets.lock().unwrap();
        Ok(buckets.get(bucket).map(|b| b.contains_key(key)).unwrap_or(false))
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), PipelineError> {
        let mut buckets = self.buckets.lock().unwrap();
        buckets.entry(bucket.to_string()).or_default().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, PipelineError> {
        let buckets = self.buckets.lock().unwrap();
        buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
            .ok_or_else(|| PipelineError::Storage(format!("no such object: {bucket}/{key}")))
    }

    fn copy(&self, bucket: &str, src_key: &str, dst_key: &str) -> Result<(), PipelineError> {
        let mut buckets = self.buckets.lock().unwrap();
        let bytes = buckets
            .get(bucket)
            .and_then(|b| b.get(src_key))
            .cloned()
            .ok_or_else(|| PipelineError::Storage(format!("no such object: {bucket}/{src_key}")))?;
        buckets.entry(bucket.to_string()).or_default().insert(dst_key.to_string(), bytes);
        Ok(())
    }
}

/// Record store contract (spec §5/§6): per-record updates serialized
/// by primary key, content-hash unique constraint on insert.
pub trait RecordStore: Send + Sync {
    fn insert(&self, id: &str, content_hash: &str, record: AuctionRecord) -> Result<(), PipelineError>;
    fn update(&self, id: &str, record: AuctionRecord) -> Result<(), PipelineError>;
    fn get(&self, id: &str) -> Result<AuctionRecord, PipelineError>;
    fn find_by_hash(&self, content_hash: &str) -> Result<Option<String>, PipelineError>;
}

struct RecordEntry {
    record: AuctionRecord,
    content_hash: String,
}

/// In-process reference `RecordStore`.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: Mutex<HashMap<String, RecordEntry>>,
    hash_index: Mutex<HashMap<String, String>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        InMemoryRecordStore::default()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn insert(&self, id: &str, content_hash: &str, record: AuctionRecord) -> Result<(), PipelineError> {
        let mut hash_index = self.hash_index.lock().unwrap();
        if hash_index.contains_key(content_hash) {
            return Err(PipelineError::RecordStore(format!("duplicate content hash: {content_hash}")));
        }
        hash_index.insert(content_hash.to_string(), id.to_string());
        self.records.lock().unwrap().insert(
            id.to_string(),
            RecordEntry { record, content_hash: content_hash.to_string() },
        );
        Ok(())
    }

    fn update(&self, id: &str, record: AuctionRecord) -> Result<(), PipelineError> {
        let mut records = self.records.lock().unwrap();
        let entry = records
            .get_mut(id)
            .ok_or_else(|| PipelineError::RecordStore(format!("no such record: {id}")))?;
        entry.record = record;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<AuctionRecord, PipelineError> {
        self.records
            .lock()
            .unwrap()
            .get(id)
            .map(|e| e.record.clone())
            .ok_or_else(|| PipelineError::RecordStore(format!("no such record: {id}")))
    }

    fn find_by_hash(&self, content_hash: &str) -> Result<Option<String>, PipelineError> {
        Ok(self.hash_index.lock().unwrap().get(content_hash).cloned())
    }
}
