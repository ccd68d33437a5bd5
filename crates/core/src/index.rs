use crate::error::SearchError;
use crate::models::{Chunk, ScoredChunk};
use crate::traits::EmbeddingProvider;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_BATCH_SIZE: usize = 32;

const SNAPSHOT_FILE: &str = "index.json";

/// A chunk the index owns: system-assigned id plus its embedding. Created
/// on `add`, removable by id, never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub id: Uuid,
    pub text: String,
    pub page: u32,
    pub embedding: Vec<f32>,
}

/// `IndexedChunk` without its embedding, for listing surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct StoredChunk {
    pub id: Uuid,
    pub content: String,
    pub page: u32,
}

#[derive(Debug, Default, Deserialize)]
struct Snapshot {
    records: Vec<IndexedChunk>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    records: &'a [IndexedChunk],
}

/// Durable chunk storage with similarity search. State lives in memory and
/// is snapshotted as JSON under the configured directory, so prior contents
/// survive process restart. All mutations go through one write lock;
/// searches only take the read side.
pub struct VectorIndex {
    directory: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    retrieval_k: usize,
    similarity_threshold: f32,
    records: RwLock<Vec<IndexedChunk>>,
}

impl VectorIndex {
    /// Loads the existing snapshot if one is present. A corrupt snapshot is
    /// surfaced here rather than silently discarded.
    pub fn open(
        directory: impl Into<PathBuf>,
        embedder: Arc<dyn EmbeddingProvider>,
        retrieval_k: usize,
        similarity_threshold: f32,
    ) -> Result<Self, SearchError> {
        let directory = directory.into();
        let snapshot_path = directory.join(SNAPSHOT_FILE);

        let records = if snapshot_path.exists() {
            let bytes = fs::read(&snapshot_path).map_err(|error| {
                SearchError::Persist(format!(
                    "cannot read {}: {error}",
                    snapshot_path.display()
                ))
            })?;
            let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|error| {
                SearchError::Persist(format!(
                    "corrupt snapshot {}: {error}",
                    snapshot_path.display()
                ))
            })?;
            snapshot.records
        } else {
            Vec::new()
        };

        info!(
            records = records.len(),
            path = %directory.display(),
            "opened vector index"
        );

        Ok(Self {
            directory,
            embedder,
            retrieval_k: retrieval_k.max(1),
            similarity_threshold,
            records: RwLock::new(records),
        })
    }

    /// Embeds and stores chunks in fixed-size batches, persisting the
    /// snapshot once after the final batch. A batch failure mid-sequence is
    /// not rolled back: earlier batches stay applied and are made durable
    /// before the error is returned (at-least-once, partial-apply).
    pub async fn add(&self, chunks: &[Chunk], batch_size: usize) -> Result<(), SearchError> {
        if chunks.is_empty() {
            info!("add called with no chunks; nothing to index");
            return Ok(());
        }

        let batch_size = batch_size.max(1);

        // The lock spans every batch so concurrent adds cannot interleave.
        let mut records = self.records.write().await;
        let before = records.len();

        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let embeddings = match self.embedder.embed(&texts).await {
                Ok(embeddings) if embeddings.len() == batch.len() => embeddings,
                Ok(embeddings) => {
                    self.persist(&records)?;
                    return Err(SearchError::Embedding(format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        embeddings.len()
                    )));
                }
                Err(error) => {
                    warn!(
                        indexed = records.len() - before,
                        %error,
                        "batch embedding failed; keeping earlier batches"
                    );
                    self.persist(&records)?;
                    return Err(error);
                }
            };

            for (chunk, embedding) in batch.iter().zip(embeddings) {
                records.push(IndexedChunk {
                    id: Uuid::new_v4(),
                    text: chunk.text.clone(),
                    page: chunk.page,
                    embedding,
                });
            }
        }

        self.persist(&records)?;
        info!(added = chunks.len(), total = records.len(), "chunks indexed");
        Ok(())
    }

    /// Top-k similarity search filtered to `score >= similarity_threshold`.
    /// When the filter empties a nonempty result set, the unfiltered top-k
    /// is returned instead so callers always have something to reason
    /// about; an empty return therefore means the index itself is empty.
    pub async fn search(
        &self,
        query: &str,
        k: Option<usize>,
    ) -> Result<Vec<ScoredChunk>, SearchError> {
        let k = k.unwrap_or(self.retrieval_k).max(1);

        let records = self.records.read().await;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SearchError::Embedding("empty query embedding".to_string()))?;

        let mut scored: Vec<ScoredChunk> = records
            .iter()
            .map(|record| ScoredChunk {
                content: record.text.clone(),
                page: record.page,
                score: cosine_similarity(&query_vector, &record.embedding),
            })
            .collect();
        scored.sort_by(|left, right| right.score.total_cmp(&left.score));
        scored.truncate(k);

        let filtered: Vec<ScoredChunk> = scored
            .iter()
            .filter(|hit| hit.score >= self.similarity_threshold)
            .cloned()
            .collect();

        if filtered.is_empty() {
            warn!(
                threshold = self.similarity_threshold,
                "no hit passed the similarity threshold; returning unfiltered top-k"
            );
            return Ok(scored);
        }

        Ok(filtered)
    }

    /// Removes the identified records and persists immediately. Unknown ids
    /// are ignored.
    pub async fn delete(&self, ids: &[Uuid]) -> Result<(), SearchError> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|record| !ids.contains(&record.id));
        self.persist(&records)?;

        info!(
            removed = before - records.len(),
            total = records.len(),
            "records deleted"
        );
        Ok(())
    }

    /// Best-effort diagnostic; never fails.
    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Everything currently stored, without embeddings.
    pub async fn all(&self) -> Vec<StoredChunk> {
        self.records
            .read()
            .await
            .iter()
            .map(|record| StoredChunk {
                id: record.id,
                content: record.text.clone(),
                page: record.page,
            })
            .collect()
    }

    /// Writes the snapshot through a temp file so a crash mid-write never
    /// leaves a truncated snapshot behind.
    fn persist(&self, records: &[IndexedChunk]) -> Result<(), SearchError> {
        fs::create_dir_all(&self.directory).map_err(|error| {
            SearchError::Persist(format!(
                "cannot create {}: {error}",
                self.directory.display()
            ))
        })?;

        let snapshot_path = self.directory.join(SNAPSHOT_FILE);
        let staging_path = self.directory.join(format!("{SNAPSHOT_FILE}.tmp"));
        let bytes = serde_json::to_vec(&SnapshotRef { records })?;

        fs::write(&staging_path, bytes).map_err(|error| {
            SearchError::Persist(format!("cannot write {}: {error}", staging_path.display()))
        })?;
        fs::rename(&staging_path, &snapshot_path).map_err(|error| {
            SearchError::Persist(format!(
                "cannot replace {}: {error}",
                snapshot_path.display()
            ))
        })?;

        Ok(())
    }
}

/// Cosine similarity in [-1, 1]; 0.0 when either vector has no magnitude.
fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let left_norm: f32 = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm: f32 = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    dot / (left_norm * right_norm)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::error::SearchError;
    use crate::traits::EmbeddingProvider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic character-trigram hashing embedder, good enough to
    /// make similar texts score close without any backend.
    #[derive(Debug, Clone, Copy)]
    pub struct HashingEmbedder {
        pub dimensions: usize,
    }

    impl Default for HashingEmbedder {
        fn default() -> Self {
            Self { dimensions: 64 }
        }
    }

    impl HashingEmbedder {
        pub fn embed_one(&self, text: &str) -> Vec<f32> {
            let mut vector = vec![0f32; self.dimensions.max(1)];
            let lowered = text.to_lowercase();
            let chars: Vec<char> = lowered.chars().collect();

            for window in chars.windows(3) {
                let token = window.iter().collect::<String>();
                let mut hash = 1469598103934665603u64;
                for byte in token.bytes() {
                    hash ^= byte as u64;
                    hash = hash.wrapping_mul(1099511628211);
                }
                let bucket = (hash % vector.len() as u64) as usize;
                vector[bucket] += 1.0;
            }

            let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
            if magnitude > 0.0 {
                for value in &mut vector {
                    *value /= magnitude;
                }
            }
            vector
        }
    }

    #[async_trait]
    impl EmbeddingProvider for HashingEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
            Ok(texts.iter().map(|text| self.embed_one(text)).collect())
        }
    }

    /// Succeeds for the first `failures_after` calls, then errors; drives
    /// the partial-apply batching tests.
    pub struct FlakyEmbedder {
        inner: HashingEmbedder,
        calls: AtomicUsize,
        failures_after: usize,
    }

    impl FlakyEmbedder {
        pub fn new(failures_after: usize) -> Self {
            Self {
                inner: HashingEmbedder::default(),
                calls: AtomicUsize::new(0),
                failures_after,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.failures_after {
                return Err(SearchError::Embedding("simulated backend outage".to_string()));
            }
            self.inner.embed(texts).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{FlakyEmbedder, HashingEmbedder};
    use super::{VectorIndex, DEFAULT_BATCH_SIZE};
    use crate::models::Chunk;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn chunk(text: &str, page: u32) -> Chunk {
        Chunk {
            text: text.to_string(),
            page,
        }
    }

    fn sample_chunks() -> Vec<Chunk> {
        vec![
            chunk("Revenue was $100 million in fiscal 2023.", 1),
            chunk("Operating expenses totaled $60 million.", 2),
            chunk("The company repurchased 2 million shares.", 3),
        ]
    }

    #[tokio::test]
    async fn adding_nothing_is_a_no_op() {
        let dir = tempdir().expect("tempdir");
        let index = VectorIndex::open(dir.path(), Arc::new(HashingEmbedder::default()), 5, 0.7)
            .expect("open");

        index.add(&[], DEFAULT_BATCH_SIZE).await.expect("no-op add");
        assert_eq!(index.count().await, 0);
    }

    #[tokio::test]
    async fn count_grows_by_exactly_the_added_chunks() {
        let dir = tempdir().expect("tempdir");
        let index = VectorIndex::open(dir.path(), Arc::new(HashingEmbedder::default()), 5, 0.7)
            .expect("open");

        index
            .add(&sample_chunks(), 2)
            .await
            .expect("add should succeed");
        assert_eq!(index.count().await, 3);
    }

    #[tokio::test]
    async fn search_scores_are_non_increasing_and_never_empty() {
        let dir = tempdir().expect("tempdir");
        let index = VectorIndex::open(dir.path(), Arc::new(HashingEmbedder::default()), 5, -1.0)
            .expect("open");
        index
            .add(&sample_chunks(), DEFAULT_BATCH_SIZE)
            .await
            .expect("add");

        let hits = index
            .search("How much revenue did the company report?", None)
            .await
            .expect("search");

        assert!(!hits.is_empty());
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn high_threshold_falls_back_to_unfiltered_top_k() {
        let dir = tempdir().expect("tempdir");
        // Nothing scores 0.99 against an unrelated query.
        let index = VectorIndex::open(dir.path(), Arc::new(HashingEmbedder::default()), 2, 0.99)
            .expect("open");
        index
            .add(&sample_chunks(), DEFAULT_BATCH_SIZE)
            .await
            .expect("add");

        let hits = index
            .search("entirely unrelated zebra migration query", None)
            .await
            .expect("search");

        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn empty_index_returns_no_hits() {
        let dir = tempdir().expect("tempdir");
        let index = VectorIndex::open(dir.path(), Arc::new(HashingEmbedder::default()), 5, 0.7)
            .expect("open");

        let hits = index.search("anything", None).await.expect("search");
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_persists() {
        let dir = tempdir().expect("tempdir");
        let index = VectorIndex::open(dir.path(), Arc::new(HashingEmbedder::default()), 5, 0.7)
            .expect("open");
        index
            .add(&sample_chunks(), DEFAULT_BATCH_SIZE)
            .await
            .expect("add");

        let stored = index.all().await;
        index.delete(&[stored[0].id]).await.expect("delete");
        assert_eq!(index.count().await, 2);

        // Deleting the same id again is not an error.
        index.delete(&[stored[0].id]).await.expect("repeat delete");
        assert_eq!(index.count().await, 2);

        index
            .delete(&[uuid::Uuid::new_v4()])
            .await
            .expect("unknown id delete");
        assert_eq!(index.count().await, 2);
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempdir().expect("tempdir");
        {
            let index =
                VectorIndex::open(dir.path(), Arc::new(HashingEmbedder::default()), 5, -1.0)
                    .expect("open");
            index
                .add(&sample_chunks(), DEFAULT_BATCH_SIZE)
                .await
                .expect("add");
        }

        let reopened = VectorIndex::open(dir.path(), Arc::new(HashingEmbedder::default()), 5, -1.0)
            .expect("reopen");
        assert_eq!(reopened.count().await, 3);

        let hits = reopened.search("revenue", None).await.expect("search");
        assert!(!hits.is_empty());
    }

    #[tokio::test]
    async fn failed_batch_keeps_earlier_batches_durable() {
        let dir = tempdir().expect("tempdir");
        // First embed call succeeds, second fails: with batch_size 2 and 3
        // chunks, the first batch lands and the second does not.
        let index = VectorIndex::open(dir.path(), Arc::new(FlakyEmbedder::new(1)), 5, 0.7)
            .expect("open");

        let result = index.add(&sample_chunks(), 2).await;
        assert!(result.is_err());
        assert_eq!(index.count().await, 2);

        let reopened = VectorIndex::open(dir.path(), Arc::new(HashingEmbedder::default()), 5, 0.7)
            .expect("reopen");
        assert_eq!(reopened.count().await, 2);
    }
}
