use crate::index::VectorIndex;
use crate::ingest::DocumentIngestor;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobState {
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Per-job progress record, queryable by id. Replaces any ambient
/// progress state on the index itself.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub id: Uuid,
    pub path: PathBuf,
    pub state: JobState,
    pub submitted_at: DateTime<Utc>,
    /// Chunks produced for this document; known once chunking finishes,
    /// before indexing starts. Advisory only.
    pub chunk_count: Option<usize>,
    pub error: Option<String>,
}

/// Fire-and-forget ingestion: `submit` returns immediately, one background
/// worker executes jobs strictly in submission order. Failures are recorded
/// on the job status and logged loudly; nothing is retried.
pub struct IngestQueue {
    sender: mpsc::UnboundedSender<Uuid>,
    statuses: Arc<RwLock<HashMap<Uuid, JobStatus>>>,
}

impl IngestQueue {
    pub fn spawn(
        ingestor: Arc<DocumentIngestor>,
        index: Arc<VectorIndex>,
        batch_size: usize,
    ) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Uuid>();
        let statuses: Arc<RwLock<HashMap<Uuid, JobStatus>>> = Arc::default();

        let worker_statuses = Arc::clone(&statuses);
        tokio::spawn(async move {
            while let Some(job_id) = receiver.recv().await {
                let path = {
                    let mut map = worker_statuses.write().await;
                    let Some(status) = map.get_mut(&job_id) else {
                        continue;
                    };
                    status.state = JobState::Running;
                    status.path.clone()
                };

                run_job(&ingestor, &index, &worker_statuses, job_id, &path, batch_size).await;
            }
        });

        Self { sender, statuses }
    }

    /// Registers the job and hands it to the worker. Returns immediately
    /// with the job id.
    pub async fn submit(&self, path: &Path) -> Uuid {
        let id = Uuid::new_v4();
        self.statuses.write().await.insert(
            id,
            JobStatus {
                id,
                path: path.to_path_buf(),
                state: JobState::Pending,
                submitted_at: Utc::now(),
                chunk_count: None,
                error: None,
            },
        );

        // The receiver lives as long as the worker task; a send failure
        // only happens during shutdown.
        let _ = self.sender.send(id);
        id
    }

    pub async fn status(&self, id: Uuid) -> Option<JobStatus> {
        self.statuses.read().await.get(&id).cloned()
    }

    pub async fn statuses(&self) -> Vec<JobStatus> {
        let mut all: Vec<JobStatus> = self.statuses.read().await.values().cloned().collect();
        all.sort_by(|left, right| left.path.cmp(&right.path));
        all
    }
}

async fn run_job(
    ingestor: &Arc<DocumentIngestor>,
    index: &Arc<VectorIndex>,
    statuses: &Arc<RwLock<HashMap<Uuid, JobStatus>>>,
    job_id: Uuid,
    path: &Path,
    batch_size: usize,
) {
    // Extraction and chunking are file/CPU bound; keep them off the
    // async runtime.
    let blocking_ingestor = Arc::clone(ingestor);
    let job_path = path.to_path_buf();
    let chunked = tokio::task::spawn_blocking(move || blocking_ingestor.process(&job_path))
        .await
        .map_err(|join_error| join_error.to_string())
        .and_then(|result| result.map_err(|error| error.to_string()));

    let chunks = match chunked {
        Ok(chunks) => chunks,
        Err(reason) => {
            fail_job(statuses, job_id, path, reason).await;
            return;
        }
    };

    // Record the chunk total before indexing so callers can report
    // progress against it while the add is still running.
    {
        let mut map = statuses.write().await;
        if let Some(status) = map.get_mut(&job_id) {
            status.chunk_count = Some(chunks.len());
        }
    }

    if let Err(error) = index.add(&chunks, batch_size).await {
        fail_job(statuses, job_id, path, error.to_string()).await;
        return;
    }

    let mut map = statuses.write().await;
    if let Some(status) = map.get_mut(&job_id) {
        status.state = JobState::Done;
    }
    info!(job = %job_id, path = %path.display(), chunks = chunks.len(), "ingestion job done");
}

async fn fail_job(
    statuses: &Arc<RwLock<HashMap<Uuid, JobStatus>>>,
    job_id: Uuid,
    path: &Path,
    reason: String,
) {
    error!(job = %job_id, path = %path.display(), reason = %reason, "ingestion job failed");
    let mut map = statuses.write().await;
    if let Some(status) = map.get_mut(&job_id) {
        status.state = JobState::Failed;
        status.error = Some(reason);
    }
}
