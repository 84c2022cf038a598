//! Bounded-concurrency worker pool that streams remote file bodies to disk,
//! hashing while copying. A single failed download is logged and skipped
//! rather than aborting the whole pool.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, Mutex};

use crate::namespace::NamespaceSnapshot;
use crate::parktable::{write_stream_to_file, ParkFile};
use crate::remote::{FileId, RemoteClient};

#[derive(Debug, Clone, Copy)]
pub struct DownloadPoolConfig {
    pub num_workers: usize,
}

impl Default for DownloadPoolConfig {
    fn default() -> Self {
        Self { num_workers: 4 }
    }
}

struct Job {
    file_id: FileId,
    relative_path: PathBuf,
}

/// Download every non-folder entry in `snapshot` to `dest_root`, returning a
/// map of successfully downloaded files keyed by id. Per-file failures are
/// logged and dropped (skip-on-error); only pool-level setup failures are
/// returned as `Err`.
pub async fn run(
    client: Arc<dyn RemoteClient>,
    snapshot: &NamespaceSnapshot,
    dest_root: &Path,
    config: DownloadPoolConfig,
) -> Result<HashMap<FileId, ParkFile>> {
    let num_workers = config.num_workers.max(1);

    let jobs: Vec<Job> = snapshot
        .non_folders()
        .filter_map(|entry| {
            snapshot
                .resolve_path(&entry.id)
                .map(|relative_path| Job {
                    file_id: entry.id.clone(),
                    relative_path,
                })
        })
        .collect();

    let (job_tx, job_rx) = mpsc::channel::<Job>(num_workers * 2);
    let job_rx = Arc::new(Mutex::new(job_rx));
    let (result_tx, mut result_rx) = mpsc::channel::<ParkFile>(num_workers * 2);

    let producer = tokio::spawn(async move {
        for job in jobs {
            if job_tx.send(job).await.is_err() {
                break;
            }
        }
        // Dropping `job_tx` here closes the job channel once every job has
        // been enqueued.
    });

    let collector = tokio::spawn(async move {
        let mut out = HashMap::new();
        while let Some(park_file) = result_rx.recv().await {
            out.insert(park_file.file_id.clone(), park_file);
        }
        out
    });

    let mut workers = Vec::with_capacity(num_workers);
    for _ in 0..num_workers {
        let job_rx = job_rx.clone();
        let result_tx = result_tx.clone();
        let client = client.clone();
        let dest_root = dest_root.to_path_buf();
        workers.push(tokio::spawn(async move {
            loop {
                let next = { job_rx.lock().await.recv().await };
                let Some(job) = next else { break };

                match download_one(client.as_ref(), &dest_root, &job).await {
                    Ok(park_file) => {
                        if result_tx.send(park_file).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(
                            target: "download",
                            file_id = %job.file_id,
                            error = %e,
                            "skipping: could not download file"
                        );
                    }
                }
            }
        }));
    }
    // Drop our own sender handle; each worker holds a clone, so the channel
    // closes once every worker task has ended.
    drop(result_tx);

    producer.await.context("download producer task panicked")?;
    for worker in workers {
        worker.await.context("download worker task panicked")?;
    }

    collector.await.context("download collector task panicked")
}

async fn download_one(client: &dyn RemoteClient, dest_root: &Path, job: &Job) -> Result<ParkFile> {
    let stream = client
        .download_body(&job.file_id)
        .await
        .with_context(|| format!("could not download file '{}'", job.file_id))?;

    let absolute_path = dest_root.join(&job.relative_path);
    let content_hash = write_stream_to_file(&absolute_path, stream)
        .await
        .with_context(|| format!("could not write file '{}'", absolute_path.display()))?;

    Ok(ParkFile {
        file_id: job.file_id.clone(),
        local_path: absolute_path,
        content_hash,
    })
}
