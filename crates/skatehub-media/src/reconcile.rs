//! Orphan reconciliation
//!
//! An object can outlive its creation call without ever getting a row: the
//! caller was cancelled between upload and insert, or the cleanup delete after a
//! failed insert did not go through. The reconciler finds such objects and
//! removes them. Objects younger than the grace period are skipped so that
//! uploads still waiting on their insert are never touched.

use chrono::Utc;
use skatehub_core::{MediaError, MediaResult};
use skatehub_db::AssetRepository;
use skatehub_storage::{Storage, StoredObject};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Keys looked up per repository query
const LOOKUP_BATCH: usize = 500;

/// Outcome of one purge pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub orphans: usize,
    pub deleted: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct OrphanReconciler {
    storage: Arc<dyn Storage>,
    repository: Arc<dyn AssetRepository>,
    grace: Duration,
}

impl OrphanReconciler {
    pub fn new(
        storage: Arc<dyn Storage>,
        repository: Arc<dyn AssetRepository>,
        grace: Duration,
    ) -> Self {
        Self {
            storage,
            repository,
            grace,
        }
    }

    /// Media objects older than the grace period with no matching asset row.
    #[tracing::instrument(skip(self), fields(reconcile.operation = "find"))]
    pub async fn find_orphans(&self) -> MediaResult<Vec<StoredObject>> {
        let grace = chrono::Duration::from_std(self.grace)
            .map_err(|e| MediaError::Internal(format!("Invalid orphan grace period: {}", e)))?;
        let cutoff = Utc::now() - grace;

        let candidates: Vec<StoredObject> = self
            .storage
            .list(None)
            .await?
            .into_iter()
            .filter(|obj| obj.last_modified <= cutoff && is_media_key(&obj.key))
            .collect();

        let mut recorded = HashSet::new();
        for batch in candidates.chunks(LOOKUP_BATCH) {
            let keys: Vec<String> = batch.iter().map(|obj| obj.key.clone()).collect();
            recorded.extend(self.repository.existing_storage_keys(&keys).await?);
        }

        let orphans: Vec<StoredObject> = candidates
            .into_iter()
            .filter(|obj| !recorded.contains(&obj.key))
            .collect();

        tracing::debug!(count = orphans.len(), "Orphan scan complete");
        Ok(orphans)
    }

    /// Delete every orphan found by [`find_orphans`](Self::find_orphans).
    #[tracing::instrument(skip(self), fields(reconcile.operation = "purge"))]
    pub async fn purge_orphans(&self) -> MediaResult<ReconcileReport> {
        let orphans = self.find_orphans().await?;
        let mut report = ReconcileReport {
            orphans: orphans.len(),
            ..Default::default()
        };

        for orphan in orphans {
            match self.storage.delete(&orphan.key).await {
                Ok(()) => {
                    tracing::info!(
                        key = %orphan.key,
                        size_bytes = orphan.size,
                        last_modified = %orphan.last_modified,
                        "Deleted orphan object"
                    );
                    report.deleted += 1;
                }
                Err(e) => {
                    tracing::error!(error = %e, key = %orphan.key, "Failed to delete orphan object");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            orphans = report.orphans,
            deleted = report.deleted,
            failed = report.failed,
            "Orphan purge completed"
        );
        Ok(report)
    }

    /// Run [`purge_orphans`](Self::purge_orphans) every `every`.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(every);

            loop {
                ticker.tick().await;

                tracing::info!("Starting scheduled orphan reconciliation");

                if let Err(e) = self.purge_orphans().await {
                    tracing::error!(error = %e, "Orphan reconciliation failed");
                }
            }
        })
    }
}

/// Media objects are stored flat as `{KEY}.{extension}`.
fn is_media_key(key: &str) -> bool {
    let Some((stem, extension)) = key.rsplit_once('.') else {
        return false;
    };
    !stem.is_empty()
        && !extension.is_empty()
        && stem
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        && extension.chars().all(|c| c.is_ascii_alphanumeric())
}
