use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::scheduler::policy::JobTemplate;
use crate::store::KvStore;

pub fn jobs_key(node_id: i64) -> String {
    format!("jobs:{}", node_id)
}

/// Per-node pending jobs, stored as one hash of job id to command.
///
/// Job sets are created whole by [`JobStore::provision`] and shrink one job
/// at a time through [`JobStore::delete`]; individual jobs are never edited.
#[derive(Clone)]
pub struct JobStore {
    store: Arc<dyn KvStore>,
}

impl JobStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Replace the node's job set with `jobs`, expiring after `ttl`.
    ///
    /// The old set is dropped first, so provisioning twice with the same
    /// template leaves exactly that template.
    pub async fn provision(&self, node_id: i64, jobs: &JobTemplate, ttl: Duration) -> Result<()> {
        let key = jobs_key(node_id);
        self.store.del(&key).await?;
        if jobs.is_empty() {
            tracing::debug!(node_id, "Provisioned empty job set");
            return Ok(());
        }
        self.store.hset_multiple(&key, jobs).await?;
        self.store.expire(&key, ttl).await?;
        tracing::info!(node_id, job_count = jobs.len(), "Jobs provisioned");
        Ok(())
    }

    /// Current jobs for a node. Missing, expired and unreadable sets all
    /// come back empty.
    pub async fn list(&self, node_id: i64) -> BTreeMap<String, String> {
        match self.store.hgetall(&jobs_key(node_id)).await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(node_id, error = %e, "Failed to list jobs");
                BTreeMap::new()
            }
        }
    }

    /// Remove one job. True iff this call removed it.
    pub async fn delete(&self, node_id: i64, job_id: &str) -> bool {
        match self.store.hdel(&jobs_key(node_id), job_id).await {
            Ok(removed) => {
                if removed {
                    tracing::info!(node_id, job_id, "Job deleted");
                }
                removed
            }
            Err(e) => {
                tracing::error!(node_id, job_id, error = %e, "Failed to delete job");
                false
            }
        }
    }
}
