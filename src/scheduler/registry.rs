use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::protocol::HostFacts;
use crate::store::KvStore;

pub fn liveness_key(node_id: i64) -> String {
    format!("client:{}", node_id)
}

pub fn facts_key(node_id: i64) -> String {
    format!("facts:{}", node_id)
}

/// Tracks which nodes are alive.
///
/// A node is known while its liveness marker exists. Markers are written
/// with a TTL on every registration and never deleted explicitly, so a node
/// that stops checking in simply decays out of the registry and has to
/// register again.
#[derive(Clone)]
pub struct NodeRegistry {
    store: Arc<dyn KvStore>,
}

impl NodeRegistry {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Store errors read as "unknown".
    pub async fn is_known(&self, node_id: i64) -> bool {
        match self.store.get(&liveness_key(node_id)).await {
            Ok(marker) => {
                let known = marker.is_some_and(|m| !m.is_empty());
                if !known {
                    tracing::debug!(node_id, "Node not found");
                }
                known
            }
            Err(e) => {
                tracing::error!(node_id, error = %e, "Liveness lookup failed");
                false
            }
        }
    }

    /// Set or refresh the liveness marker and overwrite the stored facts.
    pub async fn register(&self, node_id: i64, facts: Option<&str>, ttl: Duration) -> Result<()> {
        self.store
            .set(&liveness_key(node_id), "1", Some(ttl))
            .await?;
        match facts {
            Some(blob) => {
                self.store
                    .set(&facts_key(node_id), blob, Some(ttl))
                    .await?
            }
            None => {
                self.store.del(&facts_key(node_id)).await?;
            }
        }
        tracing::info!(node_id, ttl_secs = ttl.as_secs(), "Node registered");
        Ok(())
    }

    /// Last facts the node registered with, if still live and parseable.
    pub async fn facts(&self, node_id: i64) -> Result<Option<HostFacts>> {
        let blob = self.store.get(&facts_key(node_id)).await?;
        Ok(blob.as_deref().and_then(HostFacts::parse))
    }
}
