use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::auth::ensure_secret;
use crate::config::{CoordinatorConfig, TlsConfig};
use crate::error::{Result, RollcallError};
use crate::scheduler::ProvisioningPolicy;
use crate::server::listener::Listener;
use crate::server::session::SessionHandler;
use crate::store::{KvStore, MemoryStore, RedisStore};
use crate::tls::TlsIdentity;

/// Coordinator process: owns the store handle and wires the secret,
/// provisioning policy, TLS identity and listener together.
pub struct Coordinator {
    config: CoordinatorConfig,
    store: Arc<dyn KvStore>,
}

impl Coordinator {
    /// Open the store named in the config. Without a Redis URL the
    /// coordinator keeps state in memory, which is lost on restart.
    pub async fn connect(config: CoordinatorConfig) -> Result<Self> {
        let store: Arc<dyn KvStore> = match &config.redis_url {
            Some(url) => {
                let store = RedisStore::connect(url).await?;
                tracing::info!(url = %url, "Connected to Redis");
                Arc::new(store)
            }
            None => {
                tracing::warn!("No Redis configured, node and job state is in-memory only");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: CoordinatorConfig, store: Arc<dyn KvStore>) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> Arc<dyn KvStore> {
        self.store.clone()
    }

    /// Install the secret, load templates and TLS, and bind the listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written, the template file is
    /// unreadable, TLS is required but cannot be loaded, or the address
    /// cannot be bound.
    pub async fn bind(self) -> Result<Listener> {
        ensure_secret(self.store.as_ref(), self.config.secret.as_deref()).await?;

        let policy = match &self.config.templates_path {
            Some(path) => {
                let policy = ProvisioningPolicy::load(path).await?;
                tracing::info!(
                    path = %path.display(),
                    families = ?policy.families().collect::<Vec<_>>(),
                    "Loaded job templates"
                );
                policy
            }
            None => ProvisioningPolicy::default(),
        };

        let tls = resolve_tls(&self.config.tls).await?;
        let handler = SessionHandler::from_config(self.store.clone(), policy, &self.config);

        tracing::info!(
            listen_addr = %self.config.listen_addr,
            expire_secs = self.config.expire.as_secs(),
            tls_enabled = tls.is_some(),
            "Starting coordinator"
        );

        Listener::bind(
            self.config.listen_addr,
            handler,
            tls,
            self.config.io_timeout,
        )
        .await
    }

    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        self.bind().await?.run(shutdown).await
    }
}

/// Decide whether to serve TLS.
///
/// A complete configuration loads the identity. Missing or unloadable
/// material is fatal unless `allow_insecure` is set, in which case the
/// coordinator falls back to plaintext with a warning.
pub async fn resolve_tls(tls: &TlsConfig) -> Result<Option<TlsIdentity>> {
    if tls.server_ready() {
        match TlsIdentity::load(tls).await {
            Ok(identity) => {
                tracing::info!("TLS enabled");
                Ok(Some(identity))
            }
            Err(e) if tls.allow_insecure => {
                tracing::warn!(
                    error = %e,
                    "TLS certificate loading failed, running in insecure mode"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    } else if tls.enabled {
        if tls.allow_insecure {
            tracing::warn!("TLS enabled but certificate paths incomplete, running in insecure mode");
            Ok(None)
        } else {
            Err(RollcallError::Internal(
                "TLS enabled but missing required paths (--cert, --key)".to_string(),
            ))
        }
    } else {
        tracing::warn!("Running without TLS; event secrets travel in plaintext");
        Ok(None)
    }
}
