//! Coordinator-wide bearer token.
//!
//! Every node presents the same shared secret in `Event::auth`. The secret
//! lives in the store under [`AUTH_KEY`], so all coordinator processes
//! sharing a store agree on it. There are no per-node credentials.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::{Result, RollcallError};
use crate::protocol::Event;
use crate::store::KvStore;

/// Store key holding the shared secret.
pub const AUTH_KEY: &str = "auth";

/// Length of generated secrets.
pub const SECRET_LENGTH: usize = 64;

/// Validates events against the shared secret.
#[derive(Clone)]
pub struct CredentialGate {
    store: Arc<dyn KvStore>,
}

impl CredentialGate {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// True iff a non-empty secret is stored and `event.auth` equals it
    /// exactly. A store failure authenticates nobody.
    pub async fn authenticate(&self, event: &Event) -> bool {
        match self.verify(event).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(node_id = event.id, error = %e, "Rejecting event");
                false
            }
        }
    }

    pub async fn verify(&self, event: &Event) -> Result<()> {
        match self.store.get(AUTH_KEY).await? {
            Some(secret) if !secret.is_empty() && event.auth == secret => Ok(()),
            Some(secret) if !secret.is_empty() => Err(RollcallError::AuthenticationFailure),
            _ => Err(RollcallError::Internal(
                "no shared secret configured".to_string(),
            )),
        }
    }
}

/// Generate a random alphanumeric secret.
pub fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LENGTH)
        .map(char::from)
        .collect()
}

/// Make sure a shared secret is stored, returning the one in effect.
///
/// An explicit secret always overwrites the stored one. Otherwise an
/// existing non-empty secret is kept, and a fresh one is generated only if
/// none exists.
pub async fn ensure_secret(store: &dyn KvStore, explicit: Option<&str>) -> Result<String> {
    if let Some(secret) = explicit {
        store.set(AUTH_KEY, secret, None).await?;
        tracing::info!(key = AUTH_KEY, "Shared secret installed from configuration");
        return Ok(secret.to_string());
    }

    if let Some(existing) = store.get(AUTH_KEY).await? {
        if !existing.is_empty() {
            tracing::info!(key = AUTH_KEY, "Using existing shared secret");
            return Ok(existing);
        }
    }

    let secret = generate_secret();
    store.set(AUTH_KEY, &secret, None).await?;
    tracing::info!(
        key = AUTH_KEY,
        "Generated new shared secret; read it from the store to provision nodes"
    );
    Ok(secret)
}
