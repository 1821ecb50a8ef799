use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::auth::CredentialGate;
use crate::config::CoordinatorConfig;
use crate::error::RollcallError;
use crate::protocol::{
    Action, Event, FrameCodec, Response, PARAM_DATA, PARAM_JOB, PARAM_SYSINFO,
};
use crate::scheduler::{JobStore, NodeRegistry, ProvisioningPolicy};
use crate::store::KvStore;

/// Why a connection closed without a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer closed before sending a full frame.
    Eof,
    /// No frame arrived within the I/O timeout.
    Timeout,
    /// The frame was not a valid event.
    Malformed,
    /// Reading the frame failed at the transport.
    Transport,
    /// The event's credential did not match.
    Unauthenticated,
    /// Authenticated, but the action (or its parameters) has no reply.
    Unanswered,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Responded { action: Action, code: i32 },
    Closed(CloseReason),
}

/// Serves one connection: read one event, authenticate it, dispatch it,
/// write at most one response, close.
///
/// Handlers hold no per-connection state between calls; everything shared
/// lives in the store, so one handler is cloned into every session task.
#[derive(Clone)]
pub struct SessionHandler {
    gate: CredentialGate,
    registry: NodeRegistry,
    jobs: JobStore,
    policy: Arc<ProvisioningPolicy>,
    expire: Duration,
    io_timeout: Duration,
}

impl SessionHandler {
    pub fn new(
        store: Arc<dyn KvStore>,
        policy: ProvisioningPolicy,
        expire: Duration,
        io_timeout: Duration,
    ) -> Self {
        Self {
            gate: CredentialGate::new(store.clone()),
            registry: NodeRegistry::new(store.clone()),
            jobs: JobStore::new(store),
            policy: Arc::new(policy),
            expire,
            io_timeout,
        }
    }

    pub fn from_config(
        store: Arc<dyn KvStore>,
        policy: ProvisioningPolicy,
        config: &CoordinatorConfig,
    ) -> Self {
        Self::new(store, policy, config.expire, config.io_timeout)
    }

    pub async fn handle<S>(&self, stream: S) -> SessionOutcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut framed = Framed::new(stream, FrameCodec::<Event, Response>::new());

        // AwaitFrame
        let event = match tokio::time::timeout(self.io_timeout, framed.next()).await {
            Err(_) => return SessionOutcome::Closed(CloseReason::Timeout),
            Ok(None) => return SessionOutcome::Closed(CloseReason::Eof),
            Ok(Some(Err(RollcallError::MalformedMessage(reason)))) => {
                tracing::debug!(reason = %reason, "Dropping malformed frame");
                return SessionOutcome::Closed(CloseReason::Malformed);
            }
            Ok(Some(Err(e))) => {
                tracing::debug!(error = %e, "Failed to read frame");
                return SessionOutcome::Closed(CloseReason::Transport);
            }
            Ok(Some(Ok(event))) => event,
        };

        // Authenticated
        if !self.gate.authenticate(&event).await {
            return SessionOutcome::Closed(CloseReason::Unauthenticated);
        }

        // Dispatched
        let Some((action, response)) = self.dispatch(&event).await else {
            tracing::debug!(node_id = event.id, action = %event.action, "No response for event");
            return SessionOutcome::Closed(CloseReason::Unanswered);
        };
        let code = response.response_code;

        // Responded
        match tokio::time::timeout(self.io_timeout, framed.send(response)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(node_id = event.id, %action, error = %e, "Failed to write response");
            }
            Err(_) => {
                tracing::warn!(node_id = event.id, %action, "Timed out writing response");
            }
        }
        // Closed
        if let Err(e) = framed.close().await {
            tracing::debug!(error = %e, "Error closing connection");
        }

        SessionOutcome::Responded { action, code }
    }

    /// Route an authenticated event. `None` means nothing is written back.
    pub async fn dispatch(&self, event: &Event) -> Option<(Action, Response)> {
        let action = event.action()?;
        tracing::debug!(node_id = event.id, %action, "Dispatching event");

        let response = match action {
            Action::Checkin => self.checkin(event).await,
            Action::Register => self.register(event).await,
            Action::GetJobs => self.get_jobs(event).await,
            Action::DeleteJob => self.delete_job(event).await?,
            Action::JobResult => self.job_result(event),
        };
        Some((action, response))
    }

    async fn checkin(&self, event: &Event) -> Response {
        if self.registry.is_known(event.id).await {
            Response::success("checkin successful")
        } else {
            Response::failure("checkin failed")
        }
    }

    async fn register(&self, event: &Event) -> Response {
        let facts = event.param(PARAM_SYSINFO);
        let template = self.policy.jobs_for(facts);

        if let Err(e) = self.jobs.provision(event.id, template, self.expire).await {
            tracing::error!(node_id = event.id, error = %e, "Job provisioning failed");
        }
        if let Err(e) = self.registry.register(event.id, facts, self.expire).await {
            tracing::error!(node_id = event.id, error = %e, "Node registration failed");
        }

        Response::success("registration successful")
    }

    async fn get_jobs(&self, event: &Event) -> Response {
        let jobs = self.jobs.list(event.id).await;
        let response = if jobs.is_empty() {
            Response::failure("jobs")
        } else {
            Response::success("jobs")
        };
        response.with_data_map(jobs)
    }

    async fn delete_job(&self, event: &Event) -> Option<Response> {
        let job_id = event.param(PARAM_JOB)?;
        let response = if self.jobs.delete(event.id, job_id).await {
            Response::success("job deleted")
        } else {
            Response::failure("job does not exist")
        };
        Some(response.with_data(PARAM_JOB, job_id))
    }

    fn job_result(&self, event: &Event) -> Response {
        let job_id = event.param(PARAM_JOB).unwrap_or_default();
        let data = event.param(PARAM_DATA).unwrap_or_default();
        tracing::info!(node_id = event.id, job_id, output_len = data.len(), "Job result received");
        tracing::debug!(node_id = event.id, job_id, data, "Job output (base64)");
        Response::success("job result received").with_data(PARAM_JOB, job_id)
    }
}
