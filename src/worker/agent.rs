use tokio_util::sync::CancellationToken;

use crate::config::AgentConfig;
use crate::error::Result;
use crate::protocol::{
    Action, Event, HostFacts, Response, PARAM_DATA, PARAM_JOB, PARAM_NAME, PARAM_SYSINFO,
};
use crate::worker::executor::CommandExecutor;
use crate::worker::transport::NodeClient;

/// What one check-in round did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundReport {
    /// The node had to register this round.
    pub registered: bool,
    /// The coordinator accepted the node (checkin or registration succeeded).
    pub accepted: bool,
    /// Jobs executed and reported.
    pub jobs_run: usize,
    /// Jobs the coordinator confirmed deleted.
    pub jobs_deleted: usize,
}

/// Node-side driver.
///
/// Each round: check in, register if the coordinator does not know us, pull
/// the job set, run every job and report its output, then retire the whole
/// batch. Every step is its own connection.
pub struct Agent<E> {
    config: AgentConfig,
    client: NodeClient,
    executor: E,
    facts: String,
}

impl<E: CommandExecutor> Agent<E> {
    pub fn new(config: AgentConfig, client: NodeClient, executor: E, facts: &HostFacts) -> Self {
        Self {
            config,
            client,
            executor,
            facts: facts.to_blob(),
        }
    }

    pub fn node_id(&self) -> i64 {
        self.config.node_id
    }

    /// Loop until `shutdown` fires. A failed round is logged and the next
    /// one starts after the usual wait.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            node_id = self.config.node_id,
            master = %self.client.master(),
            wait_secs = self.config.wait.as_secs(),
            "Starting node loop"
        );

        loop {
            match self.run_round().await {
                Ok(report) => {
                    tracing::debug!(node_id = self.config.node_id, ?report, "Round complete")
                }
                Err(e) => {
                    tracing::warn!(node_id = self.config.node_id, error = %e, "Round failed")
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.wait) => {}
            }
        }

        tracing::info!(node_id = self.config.node_id, "Node loop stopped");
    }

    pub async fn run_round(&self) -> Result<RoundReport> {
        let mut report = RoundReport::default();

        let mut status = self.send(self.event(Action::Checkin)).await?;
        if status.is_session_reply() && !status.is_success() {
            tracing::info!(node_id = self.config.node_id, "Not registered, registering");
            let registration = self
                .event(Action::Register)
                .with_param(PARAM_NAME, self.config.name.as_str())
                .with_param(PARAM_SYSINFO, self.facts.as_str());
            status = self.send(registration).await?;
            report.registered = status.is_success();
        }

        if !(status.is_session_reply() && status.is_success()) {
            return Ok(report);
        }
        report.accepted = true;

        let batch = self
            .send(self.event(Action::GetJobs).with_param("params", "all"))
            .await?;
        if batch.response_data.is_empty() {
            return Ok(report);
        }

        for (job_id, command) in &batch.response_data {
            let result = self.executor.execute(job_id, command).await;
            let ack = self
                .event(Action::JobResult)
                .with_param(PARAM_JOB, job_id.as_str())
                .with_param(PARAM_DATA, result.encoded_output());
            match self.send(ack).await {
                Ok(_) => report.jobs_run += 1,
                Err(e) => tracing::warn!(
                    node_id = self.config.node_id,
                    job_id = %job_id,
                    error = %e,
                    "Failed to report job result"
                ),
            }
        }

        // Retire the whole batch, whether or not each job ran cleanly.
        if batch.is_success() {
            for job_id in batch.response_data.keys() {
                let delete = self
                    .event(Action::DeleteJob)
                    .with_param(PARAM_JOB, job_id.as_str());
                match self.send(delete).await {
                    Ok(r) if r.is_success() => report.jobs_deleted += 1,
                    Ok(r) => tracing::debug!(
                        job_id = %job_id,
                        message = %r.response_message,
                        "Job already gone"
                    ),
                    Err(e) => tracing::warn!(
                        node_id = self.config.node_id,
                        job_id = %job_id,
                        error = %e,
                        "Failed to delete job"
                    ),
                }
            }
        }

        Ok(report)
    }

    fn event(&self, action: Action) -> Event {
        Event::new(self.config.node_id, action, self.config.password.as_str())
    }

    async fn send(&self, event: Event) -> Result<Response> {
        self.client.send(&event).await
    }
}
