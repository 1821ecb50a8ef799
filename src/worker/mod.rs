//! Node side of the protocol.
//!
//! - [`Agent`]: the check-in / register / pull / run / report / retire loop
//! - [`NodeClient`]: one-shot TLS request/response per protocol step
//! - [`JobExecutor`]: runs job commands with `sh -c` and captures output
//! - [`facts`]: host facts reported at registration
//!
//! # Round Flow
//!
//! 1. `checkin`; on failure `register` with name and host facts
//! 2. `getjobs` once the coordinator accepts the node
//! 3. [`CommandExecutor::execute`] each job, `jobresult` with base64 stdout
//! 4. `deletejob` for every id in the batch
//! 5. Sleep for the configured wait
//!
//! # Security Note
//!
//! Commands are executed directly via shell without sandboxing.

pub mod agent;
pub mod executor;
pub mod facts;
pub mod transport;

pub use agent::{Agent, RoundReport};
pub use executor::{CommandExecutor, ExecutionResult, ExecutionStatus, JobExecutor};
pub use transport::NodeClient;
