//! Node and job bookkeeping on the coordinator.
//!
//! - [`NodeRegistry`]: liveness markers with TTL, plus last host facts
//! - [`JobStore`]: per-node job sets, provisioned in bulk and deleted one by one
//! - [`ProvisioningPolicy`]: picks a job template from a node's OS family

pub mod jobs;
pub mod policy;
pub mod registry;

pub use jobs::JobStore;
pub use policy::{JobTemplate, ProvisioningPolicy};
pub use registry::NodeRegistry;
