//! Coordinator side of the protocol.
//!
//! - [`Coordinator`]: wires store, secret, templates and TLS, then binds
//! - [`Listener`]: TLS accept loop, one task per connection
//! - [`SessionHandler`]: the per-connection request/response state machine

pub mod coordinator;
pub mod listener;
pub mod session;

pub use coordinator::{resolve_tls, Coordinator};
pub use listener::Listener;
pub use session::{CloseReason, SessionHandler, SessionOutcome};
