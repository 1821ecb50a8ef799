pub mod auth;
pub mod config;
pub mod error;
pub mod protocol;
pub mod scheduler;
pub mod server;
pub mod shutdown;
pub mod store;
pub mod tls;
pub mod worker;
