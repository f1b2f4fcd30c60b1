//! Command line interface module
//!
//! Argument parsing, the transport and YAML configuration layers, and the runner that ties
//! them to the sync orchestrator.

pub mod args;
pub mod config;
pub mod runner;
pub mod sync_config;

pub use args::Args;
pub use config::{AuthConfig, TransportConfig};
pub use runner::Runner;
pub use sync_config::{Credentials, CredentialsFile, SyncConfig};
