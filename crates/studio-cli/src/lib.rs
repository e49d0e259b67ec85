//! Studio CLI
//!
//! Collaborators for running the studio outside a UI:
//! - [`HttpGenerationClient`]: JSON-over-HTTP generation backend
//! - [`OfflineGenerationClient`]: deterministic placeholders for demos
//! - [`FileExporter`]: writes exported artifacts to disk
//! - [`CliConfig`]: `studio.toml` with the studio and backend tables

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod file_exporter;
pub mod http_client;
pub mod offline;
pub mod report;
pub mod settings;

pub use file_exporter::FileExporter;
pub use http_client::HttpGenerationClient;
pub use offline::OfflineGenerationClient;
pub use settings::{BackendConfig, CliConfig};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
