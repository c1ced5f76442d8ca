//! # dpres-access-client
//!
//! Client library for the digital preservation service's REST API.
//!
//! ## Overview
//!
//! Two independent clients share one configured HTTP [`Session`]:
//! - [`AccessClient`] (API 2.0) searches the catalog, disseminates preserved
//!   packages as downloadable DIPs and fetches ingest reports
//! - [`TransferClient`] (API 3.0) uploads packages in resumable chunks and
//!   tracks the resulting transfers until they are accepted or rejected
//!
//! Long-running service jobs are waited on with a ramping, jittered
//! [`PollSchedule`]. Waits are unbounded unless the caller passes a deadline.
//!
//! ## Quick Start
//!
//! ```no_run
//! use dpres_access_client::{AccessClient, ArchiveFormat, Config};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load()?;
//!     let client = AccessClient::new(&config)?;
//!
//!     let mut dip = client
//!         .create_dip_request("urn:uuid:some-aip", ArchiveFormat::Zip, None)
//!         .await?;
//!     dip.check_status(true).await?;
//!     dip.download_to(Path::new("some-aip.zip")).await?;
//!     dip.delete().await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types and file discovery
pub mod config;
/// Error types
pub mod error;
/// Poll interval schedule and polling loop
pub mod poll;
/// Retry logic with exponential backoff
pub mod retry;
/// Configured HTTP transport
pub mod session;
/// Wire and domain types
pub mod types;
/// Utility functions
pub mod utils;
/// REST API 2.0: search, dissemination, ingest reports
pub mod v2;
/// REST API 3.0: uploads and transfers
pub mod v3;

#[cfg(test)]
mod test_helpers;

// Re-export commonly used types
pub use config::{Config, ConfigSources, DpresConfig, RetryConfig, TransportConfig};
pub use error::{Error, Result, ValidationError};
pub use poll::{PollSchedule, poll_until};
pub use session::Session;
pub use types::{
    ArchiveFormat, IngestReportEntry, ReportFileType, SearchEntry, SearchResult, Transfer,
    TransferList, TransferStatus,
};
pub use v2::{AccessClient, DipRequest, DipState, StreamedDownload};
pub use v3::{TransferClient, UploadOptions, Uploader};
