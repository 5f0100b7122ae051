//! Sequential package transfer into the staging directory
//!
//! Packages are streamed one at a time with throttled, batch-wide progress
//! and cooperative cancellation at chunk boundaries.

mod config;
mod core;
mod stream;
mod validation;

pub use self::config::{DownloadedPackage, TransferConfig, TransferOutcome};
pub use self::core::PackageTransferController;
pub(crate) use self::validation::validate_url;
