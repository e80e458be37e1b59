//! Sync layer: pulls export documents from the data service and parses them
//! into raw rows.

mod error;
pub mod export;

#[cfg(feature = "http")]
pub mod http;

pub use error::SyncError;
pub use export::{ExportBatch, ExportSource, parse_export};

#[cfg(feature = "http")]
pub use http::ExportClient;
