//! Pieces shared by every function in the workspace: the error taxonomy,
//! environment configuration helpers, AWS client bootstrap, tracing setup
//! and the record and object store seams.

pub mod attributes;
pub mod aws;
pub mod config;
mod error;
#[cfg(feature = "memory-store")]
mod memory;
pub mod objects;
pub mod store;

pub use error::{Result, ViewError};
#[cfg(feature = "memory-store")]
pub use memory::MemoryStore;
pub use objects::{ObjectSource, S3Objects};
pub use store::{DynamoStore, Item, RecordKey, RecordStore};

const TRACE_DEBUG: &str = "TRACE_DEBUG";

/// Installs the fmt subscriber used by every Lambda in the workspace.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(match std::env::var(TRACE_DEBUG) {
            Ok(_) => tracing::Level::DEBUG,
            Err(_) => tracing::Level::INFO
        })
        // disable printing the name of the module in every log line.
        .with_target(false)
        // disabling time is handy because CloudWatch will add the ingestion time.
        .without_time()
        .init();
}
