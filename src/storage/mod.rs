//! Blob storage for the watch list and per-URL state records.
//!
//! Every backend exposes the same two remote operations, `get` and `put`,
//! keyed by a flat string. The layout on top of them is owned by
//! [`StateStore`]:
//!
//! ```text
//! {bucket or root}/
//! ├── urls.txt                    # Watch list, one URL per line
//! ├── state-1f0c9a4be2d3.json     # {"STATE": "OPEN", "TIME": "..."}
//! └── state-77e0b5c1a9f4.json
//! ```

pub mod local;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;
mod state;

use async_trait::async_trait;

use crate::error::Result;

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use state::{RecordLookup, StateStore, parse_watch_list};

/// Content type of state records.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Key/value blob persistence.
///
/// Implementations may fail on any call; callers decide whether a failure
/// is fatal for their key or only skips it.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read a blob, returning `None` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Create or overwrite a blob.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Human-readable location of a key, for logs.
    fn location(&self, key: &str) -> String;
}
