//! # larder-io: file access for segment files
//!
//! The cache never calls `std::fs` directly. Every open, positional read and
//! write, fsync and delete goes through an [`IoBackend`] held as
//! `Arc<dyn IoBackend>`, so tests can inject a backend that fails on demand.
//!
//! ```text
//! larder::Segment ──> dyn IoBackend ──> SyncBackend ──> std::fs (pread/pwrite)
//! ```
//!
//! [`SyncBackend`] is the only backend shipped.

mod backend;
mod error;
mod sync_backend;

pub use backend::{FileHandle, IoBackend, OpenMode};
pub use error::{IoError, IoOp};
pub use sync_backend::SyncBackend;
