//! # larder: Segmented blob cache
//!
//! An append-only, checksummed, compacting store for serialized artifacts
//! (font atlases, baked assets, ...). Payloads live in segment files grouped
//! into named namespaces; where each payload sits is described by a
//! [`RecordDescriptor`] that the *caller* keeps and persists. The cache has no
//! index of its own.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                            Cache                             │
//! │  group / register / attach / deregister                      │
//! │  submit_write ──> Scheduler ──> encode ──> Segment::append   │
//! │  read ──────────────────────────> Segment::read ──> decode   │
//! │  filter ────────────────────────> Segment::rewrite           │
//! └────────┬──────────────────┬───────────────────┬──────────────┘
//!          │                  │                   │
//!   ┌──────┴───────┐  ┌───────┴────────┐  ┌───────┴───────┐
//!   │ SegmentGroup │  │  WriteIntents  │  │ Codec / CRC32 │
//!   │   Segment    │  │ (drain barrier)│  │               │
//!   └──────┬───────┘  └────────────────┘  └───────────────┘
//!          │
//!   ┌──────┴───────┐
//!   │  IoBackend   │  (larder-io)
//!   └──────────────┘
//! ```
//!
//! # File format
//!
//! ```text
//! {root}/{group}/{segment id as 16 hex digits}
//!
//! [magic "LRDR":u32][version:u32][payload][payload]...
//! ```
//!
//! Payloads above [`CacheOptions::compression_threshold`] are zstd-compressed
//! when that makes them smaller. Every payload's CRC32 is taken over its
//! uncompressed bytes and checked on every read.
//!
//! # Example
//!
//! ```no_run
//! use larder::{Cache, CacheOptions, WriteRequest};
//!
//! let cache = Cache::open(CacheOptions::new("/tmp/larder"))?;
//! let fonts = cache.group("fonts")?;
//! let segment = cache.register(&fonts);
//!
//! let ticket = cache.submit_write(
//!     WriteRequest::new(segment.clone()).serialize(|buf| buf.extend_from_slice(b"atlas")),
//! );
//! let descriptor = ticket.wait()?;
//! assert_eq!(cache.read(&segment, &descriptor)?, b"atlas");
//!
//! cache.deregister(&segment, &fonts)?;
//! cache.await_teardowns();
//! # Ok::<(), larder::CacheError>(())
//! ```

mod cache;
pub mod checksum;
pub mod codec;
mod error;
pub mod header;
pub mod intents;
mod options;
pub mod payload;
pub mod scheduler;

mod group;
mod request;
mod segment;

pub use cache::{Cache, CompactionReport};
pub use checksum::{Crc32, checksum};
pub use codec::{Codec, ZstdCodec};
pub use error::{CacheError, CacheResult, ErrorDomain, ErrorKind};
pub use group::SegmentGroup;
pub use header::{HEADER_SIZE, Header};
pub use intents::{Intent, WriteIntents};
pub use options::{CacheOptions, DEFAULT_COMPRESSION_LEVEL, DEFAULT_COMPRESSION_THRESHOLD};
pub use request::{Serializer, WriteRequest, WriteTicket};
pub use scheduler::{InlineScheduler, Job, PoolScheduler, Scheduler};
pub use segment::Segment;

pub use larder_io::{IoBackend, IoError, SyncBackend};
pub use larder_types::{CompressionLevel, RecordDescriptor, SegmentId};
