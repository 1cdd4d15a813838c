//! Strip Viewer Cache Library
//!
//! Windowed lazy-loading cache for long ordered image sequences.
//!
//! - [`SourceList`]: the sorted, de-duplicated items of one session.
//! - [`WindowCache`]: the resident entries, keyed and ordered by index, with
//!   batch-granular distance eviction.
//! - [`LoadScheduler`]: batch-aligned, idempotent materialization with
//!   ordered insertion.
//! - [`Materializer`]: the seam to whatever turns a source into a display
//!   resource; [`FileMaterializer`] is a threaded implementation for local
//!   files and in-memory blobs.

pub mod batch;
pub mod entry;
pub mod file;
pub mod loader;
pub mod source;
pub mod window;

pub use batch::{batch_range, batch_start};
pub use entry::{Blob, DisplayResource, MaterializedEntry};
pub use file::{FileMaterializer, FileMaterializerConfig};
pub use loader::{
    Completion, LoadError, LoadScheduler, LoadStats, LoadTicket, Materializer, PumpReport,
};
pub use source::{Item, SourceError, SourceHandle, SourceList, IMAGE_EXTENSIONS};
pub use window::{CacheEvent, CacheLimits, CacheStats, WindowCache};
