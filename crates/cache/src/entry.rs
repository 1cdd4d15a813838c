//! Materialized entries and their display resources

use std::sync::Arc;

/// A disposable resource produced by a materializer.
///
/// The window cache calls [`release`](Self::release) exactly once, when the
/// entry is evicted, cleared, or discarded as stale, and then drops it.
pub trait DisplayResource {
    /// Release whatever the resource holds outside of Rust's ownership
    /// (a bound texture, a revoked URL, a GPU upload).
    fn release(&mut self) {}
}

/// Raw bytes of an item, held in memory.
#[derive(Debug, Clone)]
pub struct Blob {
    bytes: Arc<[u8]>,
}

impl Blob {
    /// Wrap bytes as a resource.
    pub fn new(bytes: Arc<[u8]>) -> Self {
        Self { bytes }
    }

    /// The bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the blob is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl DisplayResource for Blob {}

/// An item that has been loaded into the window cache.
#[derive(Debug)]
pub struct MaterializedEntry<R> {
    index: usize,
    resource: R,
    ready: bool,
}

impl<R: DisplayResource> MaterializedEntry<R> {
    /// Create an entry.
    pub fn new(index: usize, resource: R, ready: bool) -> Self {
        Self {
            index,
            resource,
            ready,
        }
    }

    /// Sequence index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The display resource.
    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// Whether the resource has finished decoding (or failed to).
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub(crate) fn mark_ready(&mut self) {
        self.ready = true;
    }

    /// Release the resource and drop the entry.
    pub(crate) fn release(mut self) {
        self.resource.release();
    }
}
