//! Source list: the ordered items of one viewing session
//!
//! Items are sorted lexicographically by name and de-duplicated once, when
//! the list is built. After that the list is immutable and every item keeps
//! its index for the rest of the session.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File extensions treated as loadable images when enumerating a directory.
pub const IMAGE_EXTENSIONS: &[&str] = &["avif", "bmp", "gif", "jpeg", "jpg", "png", "webp"];

/// Opaque reference to the raw bytes of an item.
#[derive(Clone, PartialEq, Eq)]
pub enum SourceHandle {
    /// A local file.
    Path(PathBuf),

    /// Bytes already held in memory.
    Blob(Arc<[u8]>),
}

impl fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Blob(bytes) => write!(f, "Blob({} bytes)", bytes.len()),
        }
    }
}

/// One entry of the source list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Position in the sequence, stable for the session.
    pub index: usize,

    /// Sort key, usually the file name.
    pub name: String,

    /// Where the bytes come from.
    pub source: SourceHandle,
}

/// Errors raised while enumerating sources.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("unable to read directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Immutable, sorted, de-duplicated sequence of items.
///
/// # Example
///
/// ```
/// use strip_viewer_cache::{SourceHandle, SourceList};
/// use std::sync::Arc;
///
/// let list = SourceList::new(vec![
///     ("002.png".to_string(), SourceHandle::Blob(Arc::from(&b"b"[..]))),
///     ("001.png".to_string(), SourceHandle::Blob(Arc::from(&b"a"[..]))),
/// ]);
///
/// assert_eq!(list.len(), 2);
/// assert_eq!(list.get(0).unwrap().name, "001.png");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SourceList {
    items: Vec<Item>,
}

impl SourceList {
    /// Build a list from `(name, source)` pairs.
    ///
    /// Entries are sorted by name; later entries with a name already seen
    /// are dropped.
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, SourceHandle)>,
    {
        let mut entries: Vec<(String, SourceHandle)> = entries.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.dedup_by(|later, earlier| later.0 == earlier.0);

        let items = entries
            .into_iter()
            .enumerate()
            .map(|(index, (name, source))| Item {
                index,
                name,
                source,
            })
            .collect();

        Self { items }
    }

    /// An empty list.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a list from file paths, keyed by file name.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::new(paths.into_iter().map(|path| {
            let path = path.into();
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned());
            (name, SourceHandle::Path(path))
        }))
    }

    /// Enumerate the image files directly inside `dir`.
    ///
    /// Subdirectories and files without an [`IMAGE_EXTENSIONS`] extension
    /// are skipped.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let io_err = |source| SourceError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && is_image_path(&path) {
                paths.push(path);
            }
        }

        tracing::debug!(dir = %dir.display(), count = paths.len(), "enumerated image sources");
        Ok(Self::from_paths(paths))
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item at `index`.
    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    /// Iterate items in sequence order.
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    /// Clamp `index` into `[0, len)`. `None` for an empty list.
    pub fn clamp(&self, index: usize) -> Option<usize> {
        self.items.len().checked_sub(1).map(|last| index.min(last))
    }
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(bytes: &[u8]) -> SourceHandle {
        SourceHandle::Blob(Arc::from(bytes))
    }

    #[test]
    fn test_sorted_and_indexed() {
        let list = SourceList::new(vec![
            ("c.png".to_string(), blob(b"c")),
            ("a.png".to_string(), blob(b"a")),
            ("b.png".to_string(), blob(b"b")),
        ]);

        let names: Vec<_> = list.iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
        for (position, item) in list.iter().enumerate() {
            assert_eq!(item.index, position);
        }
    }

    #[test]
    fn test_duplicate_names_are_dropped() {
        let list = SourceList::new(vec![
            ("a.png".to_string(), blob(b"first")),
            ("a.png".to_string(), blob(b"second")),
            ("b.png".to_string(), blob(b"b")),
        ]);

        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0).unwrap().source, blob(b"first"));
    }

    #[test]
    fn test_clamp() {
        let list = SourceList::from_paths(vec!["/a/1.png", "/a/2.png", "/a/3.png"]);
        assert_eq!(list.clamp(0), Some(0));
        assert_eq!(list.clamp(2), Some(2));
        assert_eq!(list.clamp(500), Some(2));
        assert_eq!(SourceList::empty().clamp(0), None);
    }

    #[test]
    fn test_from_paths_uses_file_name() {
        let list = SourceList::from_paths(vec!["/z/010.jpg", "/a/002.jpg"]);
        assert_eq!(list.get(0).unwrap().name, "002.jpg");
        assert_eq!(
            list.get(1).unwrap().source,
            SourceHandle::Path(PathBuf::from("/z/010.jpg"))
        );
    }

    #[test]
    fn test_from_dir_filters_non_images() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("002.PNG"), b"png").unwrap();
        fs::write(dir.path().join("001.jpg"), b"jpg").unwrap();
        fs::write(dir.path().join("notes.txt"), b"txt").unwrap();
        fs::create_dir(dir.path().join("nested.png")).unwrap();

        let list = SourceList::from_dir(dir.path()).unwrap();
        let names: Vec<_> = list.iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, vec!["001.jpg", "002.PNG"]);
    }

    #[test]
    fn test_from_dir_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = SourceList::from_dir(dir.path().join("missing"));
        assert!(matches!(result, Err(SourceError::Io { .. })));
    }
}
