//! Filesystem access for served documents.
//!
//! The response writer only needs two things from storage: metadata for a
//! path (or the knowledge that nothing servable lives there) and a reader
//! positioned at the start of the file. [`FileSystem`] captures exactly that;
//! [`LocalFs`] backs it with the real disk and [`MemoryFs`] with a map.

use std::collections::HashMap;
use std::future::Future;
use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use tokio::io::AsyncRead;

/// Size and modification time of a servable file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    pub modified: SystemTime,
}

/// Read access to the files under a document root.
///
/// Implementations are shared by every connection task, so they must be
/// `Send + Sync` and their futures `Send`.
pub trait FileSystem: Send + Sync + 'static {
    /// Sequential reader over one file's bytes.
    type Reader: AsyncRead + Unpin + Send;

    /// Returns metadata for `path`, or `Ok(None)` if there is no regular file there.
    ///
    /// Errors are reserved for failures other than absence (permissions, I/O).
    fn metadata(&self, path: &Path)
    -> impl Future<Output = io::Result<Option<FileMetadata>>> + Send;

    /// Opens `path` for reading from offset 0.
    fn open(&self, path: &Path) -> impl Future<Output = io::Result<Self::Reader>> + Send;
}

/// Joins a request target onto `root`.
///
/// Returns `None` for targets that could leave the root (`..` segments or
/// platform path prefixes). `.` segments and repeated slashes are dropped.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use htserve::fs::resolve;
///
/// let root = Path::new("/srv/www");
/// assert_eq!(resolve(root, "/index.html"), Some(root.join("index.html")));
/// assert_eq!(resolve(root, "/a/./b//c.txt"), Some(root.join("a/b/c.txt")));
/// assert_eq!(resolve(root, "/../etc/passwd"), None);
/// ```
pub fn resolve(root: &Path, target: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for component in Path::new(target).components() {
        match component {
            Component::Normal(segment) => path.push(segment),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => return None,
        }
    }
    Some(path)
}

/// The local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    type Reader = tokio::fs::File;

    async fn metadata(&self, path: &Path) -> io::Result<Option<FileMetadata>> {
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                ) =>
            {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if !meta.is_file() {
            return Ok(None);
        }

        Ok(Some(FileMetadata {
            size: meta.len(),
            modified: meta
                .modified()
                .ok()
                .filter(|t| *t >= SystemTime::UNIX_EPOCH)
                .unwrap_or(SystemTime::UNIX_EPOCH),
        }))
    }

    async fn open(&self, path: &Path) -> io::Result<Self::Reader> {
        tokio::fs::File::open(path).await
    }
}

/// An in-memory document tree, keyed by full path.
///
/// # Examples
///
/// ```
/// use htserve::fs::MemoryFs;
///
/// let mut fs = MemoryFs::new();
/// fs.insert("/srv/index.html", "<h1>hi</h1>");
/// assert_eq!(fs.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: HashMap<PathBuf, (Bytes, SystemTime)>,
}

impl MemoryFs {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `contents` at `path`, stamped with the current time.
    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<Bytes>) {
        self.insert_modified(path, contents, SystemTime::now());
    }

    /// Stores `contents` at `path` with an explicit modification time.
    pub fn insert_modified(
        &mut self,
        path: impl Into<PathBuf>,
        contents: impl Into<Bytes>,
        modified: SystemTime,
    ) {
        self.files.insert(path.into(), (contents.into(), modified));
    }

    /// Number of stored files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if no file is stored.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileSystem for MemoryFs {
    type Reader = Cursor<Bytes>;

    async fn metadata(&self, path: &Path) -> io::Result<Option<FileMetadata>> {
        Ok(self.files.get(path).map(|(contents, modified)| FileMetadata {
            size: contents.len() as u64,
            modified: *modified,
        }))
    }

    async fn open(&self, path: &Path) -> io::Result<Self::Reader> {
        self.files
            .get(path)
            .map(|(contents, _)| Cursor::new(contents.clone()))
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("htserve-fs-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn resolve_rejects_parent_segments() {
        let root = Path::new("/srv");
        assert_eq!(resolve(root, "/a/../b"), None);
        assert_eq!(resolve(root, ".."), None);
        assert_eq!(resolve(root, "/"), Some(PathBuf::from("/srv")));
        assert_eq!(resolve(root, "relative.txt"), Some(root.join("relative.txt")));
    }

    #[tokio::test]
    async fn local_metadata_and_read() {
        let dir = scratch_dir("local");
        let file = dir.join("hello.txt");
        std::fs::write(&file, b"hello world").unwrap();

        let meta = LocalFs.metadata(&file).await.unwrap().unwrap();
        assert_eq!(meta.size, 11);

        let mut contents = Vec::new();
        LocalFs.open(&file).await.unwrap().read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, b"hello world");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn local_missing_and_directories_are_absent() {
        let dir = scratch_dir("absent");
        assert_eq!(LocalFs.metadata(&dir.join("nope.html")).await.unwrap(), None);
        assert_eq!(LocalFs.metadata(&dir).await.unwrap(), None);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn memory_fs_round_trip() {
        let mut fs = MemoryFs::new();
        let stamp = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(784_111_777);
        fs.insert_modified("/srv/a.txt", "abc", stamp);

        let meta = fs.metadata(Path::new("/srv/a.txt")).await.unwrap().unwrap();
        assert_eq!(meta, FileMetadata { size: 3, modified: stamp });
        assert_eq!(fs.metadata(Path::new("/srv/b.txt")).await.unwrap(), None);

        let mut out = String::new();
        fs.open(Path::new("/srv/a.txt"))
            .await
            .unwrap()
            .read_to_string(&mut out)
            .await
            .unwrap();
        assert_eq!(out, "abc");
    }
}
