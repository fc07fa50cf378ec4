//! File stores: the byte-oriented collaborator behind uploads, downloads,
//! and listings.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Named blobs a session reads from and writes to.
///
/// Names are flat: a store holds one level of files, no directories.
pub trait FileStore {
    /// Returns `true` if `name` exists.
    fn exists(&self, name: &str) -> bool;

    /// Reads the whole content of `name`.
    ///
    /// Fails with [`io::ErrorKind::NotFound`] when it does not exist.
    fn read_all(&self, name: &str) -> io::Result<Vec<u8>>;

    /// Creates or replaces `name` with `data`.
    fn write_all(&self, name: &str, data: &[u8]) -> io::Result<()>;

    /// Names of all stored files, in no particular order.
    fn list_names(&self) -> io::Result<Vec<String>>;
}

/// A store backed by a single directory on disk.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Opens (or creates) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory this store reads and writes.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `name` inside the root, refusing anything that would escape it.
    fn path(&self, name: &str) -> io::Result<PathBuf> {
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', '\0']);
        if plain {
            Ok(self.root.join(name))
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid file name {name:?}"),
            ))
        }
    }
}

impl FileStore for DirStore {
    fn exists(&self, name: &str) -> bool {
        self.path(name).is_ok_and(|p| p.is_file())
    }

    fn read_all(&self, name: &str) -> io::Result<Vec<u8>> {
        let path = self
            .path(name)
            .map_err(|e| io::Error::new(io::ErrorKind::NotFound, e))?;
        fs::read(path)
    }

    fn write_all(&self, name: &str, data: &[u8]) -> io::Result<()> {
        fs::write(self.path(name)?, data)
    }

    fn list_names(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => tracing::debug!(?raw, "skipping non-UTF-8 file name"),
            }
        }
        Ok(names)
    }
}

/// An in-memory store. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the map, surfacing poisoning as an I/O error.
    fn files(&self) -> io::Result<MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.files
            .lock()
            .map_err(|_| io::Error::other("memory store lock poisoned"))
    }
}

impl FileStore for MemoryStore {
    fn exists(&self, name: &str) -> bool {
        self.files().is_ok_and(|f| f.contains_key(name))
    }

    fn read_all(&self, name: &str) -> io::Result<Vec<u8>> {
        self.files()?.get(name).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such file {name:?}"))
        })
    }

    fn write_all(&self, name: &str, data: &[u8]) -> io::Result<()> {
        self.files()?.insert(name.to_owned(), data.to_vec());
        Ok(())
    }

    fn list_names(&self) -> io::Result<Vec<String>> {
        Ok(self.files()?.keys().cloned().collect())
    }
}
