//! File persistence behind the upload and download sessions.
//!
//! [`DiskStore`] keeps public files under `<root>/public/` and everything
//! else directly under `<root>/`. Only public files are downloadable. The
//! public folder carries an `index.txt` listing, regenerated after every
//! public save.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Visibility class that makes an uploaded file downloadable.
pub const PUBLIC_TYPE: &str = "public";

const PUBLIC_DIR: &str = "public";
const INDEX_FILE: &str = "index.txt";

/// Errors from file storage.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage abstraction the sessions run against.
///
/// `save` receives the complete payload of a finished upload in one call;
/// partially received uploads never reach the store. `load` resolves a file
/// for download.
pub trait FileStore: Send + Sync + 'static {
    /// Persists a completed upload, returning the stored identifier.
    fn save(&self, file_id: &str, file_type: &str, data: &[u8]) -> Result<String, StoreError>;

    /// Reads back a stored public file.
    fn load(&self, filename: &str) -> Result<Vec<u8>, StoreError>;
}

/// Flat on-disk store rooted at a single directory.
#[derive(Debug)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Opens a store rooted at `root`, creating the directory layout if
    /// missing.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join(PUBLIC_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rewrites `public/index.txt` from the current directory contents, one
    /// file name per line, sorted.
    fn refresh_index(&self) -> Result<(), StoreError> {
        let dir = self.root.join(PUBLIC_DIR);
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name != INDEX_FILE {
                    names.push(name);
                }
            }
        }
        names.sort();
        let mut listing = names.join("\n");
        if !listing.is_empty() {
            listing.push('\n');
        }
        fs::write(dir.join(INDEX_FILE), listing)?;
        Ok(())
    }
}

impl FileStore for DiskStore {
    fn save(&self, file_id: &str, file_type: &str, data: &[u8]) -> Result<String, StoreError> {
        validate_name(file_id)?;

        let dir = if file_type == PUBLIC_TYPE {
            self.root.join(PUBLIC_DIR)
        } else {
            self.root.clone()
        };
        fs::write(dir.join(file_id), data)?;

        if file_type == PUBLIC_TYPE {
            // The listing is advisory; a failed refresh doesn't fail the save.
            if let Err(e) = self.refresh_index() {
                tracing::warn!("refreshing public index: {e}");
            }
        }

        Ok(file_id.to_string())
    }

    fn load(&self, filename: &str) -> Result<Vec<u8>, StoreError> {
        validate_name(filename)?;

        match fs::read(self.root.join(PUBLIC_DIR).join(filename)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Accepts only bare file names: no separators, no traversal, no absolute
/// paths. The store is flat, so a single normal path component is the whole
/// contract.
fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::InvalidName("empty file name".into()));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(StoreError::InvalidName(format!(
            "file name must be a bare name: {name}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, DiskStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn saves_public_file_under_public_dir() {
        let (dir, store) = store();
        let id = store.save("report.pdf", "public", b"pdf bytes").unwrap();
        assert_eq!(id, "report.pdf");
        let on_disk = fs::read(dir.path().join("public/report.pdf")).unwrap();
        assert_eq!(on_disk, b"pdf bytes");
    }

    #[test]
    fn saves_private_file_at_root() {
        let (dir, store) = store();
        store.save("secret.bin", "private", b"x").unwrap();
        assert!(dir.path().join("secret.bin").exists());
        assert!(!dir.path().join("public/secret.bin").exists());
    }

    #[test]
    fn zero_byte_file_is_stored() {
        let (dir, store) = store();
        store.save("empty.txt", "public", b"").unwrap();
        let on_disk = fs::read(dir.path().join("public/empty.txt")).unwrap();
        assert!(on_disk.is_empty());
    }

    #[test]
    fn load_roundtrip() {
        let (_dir, store) = store();
        store.save("a.txt", "public", b"hello").unwrap();
        assert_eq!(store.load("a.txt").unwrap(), b"hello");
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.load("nope.txt"),
            Err(StoreError::NotFound(name)) if name == "nope.txt"
        ));
    }

    #[test]
    fn private_files_are_not_downloadable() {
        let (_dir, store) = store();
        store.save("secret.bin", "private", b"x").unwrap();
        assert!(matches!(
            store.load("secret.bin"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn index_lists_public_files_sorted() {
        let (dir, store) = store();
        store.save("b.txt", "public", b"b").unwrap();
        store.save("a.txt", "public", b"a").unwrap();
        store.save("hidden.bin", "private", b"h").unwrap();

        let index = fs::read_to_string(dir.path().join("public/index.txt")).unwrap();
        assert_eq!(index, "a.txt\nb.txt\n");
    }

    #[test]
    fn rejects_traversal_names() {
        let (_dir, store) = store();
        for bad in ["", "..", "../escape", "sub/dir.txt", "/etc/passwd", "a/.."] {
            assert!(
                matches!(store.save(bad, "public", b"x"), Err(StoreError::InvalidName(_))),
                "save should reject {bad:?}"
            );
            assert!(
                matches!(store.load(bad), Err(StoreError::InvalidName(_))),
                "load should reject {bad:?}"
            );
        }
    }

    #[test]
    fn overwrite_replaces_contents() {
        let (_dir, store) = store();
        store.save("f.txt", "public", b"first").unwrap();
        store.save("f.txt", "public", b"second").unwrap();
        assert_eq!(store.load("f.txt").unwrap(), b"second");
    }
}
