//! mtime-gated read cache for a single file (the index template or the
//! bundle). Two independent instances — one per file — let index and
//! bundle refresh in parallel without contending on each other's lock.

use crate::error::AppError;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

struct Loaded {
    bytes: Arc<Vec<u8>>,
    mtime: Option<SystemTime>,
}

/// `read()` re-reads the backing file only when its mtime has moved
/// since the last load (§4.7.2). `forget()` (used by `Stop`) clears the
/// stored mtime so the next `read()` unconditionally rereads.
pub struct FileCache {
    path: String,
    inner: RwLock<Option<Loaded>>,
}

impl FileCache {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            inner: RwLock::new(None),
        }
    }

    pub fn read(&self) -> Result<Arc<Vec<u8>>, AppError> {
        let meta = std::fs::metadata(&self.path)
            .map_err(|e| AppError::Read(format!("stat {:?} failed: {e}", self.path)))?;
        let mtime = meta.modified().ok();

        {
            let guard = self.inner.read().expect("file cache lock poisoned");
            if let Some(loaded) = guard.as_ref() {
                if loaded.mtime == mtime {
                    return Ok(Arc::clone(&loaded.bytes));
                }
            }
        }

        let bytes = std::fs::read(&self.path)
            .map_err(|e| AppError::Read(format!("read {:?} failed: {e}", self.path)))?;
        let bytes = Arc::new(bytes);

        let mut guard = self.inner.write().expect("file cache lock poisoned");
        *guard = Some(Loaded {
            bytes: Arc::clone(&bytes),
            mtime,
        });
        Ok(bytes)
    }

    /// Forces the next `read()` to reread unconditionally (`Stop`, §4.7.7).
    pub fn forget(&self) {
        *self.inner.write().expect("file cache lock poisoned") = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &[u8]) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "webvm-file-cache-test-{}-{}",
            std::process::id(),
            contents.len()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    #[test]
    fn first_read_loads_bytes() {
        let path = write_temp(b"hello");
        let cache = FileCache::new(path.to_string_lossy().into_owned());
        assert_eq!(&*cache.read().unwrap(), b"hello");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let cache = FileCache::new("/nonexistent/webvm-missing-file");
        assert!(cache.read().is_err());
    }

    #[test]
    fn forget_forces_unconditional_reread() {
        let path = write_temp(b"v1");
        let cache = FileCache::new(path.to_string_lossy().into_owned());
        let first = cache.read().unwrap();
        cache.forget();
        // same bytes on disk, but forget() must not early-return stale state
        let second = cache.read().unwrap();
        assert_eq!(*first, *second);
        let _ = std::fs::remove_file(&path);
    }
}
