//! Per-document serialization of read-transform-write sequences.
//!
//! # Responsibility
//! - Hand out one mutex per sidecar path so writers of the same document run
//!   strictly one after another.
//!
//! # Invariants
//! - At most one closure runs inside `with_lock` per key at any time.
//! - Registry entries are dropped once no caller holds or waits on them.
//! - Locking is in-process only.
//! - Keys are resolved through the canonical parent directory when it exists,
//!   so `d/x/../a.json` and `d/a.json` share a lock. Before the directory
//!   exists the key is only made absolute lexically; two spellings of a path
//!   under a not-yet-created directory may briefly use different locks.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Keyed mutex registry.
#[derive(Debug, Default)]
pub struct DocumentLocks {
    entries: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the lock for `key`.
    pub fn with_lock<T>(&self, path: &Path, f: impl FnOnce() -> T) -> T {
        let key = lock_key(path);
        let entry = {
            let mut entries = self.entries.lock();
            Arc::clone(entries.entry(key.clone()).or_default())
        };

        let result = {
            let _guard = entry.lock();
            f()
        };

        let mut entries = self.entries.lock();
        // Registry + this caller; anyone else cloned it under the registry lock.
        if Arc::strong_count(&entry) == 2 {
            entries.remove(&key);
        }
        result
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Resolves `path` to the key its lock is registered under.
fn lock_key(path: &Path) -> PathBuf {
    let canonical = match (path.parent(), path.file_name()) {
        (Some(dir), Some(name)) => {
            let dir = if dir.as_os_str().is_empty() {
                Path::new(".")
            } else {
                dir
            };
            dir.canonicalize().ok().map(|dir| dir.join(name))
        }
        _ => None,
    };
    canonical
        .or_else(|| std::path::absolute(path).ok())
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::{lock_key, DocumentLocks};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn same_key_runs_are_exclusive() {
        let locks = Arc::new(DocumentLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    for _ in 0..50 {
                        locks.with_lock(Path::new("/m/a.json"), || {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            thread::yield_now();
                            inside.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.tracked_keys(), 0);
    }

    #[test]
    fn entries_are_pruned_after_use() {
        let locks = DocumentLocks::new();
        let value = locks.with_lock(Path::new("/m/b.json"), || {
            assert_eq!(locks.tracked_keys(), 1);
            7
        });
        assert_eq!(value, 7);
        assert_eq!(locks.tracked_keys(), 0);
    }

    #[test]
    fn equivalent_spellings_share_one_key() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("x")).unwrap();

        let direct = lock_key(&dir.path().join("take.json"));
        let dotted = lock_key(&dir.path().join("x/../take.json"));
        let current = lock_key(&dir.path().join("./take.json"));
        assert_eq!(direct, dotted);
        assert_eq!(direct, current);
    }

    #[test]
    fn missing_directory_falls_back_to_absolute_path() {
        let key = lock_key(Path::new("/no/such/dir/a.json"));
        assert_eq!(key, Path::new("/no/such/dir/a.json"));
        assert!(lock_key(Path::new("a.json")).is_absolute());
    }
}
