//! Persistent, content-addressed card cache
//!
//! Each entry is a PNG named `<fingerprint>.png` under the cache directory.
//! Entries are written once on a cache miss and never evicted by the
//! renderer; [`CardCache::prune`] is the only way they go away.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::{Error, Result};

const ENTRY_EXTENSION: &str = "png";

/// A cached card image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Fingerprint the entry is keyed by
    pub fingerprint: String,
    /// Location of the PNG on disk
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

/// The on-disk card cache rooted at one directory
#[derive(Debug, Clone)]
pub struct CardCache {
    dir: PathBuf,
}

impl CardCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path an entry with `fingerprint` lives at, whether or not it exists.
    pub fn path_for(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", fingerprint, ENTRY_EXTENSION))
    }

    /// Cached image path for `fingerprint`, if present.
    pub fn lookup(&self, fingerprint: &str) -> Option<PathBuf> {
        let path = self.path_for(fingerprint);
        path.is_file().then_some(path)
    }

    /// Create the cache directory if it does not exist yet.
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            Error::io(format!("Failed to create cache directory {}", self.dir.display()), e)
        })
    }

    /// Copy the cached image for `fingerprint` to `dest`.
    pub fn restore(&self, fingerprint: &str, dest: &Path) -> Result<()> {
        debug!("card cache hit {} -> {}", fingerprint, dest.display());
        copy_preserving(&self.path_for(fingerprint), dest)
    }

    /// Store a freshly rendered image under `fingerprint`.
    pub fn store(&self, fingerprint: &str, src: &Path) -> Result<PathBuf> {
        self.ensure_dir()?;
        let dest = self.path_for(fingerprint);
        copy_preserving(src, &dest)?;
        debug!("card cached as {}", dest.display());
        Ok(dest)
    }

    /// All entries currently in the cache, sorted by fingerprint.
    ///
    /// A missing cache directory is an empty cache.
    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::io(
                    format!("Failed to read cache directory {}", self.dir.display()),
                    e,
                ))
            }
        };

        let mut entries = Vec::new();
        for item in read_dir {
            let item = item.map_err(|e| Error::io("Failed to read cache entry", e))?;
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let Some(fingerprint) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            else {
                continue;
            };
            let meta = item
                .metadata()
                .map_err(|e| Error::io(format!("Failed to stat {}", path.display()), e))?;
            if !meta.is_file() {
                continue;
            }
            entries.push(CacheEntry {
                fingerprint,
                path,
                size: meta.len(),
            });
        }
        entries.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
        Ok(entries)
    }

    /// Delete every cached image. Returns how many were removed.
    pub fn prune(&self) -> Result<usize> {
        let entries = self.entries()?;
        for entry in &entries {
            fs::remove_file(&entry.path)
                .map_err(|e| Error::io(format!("Failed to remove {}", entry.path.display()), e))?;
        }
        Ok(entries.len())
    }
}

/// Copy `src` to `dest`, keeping permissions and the modification time.
///
/// Copying a file onto itself is a no-op; `fs::copy` would truncate it.
pub(crate) fn copy_preserving(src: &Path, dest: &Path) -> Result<()> {
    let ctx = || format!("Failed to copy {} to {}", src.display(), dest.display());
    if same_file(src, dest) {
        debug!("{} is already in place", dest.display());
        return Ok(());
    }
    fs::copy(src, dest).map_err(|e| Error::io(ctx(), e))?;
    let modified = fs::metadata(src)
        .and_then(|m| m.modified())
        .map_err(|e| Error::io(ctx(), e))?;
    fs::File::options()
        .write(true)
        .open(dest)
        .and_then(|f| f.set_modified(modified))
        .map_err(|e| Error::io(ctx(), e))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    #[test]
    fn lookup_misses_until_stored() {
        let dir = tempdir().unwrap();
        let cache = CardCache::new(dir.path().join("cards"));
        assert!(cache.lookup("0123456789abcdef").is_none());

        let src = dir.path().join("card.png");
        fs::write(&src, b"png bytes").unwrap();
        let stored = cache.store("0123456789abcdef", &src).unwrap();

        assert_eq!(stored, dir.path().join("cards/0123456789abcdef.png"));
        assert_eq!(cache.lookup("0123456789abcdef"), Some(stored));
    }

    #[test]
    fn restore_preserves_content_and_mtime() {
        let dir = tempdir().unwrap();
        let cache = CardCache::new(dir.path());
        let entry = cache.path_for("aaaa");
        fs::write(&entry, b"cached").unwrap();
        let old = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options().write(true).open(&entry).unwrap().set_modified(old).unwrap();

        let dest = dir.path().join("out.png");
        cache.restore("aaaa", &dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"cached");
        let src_mtime = fs::metadata(&entry).unwrap().modified().unwrap();
        let dest_mtime = fs::metadata(&dest).unwrap().modified().unwrap();
        assert_eq!(src_mtime, dest_mtime);
    }

    #[test]
    fn restoring_onto_the_entry_itself_keeps_its_bytes() {
        let dir = tempdir().unwrap();
        let cache = CardCache::new(dir.path().join("cards"));
        let src = dir.path().join("card.png");
        fs::write(&src, b"png bytes").unwrap();
        let entry = cache.store("cccc", &src).unwrap();

        cache.restore("cccc", &entry).unwrap();
        let via_dots = dir.path().join("cards/../cards/cccc.png");
        cache.restore("cccc", &via_dots).unwrap();
        cache.store("cccc", &entry).unwrap();

        assert_eq!(fs::read(&entry).unwrap(), b"png bytes");
    }

    #[test]
    fn entries_lists_only_png_files() {
        let dir = tempdir().unwrap();
        let cache = CardCache::new(dir.path());
        fs::write(cache.path_for("bbbb"), b"12").unwrap();
        fs::write(cache.path_for("aaaa"), b"1").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
        fs::create_dir(dir.path().join("sub.png")).unwrap();

        let entries = cache.entries().unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.fingerprint.as_str()).collect();
        assert_eq!(names, vec!["aaaa", "bbbb"]);
        assert_eq!(entries[1].size, 2);
    }

    #[test]
    fn missing_directory_is_empty() {
        let cache = CardCache::new("/nonexistent/ogcard/cache");
        assert!(cache.entries().unwrap().is_empty());
    }

    #[test]
    fn prune_removes_entries() {
        let dir = tempdir().unwrap();
        let cache = CardCache::new(dir.path());
        fs::write(cache.path_for("aaaa"), b"1").unwrap();
        fs::write(cache.path_for("bbbb"), b"2").unwrap();
        assert_eq!(cache.prune().unwrap(), 2);
        assert!(cache.entries().unwrap().is_empty());
    }
}
