//! File access for pipeline stages.
//!
//! Stages never touch `std::fs` directly; they go through a [`FileProvider`]
//! carried by the build context. [`DiskFs`] is the real filesystem,
//! [`MemoryFs`] an in-memory tree for tests.

use parking_lot::RwLock;
use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs, io,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Filesystem operations used by the stages.
///
/// Listing a missing directory yields an empty list and removing a missing
/// directory succeeds: stages treat absence as "nothing to do".
pub trait FileProvider: Send + Sync + Debug {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Write `data`, creating parent directories as needed.
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    fn is_file(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    /// Files under `dir`, sorted. Only direct children unless `recursive`.
    fn list_files(&self, dir: &Path, recursive: bool) -> io::Result<Vec<PathBuf>>;

    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        String::from_utf8(self.read(path)?)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        let data = self.read(from)?;
        self.write(to, &data)
    }
}

/// Files under `dir` whose extension is one of `exts` (case-insensitive).
pub fn files_with_ext(
    fs: &dyn FileProvider,
    dir: &Path,
    recursive: bool,
    exts: &[&str],
) -> io::Result<Vec<PathBuf>> {
    Ok(fs
        .list_files(dir, recursive)?
        .into_iter()
        .filter(|p| has_ext(p, exts))
        .collect())
}

pub fn has_ext(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| exts.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

// ============================================================================
// Disk
// ============================================================================

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskFs;

impl FileProvider for DiskFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    /// Writes go to a sibling temp file first, so readers (the dev server,
    /// the template renderer) never observe a half-written artifact.
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".partial");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, data)?;
        fs::rename(&tmp, path)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_files(&self, dir: &Path, recursive: bool) -> io::Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(max_depth) {
            let entry = entry.map_err(io::Error::other)?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        match fs::remove_dir_all(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(from, to).map(|_| ())
    }
}

// ============================================================================
// Memory
// ============================================================================

/// In-memory file tree keyed by absolute path.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: RwLock<BTreeMap<PathBuf, Vec<u8>>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(path, contents)` pairs.
    pub fn with_files<P, C>(files: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: Into<PathBuf>,
        C: AsRef<[u8]>,
    {
        let fs = Self::new();
        {
            let mut map = fs.files.write();
            for (path, content) in files {
                map.insert(path.into(), content.as_ref().to_vec());
            }
        }
        fs
    }

    /// Every stored path, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.read().keys().cloned().collect()
    }
}

impl FileProvider for MemoryFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files.read().get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display()))
        })
    }

    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        self.files.write().insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.read().contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.files
            .read()
            .keys()
            .any(|p| p != path && p.starts_with(path))
    }

    fn list_files(&self, dir: &Path, recursive: bool) -> io::Result<Vec<PathBuf>> {
        Ok(self
            .files
            .read()
            .keys()
            .filter(|p| {
                if recursive {
                    *p != dir && p.starts_with(dir)
                } else {
                    p.parent() == Some(dir)
                }
            })
            .cloned()
            .collect())
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        self.files.write().retain(|p, _| !p.starts_with(path));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_list_files() {
        let fs = MemoryFs::with_files([
            ("/a/one.json", "1"),
            ("/a/two.json", "2"),
            ("/a/sub/three.json", "3"),
            ("/b/four.json", "4"),
        ]);

        let direct = fs.list_files(Path::new("/a"), false).unwrap();
        assert_eq!(
            direct,
            vec![PathBuf::from("/a/one.json"), PathBuf::from("/a/two.json")]
        );

        let all = fs.list_files(Path::new("/a"), true).unwrap();
        assert_eq!(all.len(), 3);
        assert!(fs.list_files(Path::new("/missing"), true).unwrap().is_empty());
    }

    #[test]
    fn test_memory_dirs_and_removal() {
        let fs = MemoryFs::with_files([("/dist/img/a.png", "x"), ("/dev/index.html", "y")]);

        assert!(fs.is_dir(Path::new("/dist")));
        assert!(fs.is_dir(Path::new("/dist/img")));
        assert!(!fs.is_dir(Path::new("/dist/img/a.png")));
        assert!(fs.is_file(Path::new("/dist/img/a.png")));
        assert!(fs.exists(Path::new("/dist")));
        assert!(!fs.exists(Path::new("/dist/css")));

        fs.remove_dir_all(Path::new("/dist")).unwrap();
        fs.remove_dir_all(Path::new("/dist")).unwrap();
        assert_eq!(fs.paths(), vec![PathBuf::from("/dev/index.html")]);
    }

    #[test]
    fn test_memory_read_missing() {
        let err = MemoryFs::new().read(Path::new("/nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_read_to_string_rejects_invalid_utf8() {
        let fs = MemoryFs::with_files([("/bin", [0xffu8, 0xfe])]);
        let err = fs.read_to_string(Path::new("/bin")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_files_with_ext() {
        let fs = MemoryFs::with_files([
            ("/d/a.JSON", "{}"),
            ("/d/b.json", "{}"),
            ("/d/c.txt", ""),
        ]);
        let files = files_with_ext(&fs, Path::new("/d"), false, &["json"]).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_disk_write_creates_parents_and_lists() {
        let dir = TempDir::new().unwrap();
        let fs = DiskFs;
        let target = dir.path().join("css/style.min.css");

        fs.write(&target, b"a{}").unwrap();
        assert_eq!(fs.read(&target).unwrap(), b"a{}");
        // No temp file left behind
        assert_eq!(fs.list_files(dir.path(), true).unwrap(), vec![target.clone()]);
        assert!(fs.list_files(&dir.path().join("css"), false).unwrap().contains(&target));
    }

    #[test]
    fn test_disk_remove_missing_is_ok() {
        let dir = TempDir::new().unwrap();
        let fs = DiskFs;
        let dist = dir.path().join("dist");

        fs.remove_dir_all(&dist).unwrap();
        std::fs::create_dir_all(dist.join("img")).unwrap();
        fs.remove_dir_all(&dist).unwrap();
        assert!(!dist.exists());
    }

    #[test]
    fn test_disk_list_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(DiskFs.list_files(&dir.path().join("none"), true).unwrap().is_empty());
    }
}
