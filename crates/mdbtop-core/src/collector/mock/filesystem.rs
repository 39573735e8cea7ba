//! In-memory mock filesystem for testing collectors without real `/proc`.
//!
//! This module provides `MockFs` which simulates a filesystem in memory,
//! allowing tests to run on macOS and in CI environments without Linux.

use crate::collector::traits::{FileMeta, FileSystem};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

/// In-memory filesystem for testing.
///
/// Stores files, directories and symlinks in memory, allowing tests to
/// simulate various `/proc` and database directory states.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    /// Map from path to file contents.
    files: HashMap<PathBuf, String>,
    /// Set of directories (for read_dir support).
    directories: HashSet<PathBuf>,
    /// Map from link path to link target.
    links: HashMap<PathBuf, PathBuf>,
    /// Paths whose reads fail with `PermissionDenied`.
    denied: HashSet<PathBuf>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }

    /// Adds a file with the given content.
    ///
    /// Parent directories are automatically created.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.files.insert(path, content.into());
    }

    /// Adds a file of `size` bytes (content is filler).
    pub fn add_sized_file(&mut self, path: impl AsRef<Path>, size: usize) {
        self.add_file(path, "x".repeat(size));
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.directories.insert(path);
    }

    /// Adds a symbolic link pointing at `target`.
    pub fn add_link(&mut self, path: impl AsRef<Path>, target: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.links.insert(path, target.as_ref().to_path_buf());
    }

    /// Makes every read of `path` fail with `PermissionDenied`.
    pub fn deny(&mut self, path: impl AsRef<Path>) {
        self.denied.insert(path.as_ref().to_path_buf());
    }

    /// Removes a path and everything below it (simulates process exit).
    pub fn remove_tree(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.files.retain(|p, _| !p.starts_with(path));
        self.directories.retain(|p| !p.starts_with(path));
        self.links.retain(|p, _| !p.starts_with(path));
    }

    /// Adds a process with the `/proc/[pid]/` files the collector reads.
    ///
    /// # Arguments
    /// * `pid` - Process ID
    /// * `stat` - Content of `/proc/[pid]/stat`
    /// * `cmdline` - Content of `/proc/[pid]/cmdline` (NUL separated)
    /// * `comm` - Content of `/proc/[pid]/comm`
    /// * `maps` - Content of `/proc/[pid]/maps`
    /// * `fds` - Link targets placed under `/proc/[pid]/fd/0..n`
    pub fn add_process(
        &mut self,
        pid: u32,
        stat: &str,
        cmdline: &str,
        comm: &str,
        maps: &str,
        fds: &[&str],
    ) {
        let base = PathBuf::from(format!("/proc/{}", pid));
        self.add_dir(&base);
        self.add_file(base.join("stat"), stat);
        self.add_file(base.join("cmdline"), cmdline);
        self.add_file(base.join("comm"), comm);
        self.add_file(base.join("maps"), maps);
        self.add_dir(base.join("fd"));
        for (fd, target) in fds.iter().enumerate() {
            self.add_link(base.join("fd").join(fd.to_string()), target);
        }
    }

    fn check_access(&self, path: &Path) -> io::Result<()> {
        if self.denied.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {:?}", path),
            ));
        }
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        let mut current = path.to_path_buf();
        // Bounded to avoid looping on cyclic links.
        for _ in 0..16 {
            match self.links.get(&current) {
                Some(target) => current = target.clone(),
                None => break,
            }
        }
        current
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("not found: {:?}", path))
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.check_access(path)?;
        let path = self.resolve(path);
        self.files.get(&path).cloned().ok_or_else(|| not_found(&path))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
            || self.directories.contains(path)
            || self.links.contains_key(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        self.check_access(path)?;
        let resolved = self.resolve(path);
        let path = resolved.as_path();
        if !self.directories.contains(path) {
            return Err(not_found(path));
        }

        let mut entries = HashSet::new();

        let children = self
            .files
            .keys()
            .chain(self.links.keys())
            .chain(self.directories.iter());
        for child in children {
            if child.parent().is_some_and(|parent| parent == path) && child != path {
                entries.insert(child.clone());
            }
        }

        Ok(entries.into_iter().collect())
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        self.check_access(path)?;
        self.links.get(path).cloned().ok_or_else(|| not_found(path))
    }

    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        self.check_access(path)?;
        let path = self.resolve(path);
        if let Some(content) = self.files.get(&path) {
            return Ok(FileMeta {
                is_dir: false,
                is_file: true,
                len: content.len() as u64,
            });
        }
        if self.directories.contains(&path) {
            return Ok(FileMeta {
                is_dir: true,
                is_file: false,
                len: 0,
            });
        }
        Err(not_found(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_fs_add_file() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/meminfo", "MemTotal: 16384 kB\n");

        assert!(fs.exists(Path::new("/proc/meminfo")));
        assert!(fs.exists(Path::new("/proc")));

        let content = fs.read_to_string(Path::new("/proc/meminfo")).unwrap();
        assert_eq!(content, "MemTotal: 16384 kB\n");
    }

    #[test]
    fn test_mock_fs_read_dir_includes_links_and_dirs() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/1/stat", "stat content");
        fs.add_dir("/proc/1/fd");
        fs.add_link("/proc/1/fd/0", "/dev/null");
        fs.add_file("/proc/2/stat", "stat content 2");

        let proc_entries = fs.read_dir(Path::new("/proc")).unwrap();
        assert_eq!(proc_entries.len(), 2); // /proc/1 and /proc/2

        let proc1_entries = fs.read_dir(Path::new("/proc/1")).unwrap();
        assert_eq!(proc1_entries.len(), 2); // stat and fd

        let fd_entries = fs.read_dir(Path::new("/proc/1/fd")).unwrap();
        assert_eq!(fd_entries, vec![PathBuf::from("/proc/1/fd/0")]);
    }

    #[test]
    fn test_mock_fs_metadata_follows_links() {
        let mut fs = MockFs::new();
        fs.add_sized_file("/data/db/bat/01", 10);
        fs.add_link("/data/db/bat/alias", "/data/db/bat/01");
        fs.add_link("/proc/1/fd/3", "socket:[4242]");

        let meta = fs.metadata(Path::new("/data/db/bat/alias")).unwrap();
        assert!(meta.is_file);
        assert_eq!(meta.len, 10);

        // Socket links have no filesystem target.
        assert!(fs.metadata(Path::new("/proc/1/fd/3")).is_err());

        assert!(fs.metadata(Path::new("/data/db/nothing")).is_err());
    }

    #[test]
    fn test_mock_fs_denied_and_removed() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/7/stat", "x");
        fs.deny("/proc/7/stat");
        let err = fs.read_to_string(Path::new("/proc/7/stat")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);

        fs.remove_tree("/proc/7");
        assert!(!fs.exists(Path::new("/proc/7")));
    }

    #[test]
    fn test_mock_fs_not_found() {
        let fs = MockFs::new();
        let result = fs.read_to_string(Path::new("/nonexistent"));
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
