//! Disk footprint of the database a database-server process serves.
//!
//! The database directory is taken from the server's `--dbpath` argument;
//! the WAL (`sql_logs`) and storage (`bat`) subdirectories are walked
//! recursively and their file sizes summed.

use std::io;
use std::path::Path;

use crate::collector::procfs::CollectError;
use crate::collector::traits::FileSystem;
use crate::storage::model::DbDiskUsage;

/// Process name of the database server whose disk usage is measured.
pub const DB_SERVER_NAME: &str = "mserver5";

/// Write-ahead log directory below the dbpath.
pub const WAL_DIR: &str = "sql_logs";

/// Storage-area directory below the dbpath.
pub const BAT_DIR: &str = "bat";

/// Nesting limit for the directory walk; guards against symlink cycles.
const MAX_DEPTH: usize = 64;

/// Aggregate size of a directory tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirUsage {
    pub bytes: u64,
    pub files: u64,
}

/// Finds the `--dbpath` option in a command line.
///
/// Accepts both `--dbpath=PATH` and `--dbpath PATH`.
pub fn find_dbpath(args: &[String]) -> Option<&str> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--dbpath=") {
            return Some(value).filter(|v| !v.is_empty());
        }
        if arg == "--dbpath" {
            return iter.next().map(String::as_str).filter(|v| !v.is_empty());
        }
    }
    None
}

/// Database label: the final segment of the dbpath.
pub fn database_name(dbpath: &str) -> Option<String> {
    Path::new(dbpath.trim_end_matches('/'))
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

/// Sums file sizes below `path`, following symlinks.
///
/// Entries that vanish between listing and stat are skipped; any other
/// failure (missing root, permission denied) is returned.
pub fn dir_usage<F: FileSystem>(fs: &F, path: &Path) -> io::Result<DirUsage> {
    let mut usage = DirUsage::default();
    walk(fs, path, 0, &mut usage)?;
    Ok(usage)
}

fn walk<F: FileSystem>(fs: &F, path: &Path, depth: usize, usage: &mut DirUsage) -> io::Result<()> {
    if depth > MAX_DEPTH {
        return Err(io::Error::other(format!(
            "directory nesting deeper than {} at {}",
            MAX_DEPTH,
            path.display()
        )));
    }

    for entry in fs.read_dir(path)? {
        let meta = match fs.metadata(&entry) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        if meta.is_file {
            usage.bytes += meta.len;
            usage.files += 1;
        } else if meta.is_dir {
            walk(fs, &entry, depth + 1, usage)?;
        }
    }
    Ok(())
}

/// Measures the database a server process was started with.
pub fn probe_database<F: FileSystem>(fs: &F, cmdline: &[String]) -> Result<DbDiskUsage, CollectError> {
    let dbpath =
        find_dbpath(cmdline).ok_or_else(|| CollectError::Parse("no --dbpath argument".into()))?;
    let database = database_name(dbpath)
        .ok_or_else(|| CollectError::Parse(format!("cannot name database at {:?}", dbpath)))?;

    let root = Path::new(dbpath);
    let wal = dir_usage(fs, &root.join(WAL_DIR))?;
    let bat = dir_usage(fs, &root.join(BAT_DIR))?;

    Ok(DbDiskUsage {
        database,
        wal: wal.bytes,
        bat: bat.bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;
    use crate::collector::traits::RealFs;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_find_dbpath_forms() {
        assert_eq!(
            find_dbpath(&args(&["mserver5", "--dbpath=/data/demo", "--set", "x=1"])),
            Some("/data/demo")
        );
        assert_eq!(
            find_dbpath(&args(&["mserver5", "--dbpath", "/data/demo"])),
            Some("/data/demo")
        );
        assert_eq!(find_dbpath(&args(&["mserver5", "--set", "x=1"])), None);
        assert_eq!(find_dbpath(&args(&["mserver5", "--dbpath"])), None);
        assert_eq!(find_dbpath(&args(&["mserver5", "--dbpath="])), None);
    }

    #[test]
    fn test_database_name() {
        assert_eq!(database_name("/var/lib/monetdb/demo"), Some("demo".to_string()));
        assert_eq!(database_name("/var/lib/monetdb/demo/"), Some("demo".to_string()));
        assert_eq!(database_name("/"), None);
    }

    #[test]
    fn test_wal_350_bat_0() {
        let mut fs = MockFs::new();
        fs.add_sized_file("/db/x/sql_logs/sql/log", 100);
        fs.add_sized_file("/db/x/sql_logs/log.2", 250);
        fs.add_dir("/db/x/bat");

        let usage = probe_database(&fs, &args(&["mserver5", "--dbpath=/db/x"])).unwrap();
        assert_eq!(
            usage,
            DbDiskUsage {
                database: "x".to_string(),
                wal: 350,
                bat: 0,
            }
        );
    }

    #[test]
    fn test_missing_subdirectory_is_an_error() {
        let mut fs = MockFs::new();
        fs.add_sized_file("/db/x/sql_logs/log", 10);
        // no bat directory
        let result = probe_database(&fs, &args(&["--dbpath=/db/x"]));
        assert!(matches!(result, Err(CollectError::Io(_))));
    }

    #[test]
    fn test_permission_denied_is_an_error() {
        let mut fs = MockFs::new();
        fs.add_sized_file("/db/x/sql_logs/log", 10);
        fs.add_dir("/db/x/bat");
        fs.deny("/db/x/bat");
        assert!(probe_database(&fs, &args(&["--dbpath=/db/x"])).is_err());
    }

    #[test]
    fn test_dir_usage_follows_symlinks() {
        let mut fs = MockFs::new();
        fs.add_sized_file("/elsewhere/big", 1000);
        fs.add_dir("/elsewhere/dir");
        fs.add_sized_file("/elsewhere/dir/inner", 5);
        fs.add_dir("/db/bat");
        fs.add_link("/db/bat/file-link", "/elsewhere/big");
        fs.add_link("/db/bat/dir-link", "/elsewhere/dir");

        let usage = dir_usage(&fs, Path::new("/db/bat")).unwrap();
        assert_eq!(usage, DirUsage { bytes: 1005, files: 2 });
    }

    #[test]
    fn test_dir_usage_on_real_directory() {
        let dir = tempfile::tempdir().unwrap();
        let wal = dir.path().join("sql_logs");
        std::fs::create_dir_all(wal.join("sql")).unwrap();
        std::fs::write(wal.join("sql").join("log"), vec![0u8; 100]).unwrap();
        std::fs::write(wal.join("sql").join("log.1"), vec![0u8; 250]).unwrap();
        std::fs::create_dir_all(dir.path().join("bat")).unwrap();

        let dbpath = format!("--dbpath={}", dir.path().display());
        let usage = probe_database(&RealFs::new(), &args(&["mserver5", &dbpath])).unwrap();
        assert_eq!(usage.wal, 350);
        assert_eq!(usage.bat, 0);
    }
}
