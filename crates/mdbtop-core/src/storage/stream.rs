//! Append-only record stream: one JSON `Snapshot` per line.
//!
//! The writer appends each record as a single write followed by a flush, so a
//! reader polling the same file never sees half a record except as a trailing
//! line without its terminator. Readers leave such a line unconsumed and pick
//! it up on a later poll.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, warn};

use super::model::Snapshot;

/// Maximum number of lines consumed in a single `RecordTailer::poll()` call.
/// Prevents unbounded memory usage if the tailer falls far behind the writer.
const MAX_LINES_PER_READ: usize = 10_000;

/// Errors raised by the record stream.
#[derive(Debug)]
pub enum StreamError {
    /// Explicit log path already holds data.
    NotEmpty(PathBuf),
    /// I/O failure on the stream file.
    Io(io::Error),
    /// A complete line failed to parse as a record.
    Malformed {
        line: u64,
        source: serde_json::Error,
    },
    /// A record could not be serialized.
    Serialize(serde_json::Error),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::NotEmpty(path) => write!(f, "{} is not empty", path.display()),
            StreamError::Io(e) => write!(f, "I/O error: {}", e),
            StreamError::Malformed { line, source } => {
                write!(f, "line {}: malformed record: {}", line, source)
            }
            StreamError::Serialize(e) => write!(f, "failed to serialize record: {}", e),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Io(e) => Some(e),
            StreamError::Malformed { source, .. } => Some(source),
            StreamError::Serialize(e) => Some(e),
            StreamError::NotEmpty(_) => None,
        }
    }
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        StreamError::Io(e)
    }
}

/// Creates the log file the sampler will append to.
///
/// With an explicit path the file must be missing or empty; a file that
/// already holds data is a configuration error and is left untouched.
/// Without a path a fresh `mdbtop-<date>-*.log` file is created in the
/// system temp directory and kept after the process exits.
pub fn prepare_log_file(path: Option<&Path>) -> Result<PathBuf, StreamError> {
    match path {
        Some(path) => {
            match fs::metadata(path) {
                Ok(meta) if meta.len() > 0 => {
                    return Err(StreamError::NotEmpty(path.to_path_buf()));
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            OpenOptions::new().create(true).append(true).open(path)?;
            Ok(path.to_path_buf())
        }
        None => {
            let prefix = format!("mdbtop-{}-", Local::now().date_naive());
            let file = tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(".log")
                .tempfile()?;
            let (_file, path) = file.keep().map_err(|e| StreamError::Io(e.error))?;
            Ok(path)
        }
    }
}

/// Appends records to the stream.
pub struct RecordWriter {
    path: PathBuf,
    file: File,
}

impl RecordWriter {
    /// Opens an existing (or new) stream file in append mode.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StreamError> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    /// Appends one record as a single line.
    ///
    /// The serialized record and its terminator are handed to the OS in one
    /// `write_all` on an `O_APPEND` descriptor, then flushed.
    pub fn append(&mut self, snapshot: &Snapshot) -> Result<usize, StreamError> {
        let mut line = serde_json::to_vec(snapshot).map_err(StreamError::Serialize)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.flush()?;
        Ok(line.len())
    }

    /// Returns the stream path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Records read by one `RecordTailer::poll()` call.
#[derive(Debug, Default)]
pub struct TailBatch {
    /// Complete records in stream order.
    pub records: Vec<Snapshot>,
    /// Complete lines that failed to parse; they are skipped.
    pub errors: Vec<StreamError>,
}

impl TailBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.errors.is_empty()
    }
}

/// Reads complete records appended to a stream since the last poll.
///
/// Starts at the beginning of the file. Reaching the end of the file, or a
/// missing file, is "no new data". A trailing line without its terminator is
/// left for the next poll. If the file is replaced (inode change) or
/// truncated, reading restarts from the beginning.
pub struct RecordTailer {
    path: PathBuf,
    offset: u64,
    inode: u64,
    line_no: u64,
}

impl RecordTailer {
    /// Creates a tailer positioned at the start of `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let inode = fs::metadata(&path).map(|m| get_inode(&m)).unwrap_or(0);
        Self {
            path,
            offset: 0,
            inode,
            line_no: 0,
        }
    }

    /// Reads the complete lines appended since the last call.
    ///
    /// Returns `(line_number, text)` pairs, 1-based, without terminators.
    pub fn poll_lines(&mut self) -> io::Result<Vec<(u64, String)>> {
        let metadata = match fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let current_inode = get_inode(&metadata);
        let current_size = metadata.len();

        if current_inode != self.inode || current_size < self.offset {
            debug!(path = %self.path.display(), "stream replaced or truncated, rereading");
            self.inode = current_inode;
            self.offset = 0;
            self.line_no = 0;
        }

        if current_size <= self.offset {
            return Ok(Vec::new());
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.offset))?;
        let mut reader = BufReader::new(file);

        let mut lines = Vec::new();
        let mut buf = Vec::new();
        while lines.len() < MAX_LINES_PER_READ {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf)?;
            if n == 0 || buf.last() != Some(&b'\n') {
                // EOF, or a record still being written.
                break;
            }
            self.offset += n as u64;
            self.line_no += 1;
            buf.pop();
            lines.push((self.line_no, String::from_utf8_lossy(&buf).into_owned()));
        }

        Ok(lines)
    }

    /// Reads and parses the complete records appended since the last call.
    ///
    /// Blank lines are ignored; lines that fail to parse are reported in
    /// `TailBatch::errors` and skipped.
    pub fn poll(&mut self) -> Result<TailBatch, StreamError> {
        let mut batch = TailBatch::default();
        for (line, text) in self.poll_lines()? {
            if text.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Snapshot>(&text) {
                Ok(snapshot) => batch.records.push(snapshot),
                Err(source) => batch.errors.push(StreamError::Malformed { line, source }),
            }
        }
        Ok(batch)
    }

    /// Returns the stream path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Loads every complete record of a stream into memory, in order.
///
/// A malformed complete line is an error naming its line number. A trailing
/// line without terminator (writer still running) is ignored with a warning.
pub fn load_snapshots(path: &Path) -> Result<Vec<Snapshot>, StreamError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut snapshots = Vec::new();
    let mut buf = Vec::new();
    let mut line: u64 = 0;

    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            break;
        }
        line += 1;
        if buf.last() != Some(&b'\n') {
            warn!(
                line,
                bytes = n,
                "ignoring incomplete trailing record in {}",
                path.display()
            );
            break;
        }
        let text = String::from_utf8_lossy(&buf);
        if text.trim().is_empty() {
            continue;
        }
        let snapshot = serde_json::from_str::<Snapshot>(&text)
            .map_err(|source| StreamError::Malformed { line, source })?;
        snapshots.push(snapshot);
    }

    debug!(records = snapshots.len(), "loaded {}", path.display());
    Ok(snapshots)
}

/// Extract inode from file metadata (Linux-specific).
#[cfg(unix)]
fn get_inode(metadata: &fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

/// Fallback for non-Unix: always returns 0, relying on size-based truncation detection.
#[cfg(not(unix))]
fn get_inode(_metadata: &fs::Metadata) -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::model::{ProcessRecord, SystemInfo};

    fn snapshot(pid: u32) -> Snapshot {
        let mut s = Snapshot::now(SystemInfo::default());
        s.processes.push(ProcessRecord {
            pid,
            name: "mserver5".to_string(),
            ..ProcessRecord::default()
        });
        s
    }

    #[test]
    fn test_prepare_rejects_non_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.log");
        std::fs::write(&path, "existing data\n").unwrap();

        let err = prepare_log_file(Some(&path)).unwrap_err();
        assert!(matches!(err, StreamError::NotEmpty(ref p) if p == &path));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing data\n");
    }

    #[test]
    fn test_prepare_accepts_missing_or_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("new.log");
        assert_eq!(prepare_log_file(Some(&missing)).unwrap(), missing);
        assert!(missing.exists());

        let empty = dir.path().join("empty.log");
        std::fs::write(&empty, "").unwrap();
        assert_eq!(prepare_log_file(Some(&empty)).unwrap(), empty);
    }

    #[test]
    fn test_prepare_temp_file() {
        let path = prepare_log_file(None).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("mdbtop-"));
        assert!(name.ends_with(".log"));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.log");
        let mut writer = RecordWriter::open(&path).unwrap();
        writer.append(&snapshot(1)).unwrap();
        writer.append(&snapshot(2)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_tailer_reads_only_new_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.log");
        let mut writer = RecordWriter::open(&path).unwrap();
        let mut tailer = RecordTailer::new(&path);

        assert!(tailer.poll().unwrap().is_empty());

        let first = snapshot(10);
        writer.append(&first).unwrap();
        let batch = tailer.poll().unwrap();
        assert_eq!(batch.records, vec![first]);

        assert!(tailer.poll().unwrap().is_empty());

        let second = snapshot(11);
        writer.append(&second).unwrap();
        assert_eq!(tailer.poll().unwrap().records, vec![second]);
    }

    #[test]
    fn test_tailer_leaves_partial_line_for_next_poll() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.log");
        let line = serde_json::to_string(&snapshot(7)).unwrap();
        let (head, tail) = line.split_at(line.len() / 2);

        std::fs::write(&path, head).unwrap();
        let mut tailer = RecordTailer::new(&path);
        let batch = tailer.poll().unwrap();
        assert!(batch.is_empty(), "partial record must not be surfaced");

        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "{}", tail).unwrap();
        drop(f);

        let batch = tailer.poll().unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].processes[0].pid, 7);
        assert!(batch.errors.is_empty());
    }

    #[test]
    fn test_tailer_reports_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.log");
        let good = serde_json::to_string(&snapshot(3)).unwrap();
        std::fs::write(&path, format!("{{not json\n{}\n", good)).unwrap();

        let mut tailer = RecordTailer::new(&path);
        let batch = tailer.poll().unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.errors.len(), 1);
        assert!(matches!(batch.errors[0], StreamError::Malformed { line: 1, .. }));
    }

    #[test]
    fn test_tailer_missing_file_is_idle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("later.log");
        let mut tailer = RecordTailer::new(&path);
        assert!(tailer.poll().unwrap().is_empty());

        RecordWriter::open(&path).unwrap().append(&snapshot(1)).unwrap();
        assert_eq!(tailer.poll().unwrap().records.len(), 1);
    }

    #[test]
    fn test_tailer_restarts_after_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.log");
        let mut writer = RecordWriter::open(&path).unwrap();
        writer.append(&snapshot(1)).unwrap();
        writer.append(&snapshot(2)).unwrap();

        let mut tailer = RecordTailer::new(&path);
        assert_eq!(tailer.poll().unwrap().records.len(), 2);

        std::fs::write(&path, format!("{}\n", serde_json::to_string(&snapshot(9)).unwrap()))
            .unwrap();
        let lines = tailer.poll_lines().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, 1);
    }

    #[test]
    fn test_load_snapshots_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.log");
        let mut writer = RecordWriter::open(&path).unwrap();
        for pid in 1..=3 {
            writer.append(&snapshot(pid)).unwrap();
        }

        let loaded = load_snapshots(&path).unwrap();
        let pids: Vec<u32> = loaded.iter().map(|s| s.processes[0].pid).collect();
        assert_eq!(pids, vec![1, 2, 3]);
    }

    #[test]
    fn test_load_snapshots_rejects_malformed_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.log");
        let good = serde_json::to_string(&snapshot(1)).unwrap();
        std::fs::write(&path, format!("{}\n{{\"ts\": 42}}\n", good)).unwrap();

        let err = load_snapshots(&path).unwrap_err();
        assert!(matches!(err, StreamError::Malformed { line: 2, .. }));
        assert!(err.to_string().starts_with("line 2:"));
    }

    #[test]
    fn test_load_snapshots_ignores_incomplete_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.log");
        let good = serde_json::to_string(&snapshot(1)).unwrap();
        std::fs::write(&path, format!("{}\n{{\"ts\":\"2024", good)).unwrap();

        assert_eq!(load_snapshots(&path).unwrap().len(), 1);
    }
}
