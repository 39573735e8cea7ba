//! Process collector for gathering per-process metrics from `/proc/[pid]/`.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Instant;

use tracing::{debug, trace};

use crate::collector::disk::{DB_SERVER_NAME, probe_database};
use crate::collector::procfs::parser::{count_mapped_regions, parse_cmdline, parse_proc_stat};
use crate::collector::traits::FileSystem;
use crate::storage::model::ProcessRecord;

/// Clock ticks per second (USER_HZ). Standard value for Linux.
const CLK_TCK: f64 = 100.0;

/// Error type for collection failures.
#[derive(Debug)]
pub enum CollectError {
    /// Process disappeared during collection.
    ProcessGone(u32),
    /// I/O error reading process files.
    Io(std::io::Error),
    /// Parse error in process files.
    Parse(String),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::ProcessGone(pid) => write!(f, "process {} disappeared", pid),
            CollectError::Io(e) => write!(f, "I/O error: {}", e),
            CollectError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for CollectError {}

impl From<std::io::Error> for CollectError {
    fn from(e: std::io::Error) -> Self {
        CollectError::Io(e)
    }
}

#[derive(Debug, Clone, Copy)]
struct CpuSample {
    starttime: u64,
    ticks: u64,
    at: Instant,
}

/// Per-process CPU usage between consecutive reads.
///
/// The first read of a pid only primes the tracker and reports 0.0; every
/// later read reports usage since the previous one. A pid whose start time
/// changed (recycled) is primed again.
#[derive(Debug, Default)]
pub struct CpuTracker {
    samples: HashMap<u32, CpuSample>,
}

impl CpuTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `ticks` (utime + stime) for `pid` and returns the usage
    /// percentage since the previous read.
    pub fn observe(&mut self, pid: u32, starttime: u64, ticks: u64, at: Instant) -> f64 {
        let current = CpuSample {
            starttime,
            ticks,
            at,
        };
        let previous = self.samples.insert(pid, current);

        match previous {
            Some(prev) if prev.starttime == starttime => {
                let wall = at.saturating_duration_since(prev.at).as_secs_f64();
                if wall <= 0.0 {
                    return 0.0;
                }
                let cpu_secs = ticks.saturating_sub(prev.ticks) as f64 / CLK_TCK;
                cpu_secs / wall * 100.0
            }
            _ => 0.0,
        }
    }

    /// Drops state for pids not in `alive`.
    pub fn retain(&mut self, alive: &HashSet<u32>) {
        self.samples.retain(|pid, _| alive.contains(pid));
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// File-descriptor breakdown of `/proc/[pid]/fd`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FdCounts {
    fds: u64,
    sockets: u64,
    files: u64,
}

/// Collects process information from `/proc/[pid]/` files.
pub struct ProcessCollector<F: FileSystem> {
    fs: F,
    proc_path: String,
    page_size: u64,
    cpu: CpuTracker,
}

impl<F: FileSystem> ProcessCollector<F> {
    /// Creates a new process collector.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            page_size: 4096,
            cpu: CpuTracker::new(),
        }
    }

    /// Sets the memory page size used to convert RSS pages to bytes.
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Reads the short process name from `/proc/[pid]/comm`.
    pub fn process_name(&self, pid: u32) -> Result<String, CollectError> {
        let path = format!("{}/{}/comm", self.proc_path, pid);
        self.fs
            .read_to_string(Path::new(&path))
            .map(|s| s.trim().to_string())
            .map_err(|_| CollectError::ProcessGone(pid))
    }

    fn count_fds(&self, pid: u32) -> Result<FdCounts, CollectError> {
        let fd_dir = format!("{}/{}/fd", self.proc_path, pid);
        let entries = self.fs.read_dir(Path::new(&fd_dir))?;

        let mut counts = FdCounts::default();
        for entry in entries {
            counts.fds += 1;
            // The descriptor may be closed between listing and readlink.
            let Ok(target) = self.fs.read_link(&entry) else {
                continue;
            };
            let target = target.to_string_lossy();
            if target.starts_with("socket:") {
                counts.sockets += 1;
            } else if target.starts_with('/')
                && self
                    .fs
                    .metadata(Path::new(target.as_ref()))
                    .is_ok_and(|m| m.is_file)
            {
                counts.files += 1;
            }
        }
        Ok(counts)
    }

    /// Collects one process record.
    ///
    /// # Arguments
    /// * `pid` - Process ID
    /// * `total_memory` - Physical memory in bytes, for `memory_percent`
    /// * `now` - Read time used for the CPU delta
    pub fn collect_process(
        &mut self,
        pid: u32,
        total_memory: u64,
        now: Instant,
    ) -> Result<ProcessRecord, CollectError> {
        let proc_dir = format!("{}/{}", self.proc_path, pid);

        let stat_path = format!("{}/stat", proc_dir);
        let stat_content = self
            .fs
            .read_to_string(Path::new(&stat_path))
            .map_err(|_| CollectError::ProcessGone(pid))?;
        let stat = parse_proc_stat(&stat_content).map_err(|e| CollectError::Parse(e.message))?;

        let name = self.process_name(pid).unwrap_or_else(|_| stat.comm.clone());

        let maps_path = format!("{}/maps", proc_dir);
        let maps = self.fs.read_to_string(Path::new(&maps_path))?;

        let fds = self.count_fds(pid)?;

        let rss = (stat.rss.max(0) as u64) * self.page_size;
        let memory_percent = if total_memory == 0 {
            0.0
        } else {
            rss as f64 / total_memory as f64 * 100.0
        };
        let cpu_percent = self
            .cpu
            .observe(pid, stat.starttime, stat.utime + stat.stime, now);

        let disk = if name == DB_SERVER_NAME {
            let cmdline_path = format!("{}/cmdline", proc_dir);
            let cmdline = self
                .fs
                .read_to_string(Path::new(&cmdline_path))
                .map(|c| parse_cmdline(&c))
                .unwrap_or_default();
            match probe_database(&self.fs, &cmdline) {
                Ok(usage) => Some(usage),
                Err(e) => {
                    debug!(pid, "disk usage unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(ProcessRecord {
            pid: stat.pid,
            name,
            rss,
            vms: stat.vsize,
            num_mmaps: count_mapped_regions(&maps),
            memory_percent,
            cpu_percent,
            num_fds: fds.fds,
            num_threads: stat.num_threads as u64,
            num_net_connections: fds.sockets,
            num_open_files: fds.files,
            disk,
        })
    }

    /// Collects records for every running process whose name is in `names`.
    ///
    /// Processes that disappear or deny access during collection are
    /// skipped. Only failure to list the proc directory is an error.
    pub fn collect_tracked(
        &mut self,
        names: &[String],
        total_memory: u64,
    ) -> Result<Vec<ProcessRecord>, CollectError> {
        let entries = self.fs.read_dir(Path::new(&self.proc_path))?;

        let mut pids: Vec<u32> = entries
            .iter()
            .filter_map(|entry| entry.file_name()?.to_str()?.parse::<u32>().ok())
            .collect();
        pids.sort_unstable();

        let now = Instant::now();
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for pid in pids {
            let Ok(name) = self.process_name(pid) else {
                continue;
            };
            if !names.iter().any(|n| *n == name) {
                continue;
            }
            seen.insert(pid);
            match self.collect_process(pid, total_memory, now) {
                Ok(record) => records.push(record),
                Err(e) => debug!(pid, name = %name, "skipping process: {}", e),
            }
        }

        self.cpu.retain(&seen);
        trace!(tracked = records.len(), "collected tracked processes");
        Ok(records)
    }
}
