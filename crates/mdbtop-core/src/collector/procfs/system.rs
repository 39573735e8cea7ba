//! System collector for gathering global CPU and memory figures from `/proc/`.

use crate::collector::procfs::parser::{CpuTimes, parse_cpu_times, parse_meminfo};
use crate::collector::procfs::process::CollectError;
use crate::collector::traits::FileSystem;
use crate::storage::model::{CpuInfo, MemoryInfo, SystemInfo};
use std::path::Path;
use std::time::Duration;

/// Window over which system CPU usage is measured on every tick.
pub const DEFAULT_CPU_WINDOW: Duration = Duration::from_millis(100);

/// Collects system-wide metrics from `/proc/`.
pub struct SystemCollector<F: FileSystem> {
    fs: F,
    proc_path: String,
    cpu_window: Duration,
}

impl<F: FileSystem> SystemCollector<F> {
    /// Creates a new system collector.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            cpu_window: DEFAULT_CPU_WINDOW,
        }
    }

    /// Overrides the CPU measurement window.
    pub fn with_cpu_window(mut self, window: Duration) -> Self {
        self.cpu_window = window;
        self
    }

    /// Total physical memory in bytes.
    pub fn total_memory(&self) -> Result<u64, CollectError> {
        let path = format!("{}/meminfo", self.proc_path);
        let content = self.fs.read_to_string(Path::new(&path))?;
        let info = parse_meminfo(&content).map_err(|e| CollectError::Parse(e.message))?;
        Ok(info.mem_total * 1024)
    }

    /// Collects memory figures from `/proc/meminfo`, converted to bytes.
    pub fn collect_memory(&self) -> Result<MemoryInfo, CollectError> {
        let path = format!("{}/meminfo", self.proc_path);
        let content = self.fs.read_to_string(Path::new(&path))?;
        let info = parse_meminfo(&content).map_err(|e| CollectError::Parse(e.message))?;

        let total = info.mem_total * 1024;
        let available = info.mem_available * 1024;
        let free = info.mem_free * 1024;
        let cached = (info.cached + info.s_reclaimable) * 1024;
        let used = total
            .saturating_sub(free)
            .saturating_sub(info.buffers * 1024)
            .saturating_sub(cached);
        let percent = if total == 0 {
            0.0
        } else {
            total.saturating_sub(available) as f64 / total as f64 * 100.0
        };

        Ok(MemoryInfo {
            available,
            used,
            free,
            percent,
        })
    }

    fn read_cpu_times(&self) -> Result<CpuTimes, CollectError> {
        let path = format!("{}/stat", self.proc_path);
        let content = self.fs.read_to_string(Path::new(&path))?;
        parse_cpu_times(&content).map_err(|e| CollectError::Parse(e.message))
    }

    /// Measures system CPU usage over the configured window.
    ///
    /// Blocks for the window duration between two `/proc/stat` reads.
    pub fn collect_cpu(&self) -> Result<CpuInfo, CollectError> {
        let before = self.read_cpu_times()?;
        if !self.cpu_window.is_zero() {
            std::thread::sleep(self.cpu_window);
        }
        let after = self.read_cpu_times()?;
        Ok(CpuInfo {
            percent: after.busy_percent_since(&before),
        })
    }

    /// Collects the `system` part of a snapshot.
    pub fn collect(&self) -> Result<SystemInfo, CollectError> {
        Ok(SystemInfo {
            cpu: self.collect_cpu()?,
            memory: self.collect_memory()?,
        })
    }
}
