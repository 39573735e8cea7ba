//! Main collector that combines process and system collectors.
//!
//! The `Collector` struct provides a unified interface for collecting
//! one `Snapshot` per sampling tick.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::collector::procfs::{CollectError, ProcessCollector, SystemCollector};
use crate::collector::traits::FileSystem;
use crate::storage::model::Snapshot;

/// Process names tracked when none are configured.
pub const DEFAULT_TRACKED: &[&str] = &["mserver5", "monetdbd"];

/// Timing information for each collector phase.
///
/// Used for debugging and performance monitoring.
#[derive(Debug, Clone, Default)]
pub struct CollectorTiming {
    /// Total snapshot collection time.
    pub total: Duration,
    /// Time to collect system CPU and memory (includes the CPU window).
    pub system: Duration,
    /// Time to collect tracked processes.
    pub processes: Duration,
}

/// Memory page size of the running kernel.
pub fn page_size() -> u64 {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as u64 } else { 4096 }
}

/// Main collector that gathers one snapshot per call.
pub struct Collector<F: FileSystem + Clone> {
    process_collector: ProcessCollector<F>,
    system_collector: SystemCollector<F>,
    tracked: Vec<String>,
    /// Timing information from the last collect_snapshot call.
    last_timing: Option<CollectorTiming>,
}

impl<F: FileSystem + Clone> Collector<F> {
    /// Creates a new collector.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    /// * `tracked` - Process names to report
    pub fn new(fs: F, proc_path: impl Into<String>, tracked: Vec<String>) -> Self {
        let proc_path = proc_path.into();
        Self {
            process_collector: ProcessCollector::new(fs.clone(), &proc_path)
                .with_page_size(page_size()),
            system_collector: SystemCollector::new(fs, &proc_path),
            tracked,
            last_timing: None,
        }
    }

    /// Default tracked process names as owned strings.
    pub fn default_tracked() -> Vec<String> {
        DEFAULT_TRACKED.iter().map(|s| s.to_string()).collect()
    }

    /// Overrides the window over which system CPU usage is measured.
    pub fn with_cpu_window(mut self, window: Duration) -> Self {
        self.system_collector = self.system_collector.with_cpu_window(window);
        self
    }

    /// Overrides the page size used for RSS.
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.process_collector = self.process_collector.with_page_size(page_size);
        self
    }

    pub fn tracked(&self) -> &[String] {
        &self.tracked
    }

    /// Returns timing information from the last snapshot collection.
    pub fn last_timing(&self) -> Option<&CollectorTiming> {
        self.last_timing.as_ref()
    }

    /// Collects a complete snapshot.
    ///
    /// The timestamp is taken at the start of the tick. System figures are
    /// required; a failure there (or in listing `/proc`) fails the whole
    /// snapshot. Individual processes that cannot be read are omitted.
    pub fn collect_snapshot(&mut self) -> Result<Snapshot, CollectError> {
        let total_start = Instant::now();
        let timestamp = crate::storage::model::now_micros();

        let start = Instant::now();
        let system = self.system_collector.collect()?;
        let total_memory = self.system_collector.total_memory()?;
        let system_time = start.elapsed();

        let start = Instant::now();
        let processes = if self.tracked.is_empty() {
            Vec::new()
        } else {
            self.process_collector
                .collect_tracked(&self.tracked, total_memory)?
        };
        let processes_time = start.elapsed();

        let timing = CollectorTiming {
            total: total_start.elapsed(),
            system: system_time,
            processes: processes_time,
        };
        debug!(
            total_ms = timing.total.as_millis() as u64,
            system_ms = timing.system.as_millis() as u64,
            processes_ms = timing.processes.as_millis() as u64,
            processes = processes.len(),
            "snapshot collected"
        );
        self.last_timing = Some(timing);

        Ok(Snapshot {
            timestamp,
            system,
            processes,
        })
    }
}
