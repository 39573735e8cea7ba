//! Fixed-interval sampling loop.
//!
//! Each tick collects one [`Snapshot`] and appends it to the record stream.
//! The loop runs until the shared running flag is cleared, checking it
//! between 100 ms sleep slices so shutdown is prompt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::collector::{CollectError, Collector, FileSystem};
use crate::storage::model::Snapshot;
use crate::storage::stream::{RecordWriter, StreamError};

/// Granularity of the inter-tick sleep.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Sampler settings.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Time between tick starts.
    pub interval: Duration,
    /// Base path of the proc filesystem.
    pub proc_path: String,
    /// Process names to report.
    pub tracked: Vec<String>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            proc_path: "/proc".to_string(),
            tracked: Collector::<crate::collector::RealFs>::default_tracked(),
        }
    }
}

/// Error that stops the sampling loop.
#[derive(Debug)]
pub enum SamplerError {
    /// System-wide figures could not be read.
    Collect(CollectError),
    /// The record could not be written.
    Stream(StreamError),
}

impl std::fmt::Display for SamplerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SamplerError::Collect(e) => write!(f, "collection failed: {}", e),
            SamplerError::Stream(e) => write!(f, "record stream: {}", e),
        }
    }
}

impl std::error::Error for SamplerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SamplerError::Collect(e) => Some(e),
            SamplerError::Stream(e) => Some(e),
        }
    }
}

impl From<CollectError> for SamplerError {
    fn from(e: CollectError) -> Self {
        SamplerError::Collect(e)
    }
}

impl From<StreamError> for SamplerError {
    fn from(e: StreamError) -> Self {
        SamplerError::Stream(e)
    }
}

/// Describes the contents of a snapshot for logging.
pub fn describe_snapshot(snapshot: &Snapshot) -> String {
    format!(
        "{} processes, cpu {:.1}%, mem {:.1}%",
        snapshot.processes.len(),
        snapshot.system.cpu.percent,
        snapshot.system.memory.percent
    )
}

/// Sleeps for `duration` in short slices, returning early once `running`
/// is cleared. Returns whether the loop should keep going.
pub fn sleep_while_running(duration: Duration, running: &AtomicBool) -> bool {
    let mut remaining = duration;
    while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
        let sleep_time = remaining.min(SLEEP_SLICE);
        std::thread::sleep(sleep_time);
        remaining = remaining.saturating_sub(sleep_time);
    }
    running.load(Ordering::SeqCst)
}

/// Drives a collector and a record writer on a fixed interval.
pub struct Sampler<F: FileSystem + Clone> {
    collector: Collector<F>,
    writer: RecordWriter,
    interval: Duration,
    last_ts: Option<NaiveDateTime>,
    count: u64,
}

impl<F: FileSystem + Clone> Sampler<F> {
    pub fn new(collector: Collector<F>, writer: RecordWriter, interval: Duration) -> Self {
        Self {
            collector,
            writer,
            interval,
            last_ts: None,
            count: 0,
        }
    }

    /// Builds a sampler over `fs` from `config`.
    pub fn from_config(fs: F, config: &SamplerConfig, writer: RecordWriter) -> Self {
        let collector = Collector::new(fs, &config.proc_path, config.tracked.clone());
        Self::new(collector, writer, config.interval)
    }

    /// Number of records written so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Collects and appends one snapshot.
    ///
    /// Timestamps never go backwards within one stream, even if the wall
    /// clock is stepped back.
    pub fn tick(&mut self) -> Result<Snapshot, SamplerError> {
        let mut snapshot = self.collector.collect_snapshot()?;
        if let Some(last) = self.last_ts
            && snapshot.timestamp < last
        {
            debug!(%last, now = %snapshot.timestamp, "wall clock went backwards");
            snapshot.timestamp = last;
        }

        let bytes = self.writer.append(&snapshot)?;
        self.last_ts = Some(snapshot.timestamp);
        self.count += 1;

        debug!(
            "Snapshot #{}: {} ({} bytes)",
            self.count,
            describe_snapshot(&snapshot),
            bytes
        );
        Ok(snapshot)
    }

    /// Runs until `running` is cleared or a tick fails.
    ///
    /// The current tick always completes before the flag is checked, so
    /// the stream never ends in a partial record. Returns the number of
    /// records written.
    pub fn run(&mut self, running: &AtomicBool) -> Result<u64, SamplerError> {
        info!(
            "Sampling every {:?} into {}",
            self.interval,
            self.writer.path().display()
        );

        while running.load(Ordering::SeqCst) {
            let started = Instant::now();
            self.tick()?;
            let took = started.elapsed();
            if !sleep_while_running(self.interval.saturating_sub(took), running) {
                break;
            }
        }

        info!("Sampler stopped after {} records", self.count);
        Ok(self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MockFs;
    use crate::storage::stream::load_snapshots;
    use std::sync::Arc;

    fn sampler(fs: MockFs, path: &std::path::Path, interval: Duration) -> Sampler<MockFs> {
        let collector = Collector::new(fs, "/proc", Collector::<MockFs>::default_tracked())
            .with_cpu_window(Duration::ZERO)
            .with_page_size(4096);
        Sampler::new(collector, RecordWriter::open(path).unwrap(), interval)
    }

    #[test]
    fn test_tick_appends_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let mut s = sampler(MockFs::typical_system(), &path, Duration::from_secs(1));

        let written = s.tick().unwrap();
        assert_eq!(s.count(), 1);

        let loaded = load_snapshots(&path).unwrap();
        assert_eq!(loaded, vec![written]);
    }

    #[test]
    fn test_idle_system_yields_empty_process_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let mut s = sampler(MockFs::idle_system(), &path, Duration::from_secs(1));

        let snapshot = s.tick().unwrap();
        assert!(snapshot.processes.is_empty());
        assert!(snapshot.system.memory.available > 0);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.trim_end().ends_with(r#""processes":[]}"#));
    }

    #[test]
    fn test_system_failure_stops_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let mut fs = MockFs::typical_system();
        fs.deny("/proc/stat");
        let mut s = sampler(fs, &path, Duration::from_millis(10));

        let running = AtomicBool::new(true);
        let result = s.run(&running);
        assert!(matches!(result, Err(SamplerError::Collect(_))));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_run_respects_interval_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let interval = Duration::from_millis(150);
        let mut s = sampler(MockFs::typical_system(), &path, interval);

        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(700));
            r.store(false, Ordering::SeqCst);
        });

        let count = s.run(&running).unwrap();
        stopper.join().unwrap();

        let loaded = load_snapshots(&path).unwrap();
        assert_eq!(loaded.len() as u64, count);
        assert!(count >= 3, "expected several ticks, got {}", count);

        for pair in loaded.windows(2) {
            let gap = pair[1].timestamp - pair[0].timestamp;
            assert!(
                gap >= chrono::Duration::milliseconds(140),
                "timestamps too close: {}",
                gap
            );
        }
    }

    #[test]
    fn test_cleared_flag_runs_no_tick() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let mut s = sampler(MockFs::typical_system(), &path, Duration::from_millis(10));
        let running = AtomicBool::new(false);
        assert_eq!(s.run(&running).unwrap(), 0);
    }

    #[test]
    fn test_sleep_while_running_returns_early() {
        let running = AtomicBool::new(false);
        let start = Instant::now();
        assert!(!sleep_while_running(Duration::from_secs(5), &running));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_describe_snapshot() {
        let snapshot = Snapshot::now(Default::default());
        assert_eq!(describe_snapshot(&snapshot), "0 processes, cpu 0.0%, mem 0.0%");
    }
}
