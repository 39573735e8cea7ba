//! Record structures written to the record stream.
//!
//! One `Snapshot` is serialized per sampling tick as a single JSON line.
//! Field names on the wire follow the established log format (`ts`, `pname`)
//! so logs written by older versions of the tool still load.

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// One sampling tick: system-wide figures plus the tracked processes.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Snapshot {
    /// Local wall-clock time at tick start (microsecond precision).
    #[serde(rename = "ts", with = "iso_timestamp")]
    pub timestamp: NaiveDateTime,

    pub system: SystemInfo,

    /// Tracked processes running at this tick; empty, never absent.
    #[serde(default)]
    pub processes: Vec<ProcessRecord>,
}

impl Snapshot {
    /// Creates an empty snapshot stamped with the current local time.
    pub fn now(system: SystemInfo) -> Self {
        Self {
            timestamp: now_micros(),
            system,
            processes: Vec::new(),
        }
    }
}

/// Current local time truncated to the precision stored on disk.
pub fn now_micros() -> NaiveDateTime {
    let now = Local::now().naive_local();
    let micros = now.nanosecond() / 1_000 * 1_000;
    now.with_nanosecond(micros).unwrap_or(now)
}

/// System-wide figures.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct SystemInfo {
    pub cpu: CpuInfo,
    pub memory: MemoryInfo,
}

/// System CPU usage.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct CpuInfo {
    /// Busy percentage (0-100) over the sampling window.
    pub percent: f64,
}

/// System memory figures in bytes.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct MemoryInfo {
    /// Memory available for new allocations without swapping (MemAvailable).
    pub available: u64,
    /// Percentage of memory in use, `(total - available) / total`.
    pub percent: f64,
    /// Memory in use: total - free - buffers - cached.
    pub used: u64,
    /// Completely unused memory (MemFree).
    pub free: u64,
}

/// Disk footprint of a database served by a database-server process.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct DbDiskUsage {
    /// Final path segment of the `--dbpath` argument.
    pub database: String,
    /// Total bytes below `<dbpath>/sql_logs`.
    pub wal: u64,
    /// Total bytes below `<dbpath>/bat`.
    pub bat: u64,
}

/// Per-process measurements for one tick.
///
/// `disk` is `Some` only for recognized database-server processes whose
/// database directory could be measured. On the wire the three disk fields
/// are always present and are `null` together when not applicable.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(try_from = "ProcessRecordRepr", into = "ProcessRecordRepr")]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    /// Resident set size (bytes).
    pub rss: u64,
    /// Virtual memory size (bytes).
    pub vms: u64,
    /// Mapped regions, grouped by backing path.
    pub num_mmaps: u64,
    /// RSS as a percentage of total physical memory.
    pub memory_percent: f64,
    /// CPU usage since the previous read of this process (may exceed 100 on
    /// multi-threaded processes).
    pub cpu_percent: f64,
    pub num_fds: u64,
    pub num_threads: u64,
    pub num_net_connections: u64,
    pub num_open_files: u64,
    pub disk: Option<DbDiskUsage>,
}

/// Flat wire layout of `ProcessRecord`.
#[derive(Clone, Serialize, Deserialize)]
struct ProcessRecordRepr {
    pid: u32,
    pname: String,
    rss: u64,
    vms: u64,
    num_mmaps: u64,
    memory_percent: f64,
    cpu_percent: f64,
    num_fds: u64,
    num_threads: u64,
    num_net_connections: u64,
    num_open_files: u64,
    database: Option<String>,
    wal: Option<u64>,
    bat: Option<u64>,
}

impl From<ProcessRecord> for ProcessRecordRepr {
    fn from(p: ProcessRecord) -> Self {
        let (database, wal, bat) = match p.disk {
            Some(d) => (Some(d.database), Some(d.wal), Some(d.bat)),
            None => (None, None, None),
        };
        Self {
            pid: p.pid,
            pname: p.name,
            rss: p.rss,
            vms: p.vms,
            num_mmaps: p.num_mmaps,
            memory_percent: p.memory_percent,
            cpu_percent: p.cpu_percent,
            num_fds: p.num_fds,
            num_threads: p.num_threads,
            num_net_connections: p.num_net_connections,
            num_open_files: p.num_open_files,
            database,
            wal,
            bat,
        }
    }
}

impl TryFrom<ProcessRecordRepr> for ProcessRecord {
    type Error = String;

    fn try_from(r: ProcessRecordRepr) -> Result<Self, Self::Error> {
        let disk = match (r.database, r.wal, r.bat) {
            (Some(database), Some(wal), Some(bat)) => Some(DbDiskUsage { database, wal, bat }),
            (None, None, None) => None,
            _ => {
                return Err(format!(
                    "pid {}: database/wal/bat must be all present or all null",
                    r.pid
                ));
            }
        };
        Ok(Self {
            pid: r.pid,
            name: r.pname,
            rss: r.rss,
            vms: r.vms,
            num_mmaps: r.num_mmaps,
            memory_percent: r.memory_percent,
            cpu_percent: r.cpu_percent,
            num_fds: r.num_fds,
            num_threads: r.num_threads,
            num_net_connections: r.num_net_connections,
            num_open_files: r.num_open_files,
            disk,
        })
    }
}

mod iso_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const WRITE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
    // `%.f` also accepts a missing fraction.
    const READ_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format(WRITE_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, READ_FORMAT).map_err(serde::de::Error::custom)
    }
}
