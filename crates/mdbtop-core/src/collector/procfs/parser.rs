//! Parsers for `/proc` filesystem files.
//!
//! These are pure functions that parse the content of various `/proc` files
//! into structured data. They are designed to be easily testable with string inputs.

use std::collections::HashSet;

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parsed data from `/proc/[pid]/stat` (the fields mdbtop reports).
#[derive(Debug, Clone, Default)]
pub struct ProcStat {
    pub pid: u32,
    pub comm: String,
    pub state: char,
    pub ppid: u32,
    pub utime: u64,
    pub stime: u64,
    pub num_threads: u32,
    pub starttime: u64,
    /// Virtual memory size in bytes.
    pub vsize: u64,
    /// Resident set size in pages.
    pub rss: i64,
}

/// Parses `/proc/[pid]/stat` content.
///
/// The format is tricky because the comm field can contain spaces and parentheses.
/// Format: pid (comm) state ppid pgrp session tty_nr ...
pub fn parse_proc_stat(content: &str) -> Result<ProcStat, ParseError> {
    let content = content.trim();

    // Find the comm field boundaries (enclosed in parentheses)
    let open_paren = content
        .find('(')
        .ok_or_else(|| ParseError::new("missing '(' in stat"))?;
    let close_paren = content
        .rfind(')')
        .ok_or_else(|| ParseError::new("missing ')' in stat"))?;

    if close_paren <= open_paren {
        return Err(ParseError::new("invalid parentheses in stat"));
    }

    let pid: u32 = content[..open_paren]
        .trim()
        .parse()
        .map_err(|_| ParseError::new("invalid pid"))?;

    let comm = content[open_paren + 1..close_paren].to_string();

    let remaining = &content[close_paren + 1..];
    let fields: Vec<&str> = remaining.split_whitespace().collect();

    if fields.len() < 22 {
        return Err(ParseError::new(format!(
            "not enough fields in stat: expected 22+, got {}",
            fields.len()
        )));
    }

    let parse_field = |idx: usize, name: &str| -> Result<i64, ParseError> {
        fields[idx]
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {}", name)))
    };

    let parse_field_u64 = |idx: usize, name: &str| -> Result<u64, ParseError> {
        fields[idx]
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {}", name)))
    };

    Ok(ProcStat {
        pid,
        comm,
        state: fields[0].chars().next().unwrap_or('?'),
        ppid: parse_field(1, "ppid")? as u32,
        utime: parse_field_u64(11, "utime")?,
        stime: parse_field_u64(12, "stime")?,
        num_threads: parse_field(17, "num_threads")?.max(0) as u32,
        starttime: parse_field_u64(19, "starttime")?,
        vsize: parse_field_u64(20, "vsize")?,
        rss: parse_field(21, "rss")?,
    })
}

/// Parsed data from `/proc/meminfo`. Values are in kB as the kernel reports them.
#[derive(Debug, Clone, Default)]
pub struct MemInfo {
    pub mem_total: u64,
    pub mem_free: u64,
    pub mem_available: u64,
    pub buffers: u64,
    pub cached: u64,
    pub s_reclaimable: u64,
}

/// Parses `/proc/meminfo` content.
pub fn parse_meminfo(content: &str) -> Result<MemInfo, ParseError> {
    let mut info = MemInfo::default();

    let parse_kb = |line: &str| -> u64 {
        line.split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    };

    for line in content.lines() {
        if line.starts_with("MemTotal:") {
            info.mem_total = parse_kb(line);
        } else if line.starts_with("MemFree:") {
            info.mem_free = parse_kb(line);
        } else if line.starts_with("MemAvailable:") {
            info.mem_available = parse_kb(line);
        } else if line.starts_with("Buffers:") {
            info.buffers = parse_kb(line);
        } else if line.starts_with("Cached:") {
            info.cached = parse_kb(line);
        } else if line.starts_with("SReclaimable:") {
            info.s_reclaimable = parse_kb(line);
        }
    }

    if info.mem_total == 0 {
        return Err(ParseError::new("MemTotal missing from meminfo"));
    }

    Ok(info)
}

/// Aggregate CPU time counters (the `cpu` line of `/proc/stat`), in ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    /// Total ticks; guest time is already accounted in user/nice.
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    /// Ticks spent doing nothing (idle + iowait).
    pub fn idle_all(&self) -> u64 {
        self.idle + self.iowait
    }

    /// Busy percentage between two readings, clamped to 0..=100.
    pub fn busy_percent_since(&self, earlier: &CpuTimes) -> f64 {
        let total = self.total().saturating_sub(earlier.total());
        if total == 0 {
            return 0.0;
        }
        let idle = self.idle_all().saturating_sub(earlier.idle_all());
        let busy = total.saturating_sub(idle);
        (busy as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// Parses the aggregate `cpu` line of `/proc/stat`.
pub fn parse_cpu_times(content: &str) -> Result<CpuTimes, ParseError> {
    let line = content
        .lines()
        .find(|l| l.split_whitespace().next() == Some("cpu"))
        .ok_or_else(|| ParseError::new("missing aggregate cpu line in stat"))?;

    let parts: Vec<&str> = line.split_whitespace().collect();
    let get_val = |idx: usize| -> u64 { parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

    Ok(CpuTimes {
        user: get_val(1),
        nice: get_val(2),
        system: get_val(3),
        idle: get_val(4),
        iowait: get_val(5),
        irq: get_val(6),
        softirq: get_val(7),
        steal: get_val(8),
    })
}

/// Counts mapped regions in `/proc/[pid]/maps`, grouped by backing path.
///
/// Anonymous mappings (no pathname) are grouped together under one key.
pub fn count_mapped_regions(content: &str) -> u64 {
    let mut paths: HashSet<&str> = HashSet::new();
    for line in content.lines() {
        let mut parts = line.splitn(6, char::is_whitespace);
        // address perms offset dev inode [pathname]
        if parts.next().is_none_or(|s| s.is_empty()) {
            continue;
        }
        let path = parts.nth(4).map(str::trim).unwrap_or("");
        paths.insert(if path.is_empty() { "[anon]" } else { path });
    }
    paths.len() as u64
}

/// Splits `/proc/[pid]/cmdline` into its NUL-separated arguments.
pub fn parse_cmdline(content: &str) -> Vec<String> {
    content
        .split('\0')
        .filter(|arg| !arg.is_empty())
        .map(str::to_string)
        .collect()
}
