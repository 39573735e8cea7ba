//! Pre-built mock filesystem scenarios for testing.
//!
//! These scenarios provide realistic `/proc` filesystem states together with
//! database directories for the processes that reference them.

use super::filesystem::MockFs;

/// Builds a `/proc/[pid]/stat` line with the fields the collector reads.
///
/// Remaining fields are zero-filled to the 52 columns of a modern kernel.
pub fn stat_line(
    pid: u32,
    comm: &str,
    utime: u64,
    stime: u64,
    num_threads: u32,
    vsize: u64,
    rss_pages: u64,
) -> String {
    let mut fields = vec![
        "S".to_string(),
        "1".to_string(),        // ppid
        pid.to_string(),        // pgrp
        pid.to_string(),        // session
        "0".to_string(),        // tty_nr
        "-1".to_string(),       // tpgid
        "4194560".to_string(),  // flags
        "1200".to_string(),     // minflt
        "0".to_string(),        // cminflt
        "3".to_string(),        // majflt
        "0".to_string(),        // cmajflt
        utime.to_string(),
        stime.to_string(),
        "0".to_string(),        // cutime
        "0".to_string(),        // cstime
        "20".to_string(),       // priority
        "0".to_string(),        // nice
        num_threads.to_string(),
        "0".to_string(),        // itrealvalue
        "5000".to_string(),     // starttime
        vsize.to_string(),
        rss_pages.to_string(),
        "18446744073709551615".to_string(),
    ];
    fields.resize(52, "0".to_string());
    format!("{} ({}) {}", pid, comm, fields.join(" "))
}

const MSERVER_MAPS: &str = "\
55d4c8a00000-55d4c8a2c000 r--p 00000000 08:01 1311 /usr/bin/mserver5
55d4c8a2c000-55d4c8b10000 r-xp 0002c000 08:01 1311 /usr/bin/mserver5
7f1a2c000000-7f1a2c021000 rw-p 00000000 00:00 0
7f1a30000000-7f1a30200000 r--p 00000000 08:01 2001 /usr/lib/libmonetdb5.so
7f1a30200000-7f1a30400000 r-xp 00200000 08:01 2001 /usr/lib/libmonetdb5.so
7ffd1e9f0000-7ffd1ea11000 rw-p 00000000 00:00 0 [stack]
";

impl MockFs {
    /// Creates a typical host running a small MonetDB deployment.
    ///
    /// Includes:
    /// - PID 1: systemd (untracked)
    /// - PID 2000: monetdbd daemon (tracked, no dbpath disk usage)
    /// - PID 2001: mserver5 serving `/var/lib/monetdb/demo` (tracked, with disk usage)
    /// - PID 3000: bash (untracked)
    pub fn typical_system() -> Self {
        let mut fs = Self::new();

        fs.add_file("/proc/uptime", "12345.67 98765.43\n");
        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:   12000000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:            0 kB
SwapTotal:       4096000 kB
SwapFree:        4096000 kB
SReclaimable:     256000 kB
",
        );
        fs.add_file(
            "/proc/stat",
            "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 5000 250 1500 40000 500 100 50 0 0 0
cpu1 5000 250 1500 40000 500 100 50 0 0 0
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 0
",
        );

        fs.add_process(
            1,
            &stat_line(1, "systemd", 120, 80, 1, 170_000_000, 3000),
            "/sbin/init\0splash\0",
            "systemd\n",
            "",
            &["/dev/null"],
        );

        fs.add_process(
            2000,
            &stat_line(2000, "monetdbd", 40, 10, 2, 300_000_000, 1024),
            "monetdbd\0start\0/var/lib/monetdb\0",
            "monetdbd\n",
            "55d4c8a00000-55d4c8a2c000 r--p 00000000 08:01 1400 /usr/bin/monetdbd\n",
            &["/dev/null", "/var/lib/monetdb/merovingian.log", "socket:[1001]"],
        );

        fs.add_process(
            2001,
            &stat_line(2001, "mserver5", 1500, 300, 12, 2_147_483_648, 65536),
            "/usr/bin/mserver5\0--dbpath=/var/lib/monetdb/demo\0--set\0mapi_port=50000\0",
            "mserver5\n",
            MSERVER_MAPS,
            &[
                "/dev/null",
                "pipe:[880]",
                "/var/lib/monetdb/demo/sql_logs/sql/log.1",
                "socket:[2001]",
                "socket:[2002]",
                "anon_inode:[eventpoll]",
            ],
        );
        fs.add_sized_file("/var/lib/monetdb/demo/sql_logs/sql/log", 128);
        fs.add_sized_file("/var/lib/monetdb/demo/sql_logs/sql/log.1", 512);
        fs.add_sized_file("/var/lib/monetdb/demo/bat/BBP.dir", 1000);
        fs.add_sized_file("/var/lib/monetdb/demo/bat/01/0123.tail", 4096);
        fs.add_sized_file("/var/lib/monetdb/demo/bat/01/0124.theap", 2048);

        fs.add_process(
            3000,
            &stat_line(3000, "bash", 5, 2, 1, 20_000_000, 800),
            "/bin/bash\0--login\0",
            "bash\n",
            "",
            &["/dev/pts/0", "/dev/pts/0", "/dev/pts/0"],
        );

        fs
    }

    /// Host with system files only and no tracked process running.
    pub fn idle_system() -> Self {
        let mut fs = Self::typical_system();
        fs.remove_tree("/proc/2000");
        fs.remove_tree("/proc/2001");
        fs
    }

    /// mserver5 whose command line carries no `--dbpath` option.
    pub fn with_mserver_without_dbpath() -> Self {
        let mut fs = Self::typical_system();
        fs.add_process(
            2002,
            &stat_line(2002, "mserver5", 10, 5, 4, 1_000_000_000, 2048),
            "/usr/bin/mserver5\0--set\0embedded_py=3\0",
            "mserver5\n",
            MSERVER_MAPS,
            &["/dev/null"],
        );
        fs
    }

    /// mserver5 whose stat file cannot be read (exited or access denied).
    pub fn with_unreadable_mserver() -> Self {
        let mut fs = Self::typical_system();
        fs.add_process(
            2003,
            &stat_line(2003, "mserver5", 10, 5, 4, 1_000_000_000, 2048),
            "/usr/bin/mserver5\0--dbpath=/var/lib/monetdb/other\0",
            "mserver5\n",
            "",
            &[],
        );
        fs.deny("/proc/2003/stat");
        fs
    }

    /// Minimal database layout: `sql_logs` holds 100 + 250 bytes, `bat` is empty.
    pub fn with_small_database() -> Self {
        let mut fs = Self::typical_system();
        fs.add_process(
            2004,
            &stat_line(2004, "mserver5", 10, 5, 4, 1_000_000_000, 2048),
            "/usr/bin/mserver5\0--dbpath\0/srv/monet/small\0",
            "mserver5\n",
            "",
            &[],
        );
        fs.add_sized_file("/srv/monet/small/sql_logs/sql/log", 100);
        fs.add_sized_file("/srv/monet/small/sql_logs/sql/log.7", 250);
        fs.add_dir("/srv/monet/small/bat");
        fs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::procfs::parser::parse_proc_stat;

    #[test]
    fn test_stat_line_parses() {
        let line = stat_line(42, "mserver5", 7, 3, 9, 4096, 2);
        let stat = parse_proc_stat(&line).unwrap();
        assert_eq!(stat.pid, 42);
        assert_eq!(stat.comm, "mserver5");
        assert_eq!(stat.utime, 7);
        assert_eq!(stat.stime, 3);
        assert_eq!(stat.num_threads, 9);
        assert_eq!(stat.vsize, 4096);
        assert_eq!(stat.rss, 2);
    }
}
