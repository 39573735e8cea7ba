//! mdbtop - Resource monitor for MonetDB processes.
//!
//! Starts a sampler worker that appends one JSON snapshot per interval to a
//! log file, and shows the latest snapshot as a live table until `q`, `Esc`
//! or Ctrl-C. The log is kept for `mdbtop-chart`.
//!
//! Usage:
//!   mdbtop                         # sample every 3s into a temp log
//!   mdbtop -t 1 --log-file run.log # sample every second into run.log

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(target_os = "linux")]
use mdbtop_core::collector::RealFs;
#[cfg(not(target_os = "linux"))]
use mdbtop_core::collector::mock::MockFs;
use mdbtop_core::collector::Collector;
use mdbtop_core::sampler::{Sampler, SamplerConfig};
use mdbtop_core::storage::{RecordWriter, prepare_log_file};
use mdbtop_core::tui::App;
use mdbtop_core::worker::{SamplerController, StopOutcome, WorkerCommand};

/// Resource monitor for MonetDB processes.
#[derive(Parser, Debug)]
#[command(
    name = "mdbtop",
    about = "Logs system resource usage for MonetDB processes",
    version
)]
struct Args {
    /// Sampling interval in seconds.
    #[arg(short = 't', long, default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Log file to write snapshots to (must be empty or missing).
    /// Default: a new mdbtop-<date>-*.log in the temp directory.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Process name to track (repeatable). Default: mserver5, monetdbd.
    #[arg(long = "process", value_name = "NAME")]
    processes: Vec<String>,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Write diagnostics of the monitor and its worker to this file.
    #[arg(long, value_name = "PATH")]
    debug_log: Option<PathBuf>,

    /// Increase verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (errors only).
    #[arg(short, long)]
    quiet: bool,

    /// Run as the sampler worker (internal).
    #[arg(long, hide = true, requires = "log_file")]
    worker: bool,
}

impl Args {
    fn tracked(&self) -> Vec<String> {
        if self.processes.is_empty() {
            Collector::<mdbtop_core::collector::RealFs>::default_tracked()
        } else {
            self.processes.clone()
        }
    }

    /// Arguments that start a worker sampling into `log`.
    fn worker_args(&self, log: &Path) -> Vec<String> {
        let mut args = vec![
            "--worker".to_string(),
            "--log-file".to_string(),
            log.display().to_string(),
            "--interval".to_string(),
            self.interval.to_string(),
            "--proc-path".to_string(),
            self.proc_path.clone(),
        ];
        for name in &self.processes {
            args.push("--process".to_string());
            args.push(name.clone());
        }
        if self.quiet {
            args.push("--quiet".to_string());
        }
        for _ in 0..self.verbose {
            args.push("--verbose".to_string());
        }
        args
    }
}

/// Where log lines go.
enum LogTarget<'a> {
    Stderr,
    File(&'a Path),
    Discard,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool, target: LogTarget<'_>) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for crate_name in ["mdbtop", "mdbtop_core"] {
        if let Ok(directive) = format!("{}={}", crate_name, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match target {
        LogTarget::Stderr => builder.with_writer(std::io::stderr).init(),
        LogTarget::File(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).init(),
            Err(e) => {
                eprintln!("Error: cannot open debug log {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        LogTarget::Discard => builder.with_writer(std::io::sink).init(),
    }
}

fn main() {
    let args = Args::parse();

    if args.worker {
        run_worker(&args);
    } else {
        run_monitor(&args);
    }
}

/// Sampler worker: appends snapshots until SIGTERM/SIGINT.
fn run_worker(args: &Args) {
    // stderr is the debug log (or /dev/null), set up by the controller.
    init_logging(args.verbose, args.quiet, LogTarget::Stderr);

    let Some(log_file) = args.log_file.as_deref() else {
        eprintln!("Error: --worker requires --log-file");
        std::process::exit(1);
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set signal handler: {}", e);
    }

    let writer = match RecordWriter::open(log_file) {
        Ok(w) => w,
        Err(e) => {
            error!("Failed to open {}: {}", log_file.display(), e);
            std::process::exit(1);
        }
    };

    let config = SamplerConfig {
        interval: Duration::from_secs(args.interval),
        proc_path: args.proc_path.clone(),
        tracked: args.tracked(),
    };
    info!(
        "Config: interval={}s, log={}, proc={}, tracked={}",
        args.interval,
        log_file.display(),
        config.proc_path,
        config.tracked.join(",")
    );

    #[cfg(target_os = "linux")]
    let mut sampler = Sampler::from_config(RealFs::new(), &config, writer);
    #[cfg(not(target_os = "linux"))]
    let mut sampler = Sampler::from_config(MockFs::typical_system(), &config, writer);

    match sampler.run(&running) {
        Ok(count) => info!("Shutdown complete, {} snapshots written", count),
        Err(e) => {
            error!("Sampler failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Foreground monitor: spawns the worker and runs the live table.
fn run_monitor(args: &Args) {
    let target = match args.debug_log.as_deref() {
        Some(path) => LogTarget::File(path),
        None => LogTarget::Discard,
    };
    init_logging(args.verbose, args.quiet, target);

    let log = match prepare_log_file(args.log_file.as_deref()) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            eprintln!("Error: cannot locate mdbtop executable: {}", e);
            std::process::exit(1);
        }
    };

    let mut command = WorkerCommand::new(exe);
    command.args = args.worker_args(&log);
    if let Some(path) = &args.debug_log {
        command = command.stderr_to(path);
    }
    let mut controller = SamplerController::new(command);

    if let Err(e) = controller.start() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Only reached outside raw mode (before or after the TUI); in raw mode
    // Ctrl-C arrives as a key press.
    let quit = Arc::new(AtomicBool::new(false));
    let q = quit.clone();
    if let Err(e) = ctrlc::set_handler(move || q.store(true, Ordering::SeqCst)) {
        warn!("Failed to set signal handler: {}", e);
    }

    let app = App::new(&log, quit);
    let result = app.run(Duration::from_secs(args.interval), &mut controller);

    match controller.stop() {
        Ok(StopOutcome::Killed) => warn!("Sampler worker had to be killed"),
        Ok(_) => {}
        Err(e) => eprintln!("Error: {}", e),
    }

    if let Err(e) = result {
        eprintln!("Error running TUI: {}", e);
        eprintln!("Log: {}", log.display());
        std::process::exit(1);
    }

    println!("Log: {}", log.display());
}
