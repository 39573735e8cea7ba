//! mdbtop-chart - Render an mdbtop log as a static HTML chart.
//!
//! Usage:
//!   mdbtop-chart run.log -o run.html
//!   mdbtop-chart run.log --desc "nightly load test" > run.html

use std::path::PathBuf;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use mdbtop_core::export::log_to_html;

#[derive(Parser, Debug)]
#[command(name = "mdbtop-chart", about = "Render mdbtop log to html chart", version)]
struct Cli {
    /// Log file written by mdbtop.
    log_file: PathBuf,

    /// Output file (default: stdout).
    #[arg(short = 'o', long = "out", value_name = "PATH")]
    out_file: Option<PathBuf>,

    /// Short description to include in the heading (default: log file name).
    #[arg(long = "desc", value_name = "TEXT")]
    synopsis: Option<String>,

    /// Increase verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (errors only).
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber on stderr; stdout may carry the page.
fn init_logging(verbose: u8, quiet: bool) {
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
    for crate_name in ["mdbtop_chart", "mdbtop_core"] {
        if let Ok(directive) = format!("{}={}", crate_name, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = log_to_html(
        &cli.log_file,
        cli.out_file.as_deref(),
        cli.synopsis.as_deref(),
    ) {
        eprintln!("Error: {}: {}", cli.log_file.display(), e);
        std::process::exit(1);
    }
}
