//! Metrics collector for Linux.
//!
//! Reads system-wide and per-process figures from the `/proc` filesystem and
//! measures the on-disk footprint of served databases, with a mock
//! filesystem for tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Collector                           │
//! │  ┌─────────────────────┐   ┌─────────────────────────────┐  │
//! │  │  ProcessCollector   │   │     SystemCollector         │  │
//! │  │  - /proc/[pid]/*    │   │  - /proc/meminfo            │  │
//! │  │  - CpuTracker       │   │  - /proc/stat               │  │
//! │  │  - disk (dbpath)    │   └──────────────┬──────────────┘  │
//! │  └──────────┬──────────┘                  │                 │
//! │             └──────────────┬──────────────┘                 │
//! │                            │                                │
//! │                     ┌──────▼──────┐                         │
//! │                     │  FileSystem │ (trait)                 │
//! │                     └──────┬──────┘                         │
//! └────────────────────────────┼────────────────────────────────┘
//!                              │
//!              ┌───────────────┼───────────────┐
//!              │               │               │
//!       ┌──────▼──────┐ ┌──────▼──────┐ ┌──────▼──────┐
//!       │   RealFs    │ │   MockFs    │ │  Scenarios  │
//!       │ (Linux)     │ │ (Testing)   │ │ (Fixtures)  │
//!       └─────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use std::time::Duration;
//! use mdbtop_core::collector::{Collector, MockFs};
//!
//! let fs = MockFs::typical_system();
//! let mut collector = Collector::new(fs, "/proc", Collector::<MockFs>::default_tracked())
//!     .with_cpu_window(Duration::ZERO);
//! let snapshot = collector.collect_snapshot().unwrap();
//! assert_eq!(snapshot.processes.len(), 2);
//! ```

#[allow(clippy::module_inception)]
mod collector;
pub mod disk;
pub mod mock;
pub mod procfs;
pub mod traits;

pub use collector::{Collector, CollectorTiming, DEFAULT_TRACKED, page_size};
pub use mock::MockFs;
pub use procfs::CollectError;
pub use traits::{FileSystem, RealFs};
