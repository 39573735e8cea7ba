//! mdbtop-core - shared library for the mdbtop tools.
//!
//! Provides:
//! - `collector` - system and per-process metrics from `/proc`, dbpath disk usage
//! - `storage` - record model and the append-only record stream
//! - `sampler` - the fixed-interval sampling loop
//! - `worker` - lifecycle handle for the isolated sampler process
//! - `export` - static HTML chart rendering of a finished stream
//! - `fmt` - shared formatting helpers (bytes, elapsed time)
//!
//! With `tui` feature (default):
//! - `tui` - live table that tails the record stream (ratatui/crossterm)

pub mod collector;
pub mod export;
pub mod fmt;
pub mod sampler;
pub mod storage;
pub mod worker;

#[cfg(feature = "tui")]
pub mod tui;
