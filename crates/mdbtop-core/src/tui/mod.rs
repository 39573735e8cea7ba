//! Live terminal view of the record stream.
//!
//! Tails the stream written by the sampler worker and redraws a table of
//! the latest snapshot's processes on every tick.

mod app;
mod event;
mod input;
mod render;
mod state;
pub mod table;

pub use app::App;
pub use state::ViewState;
