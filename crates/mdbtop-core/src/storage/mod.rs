//! Record model and the append-only record stream.

pub mod model;
pub mod stream;

pub use model::{CpuInfo, DbDiskUsage, MemoryInfo, ProcessRecord, Snapshot, SystemInfo};
pub use stream::{
    RecordTailer, RecordWriter, StreamError, TailBatch, load_snapshots, prepare_log_file,
};
