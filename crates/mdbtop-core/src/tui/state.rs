//! View state fed by the record tailer.

use std::time::{Duration, Instant};

use tracing::warn;

use super::table::{DEFAULT_COL_WIDTHS, Row, column_widths, extract_rows};
use crate::storage::model::Snapshot;
use crate::storage::stream::TailBatch;

/// What the live view shows.
#[derive(Debug)]
pub struct ViewState {
    started: Instant,
    /// Latest snapshot read from the stream.
    pub latest: Option<Snapshot>,
    pub rows: Vec<Row>,
    pub widths: [u16; 8],
    /// Records read so far.
    pub records: u64,
    /// Last diagnostic, shown on the time line.
    pub status: Option<String>,
}

impl ViewState {
    pub fn new(started: Instant) -> Self {
        Self {
            started,
            latest: None,
            rows: Vec::new(),
            widths: DEFAULT_COL_WIDTHS,
            records: 0,
            status: None,
        }
    }

    /// Time since the view started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Applies newly tailed records; only the most recent one is shown.
    ///
    /// Malformed lines are skipped and reported through `status`.
    pub fn apply_batch(&mut self, batch: TailBatch) {
        for err in &batch.errors {
            warn!("skipping record: {}", err);
            self.status = Some(format!("skipped record ({})", err));
        }

        self.records += batch.records.len() as u64;
        if let Some(latest) = batch.records.into_iter().last() {
            self.rows = extract_rows(&latest);
            self.widths = column_widths(&self.rows);
            self.latest = Some(latest);
        }
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::model::{ProcessRecord, SystemInfo};
    use crate::storage::stream::StreamError;

    fn snapshot(pids: &[u32]) -> Snapshot {
        Snapshot {
            processes: pids
                .iter()
                .map(|&pid| ProcessRecord {
                    pid,
                    name: "mserver5".to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Snapshot::now(SystemInfo::default())
        }
    }

    #[test]
    fn test_new_state_uses_default_widths() {
        let state = ViewState::new(Instant::now());
        assert!(state.latest.is_none());
        assert_eq!(state.widths, DEFAULT_COL_WIDTHS);
    }

    #[test]
    fn test_apply_batch_keeps_latest_record() {
        let mut state = ViewState::new(Instant::now());
        state.apply_batch(TailBatch {
            records: vec![snapshot(&[1]), snapshot(&[1, 123456])],
            errors: Vec::new(),
        });

        assert_eq!(state.records, 2);
        assert_eq!(state.rows.len(), 2);
        assert_eq!(state.rows[1][0], "123456");
        assert_eq!(state.widths[0], 6 + 4);
        assert!(state.status.is_none());
    }

    #[test]
    fn test_empty_batch_keeps_previous_rows() {
        let mut state = ViewState::new(Instant::now());
        state.apply_batch(TailBatch {
            records: vec![snapshot(&[1])],
            errors: Vec::new(),
        });
        state.apply_batch(TailBatch::default());
        assert_eq!(state.rows.len(), 1);
    }

    #[test]
    fn test_malformed_record_sets_status() {
        let mut state = ViewState::new(Instant::now());
        let source = serde_json::from_str::<Snapshot>("{").unwrap_err();
        state.apply_batch(TailBatch {
            records: Vec::new(),
            errors: vec![StreamError::Malformed { line: 3, source }],
        });
        let status = state.status.unwrap();
        assert!(status.contains("line 3"), "{}", status);
        assert!(state.latest.is_none());
    }
}
