//! Process table model: fixed columns, cell text and column widths.

use crate::fmt::{SENTINEL, format_bytes, format_opt_bytes, format_percent};
use crate::storage::model::{ProcessRecord, Snapshot};

/// Spaces added to the widest cell of every column.
pub const PADDING: u16 = 4;

/// Column headers, in display order.
pub const HEADER: [&str; 8] = ["PID", "PROC", "VIRT", "RSS", "CPU%", "DB", "WAL", "BAT"];

/// Record fields behind each column, in display order.
pub const FIELDS: [&str; 8] = [
    "pid",
    "pname",
    "vms",
    "rss",
    "cpu_percent",
    "database",
    "wal",
    "bat",
];

/// Widths used before any process row has been seen.
pub const DEFAULT_COL_WIDTHS: [u16; 8] = [8, 8, 8, 8, 10, 8, 8, 8];

/// One rendered table row.
pub type Row = [String; 8];

/// Cell text for one process.
pub fn process_row(p: &ProcessRecord) -> Row {
    let disk = p.disk.as_ref();
    [
        p.pid.to_string(),
        p.name.clone(),
        format_bytes(p.vms),
        format_bytes(p.rss),
        format_percent(p.cpu_percent),
        disk.map_or_else(|| SENTINEL.to_string(), |d| d.database.clone()),
        format_opt_bytes(disk.map(|d| d.wal)),
        format_opt_bytes(disk.map(|d| d.bat)),
    ]
}

/// Rows for every process of a snapshot, in record order.
pub fn extract_rows(snapshot: &Snapshot) -> Vec<Row> {
    snapshot.processes.iter().map(process_row).collect()
}

/// Column widths: widest of header and cells, plus `PADDING`.
///
/// Zero rows yields `DEFAULT_COL_WIDTHS`.
pub fn column_widths(rows: &[Row]) -> [u16; 8] {
    if rows.is_empty() {
        return DEFAULT_COL_WIDTHS;
    }
    let mut widths = [0u16; 8];
    for (i, width) in widths.iter_mut().enumerate() {
        let widest = rows
            .iter()
            .map(|row| row[i].chars().count())
            .chain(std::iter::once(HEADER[i].chars().count()))
            .max()
            .unwrap_or(0);
        *width = (widest as u16).saturating_add(PADDING);
    }
    widths
}

/// Splits `total` rows over `lines` available lines.
///
/// Returns `(shown, hidden)`. When rows overflow, the last line is kept
/// for the overflow indicator.
pub fn visible_rows(total: usize, lines: usize) -> (usize, usize) {
    if total <= lines {
        (total, 0)
    } else {
        let shown = lines.saturating_sub(1);
        (shown, total - shown)
    }
}

/// Left-aligns `cells` into fixed-width columns.
pub fn pad_cells<S: AsRef<str>>(cells: &[S], widths: &[u16]) -> Vec<String> {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell.as_ref(), width = *width as usize))
        .collect()
}
