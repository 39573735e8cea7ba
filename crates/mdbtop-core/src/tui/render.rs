//! Main rendering logic for TUI.
//!
//! The view is a plain list of lines: the time line, the column header and
//! one line per process. Lines are never wrapped; anything past the right
//! edge of the frame is cut off.

use ratatui::Frame;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use super::state::ViewState;
use super::table::{HEADER, pad_cells, visible_rows};
use crate::fmt::format_elapsed;

fn header_style() -> Style {
    Style::default()
        .fg(Color::White)
        .bg(Color::Blue)
        .add_modifier(Modifier::BOLD)
}

fn status_style() -> Style {
    Style::default().fg(Color::Yellow)
}

fn dim_style() -> Style {
    Style::default().fg(Color::DarkGray)
}

/// Builds the lines for a frame `height` lines tall.
pub fn build_lines(state: &ViewState, height: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::with_capacity(height);

    let mut time_line = vec![Span::raw(format!("Time: {}", format_elapsed(state.elapsed())))];
    if let Some(status) = &state.status {
        time_line.push(Span::raw("  "));
        time_line.push(Span::styled(status.clone(), status_style()));
    }
    lines.push(Line::from(time_line));
    if height < 2 {
        lines.truncate(height);
        return lines;
    }

    lines.push(Line::styled(
        pad_cells(&HEADER, &state.widths).concat(),
        header_style(),
    ));

    let (shown, hidden) = visible_rows(state.rows.len(), height - 2);
    for row in state.rows.iter().take(shown) {
        lines.push(Line::raw(pad_cells(row, &state.widths).concat()));
    }
    if hidden > 0 {
        lines.push(Line::styled(format!("\u{2026} {} more", hidden), dim_style()));
    }

    lines
}

/// Main render function.
pub fn render(frame: &mut Frame, state: &ViewState) {
    let area = frame.area();
    let lines = build_lines(state, area.height as usize);
    frame.render_widget(Paragraph::new(lines), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::model::{ProcessRecord, Snapshot, SystemInfo};
    use crate::storage::stream::TailBatch;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use std::time::Instant;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn state_with(pids: std::ops::Range<u32>) -> ViewState {
        let mut state = ViewState::new(Instant::now());
        let snapshot = Snapshot {
            processes: pids
                .map(|pid| ProcessRecord {
                    pid,
                    name: "mserver5".to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Snapshot::now(SystemInfo::default())
        };
        state.apply_batch(TailBatch {
            records: vec![snapshot],
            errors: Vec::new(),
        });
        state
    }

    #[test]
    fn test_layout_time_header_rows() {
        let state = state_with(100..102);
        let lines = build_lines(&state, 20);
        assert_eq!(lines.len(), 4);
        assert!(text(&lines[0]).starts_with("Time: 0:00:0"));
        assert!(text(&lines[1]).starts_with("PID    PROC"));
        assert!(text(&lines[2]).starts_with("100    mserver5    "));
        assert!(text(&lines[3]).starts_with("101 "));
    }

    #[test]
    fn test_empty_view_shows_header_only() {
        let state = ViewState::new(Instant::now());
        let lines = build_lines(&state, 20);
        assert_eq!(lines.len(), 2);
        // default PID width is 8
        assert!(text(&lines[1]).starts_with("PID     PROC"));
    }

    #[test]
    fn test_overflow_indicator() {
        let state = state_with(1..11);
        // time + header + 3 lines for rows
        let lines = build_lines(&state, 5);
        assert_eq!(lines.len(), 5);
        assert_eq!(text(&lines[4]), "\u{2026} 8 more");
    }

    #[test]
    fn test_status_on_time_line() {
        let mut state = ViewState::new(Instant::now());
        state.set_status("skipped record");
        let lines = build_lines(&state, 3);
        assert!(text(&lines[0]).ends_with("skipped record"));
    }

    #[test]
    fn test_render_clips_at_right_edge() {
        let state = state_with(1..3);
        let backend = TestBackend::new(10, 6);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| render(frame, &state)).unwrap();

        let buffer = terminal.backend().buffer();
        let row: String = (0..10).map(|x| buffer[(x, 2)].symbol().to_string()).collect();
        assert_eq!(row, "1      mse");
    }
}
