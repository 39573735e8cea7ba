//! Static HTML chart of a finished record stream.
//!
//! The page is self-contained apart from Chart.js, which is loaded from a
//! CDN: the snapshots are embedded as a JSON literal and the plotting script
//! is inlined.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tracing::info;

use crate::storage::model::Snapshot;
use crate::storage::stream::{StreamError, load_snapshots};

const PAGE_TEMPLATE: &str = include_str!("chart.html");
const PLOT_JS: &str = include_str!("plot.js");

/// Error type for export failures.
#[derive(Debug)]
pub enum ExportError {
    /// The log could not be loaded (missing, unreadable or malformed).
    Stream(StreamError),
    /// The page could not be written.
    Io(io::Error),
    /// The snapshots could not be serialized.
    Serialize(serde_json::Error),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Stream(e) => write!(f, "{}", e),
            ExportError::Io(e) => write!(f, "failed to write chart: {}", e),
            ExportError::Serialize(e) => write!(f, "failed to serialize snapshots: {}", e),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Stream(e) => Some(e),
            ExportError::Io(e) => Some(e),
            ExportError::Serialize(e) => Some(e),
        }
    }
}

impl From<StreamError> for ExportError {
    fn from(e: StreamError) -> Self {
        ExportError::Stream(e)
    }
}

impl From<io::Error> for ExportError {
    fn from(e: io::Error) -> Self {
        ExportError::Io(e)
    }
}

/// Escapes text for use in HTML element content and attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Serializes snapshots as a JSON literal safe to embed in a `<script>`.
fn script_json(snapshots: &[Snapshot]) -> Result<String, ExportError> {
    let json = serde_json::to_string(snapshots).map_err(ExportError::Serialize)?;
    Ok(json.replace("</", "<\\/"))
}

/// Substitutes `{{name}}` placeholders in a single pass.
///
/// Substituted values are not scanned again; unknown placeholders are kept.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match values.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

/// Renders the chart page for `snapshots` with an (unescaped) heading.
pub fn render_html(snapshots: &[Snapshot], header: &str) -> Result<String, ExportError> {
    let data = script_json(snapshots)?;
    let header = escape_html(header);
    Ok(fill_template(
        PAGE_TEMPLATE,
        &[("header", &header), ("data", &data), ("js", PLOT_JS)],
    ))
}

/// Loads a whole log and writes its chart page to `out`, or stdout.
///
/// The heading defaults to the log's file name.
pub fn log_to_html(log: &Path, out: Option<&Path>, header: Option<&str>) -> Result<(), ExportError> {
    let snapshots = load_snapshots(log)?;
    let default_header;
    let header = match header {
        Some(h) => h,
        None => {
            default_header = log
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| log.display().to_string());
            &default_header
        }
    };

    let page = render_html(&snapshots, header)?;
    match out {
        Some(path) => {
            fs::write(path, page)?;
            info!(
                "Wrote chart of {} snapshots to {}",
                snapshots.len(),
                path.display()
            );
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(page.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::model::{DbDiskUsage, ProcessRecord, SystemInfo};
    use crate::storage::stream::RecordWriter;

    fn snapshot() -> Snapshot {
        Snapshot {
            processes: vec![ProcessRecord {
                pid: 42,
                name: "mserver5".to_string(),
                disk: Some(DbDiskUsage {
                    database: "</script><b>".to_string(),
                    wal: 350,
                    bat: 0,
                }),
                ..Default::default()
            }],
            ..Snapshot::now(SystemInfo::default())
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Q&A"</b> it's"#),
            "&lt;b&gt;&quot;Q&amp;A&quot;&lt;/b&gt; it&#39;s"
        );
    }

    #[test]
    fn test_fill_template_single_pass() {
        let out = fill_template(
            "a {{x}} b {{y}} c {{unknown}} {{",
            &[("x", "{{y}}"), ("y", "Y")],
        );
        assert_eq!(out, "a {{y}} b Y c {{unknown}} {{");
    }

    #[test]
    fn test_render_html_embeds_data_and_script() {
        let page = render_html(&[snapshot()], "Load test <1>").unwrap();
        assert!(page.contains("<h2>Load test &lt;1&gt;</h2>"));
        assert!(page.contains("function render(ctx"));
        assert!(page.contains(r#""pname":"mserver5""#));
        // JSON cannot close the script element
        assert!(!page.contains("</script><b>"));
        assert!(page.contains(r#"<\/script><b>"#));
        assert!(!page.contains("{{data}}"));
    }

    #[test]
    fn test_empty_log_renders_empty_array() {
        let page = render_html(&[], "empty").unwrap();
        assert!(page.contains("const snapshots = [];"));
    }

    #[test]
    fn test_log_to_html_writes_file_with_default_header() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("mdbtop-run.log");
        let mut writer = RecordWriter::open(&log).unwrap();
        writer.append(&snapshot()).unwrap();
        writer.append(&snapshot()).unwrap();

        let out = dir.path().join("chart.html");
        log_to_html(&log, Some(&out), None).unwrap();

        let page = fs::read_to_string(&out).unwrap();
        assert!(page.contains("<h2>mdbtop-run.log</h2>"));
        assert_eq!(page.matches(r#""pid":42"#).count(), 2);
    }

    #[test]
    fn test_malformed_log_aborts_with_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("bad.log");
        let good = serde_json::to_string(&snapshot()).unwrap();
        fs::write(&log, format!("{}\nnot json\n", good)).unwrap();

        let out = dir.path().join("chart.html");
        let err = log_to_html(&log, Some(&out), Some("x")).unwrap_err();
        assert!(matches!(
            err,
            ExportError::Stream(StreamError::Malformed { line: 2, .. })
        ));
        assert!(!out.exists());
    }

    #[test]
    fn test_missing_log_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = log_to_html(&dir.path().join("nope.log"), None, None);
        assert!(matches!(result, Err(ExportError::Stream(StreamError::Io(_)))));
    }
}
