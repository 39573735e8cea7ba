//! Sampler to exporter, over a mock `/proc`.

use std::time::Duration;

use mdbtop_core::collector::{Collector, MockFs};
use mdbtop_core::export::render_html;
use mdbtop_core::sampler::Sampler;
use mdbtop_core::storage::{RecordTailer, RecordWriter, load_snapshots};

fn sampler(path: &std::path::Path) -> Sampler<MockFs> {
    let collector = Collector::new(
        MockFs::typical_system(),
        "/proc",
        Collector::<MockFs>::default_tracked(),
    )
    .with_cpu_window(Duration::ZERO);
    Sampler::new(collector, RecordWriter::open(path).unwrap(), Duration::from_secs(1))
}

#[test]
fn sampled_records_round_trip_through_the_stream() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.log");
    let mut sampler = sampler(&path);

    let mut written = Vec::new();
    for _ in 0..3 {
        written.push(sampler.tick().unwrap());
    }

    let loaded = load_snapshots(&path).unwrap();
    assert_eq!(loaded, written);
    for pair in loaded.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }

    let server = &loaded[0].processes[1];
    assert_eq!(server.name, "mserver5");
    let disk = server.disk.as_ref().unwrap();
    assert_eq!((disk.database.as_str(), disk.wal, disk.bat), ("demo", 640, 7144));
    assert_eq!(loaded[0].processes[0].disk, None);
}

#[test]
fn tailer_follows_the_sampler() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.log");
    let mut sampler = sampler(&path);
    let mut tailer = RecordTailer::new(&path);

    assert!(tailer.poll().unwrap().is_empty());
    sampler.tick().unwrap();
    assert_eq!(tailer.poll().unwrap().records.len(), 1);
    sampler.tick().unwrap();
    sampler.tick().unwrap();
    assert_eq!(tailer.poll().unwrap().records.len(), 2);
}

#[test]
fn exported_page_contains_every_sample() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.log");
    let mut sampler = sampler(&path);
    sampler.tick().unwrap();
    sampler.tick().unwrap();

    let page = render_html(&load_snapshots(&path).unwrap(), "demo run").unwrap();
    assert_eq!(page.matches(r#""database":"demo""#).count(), 2);
    assert!(page.contains("<h2>demo run</h2>"));
}
