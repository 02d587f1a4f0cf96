use chrono::{Duration, Utc};
use nsd_connector::error::PipelineError;
use nsd_connector::run::{LockFile, ServiceTracker};

#[test]
fn tracker_snapshot_survives_reload() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut tracker = ServiceTracker::default();
    let full = Utc::now() - Duration::days(1);
    let incremental = Utc::now() - Duration::hours(2);
    tracker.advance_full(full);
    tracker.advance_incremental(incremental);
    tracker.save(tmp.path()).expect("save");

    let loaded = ServiceTracker::load(tmp.path());
    assert_eq!(loaded.last_full(), Some(full));
    assert_eq!(loaded.last_incremental(), Some(incremental));
}

#[test]
fn tracker_overwrite_is_atomic() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut tracker = ServiceTracker::default();
    tracker.advance_full(Utc::now() - Duration::days(2));
    tracker.save(tmp.path()).expect("first save");

    let newer = Utc::now();
    tracker.advance_full(newer);
    tracker.save(tmp.path()).expect("second save");

    let loaded = ServiceTracker::load(tmp.path());
    assert_eq!(loaded.last_full(), Some(newer));
    // No temp file left behind by the write-then-rename.
    let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
        .expect("dir")
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn corrupt_tracker_falls_back_to_first_run() {
    let tmp = tempfile::tempdir().expect("tempdir");
    std::fs::write(tmp.path().join("service-tracker.xml"), "<not-xml").expect("write");
    let tracker = ServiceTracker::load(tmp.path());
    assert!(tracker.is_first_run());
}

#[test]
fn lock_is_mutually_exclusive_per_workdir() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let held = LockFile::acquire(tmp.path()).expect("first");
    for _ in 0..3 {
        match LockFile::acquire(tmp.path()) {
            Err(PipelineError::LockBusy(path)) => assert!(path.contains("CrawlActive.lck")),
            other => panic!("Expected LockBusy, got {other:?}"),
        }
    }
    drop(held);
    LockFile::acquire(tmp.path()).expect("free again");
}
