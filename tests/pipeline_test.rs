//! End-to-end pipeline runs over a temp file share and the in-memory index.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use nsd_connector::config::ConnectorConfig;
use nsd_connector::publish::MemorySearchIndex;
use nsd_connector::queue::AbortFlag;
use nsd_connector::run::{CrawlType, RunController, RunStatus, ServiceTracker};

struct Fixture {
    _root: tempfile::TempDir,
    config: ConnectorConfig,
}

/// Lay out a file share plus rule files and a work directory
fn fixture(files: &[(&str, &str)], ignore: &[&str]) -> Fixture {
    let root = tempfile::tempdir().expect("tempdir");
    let share = root.path().join("share");
    std::fs::create_dir_all(&share).expect("share dir");
    for (rel, contents) in files {
        let path = share.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("parent dir");
        }
        std::fs::write(path, contents).expect("write file");
    }

    let start_file = root.path().join("start.txt");
    std::fs::write(&start_file, format!("{}\n", share.display())).expect("start file");
    let follow_file = root.path().join("follow.txt");
    std::fs::write(&follow_file, format!("{}\n", share.display())).expect("follow file");
    let ignore_file = root.path().join("ignore.txt");
    std::fs::write(&ignore_file, ignore.join("\n")).expect("ignore file");

    let config = ConnectorConfig::builder()
        .name("corp-share")
        .work_dir(root.path().join("work"))
        .crawl_start_file(start_file)
        .crawl_follow_file(follow_file)
        .crawl_ignore_file(ignore_file)
        .extract_threads(2)
        .flush_timeout_secs(10)
        .build();
    Fixture {
        _root: root,
        config,
    }
}

fn touch_future(path: &Path) {
    let file = std::fs::File::options()
        .write(true)
        .open(path)
        .expect("open for touch");
    file.set_modified(SystemTime::now() + Duration::from_secs(5))
        .expect("set mtime");
}

#[tokio::test]
async fn s1_happy_file_share_crawl() {
    let fixture = fixture(
        &[
            ("a.txt", "alpha"),
            ("b.txt", "bravo"),
            ("sub/c.txt", "charlie"),
        ],
        &[r".*\.log$"],
    );
    let work_dir = fixture.config.work_dir().clone();
    let index = Arc::new(MemorySearchIndex::new());
    let controller = RunController::new(fixture.config, Arc::clone(&index));

    let outcome = controller
        .run_once(Some(CrawlType::Full), AbortFlag::new())
        .await;
    assert_eq!(outcome.status, RunStatus::Success);
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.published, 3);
    assert_eq!(index.committed_count(), 3);
    assert_eq!(index.commit_calls(), 1);

    let tracker = ServiceTracker::load(&work_dir);
    assert!(tracker.last_full().is_some(), "tracker advanced");
    assert!(
        !work_dir.join("CrawlActive.lck").exists(),
        "lock released after run"
    );
}

#[tokio::test]
async fn s2_ignore_rules_win() {
    let fixture = fixture(
        &[("a.txt", "keep me"), ("a.log", "drop me")],
        &[r".*\.log$"],
    );
    let index = Arc::new(MemorySearchIndex::new());
    let controller = RunController::new(fixture.config, Arc::clone(&index));

    let outcome = controller
        .run_once(Some(CrawlType::Full), AbortFlag::new())
        .await;
    assert_eq!(outcome.status, RunStatus::Success);
    assert_eq!(outcome.published, 1);
    assert_eq!(index.committed_count(), 1);
}

#[tokio::test]
async fn s3_document_budget_caps_the_run() {
    let files: Vec<(String, String)> = (0..10)
        .map(|i| (format!("f{i}.txt"), format!("contents {i}")))
        .collect();
    let file_refs: Vec<(&str, &str)> = files
        .iter()
        .map(|(name, contents)| (name.as_str(), contents.as_str()))
        .collect();
    let mut fixture = fixture(&file_refs, &[]);
    fixture.config = ConnectorConfig::builder()
        .name(fixture.config.name())
        .work_dir(fixture.config.work_dir().clone())
        .crawl_start_file(fixture.config.crawl_start_file().clone())
        .publish_max(5)
        .extract_threads(2)
        .flush_timeout_secs(10)
        .build();
    let work_dir = fixture.config.work_dir().clone();

    let index = Arc::new(MemorySearchIndex::new());
    let controller = RunController::new(fixture.config, Arc::clone(&index));
    let outcome = controller
        .run_once(Some(CrawlType::Full), AbortFlag::new())
        .await;

    assert_eq!(outcome.status, RunStatus::SuccessWithCap);
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(index.committed_count(), 5, "budget bounds the committed set");
    assert!(outcome.commits >= 1);
    let tracker = ServiceTracker::load(&work_dir);
    assert!(
        tracker.last_full().is_some(),
        "tracker advances when at least one commit succeeded"
    );
}

#[tokio::test]
async fn s5_incremental_run_skips_unmodified_files() {
    let fixture = fixture(
        &[
            ("a.txt", "alpha"),
            ("b.txt", "bravo"),
            ("sub/c.txt", "charlie"),
        ],
        &[],
    );
    let share_b = fixture
        .config
        .crawl_start_file()
        .parent()
        .expect("root")
        .join("share/b.txt");
    let index = Arc::new(MemorySearchIndex::new());
    let controller = RunController::new(fixture.config, Arc::clone(&index));

    let first = controller
        .run_once(Some(CrawlType::Full), AbortFlag::new())
        .await;
    assert_eq!(first.published, 3);

    touch_future(&share_b);
    let second = controller
        .run_once(Some(CrawlType::Incremental), AbortFlag::new())
        .await;
    assert_eq!(second.status, RunStatus::Success);
    assert_eq!(second.published, 1, "only the touched file re-publishes");
}

#[tokio::test]
async fn s6_lock_busy_refuses_the_run() {
    let fixture = fixture(&[("a.txt", "alpha")], &[]);
    let work_dir = fixture.config.work_dir().clone();
    std::fs::create_dir_all(&work_dir).expect("work dir");
    std::fs::write(work_dir.join("CrawlActive.lck"), "").expect("pre-create lock");

    let index = Arc::new(MemorySearchIndex::new());
    let controller = RunController::new(fixture.config, Arc::clone(&index));
    let outcome = controller
        .run_once(Some(CrawlType::Full), AbortFlag::new())
        .await;

    assert_eq!(outcome.status, RunStatus::Failure);
    assert_eq!(outcome.exit_code, 2);
    assert_eq!(index.committed_count(), 0, "never reached Running");
    assert!(
        ServiceTracker::load(&work_dir).is_first_run(),
        "tracker unchanged"
    );
    assert!(
        work_dir.join("CrawlActive.lck").exists(),
        "foreign lock left in place"
    );
}

#[tokio::test]
async fn missing_start_file_is_fatal_init() {
    let root = tempfile::tempdir().expect("tempdir");
    let config = ConnectorConfig::builder()
        .name("broken")
        .work_dir(root.path().join("work"))
        .crawl_start_file(root.path().join("does-not-exist.txt"))
        .build();
    let index = Arc::new(MemorySearchIndex::new());
    let controller = RunController::new(config, Arc::clone(&index));

    let outcome = controller
        .run_once(Some(CrawlType::Full), AbortFlag::new())
        .await;
    assert_eq!(outcome.status, RunStatus::Failure);
    assert_eq!(outcome.exit_code, 1);
    assert!(
        !root.path().join("work/CrawlActive.lck").exists(),
        "lock released on fatal-init"
    );
}

#[tokio::test]
async fn administrative_abort_stops_the_run() {
    let files: Vec<(String, String)> = (0..20)
        .map(|i| (format!("f{i}.txt"), format!("contents {i}")))
        .collect();
    let file_refs: Vec<(&str, &str)> = files
        .iter()
        .map(|(name, contents)| (name.as_str(), contents.as_str()))
        .collect();
    let fixture = fixture(&file_refs, &[]);
    let index = Arc::new(MemorySearchIndex::new());
    let controller = RunController::new(fixture.config, Arc::clone(&index));

    let abort = AbortFlag::new();
    abort.set();
    let outcome = controller.run_once(Some(CrawlType::Full), abort).await;
    assert_eq!(outcome.status, RunStatus::Failure);
    assert_eq!(outcome.exit_code, 0, "administrative abort is not fatal-init");
    assert_eq!(index.committed_count(), 0);
}

#[tokio::test]
async fn transient_index_failures_are_retried() {
    let fixture = fixture(&[("a.txt", "alpha"), ("b.txt", "bravo")], &[]);
    let index = Arc::new(MemorySearchIndex::new());
    // First upsert attempt fails; the publisher's single retry recovers it.
    index.fail_next_upserts(1);
    let controller = RunController::new(fixture.config, Arc::clone(&index));

    let outcome = controller
        .run_once(Some(CrawlType::Full), AbortFlag::new())
        .await;
    assert_eq!(outcome.status, RunStatus::Success);
    assert_eq!(index.committed_count(), 2);
}
