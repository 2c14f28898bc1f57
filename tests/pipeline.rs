use std::path::Path;
use std::time::Duration;

use chrono::{Local, TimeZone};
use phishfeed::error::AppError;
use phishfeed::models::Config;
use phishfeed::pipeline::{RunOptions, run_update};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HEADER: &str = "phish_id,url,phish_detail_url,submission_time,verified,verification_time,online,target\n";

async fn serve(body: String) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/online-valid.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;
    server
}

fn config_for(server: &MockServer, data_dir: &Path) -> Config {
    let mut config = Config::default();
    config.feed.url = format!("{}/online-valid.csv", server.uri());
    config.feed.timeout_secs = 5;
    config.storage.data_dir = data_dir.to_path_buf();
    config
}

fn run_at(hour: u32) -> RunOptions {
    RunOptions {
        force: false,
        started_at: Local.with_ymd_and_hms(2026, 10, 18, hour, 30, 0).unwrap(),
    }
}

fn feed_row(id: u32, url: &str) -> String {
    format!(
        "{id},\"{url}\",http://www.phishtank.com/phish_detail.php?phish_id={id},2026-10-17T10:00:00+00:00,yes,2026-10-17T10:05:00+00:00,yes,Other\n"
    )
}

fn snapshot(dir: &Path) -> Option<String> {
    std::fs::read_to_string(dir.join("phishing_urls.txt")).ok()
}

fn backups(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| n.starts_with("phishing_urls_backup_"))
        .collect();
    names.sort();
    names
}

fn leftovers(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| n.starts_with(".phishfeed-run-") || n.ends_with(".tmp") || n == ".phishfeed.lock")
        .collect()
}

fn run_log(dir: &Path) -> String {
    std::fs::read_to_string(dir.join("update.log")).unwrap_or_default()
}

#[tokio::test]
async fn quoted_and_bare_duplicates_collapse_to_one_entry() {
    let tmp = TempDir::new().unwrap();
    let server = serve(
        "id,url,other\n1,\"http://evil.example/a\",x\n2,http://evil.example/a,y\n3,  ,z\n"
            .to_string(),
    )
    .await;
    let config = config_for(&server, tmp.path());

    let summary = run_update(&config, &run_at(3)).await.expect("run succeeds");

    assert_eq!(summary.candidates, 3);
    assert_eq!(summary.blank, 1);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.entries, 1);
    assert_eq!(snapshot(tmp.path()).as_deref(), Some("http://evil.example/a\n"));
    assert!(backups(tmp.path()).is_empty());
    assert!(leftovers(tmp.path()).is_empty());
    assert!(run_log(tmp.path()).contains("[SUMMARY] Update complete"));
}

#[tokio::test]
async fn server_error_publishes_nothing() {
    let tmp = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/online-valid.csv"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let config = config_for(&server, tmp.path());

    let err = run_update(&config, &run_at(3)).await.unwrap_err();

    assert!(matches!(err, AppError::Fetch { .. }));
    assert_eq!(snapshot(tmp.path()), None);
    assert!(backups(tmp.path()).is_empty());
    assert!(leftovers(tmp.path()).is_empty());

    let log = run_log(tmp.path());
    assert!(log.contains("ERROR: Update aborted: Fetch failed"), "{log}");
    assert!(log.contains("500"), "{log}");
}

#[tokio::test]
async fn update_backs_up_previous_snapshot() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("phishing_urls.txt"), "a.com\nb.com\n").unwrap();
    let server = serve(format!(
        "{HEADER}{}{}{}",
        feed_row(1, "c.com"),
        feed_row(2, "a.com"),
        feed_row(3, "c.com")
    ))
    .await;
    let config = config_for(&server, tmp.path());

    let summary = run_update(&config, &run_at(4)).await.expect("run succeeds");

    assert_eq!(summary.previous_entries, Some(2));
    assert_eq!(summary.duplicates, 1);
    assert_eq!(snapshot(tmp.path()).as_deref(), Some("a.com\nc.com\n"));

    let names = backups(tmp.path());
    assert_eq!(names, vec!["phishing_urls_backup_20261018_043000.txt".to_string()]);
    let backup = std::fs::read_to_string(tmp.path().join(&names[0])).unwrap();
    assert_eq!(backup, "a.com\nb.com\n");
}

#[tokio::test]
async fn header_only_feed_is_refused_over_existing_snapshot() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("phishing_urls.txt"), "a.com\nb.com\n").unwrap();
    let server = serve(HEADER.to_string()).await;
    let config = config_for(&server, tmp.path());

    let err = run_update(&config, &run_at(5)).await.unwrap_err();

    assert!(matches!(err, AppError::EmptyResult { previous_count: 2 }));
    assert_eq!(snapshot(tmp.path()).as_deref(), Some("a.com\nb.com\n"));
    assert!(backups(tmp.path()).is_empty());
    assert!(leftovers(tmp.path()).is_empty());
}

#[tokio::test]
async fn header_only_feed_publishes_empty_on_cold_start() {
    let tmp = TempDir::new().unwrap();
    let server = serve(HEADER.to_string()).await;
    let config = config_for(&server, tmp.path());

    let summary = run_update(&config, &run_at(5)).await.expect("cold start publishes");

    assert_eq!(summary.entries, 0);
    assert_eq!(snapshot(tmp.path()).as_deref(), Some(""));
}

#[tokio::test]
async fn allow_empty_publishes_empty_snapshot() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("phishing_urls.txt"), "a.com\n").unwrap();
    let server = serve(HEADER.to_string()).await;
    let mut config = config_for(&server, tmp.path());
    config.guard.allow_empty = true;

    run_update(&config, &run_at(6)).await.expect("empty publish allowed");

    assert_eq!(snapshot(tmp.path()).as_deref(), Some(""));
    assert_eq!(backups(tmp.path()).len(), 1);
}

#[tokio::test]
async fn repeated_runs_are_deterministic() {
    let tmp = TempDir::new().unwrap();
    let server = serve(format!(
        "{HEADER}{}{}{}",
        feed_row(1, "  z.example/path "),
        feed_row(2, "a.example"),
        feed_row(3, "m.example")
    ))
    .await;
    let config = config_for(&server, tmp.path());

    run_update(&config, &run_at(7)).await.unwrap();
    let first = snapshot(tmp.path()).unwrap();
    run_update(&config, &run_at(8)).await.unwrap();
    let second = snapshot(tmp.path()).unwrap();

    assert_eq!(first, "a.example\nm.example\nz.example/path\n");
    assert_eq!(first, second);

    let names = backups(tmp.path());
    assert_eq!(names.len(), 1);
    let backup = std::fs::read_to_string(tmp.path().join(&names[0])).unwrap();
    assert_eq!(backup, first);
}

#[tokio::test]
async fn drop_guard_refuses_collapse() {
    let tmp = TempDir::new().unwrap();
    let previous: String = (0..200).map(|i| format!("site{i:03}.example\n")).collect();
    std::fs::write(tmp.path().join("phishing_urls.txt"), &previous).unwrap();
    let server = serve(format!("{HEADER}{}", feed_row(1, "only.example"))).await;
    let config = config_for(&server, tmp.path());

    let err = run_update(&config, &run_at(9)).await.unwrap_err();
    assert!(matches!(err, AppError::GuardTriggered { .. }));
    assert_eq!(snapshot(tmp.path()).as_deref(), Some(previous.as_str()));

    let forced = run_at(9).with_force(true);
    run_update(&config, &forced).await.expect("forced publish");
    assert_eq!(snapshot(tmp.path()).as_deref(), Some("only.example\n"));
}

#[tokio::test]
async fn interrupted_run_leaves_snapshot_intact() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("phishing_urls.txt"), "a.com\n").unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/online-valid.csv"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("{HEADER}{}", feed_row(1, "b.com")))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let config = config_for(&server, tmp.path());

    let interrupted =
        tokio::time::timeout(Duration::from_millis(200), run_update(&config, &run_at(10))).await;

    assert!(interrupted.is_err());
    assert_eq!(snapshot(tmp.path()).as_deref(), Some("a.com\n"));
    assert!(backups(tmp.path()).is_empty());
    assert!(leftovers(tmp.path()).is_empty());
}

#[tokio::test]
async fn stray_temp_file_does_not_block_publish() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("phishing_urls.txt"), "a.com\n").unwrap();
    std::fs::write(tmp.path().join(".phishing_urls.txt.tmp"), "partial").unwrap();
    let server = serve(format!("{HEADER}{}", feed_row(1, "b.com"))).await;
    let config = config_for(&server, tmp.path());

    run_update(&config, &run_at(11)).await.expect("run succeeds");

    assert_eq!(snapshot(tmp.path()).as_deref(), Some("b.com\n"));
    assert_eq!(leftovers(tmp.path()), vec![".phishing_urls.txt.tmp".to_string()]);
}

#[tokio::test]
async fn malformed_feed_aborts_before_backup() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("phishing_urls.txt"), "a.com\n").unwrap();
    let server = serve("phish_id\n42\n".to_string()).await;
    let config = config_for(&server, tmp.path());

    let err = run_update(&config, &run_at(12)).await.unwrap_err();

    assert!(matches!(err, AppError::Extract(_)));
    assert_eq!(snapshot(tmp.path()).as_deref(), Some("a.com\n"));
    assert!(backups(tmp.path()).is_empty());
    assert!(run_log(tmp.path()).contains("Published snapshot left unchanged"));
}
