use phishfeed::error::AppError;
use phishfeed::models::FeedConfig;
use phishfeed::pipeline::fetch::run_fetch;
use phishfeed::pipeline::{FeedSource, HttpFeedSource, RetryPolicy, Workspace};
use phishfeed::utils::log::RunLog;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings() -> FeedConfig {
    FeedConfig {
        retry_delay_ms: 10,
        ..FeedConfig::default()
    }
}

#[tokio::test]
async fn fetcher_returns_body_unchanged() {
    let server = MockServer::start().await;
    let body = "phish_id,url,phish_detail_url\n1,\"http://evil.example/a\",x\n";
    Mock::given(method("GET"))
        .and(path("/online-valid.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/csv"))
        .mount(&server)
        .await;

    let source = HttpFeedSource::new(&settings()).unwrap();
    let url = format!("{}/online-valid.csv", server.uri());

    let bytes = source.fetch(&url).await.expect("fetch ok");
    assert_eq!(bytes, body.as_bytes());
}

#[tokio::test]
async fn fetcher_fails_on_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/online-valid.csv"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let source = HttpFeedSource::new(&settings()).unwrap();
    let url = format!("{}/online-valid.csv", server.uri());

    let err = source.fetch(&url).await.unwrap_err();
    match err {
        AppError::Fetch { url: failed, message } => {
            assert_eq!(failed, url);
            assert!(message.contains("500"), "unexpected message: {message}");
        }
        other => panic!("expected fetch error, got {other:?}"),
    }
}

#[tokio::test]
async fn retried_fetch_logs_each_failed_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/online-valid.csv"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/online-valid.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("id,url\n1,a.com\n"))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let workspace = Workspace::create_in(tmp.path()).unwrap();
    let log_path = tmp.path().join("update.log");
    let mut log = RunLog::open(&log_path);
    let config = FeedConfig {
        retries: 1,
        ..settings()
    };
    let source = HttpFeedSource::new(&config).unwrap();
    let url = format!("{}/online-valid.csv", server.uri());

    let retry = RetryPolicy::from(&config);
    let (feed_path, size) = run_fetch(&source, &url, retry, &workspace, &mut log)
        .await
        .expect("second attempt succeeds");
    drop(log);

    assert_eq!(size, 15);
    assert_eq!(std::fs::read(feed_path).unwrap(), b"id,url\n1,a.com\n");
    let run_log = std::fs::read_to_string(&log_path).unwrap();
    assert!(run_log.contains("WARN: Fetch attempt 1/2 failed"), "{run_log}");
    assert!(run_log.contains("503"), "{run_log}");
}

#[tokio::test]
async fn fetch_without_retries_fails_first_time() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/online-valid.csv"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let workspace = Workspace::create_in(tmp.path()).unwrap();
    let mut log = RunLog::console();
    let source = HttpFeedSource::new(&settings()).unwrap();
    let url = format!("{}/online-valid.csv", server.uri());

    let result = run_fetch(&source, &url, RetryPolicy::none(), &workspace, &mut log).await;
    assert!(matches!(result, Err(AppError::Fetch { .. })));
}

#[tokio::test]
async fn retries_exhausted_returns_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/online-valid.csv"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let workspace = Workspace::create_in(tmp.path()).unwrap();
    let mut log = RunLog::console();
    let source = HttpFeedSource::new(&settings()).unwrap();
    let url = format!("{}/online-valid.csv", server.uri());
    let retry = RetryPolicy {
        retries: 2,
        delay: std::time::Duration::from_millis(10),
    };

    let err = run_fetch(&source, &url, retry, &workspace, &mut log)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("502"), "unexpected: {err}");
}

#[tokio::test]
async fn fetcher_rejects_oversized_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/online-valid.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
        .mount(&server)
        .await;

    let config = FeedConfig {
        max_bytes: 1024,
        ..settings()
    };
    let source = HttpFeedSource::new(&config).unwrap();
    let url = format!("{}/online-valid.csv", server.uri());

    let err = source.fetch(&url).await.unwrap_err();
    assert!(err.to_string().contains("byte limit"), "unexpected: {err}");
}

#[tokio::test]
async fn fetcher_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/online-valid.csv"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("id,url\n")
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = FeedConfig {
        timeout_secs: 1,
        ..settings()
    };
    let source = HttpFeedSource::new(&config).unwrap();
    let url = format!("{}/online-valid.csv", server.uri());

    let err = source.fetch(&url).await.unwrap_err();
    assert!(matches!(err, AppError::Fetch { .. }));
    assert!(err.to_string().contains("timed out"), "unexpected: {err}");
}
