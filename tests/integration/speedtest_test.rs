use std::time::{Duration, Instant};
use sysmon::core::monitor::{
    CancelToken, MonitorSession, SpeedTestEndpoint, SpeedTestError, SpeedTestOutcome,
    SpeedTestProbe, Window,
};
use sysmon::MonitorConfig;

use super::support::{direct_client, serve_bytes, silent_listener, ScriptedSource};

const GRACE: Duration = Duration::from_secs(1);

fn probe() -> SpeedTestProbe {
    SpeedTestProbe::with_client(direct_client(), 2, 0)
}

#[tokio::test]
async fn test_tiny_timeout_against_unreachable_endpoint_fails() {
    let endpoint = SpeedTestEndpoint::new("unreachable", "http://127.0.0.1:1/");

    let started = Instant::now();
    let outcome = probe()
        .run(&endpoint, Duration::from_millis(1), &CancelToken::new())
        .await;

    assert!(started.elapsed() < GRACE);
    assert!(matches!(outcome, SpeedTestOutcome::Failed(_)), "{:?}", outcome);
}

#[tokio::test]
async fn test_cancel_five_ms_into_long_test() {
    let (url, _listener) = silent_listener().await;
    let endpoint = SpeedTestEndpoint::new("silent", url);
    let cancel = CancelToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let outcome = probe().run(&endpoint, Duration::from_secs(30), &cancel).await;

    assert!(started.elapsed() < GRACE);
    assert_eq!(outcome, SpeedTestOutcome::Cancelled);
}

#[tokio::test]
async fn test_http_error_status_is_reported() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/missing", listener.local_addr().unwrap());
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                if matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {
                    let _ = socket
                        .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                        .await;
                }
            });
        }
    });

    let outcome = probe()
        .run(&SpeedTestEndpoint::new("missing", url), Duration::from_secs(5), &CancelToken::new())
        .await;
    assert_eq!(outcome, SpeedTestOutcome::Failed(SpeedTestError::Http(404)));
}

#[tokio::test]
async fn test_upload_is_measured_when_configured() {
    let url = serve_bytes(b"ok").await;
    let endpoint = SpeedTestEndpoint::new("local", url.clone()).with_upload(url);

    let outcome = SpeedTestProbe::with_client(direct_client(), 1, 4096)
        .run(&endpoint, Duration::from_secs(5), &CancelToken::new())
        .await;

    let result = outcome.result().expect("completed");
    assert_eq!(result.bytes_downloaded, 2);
    assert_eq!(result.bytes_uploaded, 4096);
    assert!(result.upload_bps.is_some());
}

#[tokio::test]
async fn test_session_stores_completed_result() {
    let url = serve_bytes(&[1u8; 10_000]).await;
    let session = MonitorSession::new(MonitorConfig::default(), ScriptedSource::new(&[]))
        .unwrap()
        .with_http_client(direct_client());

    let outcome = session
        .run_speed_test(
            &SpeedTestEndpoint::new("local", url),
            Duration::from_secs(5),
            &CancelToken::new(),
        )
        .await;

    assert!(outcome.result().is_some());
    let stored = session.latest_speed_test().unwrap();
    assert_eq!(stored.bytes_downloaded, 10_000);
    assert_eq!(session.history(Window::All).speed_tests().count(), 1);
}

#[tokio::test]
async fn test_run_best_picks_a_reachable_endpoint() {
    let url = serve_bytes(&[1u8; 512]).await;
    let session = MonitorSession::new(MonitorConfig::default(), ScriptedSource::new(&[]))
        .unwrap()
        .with_http_client(direct_client());

    let endpoints = vec![
        SpeedTestEndpoint::new("dead", "http://127.0.0.1:1/"),
        SpeedTestEndpoint::new("alive", url),
    ];
    let outcome = session
        .run_best(&endpoints, Duration::from_secs(5), &CancelToken::new())
        .await;

    assert_eq!(outcome.result().map(|r| r.server_id.as_str()), Some("alive"));
}

#[tokio::test]
async fn test_run_best_without_endpoints_fails() {
    let session = MonitorSession::new(MonitorConfig::default(), ScriptedSource::new(&[])).unwrap();
    let outcome = session
        .run_best(&[], Duration::from_secs(1), &CancelToken::new())
        .await;
    assert!(matches!(
        outcome,
        SpeedTestOutcome::Failed(SpeedTestError::InvalidEndpoint(_))
    ));
}
