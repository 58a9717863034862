//! End-to-end tests: real sockets, real handler processes.

mod common;

use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use common::{config_for, read_all, response_body, roundtrip, scripts, start_server, status_line};

#[tokio::test]
async fn get_reaches_handler_with_arguments_and_headers() {
    let scripts = scripts();
    let server = start_server(config_for(&scripts.echo)).await;

    let response = roundtrip(
        server.addr,
        b"GET /hello HTTP/1.1\r\nHost: example\r\nX-Mixed-Case:  spaced \r\n\r\n",
    )
    .await;

    assert_eq!(status_line(&response), "HTTP/1.1 200 OK");
    let body = String::from_utf8_lossy(response_body(&response)).into_owned();
    assert!(body.starts_with("method=GET\npath=/hello\nbody unset\n"), "{body}");
    assert!(body.ends_with("Host: example\r\nX-Mixed-Case:  spaced \r\n"), "{body}");
}

#[tokio::test]
async fn body_arriving_in_pieces_is_passed_in_environment() {
    let scripts = scripts();
    let server = start_server(config_for(&scripts.echo)).await;

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    client
        .write_all(b"POST /submit HTTP/1.1\r\nContent-Length: 5\r\n\r\nhel")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    client.write_all(b"lo").await.unwrap();
    client.shutdown().await.unwrap();

    let response = read_all(&mut client).await;
    let body = String::from_utf8_lossy(response_body(&response)).into_owned();
    assert!(body.starts_with("method=POST\npath=/submit\nbody=hello\n"), "{body}");
}

#[tokio::test]
async fn large_body_is_spooled_to_stdin() {
    let scripts = scripts();
    let spool = tempfile::tempdir().unwrap();

    let mut config = config_for(&scripts.cat);
    config.handler.spool_dir = Some(spool.path().to_path_buf());
    config.limits.max_body_size = 4 * 1024 * 1024;
    config.limits.max_request_size = 4 * 1024 * 1024 + 64 * 1024;
    let server = start_server(config).await;

    let payload: Vec<u8> = (0..2 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let mut request = format!("PUT /upload HTTP/1.0\r\nContent-Length: {}\r\n\r\n", payload.len())
        .into_bytes();
    request.extend_from_slice(&payload);

    let response = roundtrip(server.addr, &request).await;
    assert_eq!(status_line(&response), "HTTP/1.1 200 OK");
    assert_eq!(response_body(&response), &payload[..]);

    // The spool file is unlinked before the handler starts.
    assert_eq!(std::fs::read_dir(spool.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn unknown_method_gets_bad_request() {
    let scripts = scripts();
    let server = start_server(config_for(&scripts.echo)).await;

    let response = roundtrip(server.addr, b"FOO / HTTP/1.1\r\n\r\n").await;
    assert_eq!(status_line(&response), "HTTP/1.1 400");
    assert!(String::from_utf8_lossy(&response).contains("Content-Type: text/plain"));
}

#[tokio::test]
async fn chunked_body_gets_not_implemented() {
    let scripts = scripts();
    let server = start_server(config_for(&scripts.echo)).await;

    let response = roundtrip(
        server.addr,
        b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n",
    )
    .await;
    assert_eq!(status_line(&response), "HTTP/1.1 501");
    assert_eq!(response_body(&response), b"Not implemented\r\n");
}

#[tokio::test]
async fn declared_body_over_limit_is_rejected_before_reading_it() {
    let scripts = scripts();
    let mut config = config_for(&scripts.echo);
    config.limits.max_body_size = 1024;
    let server = start_server(config).await;

    let response = roundtrip(server.addr, b"POST / HTTP/1.1\r\nContent-Length: 4096\r\n\r\n").await;
    assert_eq!(status_line(&response), "HTTP/1.1 400");
}

#[tokio::test]
async fn oversized_head_is_rejected() {
    let scripts = scripts();
    let mut config = config_for(&scripts.echo);
    config.limits.max_request_size = 2048;
    let server = start_server(config).await;

    let request = format!("GET / HTTP/1.1\r\nX-Filler: {}\r\n\r\n", "f".repeat(4096));
    let response = roundtrip(server.addr, request.as_bytes()).await;
    assert_eq!(status_line(&response), "HTTP/1.1 400");
    assert_eq!(response_body(&response), b"Request too large\r\n");
}

#[tokio::test]
async fn truncated_request_gets_bad_request() {
    let scripts = scripts();
    let server = start_server(config_for(&scripts.echo)).await;

    let response = roundtrip(server.addr, b"GET / HTTP/1.1\r\nHost: x\r\n").await;
    assert_eq!(status_line(&response), "HTTP/1.1 400");
    assert_eq!(response_body(&response), b"Expected more data\r\n");
}

#[tokio::test]
async fn idle_client_is_closed_silently() {
    let scripts = scripts();
    let mut config = config_for(&scripts.echo);
    config.timeouts.idle_secs = 1;
    let server = start_server(config).await;

    let started = Instant::now();
    let mut client = TcpStream::connect(server.addr).await.unwrap();
    let response = read_all(&mut client).await;

    assert!(response.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(900));
}

#[tokio::test]
async fn deadline_kills_stalled_handler() {
    let scripts = scripts();
    let mut config = config_for(&scripts.stall);
    config.timeouts.deadline_secs = 1;
    let server = start_server(config).await;

    let started = Instant::now();
    let response = roundtrip(server.addr, b"GET /slow HTTP/1.1\r\n\r\n").await;

    assert!(response.is_empty());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn missing_handler_gets_internal_error() {
    let scripts = scripts();
    let server = start_server(config_for(&scripts.echo.with_file_name("absent.sh"))).await;

    let response = roundtrip(server.addr, b"GET / HTTP/1.1\r\n\r\n").await;
    assert_eq!(status_line(&response), "HTTP/1.1 500");
    assert_eq!(response_body(&response), b"Error\r\n");
}

#[tokio::test]
async fn one_bad_connection_does_not_affect_others() {
    let scripts = scripts();
    let server = start_server(config_for(&scripts.echo)).await;

    let silent = TcpStream::connect(server.addr).await.unwrap();
    let (bad, good) = tokio::join!(
        roundtrip(server.addr, b"BREW /pot HTTP/1.1\r\n\r\n"),
        roundtrip(server.addr, b"HEAD /ok HTTP/1.1\r\n\r\n"),
    );

    assert_eq!(status_line(&bad), "HTTP/1.1 400");
    assert!(String::from_utf8_lossy(&good).contains("method=HEAD\npath=/ok\n"));
    drop(silent);
}

#[tokio::test]
async fn shutdown_stops_accepting_and_drains() {
    let scripts = scripts();
    let server = start_server(config_for(&scripts.echo)).await;

    let response = roundtrip(server.addr, b"GET / HTTP/1.1\r\n\r\n").await;
    assert_eq!(status_line(&response), "HTTP/1.1 200 OK");

    server.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), server.task)
        .await
        .expect("server did not stop")
        .unwrap();

    // The listening socket is gone once the server has stopped.
    assert!(TcpStream::connect(server.addr).await.is_err());
}
