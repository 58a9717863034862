//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use reqexec::config::GatewayConfig;
use reqexec::net::listener::Listener;
use reqexec::{HttpServer, Shutdown};

/// Handler scripts used by the tests.
pub struct Scripts {
    _dir: tempfile::TempDir,
    /// Prints method, path, body and raw headers.
    pub echo: PathBuf,
    /// Streams stdin back as the response body.
    pub cat: PathBuf,
    /// Never answers.
    pub stall: PathBuf,
}

const ECHO: &str = r#"#!/bin/sh
printf 'HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\n'
printf 'method=%s\npath=%s\n' "$1" "$2"
if [ -z "${REQBODY+x}" ]; then
    printf 'body unset\n'
else
    printf 'body=%s\n' "$REQBODY"
fi
printf '%s' "$REQHEADERS"
"#;

const CAT: &str = "#!/bin/sh\nprintf 'HTTP/1.1 200 OK\\r\\n\\r\\n'\nexec cat\n";

const STALL: &str = "#!/bin/sh\nexec sleep 30\n";

/// Write the handler scripts once per test binary.
///
/// Every test calls this before spawning anything, so no script is still
/// open for writing while another test forks a handler.
pub fn scripts() -> &'static Scripts {
    static SCRIPTS: OnceLock<Scripts> = OnceLock::new();
    SCRIPTS.get_or_init(|| {
        let dir = tempfile::Builder::new()
            .prefix("reqexec-handlers")
            .tempdir_in(env!("CARGO_TARGET_TMPDIR"))
            .unwrap();
        let echo = write_script(dir.path(), "echo.sh", ECHO);
        let cat = write_script(dir.path(), "cat.sh", CAT);
        let stall = write_script(dir.path(), "stall.sh", STALL);
        Scripts {
            _dir: dir,
            echo,
            cat,
            stall,
        }
    })
}

fn write_script(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Configuration for a test server running `handler`.
pub fn config_for(handler: &Path) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1".into();
    config.handler.program = handler.to_path_buf();
    config.timeouts.idle_secs = 5;
    config.timeouts.deadline_secs = 10;
    config
}

/// A running server on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub task: JoinHandle<()>,
}

pub async fn start_server(config: GatewayConfig) -> TestServer {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_tcp(tcp, 64);

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestServer {
        addr,
        shutdown,
        task,
    }
}

/// Send `request`, close our sending side, and collect the full response.
pub async fn roundtrip(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(request).await.unwrap();
    client.shutdown().await.unwrap();
    read_all(&mut client).await
}

/// Read until the server closes, failing the test after 10 seconds.
pub async fn read_all(client: &mut TcpStream) -> Vec<u8> {
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), client.read_to_end(&mut response))
        .await
        .expect("server did not close the connection")
        .unwrap();
    response
}

/// Status line of a response.
pub fn status_line(response: &[u8]) -> String {
    String::from_utf8_lossy(response)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Everything after the response head.
pub fn response_body(response: &[u8]) -> &[u8] {
    let end = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has no header terminator");
    &response[end + 4..]
}
