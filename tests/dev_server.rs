// tests/dev_server.rs

use std::error::Error;
use std::fs;
use std::net::TcpListener as StdListener;
use std::path::Path;
use std::time::Duration;

use sitepipe::pipeline::{ReloadSignal, ReloadSink};
use sitepipe::server::{DevServerHub, ServerSpec, RELOAD_PATH};
use sitepipe_test_utils::{init_tracing, with_timeout};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

type TestResult = Result<(), Box<dyn Error>>;

/// A port that was free a moment ago.
fn free_port() -> Result<u16, Box<dyn Error>> {
    let listener = StdListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

fn site(index: &str) -> Result<TempDir, Box<dyn Error>> {
    let dir = TempDir::new()?;
    fs::write(dir.path().join("index.html"), index)?;
    fs::write(dir.path().join("app.js"), "var a = 1;")?;
    Ok(dir)
}

fn spec(root: &Path, port: u16) -> ServerSpec {
    ServerSpec::new(root, "127.0.0.1", port)
}

// Servers bind inside their own task; retry until the port answers.
async fn connect(port: u16) -> Result<TcpStream, Box<dyn Error>> {
    for _ in 0..100 {
        if let Ok(stream) = TcpStream::connect(("127.0.0.1", port)).await {
            return Ok(stream);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Err(format!("nothing listening on port {port}").into())
}

async fn get(port: u16, path: &str) -> Result<String, Box<dyn Error>> {
    let mut stream = connect(port).await?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Read from `stream` until `needle` shows up in what has arrived so far.
async fn read_until(stream: &mut TcpStream, needle: &str) -> Result<String, Box<dyn Error>> {
    let mut seen = String::new();
    let mut chunk = [0u8; 1024];
    while !seen.contains(needle) {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(format!("stream closed before {needle:?}; got {seen:?}").into());
        }
        seen.push_str(&String::from_utf8_lossy(&chunk[..n]));
    }
    Ok(seen)
}

#[tokio::test]
async fn each_root_is_served_on_its_own_port_with_the_script_injected() -> TestResult {
    init_tracing();
    let main = site("<html><body><h1>main</h1></body></html>")?;
    let docs = site("<html><body><h1>docs</h1></body></html>")?;
    let (main_port, docs_port) = (free_port()?, free_port()?);

    let hub = DevServerHub::start(vec![spec(main.path(), main_port), spec(docs.path(), docs_port)]);

    let page = with_timeout(get(main_port, "/")).await?;
    assert!(page.starts_with("HTTP/1.1 200"), "{page}");
    assert!(page.contains("<h1>main</h1>"));
    assert!(page.contains(RELOAD_PATH), "client script injected: {page}");

    let page = with_timeout(get(docs_port, "/index.html")).await?;
    assert!(page.contains("<h1>docs</h1>"));
    assert!(page.contains(RELOAD_PATH));

    // Non-HTML passes through untouched.
    let script = with_timeout(get(main_port, "/app.js")).await?;
    assert!(script.contains("var a = 1;"));
    assert!(!script.contains(RELOAD_PATH));

    with_timeout(hub.shutdown()).await;
    Ok(())
}

#[tokio::test]
async fn port_in_use_only_loses_that_server() -> TestResult {
    init_tracing();
    let taken_root = site("<p>taken</p>")?;
    let free_root = site("<p>free</p>")?;

    let occupied = StdListener::bind("127.0.0.1:0")?;
    let taken_port = occupied.local_addr()?.port();
    let free = free_port()?;

    let hub = DevServerHub::start(vec![spec(taken_root.path(), taken_port), spec(free_root.path(), free)]);

    let page = with_timeout(get(free, "/")).await?;
    assert!(page.contains("<p>free</p>"));

    with_timeout(hub.shutdown()).await;
    drop(occupied);
    Ok(())
}

#[tokio::test]
async fn reload_reaches_connected_clients_of_the_changed_root() -> TestResult {
    init_tracing();
    let main = site("<p>main</p>")?;
    let port = free_port()?;
    let hub = DevServerHub::start(vec![spec(main.path(), port)]);

    let mut events = connect(port).await?;
    let request =
        format!("GET {RELOAD_PATH} HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n");
    events.write_all(request.as_bytes()).await?;
    // The client is subscribed once the response head is out.
    let head = with_timeout(read_until(&mut events, "\r\n\r\n")).await?;
    assert!(head.contains("text/event-stream"), "{head}");

    // A change under another root is not this client's business.
    hub.reload(ReloadSignal::Paths(vec!["/elsewhere/index.html".into()]));
    hub.reload(ReloadSignal::Paths(vec![main.path().join("index.html")]));

    let body = with_timeout(read_until(&mut events, "event: reload")).await?;
    assert_eq!(body.matches("event: reload").count(), 1, "{body}");

    drop(events);
    with_timeout(hub.shutdown()).await;
    Ok(())
}
