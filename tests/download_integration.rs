//! Integration tests for streamed downloads.
//!
//! `DownloadStream` blocks on every read, so each test reads it on a blocking
//! thread of a multi-thread runtime.

use std::io::{self, Read};
use std::time::Duration;

use assemblyline_client::{
    AssemblylineClient, ClientError, Credentials, DownloadParams, DownloadStream, Encoding,
};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DOWNLOAD_PATH: &str = "/api/v4/file/download/abc/";

fn client_for(base_url: &str) -> AssemblylineClient {
    let credentials = Credentials::api_key("admin", "devkey").expect("valid credentials");
    AssemblylineClient::new(base_url, credentials).expect("client builds")
}

async fn read_all(mut stream: DownloadStream) -> io::Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let mut content = Vec::new();
        stream.read_to_end(&mut content).map(|_| content)
    })
    .await
    .expect("reader thread panicked")
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_streams_full_content() {
    let server = MockServer::start().await;
    let content: Vec<u8> = (0..200_000_u32)
        .map(|i| u8::try_from(i % 251).expect("below 256"))
        .collect();
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .and(query_param("encoding", "raw"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let params = DownloadParams {
        encoding: Encoding::Raw,
        ..DownloadParams::default()
    };
    let stream = client.download_file("abc", &params).expect("download starts");

    let downloaded = read_all(stream).await.expect("download completes");
    assert_eq!(downloaded, content);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_defaults_to_cart_and_drops_blank_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"CART".to_vec()))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let params = DownloadParams {
        name: Some("sample.exe".to_string()),
        sid: Some("  ".to_string()),
        ..DownloadParams::default()
    };
    let stream = client.download_file("abc", &params).expect("download starts");
    read_all(stream).await.expect("download completes");

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.query(), Some("encoding=cart&name=sample.exe"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_not_found_surfaces_on_read() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "api_error_message": "File not found",
            "api_response": "",
            "api_status_code": 404
        })))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let stream = client
        .download_file("abc", &DownloadParams::default())
        .expect("reader is returned before the request completes");

    let error = read_all(stream).await.expect_err("404 is an error");
    assert_eq!(error.kind(), io::ErrorKind::NotFound);
    let inner = error
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<ClientError>())
        .expect("client error is attached");
    assert_eq!(inner.status(), Some(404));
    assert!(inner.to_string().contains("File not found"), "{inner}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_relogs_in_once_on_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .and(header("cookie", "session=fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v4/auth/login/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "session=fresh; Path=/")
                .set_body_json(json!({"api_response": {"username": "admin"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let stream = client
        .download_file("abc", &DownloadParams::default())
        .expect("download starts");

    assert_eq!(read_all(stream).await.expect("retry succeeds"), b"payload");
    assert_eq!(client.session(), "fresh");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_second_unauthorized_is_permission_denied() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v4/auth/login/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"api_response": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let stream = client
        .download_file("abc", &DownloadParams::default())
        .expect("download starts");

    let error = read_all(stream).await.expect_err("still unauthorized");
    assert_eq!(error.kind(), io::ErrorKind::PermissionDenied);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_truncated_body_is_an_error_not_eof() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut request = [0_u8; 4096];
        let _ = socket.read(&mut request).await;
        // Promise 1000 bytes, deliver 10, hang up.
        let _ = socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 1000\r\n\r\n0123456789")
            .await;
        let _ = socket.shutdown().await;
    });

    let client = client_for(&format!("http://{address}"));
    let stream = client
        .download_file("abc", &DownloadParams::default())
        .expect("download starts");

    let error = read_all(stream).await.expect_err("truncated transfer");
    assert_eq!(error.kind(), io::ErrorKind::ConnectionAborted, "{error}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dropping_reader_closes_the_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    let (closed_tx, closed_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut buffer = [0_u8; 4096];
        let _ = socket.read(&mut buffer).await;
        let _ = socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100000000\r\n\r\nfirst-chunk")
            .await;
        // Wait for the client side to go away.
        loop {
            match socket.read(&mut buffer).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
        let _ = closed_tx.send(());
    });

    let client = client_for(&format!("http://{address}"));
    let mut stream = client
        .download_file("abc", &DownloadParams::default())
        .expect("download starts");

    let first = tokio::task::spawn_blocking(move || {
        let mut buf = [0_u8; 64];
        let n = stream.read(&mut buf).expect("first chunk arrives");
        drop(stream);
        buf[..n].to_vec()
    })
    .await
    .expect("reader thread panicked");
    assert_eq!(first, b"first-chunk");

    tokio::time::timeout(Duration::from_secs(5), closed_rx)
        .await
        .expect("connection closed after the reader was dropped")
        .expect("server task finished");
}

#[tokio::test]
async fn test_download_with_empty_hash_is_usage_error() {
    let client = client_for("http://127.0.0.1:9");
    let err = client
        .download_file("", &DownloadParams::default())
        .expect_err("empty hash");
    assert!(matches!(err, ClientError::Usage { .. }), "{err}");
}

#[test]
fn test_download_outside_runtime_is_usage_error() {
    let client = client_for("http://127.0.0.1:9");
    let err = client
        .download_file("abc", &DownloadParams::default())
        .expect_err("no runtime");
    assert!(matches!(err, ClientError::Usage { .. }), "{err}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_slow_reader_holds_back_the_server() {
    const BODY_LEN: usize = 32 * 1024 * 1024;
    let content: Vec<u8> = (0..BODY_LEN)
        .map(|i| u8::try_from(i % 251).expect("below 256"))
        .collect();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    let body = content.clone();
    let (written_tx, mut written_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut request = [0_u8; 4096];
        let _ = socket.read(&mut request).await;
        let head = format!("HTTP/1.1 200 OK\r\ncontent-length: {BODY_LEN}\r\n\r\n");
        socket.write_all(head.as_bytes()).await.expect("write head");
        socket.write_all(&body).await.expect("write body");
        let _ = written_tx.send(());
    });

    let client = client_for(&format!("http://{address}"));
    let mut stream = client
        .download_file("abc", &DownloadParams::default())
        .expect("download starts");
    let (stream, first) = tokio::task::spawn_blocking(move || {
        let mut first = vec![0_u8; 1024];
        let n = stream.read(&mut first)?;
        first.truncate(n);
        Ok::<_, io::Error>((stream, first))
    })
    .await
    .expect("reader thread panicked")
    .expect("first read");
    assert!(!first.is_empty());

    // With the reader idle the server cannot push the whole body.
    let pending = tokio::time::timeout(Duration::from_millis(500), &mut written_rx).await;
    assert!(pending.is_err(), "server finished writing before the reader caught up");

    let rest = read_all(stream).await.expect("download completes");
    let mut downloaded = first;
    downloaded.extend_from_slice(&rest);
    assert_eq!(downloaded.len(), content.len());
    assert!(downloaded == content, "content differs");
    tokio::time::timeout(Duration::from_secs(10), written_rx)
        .await
        .expect("server write completes")
        .expect("server task reports");
}
