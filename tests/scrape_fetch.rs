// tests/scrape_fetch.rs
// Fetch-path behavior against a local canned HTTP server: every failure mode
// must fold into `fetch_error` instead of panicking or erroring.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use ppc_research_engine::fetch_page;

/// Serve exactly one connection with a canned raw HTTP response.
async fn serve_once(response: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });
    format!("http://{addr}/")
}

#[tokio::test]
async fn ok_html_page_is_parsed() {
    let body = "<html><head><title>ペアリング専門店</title>\
                <meta name=\"description\" content=\"刻印無料のペアリング通販\"></head>\
                <body><h1>ペアリング</h1><p>ステンレス素材のペアリングを販売しています</p></body></html>";
    let response: &'static str = Box::leak(
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
        .into_boxed_str(),
    );
    let url = serve_once(response).await;

    let page = fetch_page(&url, 5_000).await;
    assert!(page.fetch_error.is_none());
    assert_eq!(page.title, "ペアリング専門店");
    assert_eq!(page.h1, "ペアリング");
    assert_eq!(page.meta_description, "刻印無料のペアリング通販");
    assert!(page.word_count > 0);
}

#[tokio::test]
async fn server_error_becomes_fetch_error_with_zero_counts() {
    let url = serve_once(
        "HTTP/1.1 500 Internal Server Error\r\nContent-Type: text/html\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
    )
    .await;

    let page = fetch_page(&url, 5_000).await;
    assert_eq!(page.fetch_error.as_deref(), Some("HTTP 500"));
    assert_eq!(page.word_count, 0);
    assert_eq!(page.external_link_count, 0);
    assert!(page.title.is_empty());
}

#[tokio::test]
async fn non_html_content_type_is_rejected() {
    let url = serve_once(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}",
    )
    .await;

    let page = fetch_page(&url, 5_000).await;
    assert_eq!(page.fetch_error.as_deref(), Some("Not HTML: application/json"));
}

#[tokio::test]
async fn slow_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            let _ = stream.shutdown().await;
        }
    });

    let page = fetch_page(&format!("http://{addr}/"), 200).await;
    assert_eq!(page.fetch_error.as_deref(), Some("Timeout"));
}

#[tokio::test]
async fn invalid_inputs_never_touch_the_network() {
    let page = fetch_page("", 1_000).await;
    assert_eq!(page.fetch_error.as_deref(), Some("URL is empty"));

    let page = fetch_page("ftp://example.com/file", 1_000).await;
    assert_eq!(page.fetch_error.as_deref(), Some("Invalid URL scheme"));

    let page = fetch_page("javascript:alert(1)", 1_000).await;
    assert_eq!(page.fetch_error.as_deref(), Some("Invalid URL scheme"));
}
