use super::dynamic_links::{stat, StatArgs};
use super::pubsub::{pull_message, send_dummy, PullMessageArgs, SendDummyArgs};
use super::*;
use crate::dynamic_links::DynamicLinks;
use crate::pubsub::PubSub;
use crate::urlshortener::UrlShortener;
use clap::CommandFactory;
use httpmock::prelude::*;
use reqwest::Client;
use reqwest_middleware::ClientBuilder;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn plain_client() -> reqwest_middleware::ClientWithMiddleware {
    ClientBuilder::new(Client::new()).build()
}

/// Counts requests that leave the client.
#[derive(Clone, Default)]
struct RequestCounter(Arc<AtomicUsize>);

#[async_trait::async_trait]
impl reqwest_middleware::Middleware for RequestCounter {
    async fn handle(
        &self,
        req: reqwest::Request,
        extensions: &mut http::Extensions,
        next: reqwest_middleware::Next<'_>,
    ) -> reqwest_middleware::Result<reqwest::Response> {
        self.0.fetch_add(1, Ordering::SeqCst);
        next.run(req, extensions).await
    }
}

/// A stdout whose reader has gone away.
struct ClosedPipe;

impl io::Write for ClosedPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn stat_args(urls: &[&str]) -> StatArgs {
    StatArgs {
        duration: 10,
        file: None,
        parallelism: 2,
        output: OutputFormat::Json,
        urls: urls.iter().map(|u| u.to_string()).collect(),
    }
}

fn temp_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("gapi-{}-{}", std::process::id(), name));
    std::fs::write(&path, contents).unwrap();
    path
}

async fn mock_link_stats(server: &MockServer, code: &str, platform: &str, count: &str) {
    let pattern = format!(r"^/v1/https:(%2F|/)(%2F|/)example\.app\.goo\.gl(%2F|/){}/linkStats$", code);
    let body = json!({
        "linkEventStats": [
            { "platform": platform, "count": count, "event": "CLICK" }
        ]
    });
    server
        .mock_async(move |when, then| {
            when.method(GET).path_matches(pattern.as_str());
            then.status(200)
                .header("content-type", "application/json")
                .json_body(body);
        })
        .await;
}

#[test]
fn test_descriptor_names_match_cli() {
    let cli = crate::cli::Cli::command();
    let subcommands: HashSet<&str> = cli
        .get_subcommands()
        .map(|c| c.get_name())
        .filter(|name| *name != "help")
        .collect();
    let described: HashSet<&str> = names().into_iter().collect();

    assert_eq!(described.len(), DESCRIPTORS.len());
    assert_eq!(subcommands, described);
}

#[test]
fn test_find_descriptor() {
    assert_eq!(find("pubsub").unwrap().scope, crate::pubsub::PUBSUB_SCOPE);
    assert_eq!(
        find("firebase-dynamiclinks").unwrap().scope,
        crate::dynamic_links::FIREBASE_SCOPE
    );
    assert!(find("storage").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stat_prints_one_json_line_per_link() {
    let server = MockServer::start_async().await;
    let links = DynamicLinks::new_with_client(plain_client(), server.url("/v1"));
    mock_link_stats(&server, "one", "ANDROID", "3").await;
    mock_link_stats(&server, "two", "IOS", "5").await;

    let mut out = Vec::new();
    stat(
        &links,
        stat_args(&["https://example.app.goo.gl/one", "https://example.app.goo.gl/two"]),
        &mut out,
    )
    .await
    .unwrap();

    let lines: Vec<Value> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);

    let urls: HashSet<&str> = lines.iter().map(|l| l["url"].as_str().unwrap()).collect();
    assert!(urls.contains("https://example.app.goo.gl/one"));
    assert!(urls.contains("https://example.app.goo.gl/two"));

    let two = lines
        .iter()
        .find(|l| l["url"] == "https://example.app.goo.gl/two")
        .unwrap();
    assert_eq!(two["events"][0]["platform"], "IOS");
    assert_eq!(two["events"][0]["count"], "5");
}

#[tokio::test]
async fn test_stat_text_output() {
    let server = MockServer::start_async().await;
    let links = DynamicLinks::new_with_client(plain_client(), server.url("/v1"));
    mock_link_stats(&server, "one", "ANDROID", "3").await;

    let mut args = stat_args(&["https://example.app.goo.gl/one"]);
    args.output = OutputFormat::Text;

    let mut out = Vec::new();
    stat(&links, args, &mut out).await.unwrap();

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "https://example.app.goo.gl/one\tANDROID\tCLICK\t3\n"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stat_reads_links_from_file() {
    let server = MockServer::start_async().await;
    let links = DynamicLinks::new_with_client(plain_client(), server.url("/v1"));
    mock_link_stats(&server, "one", "ANDROID", "3").await;
    mock_link_stats(&server, "two", "IOS", "5").await;
    mock_link_stats(&server, "three", "WEB", "8").await;

    let path = temp_file(
        "links.txt",
        "https://example.app.goo.gl/one\nhttps://example.app.goo.gl/two\n\n  https://example.app.goo.gl/three  \r\n",
    );
    let mut args = stat_args(&[]);
    args.file = Some(path.clone());

    let mut out = Vec::new();
    stat(&links, args, &mut out).await.unwrap();
    std::fs::remove_file(&path).ok();

    let urls: HashSet<String> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str::<Value>(l).unwrap()["url"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(urls.len(), 3);
    assert!(urls.contains("https://example.app.goo.gl/three"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stat_passes_non_utf8_lines_through() {
    let server = MockServer::start_async().await;
    let links = DynamicLinks::new_with_client(plain_client(), server.url("/v1"));
    server
        .mock_async(|when, then| {
            when.method(GET).path_matches(r"/linkStats$");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "linkEventStats": [] }));
        })
        .await;

    let path = std::env::temp_dir().join(format!("gapi-{}-binary-links.txt", std::process::id()));
    std::fs::write(&path, b"https://example.app.goo.gl/one\nhttps://example.app.goo.gl/\xff\xfe\n").unwrap();
    let mut args = stat_args(&[]);
    args.file = Some(path.clone());

    let mut out = Vec::new();
    stat(&links, args, &mut out).await.unwrap();
    std::fs::remove_file(&path).ok();

    let urls: HashSet<String> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str::<Value>(l).unwrap()["url"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(urls.len(), 2);
    assert!(urls.contains("https://example.app.goo.gl/\u{fffd}\u{fffd}"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stat_write_failure_stops_fetching() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path_matches(r"/linkStats$");
            then.status(200)
                .delay(Duration::from_millis(50))
                .header("content-type", "application/json")
                .json_body(json!({ "linkEventStats": [] }));
        })
        .await;

    let counter = RequestCounter::default();
    let client = ClientBuilder::new(Client::new()).with(counter.clone()).build();
    let links = DynamicLinks::new_with_client(client, server.url("/v1"));

    let contents: String = (0..40)
        .map(|i| format!("https://example.app.goo.gl/link{}\n", i))
        .collect();
    let path = temp_file("many-links.txt", &contents);
    let mut args = stat_args(&[]);
    args.file = Some(path.clone());
    args.parallelism = 2;

    let err = stat(&links, args, &mut ClosedPipe).await.unwrap_err();
    std::fs::remove_file(&path).ok();

    assert_eq!(err.to_string(), "Failed to write output");
    let calls = counter.0.load(Ordering::SeqCst);
    assert!(calls <= 4, "{} requests sent after output closed", calls);
}

#[tokio::test]
async fn test_stat_missing_file_is_an_error() {
    let links = DynamicLinks::new_with_client(plain_client(), "http://127.0.0.1:9/v1".to_string());
    let mut args = stat_args(&[]);
    args.file = Some(PathBuf::from("/nonexistent/gapi-links.txt"));

    let err = stat(&links, args, &mut Vec::new()).await.unwrap_err();
    assert!(err.to_string().starts_with("Failed to open"));
}

#[tokio::test]
async fn test_stat_fails_on_first_api_error() {
    let server = MockServer::start_async().await;
    let links = DynamicLinks::new_with_client(plain_client(), server.url("/v1"));
    server
        .mock_async(|when, then| {
            when.method(GET).path_matches(r"broken/linkStats$");
            then.status(500)
                .header("content-type", "application/json")
                .json_body(json!({ "error": { "code": 500, "message": "backend error" } }));
        })
        .await;

    let mut args = stat_args(&["https://example.app.goo.gl/broken"]);
    args.parallelism = 1;

    let err = stat(&links, args, &mut Vec::new()).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to get link stats for https://example.app.goo.gl/broken"
    );
    assert!(format!("{:#}", err).contains("backend error"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_send_dummy_publishes_count_messages() {
    let server = MockServer::start_async().await;
    let pubsub = PubSub::new_with_client(plain_client(), server.url("/v1"), Some("test-project".to_string()));

    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/projects/test-project/topics/dummy:publish");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "messageIds": ["1"] }));
        })
        .await;

    let summary = send_dummy(
        &pubsub,
        SendDummyArgs {
            parallel: 3,
            count: 10,
            topic: "dummy".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(summary.completed, 10);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_send_dummy_reports_publish_failure() {
    let server = MockServer::start_async().await;
    let pubsub = PubSub::new_with_client(plain_client(), server.url("/v1"), Some("test-project".to_string()));

    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/projects/test-project/topics/dummy:publish");
            then.status(403)
                .header("content-type", "application/json")
                .json_body(json!({ "error": { "code": 403, "message": "forbidden" } }));
        })
        .await;

    let err = send_dummy(
        &pubsub,
        SendDummyArgs {
            parallel: 1,
            count: 5,
            topic: "dummy".to_string(),
        },
    )
    .await
    .unwrap_err();

    assert_eq!(err.to_string(), "Failed to publish to dummy");
}

#[tokio::test]
async fn test_pull_message_prints_payload_and_survives_ack_failure() {
    let server = MockServer::start_async().await;
    let pubsub = PubSub::new_with_client(plain_client(), server.url("/v1"), Some("test-project".to_string()));

    let pull = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/projects/test-project/subscriptions/sub:pull")
                .json_body(json!({ "returnImmediately": false, "maxMessages": 1 }));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "receivedMessages": [
                        { "ackId": "ack-1", "message": { "data": "aGVsbG8=", "messageId": "1" } }
                    ]
                }));
        })
        .await;
    let ack = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/projects/test-project/subscriptions/sub:acknowledge")
                .json_body(json!({ "ackIds": ["ack-1"] }));
            then.status(500);
        })
        .await;

    let mut out = Vec::new();
    pull_message(
        &pubsub,
        PullMessageArgs {
            subscription: "sub".to_string(),
            max_loops: Some(1),
        },
        &mut out,
    )
    .await
    .unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "hello\n");
    pull.assert_async().await;
    ack.assert_async().await;
}

#[tokio::test]
async fn test_pull_message_failure_is_fatal() {
    let server = MockServer::start_async().await;
    let pubsub = PubSub::new_with_client(plain_client(), server.url("/v1"), Some("test-project".to_string()));

    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/projects/test-project/subscriptions/sub:pull");
            then.status(404)
                .header("content-type", "application/json")
                .json_body(json!({ "error": { "code": 404, "message": "Resource not found" } }));
        })
        .await;

    let err = pull_message(
        &pubsub,
        PullMessageArgs {
            subscription: "sub".to_string(),
            max_loops: None,
        },
        &mut Vec::new(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.to_string(), "Failed to pull from sub");
}

#[tokio::test]
async fn test_urlshortener_insert_prints_mapping() {
    let server = MockServer::start_async().await;
    let shortener = UrlShortener::new_with_client(plain_client(), server.url("/urlshortener/v1"));

    server
        .mock_async(|when, then| {
            when.method(POST).path("/urlshortener/v1/url");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "id": "http://goo.gl/abc", "longUrl": "http://example.com/long" }));
        })
        .await;

    let mut out = Vec::new();
    urlshortener::run(
        urlshortener::UrlShortenerCommand::Insert {
            long_url: "http://example.com/long".to_string(),
        },
        &shortener,
        &mut out,
    )
    .await
    .unwrap();

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "Shortened http://example.com/long => http://goo.gl/abc\n"
    );
}

#[tokio::test]
async fn test_urlshortener_get_prints_json() {
    let server = MockServer::start_async().await;
    let shortener = UrlShortener::new_with_client(plain_client(), server.url("/urlshortener/v1"));

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/urlshortener/v1/url")
                .query_param("shortUrl", "http://goo.gl/abc");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "id": "http://goo.gl/abc", "longUrl": "http://example.com/long", "status": "OK" }));
        })
        .await;

    let mut out = Vec::new();
    urlshortener::run(
        urlshortener::UrlShortenerCommand::Get {
            short_url: "http://goo.gl/abc".to_string(),
        },
        &shortener,
        &mut out,
    )
    .await
    .unwrap();

    let printed = String::from_utf8(out).unwrap();
    assert_eq!(printed.lines().count(), 1);
    let printed: Value = serde_json::from_str(&printed).unwrap();
    assert_eq!(printed["longUrl"], "http://example.com/long");
    assert_eq!(printed["status"], "OK");
}
