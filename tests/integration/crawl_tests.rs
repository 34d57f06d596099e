//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end. Rendering, OCR and PDF engines are
//! replaced by test doubles, and every wait goes through a recording sleeper.

use async_trait::async_trait;
use site_corpus::config::{
    ChunkingConfig, Config, CrawlerConfig, EscalationConfig, OutputConfig, RemoteStoreConfig,
    UserAgentConfig,
};
use site_corpus::crawler::{Coordinator, Sleeper};
use site_corpus::escalation::{DocumentTextExtractor, Escalation, Renderer, TextRecognizer};
use site_corpus::state::DropReason;
use site_corpus::storage::{PageRecord, PageSource};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Records requested sleeps without waiting
#[derive(Default)]
struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    fn recorded(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Call counters shared between a test and its renderer double
#[derive(Default)]
struct RendererCalls {
    renders: AtomicU32,
    screenshots: AtomicU32,
    closes: AtomicU32,
}

/// Renderer double returning canned markup and screenshot bytes
struct CountingRenderer {
    calls: Arc<RendererCalls>,
    html: Option<String>,
    image: Option<Vec<u8>>,
}

#[async_trait]
impl Renderer for CountingRenderer {
    async fn render(&self, _url: &str) -> Option<String> {
        self.calls.renders.fetch_add(1, Ordering::SeqCst);
        self.html.clone()
    }

    async fn screenshot(&self, _url: &str, _selector: &str) -> Option<Vec<u8>> {
        self.calls.screenshots.fetch_add(1, Ordering::SeqCst);
        self.image.clone()
    }

    async fn close(&self) {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// "Recognizes" the bytes as UTF-8 text
struct EchoRecognizer;

#[async_trait]
impl TextRecognizer for EchoRecognizer {
    async fn recognize(&self, image: &[u8]) -> String {
        String::from_utf8_lossy(image).to_string()
    }
}

/// "Extracts" the bytes as UTF-8 text
struct EchoExtractor;

#[async_trait]
impl DocumentTextExtractor for EchoExtractor {
    async fn extract_text(&self, pdf: &[u8]) -> String {
        String::from_utf8_lossy(pdf).to_string()
    }
}

fn create_escalation(html: Option<String>, image: Option<Vec<u8>>) -> (Escalation, Arc<RendererCalls>) {
    let calls = Arc::new(RendererCalls::default());
    let escalation = Escalation {
        renderer: Box::new(CountingRenderer {
            calls: Arc::clone(&calls),
            html,
            image,
        }),
        recognizer: Arc::new(EchoRecognizer),
        documents: Box::new(EchoExtractor),
    };
    (escalation, calls)
}

/// Creates a test configuration crawling the mock server
fn create_test_config(base_url: &str, corpus_path: &Path, max_pages: u32, max_depth: u32) -> Config {
    Config {
        crawler: CrawlerConfig {
            seeds: vec![format!("{}/", base_url)],
            allowed_domains: vec!["127.0.0.1".to_string()],
            max_pages,
            max_depth,
            crawl_delay_ms: 0,
            debug: false,
            respect_robots_txt: false,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.edu/crawler".to_string(),
        },
        output: OutputConfig {
            corpus_path: corpus_path.display().to_string(),
        },
        escalation: EscalationConfig::default(),
        remote_store: None,
        chunking: ChunkingConfig::default(),
    }
}

fn long_text() -> String {
    "Tuition and fees for the academic year are listed on this page. ".repeat(5)
}

/// A static page with plenty of text and the given links
fn html_page(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">link</a>"#, href))
        .collect();
    format!(
        "<html><head><title>{}</title></head><body><p>{}</p>{}</body></html>",
        title,
        long_text(),
        anchors
    )
}

/// A client-side rendered shell with no readable text
fn spa_shell() -> String {
    r#"<html><head><title>App</title></head><body><div id="root"></div><noscript>Enable JavaScript</noscript></body></html>"#.to_string()
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    mount_raw(server, route, body.into_bytes(), "text/html").await;
}

async fn mount_raw(server: &MockServer, route: &str, body: Vec<u8>, mime: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, mime))
        .mount(server)
        .await;
}

fn read_records(path: &Path) -> Vec<PageRecord> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("corpus line should be a record"))
        .collect()
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.jsonl");

    mount_page(
        &server,
        "/",
        html_page(
            "Home",
            &["/page1", "/page2", "http://other.test/page", "/page1#fees"],
        ),
    )
    .await;
    mount_page(&server, "/page1", html_page("Page 1", &["/page3"])).await;
    mount_page(&server, "/page2", html_page("Page 2", &["/"])).await;
    Mock::given(method("GET"))
        .and(path("/page3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let (escalation, calls) = create_escalation(None, None);
    let config = create_test_config(&base, &corpus, 10, 1);
    let mut coordinator = Coordinator::with_capabilities(config, escalation, sleeper.clone())
        .expect("Failed to create coordinator");

    let summary = coordinator.run().await.expect("Crawl failed");

    assert_eq!(summary.stored, 3);
    assert_eq!(summary.dequeued, 3);
    assert_eq!(summary.total_dropped(), 0);
    assert_eq!(coordinator.store().len(), 3);

    let records = read_records(&corpus);
    let urls: Vec<_> = records.iter().map(|r| r.url.clone()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/", base),
            format!("{}/page1", base),
            format!("{}/page2", base),
        ]
    );
    assert_eq!(records[0].title, "Home");
    assert_eq!(records[0].source, PageSource::Fetch);
    assert!(records[0].html.is_some());

    // Leading delay per fetch plus one politeness delay per item
    assert_eq!(sleeper.recorded().len(), 6);
    assert_eq!(calls.renders.load(Ordering::SeqCst), 0);
    assert_eq!(calls.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_page_budget_stops_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.jsonl");

    let links = ["/a", "/b", "/c", "/d", "/e"];
    mount_page(&server, "/", html_page("Home", &links)).await;
    for link in links {
        mount_page(&server, link, html_page(link, &[])).await;
    }

    let (escalation, _) = create_escalation(None, None);
    let config = create_test_config(&base, &corpus, 2, 3);
    let mut coordinator =
        Coordinator::with_capabilities(config, escalation, Arc::new(RecordingSleeper::default()))
            .unwrap();

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.stored, 2);
    assert_eq!(summary.dequeued, 2);
    assert_eq!(read_records(&corpus).len(), 2);
}

#[tokio::test]
async fn test_unsupported_and_failed_items_do_not_stop_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.jsonl");

    mount_page(
        &server,
        "/",
        html_page("Home", &["/data.json", "/missing", "/ok"]),
    )
    .await;
    mount_raw(
        &server,
        "/data.json",
        br#"{"fees": 100}"#.to_vec(),
        "application/json",
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/ok", html_page("OK", &[])).await;

    let (escalation, _) = create_escalation(None, None);
    let config = create_test_config(&base, &corpus, 10, 1);
    let mut coordinator =
        Coordinator::with_capabilities(config, escalation, Arc::new(RecordingSleeper::default()))
            .unwrap();

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.stored, 2);
    assert_eq!(summary.drops(DropReason::UnsupportedContent), 1);
    assert_eq!(summary.drops(DropReason::FetchFailed), 1);

    let records = read_records(&corpus);
    assert!(records.iter().all(|r| !r.url.ends_with("/data.json")));
}

#[tokio::test]
async fn test_retry_after_server_error() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.jsonl");

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html_page("Home", &[]), "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let (escalation, _) = create_escalation(None, None);
    let config = create_test_config(&base, &corpus, 10, 1);
    let mut coordinator =
        Coordinator::with_capabilities(config, escalation, Arc::new(RecordingSleeper::default()))
            .unwrap();

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.stored, 1);
    assert_eq!(summary.drops(DropReason::FetchFailed), 0);
}

#[tokio::test]
async fn test_stored_seed_is_not_recrawled() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.jsonl");

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html_page("Home", &[]), "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    for _ in 0..2 {
        let (escalation, _) = create_escalation(None, None);
        let config = create_test_config(&base, &corpus, 10, 1);
        let mut coordinator = Coordinator::with_capabilities(
            config,
            escalation,
            Arc::new(RecordingSleeper::default()),
        )
        .unwrap();
        coordinator.run().await.unwrap();
    }

    assert_eq!(read_records(&corpus).len(), 1);
}

#[tokio::test]
async fn test_canonical_url_replaces_page_url() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.jsonl");

    let body = format!(
        r#"<html><head><title>Home</title><link rel="canonical" href="/home"></head><body><p>{}</p></body></html>"#,
        long_text()
    );
    mount_page(&server, "/", body).await;

    let (escalation, _) = create_escalation(None, None);
    let config = create_test_config(&base, &corpus, 10, 1);
    let mut coordinator =
        Coordinator::with_capabilities(config, escalation, Arc::new(RecordingSleeper::default()))
            .unwrap();
    coordinator.run().await.unwrap();

    let records = read_records(&corpus);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].url, format!("{}/home", base));
}

#[tokio::test]
async fn test_sparse_page_is_rendered() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.jsonl");

    mount_page(&server, "/", spa_shell()).await;

    let rendered = html_page("Rendered Programs", &[]);
    let (escalation, calls) = create_escalation(Some(rendered.clone()), None);
    let config = create_test_config(&base, &corpus, 10, 1);
    let mut coordinator =
        Coordinator::with_capabilities(config, escalation, Arc::new(RecordingSleeper::default()))
            .unwrap();

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.stored, 1);
    assert_eq!(summary.renders_used, 1);
    assert_eq!(summary.screenshots_used, 0);
    assert_eq!(calls.renders.load(Ordering::SeqCst), 1);
    assert_eq!(calls.closes.load(Ordering::SeqCst), 1);

    let records = read_records(&corpus);
    assert_eq!(records[0].source, PageSource::Rendered);
    assert_eq!(records[0].title, "Rendered Programs");
    assert_eq!(records[0].text, long_text().trim());
    assert_eq!(records[0].html.as_deref(), Some(rendered.as_str()));
}

#[tokio::test]
async fn test_render_budget_is_never_exceeded() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.jsonl");

    mount_page(&server, "/", spa_shell()).await;
    mount_page(&server, "/next", spa_shell()).await;

    // Rendered markup is the only place the second page is linked from
    let (escalation, calls) = create_escalation(Some(html_page("Rendered", &["/next"])), None);
    let mut config = create_test_config(&base, &corpus, 10, 2);
    config.escalation.render_budget = 1;
    let mut coordinator =
        Coordinator::with_capabilities(config, escalation, Arc::new(RecordingSleeper::default()))
            .unwrap();

    let summary = coordinator.run().await.unwrap();

    assert_eq!(calls.renders.load(Ordering::SeqCst), 1);
    assert_eq!(summary.renders_used, 1);
    assert_eq!(summary.stored, 1);
    assert_eq!(summary.drops(DropReason::TextTooShort), 1);
    // The unrendered shell has no text, so its selector screenshot is tried
    assert_eq!(calls.screenshots.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_screenshot_ocr_rescues_sparse_page() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.jsonl");

    let static_text = "x".repeat(100);
    mount_page(
        &server,
        "/",
        format!(
            "<html><head><title>Fees</title></head><body><p>{}</p><table></table></body></html>",
            static_text
        ),
    )
    .await;

    let ocr_text = "Tuition per credit hour: 350 USD. Mandatory fees: 120 USD per term.";
    let (escalation, calls) = create_escalation(None, Some(ocr_text.as_bytes().to_vec()));
    let config = create_test_config(&base, &corpus, 10, 1);
    let mut coordinator =
        Coordinator::with_capabilities(config, escalation, Arc::new(RecordingSleeper::default()))
            .unwrap();

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.stored, 1);
    assert_eq!(summary.screenshots_used, 1);
    assert_eq!(calls.renders.load(Ordering::SeqCst), 0);

    let records = read_records(&corpus);
    assert_eq!(records[0].text, format!("{}\n{}", static_text, ocr_text));
    assert_eq!(records[0].source, PageSource::Fetch);
}

#[tokio::test]
async fn test_short_ocr_text_is_ignored() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.jsonl");

    mount_page(
        &server,
        "/",
        format!("<html><body><p>{}</p></body></html>", "x".repeat(100)),
    )
    .await;

    // Exactly 50 chars is not enough to be appended
    let (escalation, _) = create_escalation(None, Some("y".repeat(50).into_bytes()));
    let config = create_test_config(&base, &corpus, 10, 1);
    let mut coordinator =
        Coordinator::with_capabilities(config, escalation, Arc::new(RecordingSleeper::default()))
            .unwrap();

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.stored, 0);
    assert_eq!(summary.drops(DropReason::TextTooShort), 1);
}

#[tokio::test]
async fn test_length_gate_boundaries() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.jsonl");

    mount_page(
        &server,
        "/",
        html_page(
            "Home",
            &[
                "/exact.pdf",
                "/short.pdf",
                "/exact.png",
                "/short.png",
                "/exact-page",
                "/short-page",
            ],
        ),
    )
    .await;
    mount_raw(&server, "/exact.pdf", "p".repeat(30).into_bytes(), "application/pdf").await;
    mount_raw(&server, "/short.pdf", "p".repeat(29).into_bytes(), "application/pdf").await;
    mount_raw(&server, "/exact.png", "i".repeat(120).into_bytes(), "image/png").await;
    mount_raw(&server, "/short.png", "i".repeat(119).into_bytes(), "image/png").await;
    mount_page(
        &server,
        "/exact-page",
        format!("<html><body><p>{}</p></body></html>", "h".repeat(120)),
    )
    .await;
    mount_page(
        &server,
        "/short-page",
        format!("<html><body><p>{}</p></body></html>", "h".repeat(119)),
    )
    .await;

    let (escalation, _) = create_escalation(None, None);
    let config = create_test_config(&base, &corpus, 20, 1);
    let mut coordinator =
        Coordinator::with_capabilities(config, escalation, Arc::new(RecordingSleeper::default()))
            .unwrap();

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.stored, 4);
    assert_eq!(summary.drops(DropReason::TextTooShort), 3);

    let records = read_records(&corpus);
    let pdf = records
        .iter()
        .find(|r| r.url.ends_with("/exact.pdf"))
        .expect("PDF at the boundary should be stored");
    assert_eq!(pdf.source, PageSource::Crawl);
    assert_eq!(pdf.title, pdf.url);
    assert_eq!(pdf.html, None);

    let image = records
        .iter()
        .find(|r| r.url.ends_with("/exact.png"))
        .expect("image at the boundary should be stored");
    assert_eq!(image.source, PageSource::Crawl);

    assert!(records.iter().any(|r| r.url.ends_with("/exact-page")));
    assert!(!records.iter().any(|r| r.url.contains("/short")));
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.jsonl");

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "User-agent: *\nDisallow: /private\nCrawl-delay: 2\n",
        ))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/", html_page("Home", &["/private/page", "/public"])).await;
    mount_page(&server, "/public", html_page("Public", &[])).await;
    Mock::given(method("GET"))
        .and(path("/private/page"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let (escalation, _) = create_escalation(None, None);
    let mut config = create_test_config(&base, &corpus, 10, 1);
    config.crawler.respect_robots_txt = true;
    let mut coordinator =
        Coordinator::with_capabilities(config, escalation, sleeper.clone()).unwrap();

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.stored, 2);
    assert_eq!(summary.drops(DropReason::RobotsDenied), 1);

    // Every item waits at least the robots crawl-delay
    let long_waits = sleeper
        .recorded()
        .into_iter()
        .filter(|d| *d >= Duration::from_secs(2))
        .count();
    assert_eq!(long_waits, 3);
}

#[tokio::test]
async fn test_records_published_to_remote_store() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.jsonl");

    mount_page(&server, "/", html_page("Home", &[])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/pages"))
        .and(header("apikey", "integration-key"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    std::env::set_var("SITE_CORPUS_IT_REMOTE_KEY", "integration-key");
    let (escalation, _) = create_escalation(None, None);
    let mut config = create_test_config(&base, &corpus, 10, 1);
    config.remote_store = Some(RemoteStoreConfig {
        url: base.clone(),
        table: "pages".to_string(),
        chunk_table: "chunks".to_string(),
        service_key_env: "SITE_CORPUS_IT_REMOTE_KEY".to_string(),
    });
    let mut coordinator =
        Coordinator::with_capabilities(config, escalation, Arc::new(RecordingSleeper::default()))
            .unwrap();

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.stored, 1);
    assert_eq!(read_records(&corpus).len(), 1);
}

#[tokio::test]
async fn test_missing_remote_key_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.jsonl");

    let mut config = create_test_config("http://127.0.0.1:9", &corpus, 10, 1);
    config.remote_store = Some(RemoteStoreConfig {
        url: "http://127.0.0.1:9".to_string(),
        table: "pages".to_string(),
        chunk_table: "chunks".to_string(),
        service_key_env: "SITE_CORPUS_IT_UNSET_KEY".to_string(),
    });

    let (escalation, _) = create_escalation(None, None);
    let result =
        Coordinator::with_capabilities(config, escalation, Arc::new(RecordingSleeper::default()));

    assert!(matches!(
        result,
        Err(site_corpus::CrawlError::Config(
            site_corpus::ConfigError::MissingEnv(_)
        ))
    ));
}

#[tokio::test]
async fn test_budget_halts_before_remaining_link() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.jsonl");

    mount_page(
        &server,
        "/",
        html_page("Home", &["/first", "/second", "https://www.example.com/"]),
    )
    .await;
    mount_page(&server, "/first", html_page("First", &[])).await;
    Mock::given(method("GET"))
        .and(path("/second"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (escalation, _) = create_escalation(None, None);
    let config = create_test_config(&base, &corpus, 2, 1);
    let mut coordinator =
        Coordinator::with_capabilities(config, escalation, Arc::new(RecordingSleeper::default()))
            .unwrap();

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.stored, 2);
    assert_eq!(summary.links_enqueued, 2);

    let urls: Vec<_> = read_records(&corpus).into_iter().map(|r| r.url).collect();
    assert_eq!(urls, vec![format!("{}/", base), format!("{}/first", base)]);
}
