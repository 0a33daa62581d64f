//! Shared fixtures for the integration tests

use async_trait::async_trait;
use mediascrape::config::{Config, ExtractorKind, SelectorsConfig, SiteConfig};
use mediascrape::cookies::CookieStore;
use mediascrape::error::{NavigationError, Result, ScrapeError};
use mediascrape::models::PageSnapshot;
use mediascrape::traits::PageDriver;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

pub const ORIGIN: &str = "https://xhs.test";

/// Scripted page: canned HTML per URL and a queue of height readings.
///
/// The last queued height repeats forever; an empty queue makes every
/// measurement fail.
pub struct FakePage {
    pages: HashMap<String, String>,
    heights: Mutex<VecDeque<u64>>,
    current: Mutex<Option<String>>,
    failing_goto: bool,
    never_ready: bool,
    blank_snapshots: AtomicU32,
    pub visits: Mutex<Vec<String>>,
    pub scrolls: AtomicU32,
    pub cookies: Mutex<Option<(usize, String)>>,
}

#[allow(dead_code)]
impl FakePage {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            heights: Mutex::new(VecDeque::from(vec![1000])),
            current: Mutex::new(None),
            failing_goto: false,
            never_ready: false,
            blank_snapshots: AtomicU32::new(0),
            visits: Mutex::new(Vec::new()),
            scrolls: AtomicU32::new(0),
            cookies: Mutex::new(None),
        }
    }

    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), html.into());
        self
    }

    pub fn with_heights(self, heights: Vec<u64>) -> Self {
        *self.heights.lock().unwrap() = heights.into();
        self
    }

    pub fn failing_goto(mut self) -> Self {
        self.failing_goto = true;
        self
    }

    pub fn never_ready(mut self) -> Self {
        self.never_ready = true;
        self
    }

    /// The first `count` snapshots show an empty body, as if the content
    /// were still rendering.
    pub fn rendering_for(self, count: u32) -> Self {
        self.blank_snapshots.store(count, Ordering::SeqCst);
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    pub fn scroll_count(&self) -> u32 {
        self.scrolls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str) -> std::result::Result<(), NavigationError> {
        self.visits.lock().unwrap().push(url.to_string());
        if self.failing_goto {
            return Err(NavigationError::driver("net::ERR_CONNECTION_REFUSED"));
        }
        *self.current.lock().unwrap() = Some(url.to_string());
        Ok(())
    }

    async fn is_ready(&self) -> std::result::Result<bool, NavigationError> {
        Ok(!self.never_ready)
    }

    async fn content_height(&self) -> Result<u64> {
        let mut heights = self.heights.lock().unwrap();
        match heights.len() {
            0 => Err(ScrapeError::browser("target closed")),
            1 => Ok(heights[0]),
            _ => Ok(heights.pop_front().unwrap_or_default()),
        }
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.scrolls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn snapshot(&self) -> Result<PageSnapshot> {
        let current = self
            .current
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| "about:blank".to_string());
        let rendering = self
            .blank_snapshots
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let html = self
            .pages
            .get(&current)
            .filter(|_| !rendering)
            .cloned()
            .unwrap_or_else(|| "<html><body></body></html>".to_string());
        Ok(PageSnapshot::new(Url::parse(&current)?, html))
    }

    async fn set_cookies(&self, cookies: &CookieStore, domain: &str) -> Result<()> {
        *self.cookies.lock().unwrap() = Some((cookies.len(), domain.to_string()));
        Ok(())
    }
}

/// Defaults with every wait and retry delay at zero and output under `root`.
#[allow(dead_code)]
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.navigation.ready_timeout_secs = 5;
    config.navigation.backoff_base_ms = 0;
    config.navigation.backoff_min_ms = 0;
    config.navigation.backoff_max_ms = 0;
    config.navigation.scroll_step_delay_ms = 0;
    config.navigation.ready_poll_ms = 5;
    config.navigation.selector_timeout_ms = 200;
    config.navigation.stabilize_timeout_secs = 30;
    config.download.retry_delay_ms = 0;
    config.download.read_timeout_secs = 5;
    config.download.connect_timeout_secs = 2;
    config.download.show_progress = false;
    config.pacing.post_delay_min_ms = 0;
    config.pacing.post_delay_max_ms = 0;
    config.storage.output_root = root.to_path_buf();
    config.drilldown.origin = ORIGIN.to_string();
    config.drilldown.search_url_template = format!("{}/search?keyword={{}}", ORIGIN);
    config.sites.insert(
        "shop".to_string(),
        SiteConfig {
            name: "Test shop".to_string(),
            url_template: "https://shop.test/search?q={}".to_string(),
            extractor: ExtractorKind::Generic,
            selectors: SelectorsConfig::default(),
            user_agent: None,
            headers: None,
            accept_invalid_certs: false,
        },
    );
    config
}

#[allow(dead_code)]
pub fn html_page(body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>test</title></head><body>{}</body></html>",
        body
    )
}

#[allow(dead_code)]
pub fn jpeg_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.resize(len.max(4), 0x42);
    bytes
}

/// Media server that sends its body in delayed chunks and records the
/// highest number of requests it served at once.
#[allow(dead_code)]
pub struct TrickleServer {
    pub base: String,
    pub peak: Arc<AtomicUsize>,
    pub requests: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl TrickleServer {
    pub async fn start(content_type: &'static str, chunks: usize, chunk_len: usize, delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let served = Arc::new(AtomicUsize::new(0));

        let (peak_out, served_out) = (peak.clone(), served.clone());
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let (active, peak, served) = (active.clone(), peak.clone(), served.clone());
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => head.extend_from_slice(&buf[..n]),
                        }
                    }

                    served.fetch_add(1, Ordering::SeqCst);
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    let header = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        content_type,
                        chunks * chunk_len
                    );
                    let mut ok = socket.write_all(header.as_bytes()).await.is_ok();
                    for _ in 0..chunks {
                        if !ok {
                            break;
                        }
                        tokio::time::sleep(delay).await;
                        ok = socket.write_all(&vec![0x42; chunk_len]).await.is_ok();
                    }
                    active.fetch_sub(1, Ordering::SeqCst);
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self {
            base,
            peak: peak_out,
            requests: served_out,
        }
    }

    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("{}{}", self.base, path)).unwrap()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}
