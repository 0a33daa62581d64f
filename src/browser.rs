use crate::config::NavigationConfig;
use crate::cookies::CookieStore;
use crate::error::{NavigationError, Result, ScrapeError};
use crate::models::PageSnapshot;
use crate::traits::PageDriver;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use url::Url;

const READY_SCRIPT: &str = "document.readyState !== 'loading' && document.body !== null";
const HEIGHT_SCRIPT: &str = "document.body ? document.body.scrollHeight : 0";
const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight)";

/// A headless Chrome instance with a single working tab.
pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
}

impl ChromeSession {
    pub async fn launch(config: &NavigationConfig, user_agent: &str) -> Result<Self> {
        info!("Launching browser");

        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_secs(config.ready_timeout_secs))
            .window_size(1920, 1080)
            .no_sandbox()
            .arg(format!("--user-agent={}", user_agent))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-notifications")
            .arg("--no-first-run")
            .arg("--mute-audio");
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &config.chrome_executable {
            builder = builder.chrome_executable(executable);
        }
        let browser_config = builder
            .build()
            .map_err(|e| ScrapeError::browser(format!("invalid browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScrapeError::browser(format!("launch failed: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    error!("Browser handler error: {:?}", e);
                }
            }
            debug!("Browser event handler finished");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScrapeError::browser(format!("cannot open tab: {}", e)))?;

        Ok(Self {
            browser,
            handler,
            page,
        })
    }

    pub async fn close(mut self) -> Result<()> {
        info!("Closing browser");
        self.browser
            .close()
            .await
            .map_err(|e| ScrapeError::browser(e.to_string()))?;
        let _ = self.browser.wait().await;
        self.handler.abort();
        Ok(())
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: &str) -> std::result::Result<T, String> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| e.to_string())?
            .into_value::<T>()
            .map_err(|e| e.to_string())
    }
}

#[async_trait::async_trait]
impl PageDriver for ChromeSession {
    async fn goto(&self, url: &str) -> std::result::Result<(), NavigationError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| NavigationError::driver(e.to_string()))?;
        Ok(())
    }

    async fn is_ready(&self) -> std::result::Result<bool, NavigationError> {
        self.eval::<bool>(READY_SCRIPT)
            .await
            .map_err(NavigationError::driver)
    }

    async fn content_height(&self) -> Result<u64> {
        let height = self.eval::<f64>(HEIGHT_SCRIPT).await.map_err(ScrapeError::browser)?;
        Ok(height.max(0.0) as u64)
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.page
            .evaluate(SCROLL_SCRIPT)
            .await
            .map_err(|e| ScrapeError::browser(e.to_string()))?;
        Ok(())
    }

    async fn snapshot(&self) -> Result<PageSnapshot> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| ScrapeError::browser(e.to_string()))?
            .unwrap_or_else(|| "about:blank".to_string());
        let html = self
            .page
            .content()
            .await
            .map_err(|e| ScrapeError::browser(e.to_string()))?;
        Ok(PageSnapshot::new(Url::parse(&url)?, html))
    }

    async fn set_cookies(&self, cookies: &CookieStore, domain: &str) -> Result<()> {
        let params = cookies
            .iter()
            .map(|(name, value)| {
                CookieParam::builder()
                    .name(name)
                    .value(value)
                    .domain(domain)
                    .path("/")
                    .build()
                    .map_err(ScrapeError::browser)
            })
            .collect::<Result<Vec<_>>>()?;
        self.page
            .set_cookies(params)
            .await
            .map_err(|e| ScrapeError::browser(e.to_string()))?;
        Ok(())
    }
}
