use crate::config::{DrillDownConfig, NavigationConfig};
use crate::cookies::CookieStore;
use crate::error::{NavigationError, Result, ScrapeError};
use crate::extractors::selector;
use crate::models::{PageSnapshot, ScrollState};
use crate::retry::RetryPolicy;
use crate::traits::PageDriver;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn, Span};

/// Drives one page through load, readiness and scroll stabilization.
pub struct Navigator<'d> {
    driver: &'d dyn PageDriver,
    policy: RetryPolicy<NavigationError>,
    ready_timeout: Duration,
    ready_poll: Duration,
    stabilize_timeout: Duration,
    span: Span,
}

impl<'d> Navigator<'d> {
    pub fn new(driver: &'d dyn PageDriver, config: &NavigationConfig, span: Span) -> Self {
        Self {
            driver,
            policy: RetryPolicy::exponential(
                config.max_attempts,
                Duration::from_millis(config.backoff_base_ms),
                Duration::from_millis(config.backoff_min_ms),
                Duration::from_millis(config.backoff_max_ms),
                |_| true,
            ),
            ready_timeout: config.ready_timeout(),
            ready_poll: config.ready_poll(),
            stabilize_timeout: config.stabilize_timeout(),
            span,
        }
    }

    pub fn driver(&self) -> &'d dyn PageDriver {
        self.driver
    }

    /// Navigates to `url` and waits for the document to be ready, retrying
    /// timeouts and driver failures with exponential backoff.
    #[instrument(parent = &self.span, skip_all, fields(url = %url))]
    pub async fn load_page(&self, url: &str) -> Result<()> {
        let retried = self
            .policy
            .run(|attempt| async move {
                debug!(attempt, "Navigating");
                self.load_once(url).await
            })
            .await;

        match retried.outcome {
            Ok(()) => {
                info!(attempts = retried.attempts, "Page ready");
                Ok(())
            }
            Err(source) => Err(ScrapeError::Navigation {
                url: url.to_string(),
                attempts: retried.attempts,
                source,
            }),
        }
    }

    async fn load_once(&self, url: &str) -> std::result::Result<(), NavigationError> {
        let attempt = async {
            self.driver.goto(url).await?;
            while !self.driver.is_ready().await? {
                tokio::time::sleep(self.ready_poll).await;
            }
            Ok::<(), NavigationError>(())
        };
        tokio::time::timeout(self.ready_timeout, attempt)
            .await
            .map_err(|_| NavigationError::Timeout(self.ready_timeout))?
    }

    /// Waits until `css` matches something on the page, polling for up to
    /// `timeout` per attempt under the navigation retry policy.
    ///
    /// Returns `false` once every attempt timed out; the page is left as is.
    #[instrument(parent = &self.span, skip_all, fields(selector = css))]
    pub async fn wait_for_selector(&self, css: &str, timeout: Duration) -> Result<bool> {
        let wanted = selector(css)?;
        let wanted = &wanted;
        let retried = self
            .policy
            .run(|attempt| async move {
                debug!(attempt, "Waiting for selector");
                self.poll_selector(wanted, timeout).await
            })
            .await;

        match retried.outcome {
            Ok(()) => {
                debug!(attempts = retried.attempts, "Selector present");
                Ok(true)
            }
            Err(e) => {
                warn!(attempts = retried.attempts, error = %e, "Selector never appeared");
                Ok(false)
            }
        }
    }

    async fn poll_selector(
        &self,
        wanted: &Selector,
        timeout: Duration,
    ) -> std::result::Result<(), NavigationError> {
        let poll = async {
            loop {
                let snapshot = self
                    .driver
                    .snapshot()
                    .await
                    .map_err(|e| NavigationError::driver(e.to_string()))?;
                if matches_any(&snapshot, wanted) {
                    return Ok::<(), NavigationError>(());
                }
                tokio::time::sleep(self.ready_poll).await;
            }
        };
        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| NavigationError::Timeout(timeout))?
    }

    /// Scrolls to the bottom until the content height stops growing or
    /// `max_attempts` scrolls were made, then snapshots the page.
    ///
    /// Measurement failures and the overall stabilization timeout end the
    /// loop early; whatever has loaded by then is captured.
    #[instrument(parent = &self.span, skip_all, fields(max_attempts = max_attempts))]
    pub async fn scroll_until_stable(
        &self,
        max_attempts: u32,
        step_delay: Duration,
    ) -> Result<(PageSnapshot, ScrollState)> {
        let initial = match self.driver.content_height().await {
            Ok(height) => height,
            Err(e) => {
                warn!(error = %e, "Could not measure page height");
                0
            }
        };
        let mut state = ScrollState::new(initial);

        let stabilize = async {
            while state.attempts < max_attempts {
                if let Err(e) = self.driver.scroll_to_bottom().await {
                    warn!(error = %e, "Scroll failed, keeping what has loaded");
                    break;
                }
                tokio::time::sleep(step_delay).await;
                match self.driver.content_height().await {
                    Ok(height) => {
                        let unchanged = state.observe(height);
                        debug!(height, attempts = state.attempts, "Scrolled");
                        if unchanged {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Could not measure page height, keeping what has loaded");
                        break;
                    }
                }
            }
        };
        if tokio::time::timeout(self.stabilize_timeout, stabilize).await.is_err() {
            warn!(timeout = ?self.stabilize_timeout, "Stabilization timed out");
        }

        info!(
            height = state.last_height,
            attempts = state.attempts,
            stable = state.is_stable(),
            "Page stabilized"
        );
        let snapshot = self.driver.snapshot().await?;
        Ok((snapshot, state))
    }

    /// Installs session cookies ahead of the first navigation.
    pub async fn apply_cookies(&self, cookies: &CookieStore, domain: &str) -> Result<()> {
        if cookies.is_empty() {
            return Ok(());
        }
        self.driver.set_cookies(cookies, domain).await?;
        debug!(count = cookies.len(), domain, "Cookies installed");
        Ok(())
    }
}

fn matches_any(snapshot: &PageSnapshot, wanted: &Selector) -> bool {
    Html::parse_document(&snapshot.html)
        .select(wanted)
        .next()
        .is_some()
}

/// Whether the page is a login wall or captcha instead of the requested
/// content.
pub fn detect_block(snapshot: &PageSnapshot, config: &DrillDownConfig) -> Result<bool> {
    let url = snapshot.url.as_str();
    if config
        .blocked_url_markers
        .iter()
        .any(|marker| !marker.is_empty() && url.contains(marker.as_str()))
    {
        return Ok(true);
    }

    match &config.blocked_selector {
        Some(css) => {
            let blocked = selector(css)?;
            Ok(matches_any(snapshot, &blocked))
        }
        None => Ok(false),
    }
}
