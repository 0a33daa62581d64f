use crate::config::DownloadConfig;
use crate::error::DownloadError;
use crate::models::{DownloadOutcome, DownloadStatus, MediaItem};
use crate::retry::RetryPolicy;
use crate::session::Session;
use crate::storage::StorageManager;
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, REFERER};
use reqwest::StatusCode;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn, Span};
use url::Url;

/// Whether a `Content-Type` names an image or video we keep.
///
/// Vector and animated-GIF images are rejected even though they are `image/*`.
pub fn is_allowed_media_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.split_once('/') {
        Some(("image", subtype)) => !matches!(subtype, "svg+xml" | "gif"),
        Some(("video", subtype)) => !subtype.is_empty(),
        _ => false,
    }
}

pub struct MediaDownloader<'s> {
    session: &'s Session,
    policy: RetryPolicy<DownloadError>,
    max_concurrency: usize,
    read_timeout: Duration,
    show_progress: bool,
    span: Span,
}

impl<'s> MediaDownloader<'s> {
    pub fn new(session: &'s Session, config: &DownloadConfig, span: Span) -> Self {
        Self {
            session,
            policy: RetryPolicy::fixed(
                config.max_attempts,
                config.retry_delay(),
                DownloadError::is_retryable,
            ),
            max_concurrency: config.max_concurrency.max(1),
            read_timeout: config.read_timeout(),
            show_progress: config.show_progress,
            span,
        }
    }

    /// Fetches `url` into `dest` under the retry policy. Never fails: every
    /// outcome, including exhausted retries, is recorded in the result.
    #[instrument(parent = &self.span, skip_all, fields(url = %url))]
    pub async fn download(&self, url: &Url, dest: &Path, headers: &HeaderMap) -> DownloadOutcome {
        let retried = self
            .policy
            .run(|attempt| async move {
                debug!(attempt, "Fetching");
                self.fetch_once(url, dest, headers).await
            })
            .await;

        let (status, bytes_written, error) = match retried.outcome {
            Ok(bytes) => {
                info!(path = %dest.display(), bytes, "Downloaded");
                (DownloadStatus::Success, bytes, None)
            }
            Err(DownloadError::NonImageContent(content_type)) => {
                info!(%content_type, "Skipped: not an allowed image or video");
                (
                    DownloadStatus::Skipped,
                    0,
                    Some(DownloadError::NonImageContent(content_type).to_string()),
                )
            }
            Err(e) => {
                warn!(attempts = retried.attempts, error = %e, "Download failed");
                (DownloadStatus::Failed, 0, Some(e.to_string()))
            }
        };

        DownloadOutcome {
            index: 0,
            source_url: url.to_string(),
            local_path: dest.to_path_buf(),
            status,
            bytes_written,
            attempts: retried.attempts,
            error,
        }
    }

    async fn fetch_once(&self, url: &Url, dest: &Path, headers: &HeaderMap) -> Result<u64, DownloadError> {
        let request = self
            .session
            .client()
            .get(url.clone())
            .headers(self.session.default_headers().clone())
            .headers(headers.clone())
            .send();
        let response = self.within_read_timeout(request).await??;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DownloadError::HttpStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !is_allowed_media_type(&content_type) {
            return Err(DownloadError::NonImageContent(content_type));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        let streamed: Result<(), DownloadError> = async {
            while let Some(chunk) = self.within_read_timeout(stream.next()).await? {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok(())
        }
        .await;
        drop(file);

        let result = match streamed {
            Ok(()) if written == 0 => Err(DownloadError::EmptyBody),
            Ok(()) => Ok(written),
            Err(e) => Err(e),
        };
        if result.is_err() {
            let _ = tokio::fs::remove_file(dest).await;
        }
        result
    }

    /// Bounds the wait for one network read; a stalled read is a network error.
    async fn within_read_timeout<F: Future>(&self, read: F) -> Result<F::Output, DownloadError> {
        tokio::time::timeout(self.read_timeout, read)
            .await
            .map_err(|_| DownloadError::Network(format!("no data for {:?}", self.read_timeout)))
    }

    /// Downloads `items` into `dir` through a bounded pool until `quota`
    /// downloads have succeeded or the candidates run out.
    ///
    /// Items are scheduled in order and only while
    /// `successes + in_flight < quota`, so a skipped or failed item is
    /// replaced by the next candidate. In-flight downloads always finish.
    /// Outcomes come back sorted by item index.
    #[instrument(parent = &self.span, skip_all, fields(dir = %dir.display(), candidates = items.len(), quota = quota))]
    pub async fn download_all(
        &self,
        items: &[MediaItem],
        dir: &Path,
        quota: usize,
        storage: &StorageManager,
    ) -> Vec<DownloadOutcome> {
        let concurrency = quota.min(items.len()).min(self.max_concurrency).max(1);
        let progress = self.progress_bar(quota.min(items.len()));

        let mut in_flight = FuturesUnordered::new();
        let mut outcomes = Vec::new();
        let mut next = 0;
        let mut successes = 0;

        loop {
            while next < items.len()
                && in_flight.len() < concurrency
                && successes + in_flight.len() < quota
            {
                let index = next;
                let item = &items[index];
                let dest = dir.join(storage.media_filename(item, index + 1));
                let mut headers = HeaderMap::new();
                if let Ok(referer) = HeaderValue::from_str(item.url.as_str()) {
                    headers.insert(REFERER, referer);
                }
                in_flight.push(async move {
                    let mut outcome = self.download(&item.url, &dest, &headers).await;
                    outcome.index = index;
                    outcome
                });
                next += 1;
            }

            match in_flight.next().await {
                Some(outcome) => {
                    if outcome.is_success() {
                        successes += 1;
                        progress.inc(1);
                    }
                    progress.set_message(format!("{} {}", outcome.status, outcome.source_url));
                    outcomes.push(outcome);
                }
                None => break,
            }
        }

        progress.finish_with_message(format!("{} downloaded", successes));
        outcomes.sort_by_key(|outcome| outcome.index);
        debug!(successes, attempted = outcomes.len(), "Pool drained");
        outcomes
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
