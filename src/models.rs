use crate::error::{Result, ScrapeError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use url::Url;

/// What a target scrapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TargetKind {
    /// Search a configured site for a keyword and collect its images.
    Site { key: String, keyword: String },
    /// Drill into every post listed on a profile page.
    Profile { url: String },
    /// Drill into the posts returned for a search keyword.
    Search { keyword: String },
}

/// One unit of scrape work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    kind: TargetKind,
    quota: NonZeroUsize,
    output_root: PathBuf,
}

impl Target {
    pub fn site(
        key: impl Into<String>,
        keyword: impl Into<String>,
        quota: usize,
        output_root: impl Into<PathBuf>,
    ) -> Result<Self> {
        let key = key.into();
        let keyword = keyword.into();
        if key.trim().is_empty() {
            return Err(ScrapeError::invalid_target("site key is empty"));
        }
        let keyword = non_empty_keyword(keyword)?;
        Self::build(TargetKind::Site { key, keyword }, quota, output_root)
    }

    pub fn profile(url: impl Into<String>, quota: usize, output_root: impl Into<PathBuf>) -> Result<Self> {
        let url = url.into();
        let parsed = Url::parse(&url)
            .map_err(|e| ScrapeError::invalid_target(format!("profile URL '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScrapeError::invalid_target(format!(
                "profile URL '{}' is not http(s)",
                url
            )));
        }
        Self::build(TargetKind::Profile { url }, quota, output_root)
    }

    pub fn search(keyword: impl Into<String>, quota: usize, output_root: impl Into<PathBuf>) -> Result<Self> {
        let keyword = non_empty_keyword(keyword.into())?;
        Self::build(TargetKind::Search { keyword }, quota, output_root)
    }

    /// Validates `kind` the same way the dedicated constructors do.
    pub fn from_kind(kind: TargetKind, quota: usize, output_root: impl Into<PathBuf>) -> Result<Self> {
        match kind {
            TargetKind::Site { key, keyword } => Self::site(key, keyword, quota, output_root),
            TargetKind::Profile { url } => Self::profile(url, quota, output_root),
            TargetKind::Search { keyword } => Self::search(keyword, quota, output_root),
        }
    }

    fn build(kind: TargetKind, quota: usize, output_root: impl Into<PathBuf>) -> Result<Self> {
        let quota = NonZeroUsize::new(quota)
            .ok_or_else(|| ScrapeError::invalid_target("quota must be at least 1"))?;
        Ok(Self {
            kind,
            quota,
            output_root: output_root.into(),
        })
    }

    pub fn kind(&self) -> &TargetKind {
        &self.kind
    }

    pub fn quota(&self) -> usize {
        self.quota.get()
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn is_drill_down(&self) -> bool {
        !matches!(self.kind, TargetKind::Site { .. })
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TargetKind::Site { key, keyword } => write!(f, "site {} '{}'", key, keyword),
            TargetKind::Profile { url } => write!(f, "profile {}", url),
            TargetKind::Search { keyword } => write!(f, "search '{}'", keyword),
        }
    }
}

fn non_empty_keyword(keyword: String) -> Result<String> {
    let trimmed = keyword.trim();
    if trimmed.is_empty() {
        return Err(ScrapeError::invalid_target("keyword is empty"));
    }
    Ok(trimmed.to_string())
}

/// Progress of one scroll-until-stable loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollState {
    pub last_height: u64,
    pub stable_count: u32,
    pub attempts: u32,
}

impl ScrollState {
    pub fn new(initial_height: u64) -> Self {
        Self {
            last_height: initial_height,
            stable_count: 0,
            attempts: 0,
        }
    }

    /// Records one post-scroll measurement and returns whether the height held.
    pub fn observe(&mut self, height: u64) -> bool {
        self.attempts += 1;
        if height == self.last_height {
            self.stable_count += 1;
            true
        } else {
            self.stable_count = 0;
            self.last_height = height;
            false
        }
    }

    pub fn is_stable(&self) -> bool {
        self.stable_count >= 1
    }
}

/// Rendered page content captured after stabilization.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub url: Url,
    pub html: String,
}

impl PageSnapshot {
    pub fn new(url: Url, html: impl Into<String>) -> Self {
        Self {
            url,
            html: html.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    /// A post page to drill into rather than a downloadable file.
    Post,
}

impl MediaKind {
    /// File extension for downloadable kinds. Posts are visited, never
    /// downloaded, so they have none.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            MediaKind::Image => Some("jpg"),
            MediaKind::Video => Some("mp4"),
            MediaKind::Post => None,
        }
    }

    pub fn stem(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Post => "post",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub url: Url,
    pub descriptor: Option<String>,
    pub kind: MediaKind,
}

impl MediaItem {
    pub fn image(url: Url) -> Self {
        Self {
            url,
            descriptor: None,
            kind: MediaKind::Image,
        }
    }

    pub fn video(url: Url) -> Self {
        Self {
            url,
            descriptor: None,
            kind: MediaKind::Video,
        }
    }

    pub fn post(url: Url) -> Self {
        Self {
            url,
            descriptor: None,
            kind: MediaKind::Post,
        }
    }

    pub fn with_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        let descriptor = descriptor.into();
        let trimmed = descriptor.trim();
        self.descriptor = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Success,
    Skipped,
    Failed,
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadStatus::Success => write!(f, "Success"),
            DownloadStatus::Skipped => write!(f, "Skipped"),
            DownloadStatus::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadOutcome {
    /// Position of the item in the candidate list.
    pub index: usize,
    pub source_url: String,
    pub local_path: PathBuf,
    pub status: DownloadStatus,
    pub bytes_written: u64,
    pub attempts: u32,
    pub error: Option<String>,
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        self.status == DownloadStatus::Success
    }
}

/// Aggregate result of one target.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub target: String,
    pub output_dir: PathBuf,
    pub authenticated: bool,
    pub discovered: usize,
    pub unique: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub posts_attempted: usize,
    pub posts_succeeded: usize,
    pub diagnostic: Option<PathBuf>,
    pub outcomes: Vec<DownloadOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    pub fn new(target: &Target, output_dir: PathBuf, authenticated: bool) -> Self {
        Self {
            target: target.to_string(),
            output_dir,
            authenticated,
            discovered: 0,
            unique: 0,
            attempted: 0,
            succeeded: 0,
            skipped: 0,
            failed: 0,
            posts_attempted: 0,
            posts_succeeded: 0,
            diagnostic: None,
            outcomes: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at.unwrap_or_else(Utc::now) - self.started_at
    }

    /// Folds a batch of download outcomes into the counters.
    pub fn record(&mut self, outcomes: Vec<DownloadOutcome>) {
        for outcome in &outcomes {
            self.attempted += 1;
            match outcome.status {
                DownloadStatus::Success => self.succeeded += 1,
                DownloadStatus::Skipped => self.skipped += 1,
                DownloadStatus::Failed => self.failed += 1,
            }
        }
        self.outcomes.extend(outcomes);
    }
}

/// Results of a multi-target run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub runs: Vec<(String, std::result::Result<RunReport, ScrapeError>)>,
}

impl BatchReport {
    pub fn total_succeeded(&self) -> usize {
        self.runs
            .iter()
            .filter_map(|(_, run)| run.as_ref().ok())
            .map(|report| report.succeeded)
            .sum()
    }

    pub fn total_attempted(&self) -> usize {
        self.runs
            .iter()
            .filter_map(|(_, run)| run.as_ref().ok())
            .map(|report| report.attempted)
            .sum()
    }

    pub fn failed_targets(&self) -> usize {
        self.runs.iter().filter(|(_, run)| run.is_err()).count()
    }
}
