use crate::config::Config;
use crate::cookies::CookieStore;
use crate::downloader::MediaDownloader;
use crate::error::{Result, ScrapeError};
use crate::extractors::listing::PostListingExtractor;
use crate::extractors::post::{extract_fields, PostMediaExtractor, NOT_AVAILABLE};
use crate::models::{
    BatchReport, DownloadOutcome, MediaItem, PageSnapshot, RunReport, Target, TargetKind,
};
use crate::navigation::{detect_block, Navigator};
use crate::pacing::Pacer;
use crate::registry::ExtractorRegistry;
use crate::selection::{dedupe, select};
use crate::session::Session;
use crate::storage::{
    field_text, profile_id, FieldValue, StorageManager, POST_INFO_FILE, USER_INFO_FILE,
};
use crate::traits::{MediaExtractor, PageDriver};
use std::path::{Path, PathBuf};
use tracing::{error, info, info_span, instrument, warn, Instrument, Span};

const PREVIEW_CHARS: usize = 500;

/// Runs targets end to end on one browser page.
pub struct Orchestrator<'d> {
    config: Config,
    registry: ExtractorRegistry,
    driver: &'d dyn PageDriver,
    pacer: Pacer,
    storage: StorageManager,
    span: Span,
}

impl<'d> Orchestrator<'d> {
    pub fn new(config: Config, driver: &'d dyn PageDriver, span: Span) -> Self {
        Self {
            registry: ExtractorRegistry::from_config(&config),
            pacer: Pacer::from_config(&config.pacing),
            storage: StorageManager::new(&config.storage),
            config,
            driver,
            span,
        }
    }

    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    #[instrument(parent = &self.span, skip_all, fields(target = %target))]
    pub async fn run(&self, target: &Target) -> Result<RunReport> {
        info!("Starting target");
        let mut report = match target.kind() {
            TargetKind::Site { key, keyword } => self.run_site(target, key, keyword).await?,
            TargetKind::Profile { .. } | TargetKind::Search { .. } => {
                self.run_drill_down(target).await?
            }
        };
        report.finish();
        info!(
            succeeded = report.succeeded,
            attempted = report.attempted,
            quota = target.quota(),
            dir = %report.output_dir.display(),
            elapsed_ms = report.elapsed().num_milliseconds(),
            "Target finished"
        );
        Ok(report)
    }

    /// Runs every target in order. A failing target is recorded and the
    /// batch moves on.
    pub async fn run_batch(&self, targets: &[Target]) -> BatchReport {
        let mut batch = BatchReport::default();
        for target in targets {
            let result = self.run(target).await;
            if let Err(e) = &result {
                error!(target = %target, error = %e, "Target failed");
            }
            batch.runs.push((target.to_string(), result));
        }
        batch
    }

    fn navigator(&self) -> Navigator<'d> {
        Navigator::new(self.driver, &self.config.navigation, self.span.clone())
    }

    fn downloader<'s>(&self, session: &'s Session) -> MediaDownloader<'s> {
        MediaDownloader::new(session, &self.config.download, self.span.clone())
    }

    async fn stabilize(&self, navigator: &Navigator<'_>) -> Result<PageSnapshot> {
        let nav = &self.config.navigation;
        let (snapshot, _) = navigator
            .scroll_until_stable(nav.scroll_max_attempts, nav.scroll_step_delay())
            .await?;
        Ok(snapshot)
    }

    async fn run_site(&self, target: &Target, key: &str, keyword: &str) -> Result<RunReport> {
        let site = self
            .config
            .get_site_config(key)
            .ok_or_else(|| ScrapeError::invalid_target(format!("unknown site '{}'", key)))?;
        let extractor = self
            .registry
            .get_extractor(key)
            .ok_or_else(|| ScrapeError::invalid_target(format!("no extractor for site '{}'", key)))?;

        let session = Session::builder(&self.config.download)
            .user_agent(site.user_agent.as_deref())
            .headers(site.headers.as_ref())
            .accept_invalid_certs(site.accept_invalid_certs)
            .build()?;

        let dir = self
            .storage
            .ensure_directory(&self.storage.target_dir(target.output_root(), target.kind(), None))
            .await?;
        let mut report = RunReport::new(target, dir.clone(), session.is_authenticated());

        let navigator = self.navigator();
        let url = site.search_url(keyword);
        info!(site = %site.name, %url, "[{} SCRAPER] Loading search page", key.to_uppercase());
        navigator.load_page(&url).await?;
        let snapshot = self.stabilize(&navigator).await?;

        let items = extractor.extract(&snapshot, keyword)?;
        report.discovered = items.len();
        let items = dedupe(items);
        report.unique = items.len();
        info!(
            extractor = extractor.name(),
            discovered = report.discovered,
            unique = report.unique,
            "Candidates extracted"
        );

        if items.is_empty() {
            report.diagnostic = Some(self.write_diagnostic(&dir, &snapshot).await?);
            return Ok(report);
        }

        let outcomes = self
            .downloader(&session)
            .download_all(&items, &dir, target.quota(), &self.storage)
            .await;
        report.record(outcomes);
        Ok(report)
    }

    fn load_cookies(&self) -> CookieStore {
        match &self.config.cookies.path {
            Some(path) => CookieStore::load(path),
            None => CookieStore::empty(),
        }
    }

    async fn run_drill_down(&self, target: &Target) -> Result<RunReport> {
        let drill = &self.config.drilldown;
        let cookies = self.load_cookies();
        let session = Session::builder(&self.config.download)
            .cookies(cookies.clone(), &self.config.cookies.domain)
            .accept_invalid_certs(drill.accept_invalid_certs)
            .build()?;
        if !session.is_authenticated() {
            warn!("No cookies loaded, continuing unauthenticated");
        }

        let navigator = self.navigator();
        if let Err(e) = navigator.apply_cookies(&cookies, &self.config.cookies.domain).await {
            warn!(error = %e, "Could not install cookies in the browser");
        }

        let (listing_url, keyword) = match target.kind() {
            TargetKind::Profile { url } => (url.clone(), ""),
            TargetKind::Search { keyword } => (drill.search_url(keyword), keyword.as_str()),
            TargetKind::Site { .. } => {
                return Err(ScrapeError::invalid_target("site target is not a drill-down"))
            }
        };
        info!(url = %listing_url, "Loading listing page");
        navigator.load_page(&listing_url).await?;
        let rendered = navigator
            .wait_for_selector(&drill.listing_selector, self.config.navigation.selector_timeout())
            .await?;
        if !rendered {
            warn!(url = %listing_url, "Post links never rendered");
        }

        let mut profile_fields = None;
        let mut profile_name = None;
        if let TargetKind::Profile { .. } = target.kind() {
            let snapshot = self.driver.snapshot().await?;
            let fields = extract_fields(&snapshot, &drill.profile_fields)?;
            profile_name = field_text(&fields, &drill.user_name_label)
                .filter(|name| *name != NOT_AVAILABLE)
                .map(str::to_string);
            profile_fields = Some(fields);
        }

        let dir = self
            .storage
            .ensure_directory(&self.storage.target_dir(
                target.output_root(),
                target.kind(),
                profile_name.as_deref(),
            ))
            .await?;
        let mut report = RunReport::new(target, dir.clone(), session.is_authenticated());

        let snapshot = self.stabilize(&navigator).await?;
        let listing = PostListingExtractor::new(&drill.origin, &drill.post_path_prefix);
        let posts = listing.extract(&snapshot, keyword)?;
        report.discovered = posts.len();
        let posts = dedupe(posts);
        report.unique = posts.len();
        info!(discovered = report.discovered, unique = report.unique, "Posts found");

        if let Some(mut fields) = profile_fields {
            fields.push(("Total Posts".to_string(), FieldValue::Text(posts.len().to_string())));
            self.storage
                .write_sidecar(&dir, USER_INFO_FILE, Some(("Profile URL", &listing_url)), &fields)
                .await?;
        }

        if posts.is_empty() {
            report.diagnostic = Some(self.write_diagnostic(&dir, &snapshot).await?);
            return Ok(report);
        }

        let downloader = self.downloader(&session);
        let media = PostMediaExtractor::new(drill);
        let selected = select(&posts, target.quota());
        for (position, post) in selected.iter().enumerate() {
            report.posts_attempted += 1;
            let span = info_span!(parent: &self.span, "post", url = %post.url, n = position + 1);
            let scraped = self
                .scrape_post(&navigator, &downloader, &media, post, &dir)
                .instrument(span)
                .await;

            match scraped {
                Ok(outcomes) => {
                    report.posts_succeeded += 1;
                    report.record(outcomes);
                }
                Err(e) => warn!(url = %post.url, error = %e, "Post failed"),
            }

            if position + 1 < selected.len() {
                let delay = self.pacer.pause().await;
                info!(?delay, "Paused between posts");
            }
        }

        Ok(report)
    }

    async fn scrape_post(
        &self,
        navigator: &Navigator<'_>,
        downloader: &MediaDownloader<'_>,
        media: &PostMediaExtractor,
        post: &MediaItem,
        target_dir: &Path,
    ) -> Result<Vec<DownloadOutcome>> {
        let drill = &self.config.drilldown;
        navigator.load_page(post.url.as_str()).await?;

        let landed = self.driver.snapshot().await?;
        if detect_block(&landed, drill)? {
            return Err(ScrapeError::Blocked(landed.url.to_string()));
        }

        let snapshot = self.stabilize(navigator).await?;
        let fields = extract_fields(&snapshot, &drill.post_fields)?;
        let title = field_text(&fields, &drill.title_label)
            .filter(|title| *title != NOT_AVAILABLE)
            .unwrap_or_default();
        let post_id = profile_id(post.url.as_str()).unwrap_or_else(|| "unknown".to_string());

        let post_dir = self
            .storage
            .ensure_directory(&self.storage.post_dir(target_dir, title, &post_id))
            .await?;
        self.storage
            .write_sidecar(&post_dir, POST_INFO_FILE, Some(("Post URL", post.url.as_str())), &fields)
            .await?;

        let items = dedupe(media.extract(&snapshot, "")?);
        if items.is_empty() {
            warn!(url = %post.url, "No media found in post");
        }
        Ok(downloader
            .download_all(&items, &post_dir, items.len(), &self.storage)
            .await)
    }

    async fn write_diagnostic(&self, dir: &Path, snapshot: &PageSnapshot) -> Result<PathBuf> {
        let preview: String = snapshot.html.chars().take(PREVIEW_CHARS).collect();
        warn!(url = %snapshot.url, %preview, "No media extracted");
        let path = self.storage.write_diagnostic(dir, &snapshot.html).await?;
        info!(path = %path.display(), "Saved page for inspection");
        Ok(path)
    }
}
