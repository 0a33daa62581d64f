use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub navigation: NavigationConfig,
    pub download: DownloadConfig,
    pub pacing: PacingConfig,
    pub storage: StorageConfig,
    pub cookies: CookieConfig,
    pub drilldown: DrillDownConfig,
    /// Extra or overriding sites, keyed by site key.
    pub sites: HashMap<String, SiteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub ready_timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_min_ms: u64,
    pub backoff_max_ms: u64,
    pub scroll_max_attempts: u32,
    pub scroll_step_delay_ms: u64,
    pub stabilize_timeout_secs: u64,
    pub ready_poll_ms: u64,
    /// Per-attempt bound on waiting for a selector to match.
    pub selector_timeout_ms: u64,
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
}

impl NavigationConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn scroll_step_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_step_delay_ms)
    }

    pub fn stabilize_timeout(&self) -> Duration {
        Duration::from_secs(self.stabilize_timeout_secs)
    }

    pub fn ready_poll(&self) -> Duration {
        Duration::from_millis(self.ready_poll_ms)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            ready_timeout_secs: 90,
            max_attempts: 3,
            backoff_base_ms: 1000,
            backoff_min_ms: 4000,
            backoff_max_ms: 10_000,
            scroll_max_attempts: 5,
            scroll_step_delay_ms: 2000,
            stabilize_timeout_secs: 120,
            ready_poll_ms: 100,
            selector_timeout_ms: 10_000,
            headless: true,
            chrome_executable: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    /// Longest wait for the response head or for the next body chunk. A
    /// body that keeps arriving may take as long as it needs.
    pub read_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_concurrency: usize,
    pub user_agent: String,
    pub show_progress: bool,
}

impl DownloadConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 2000,
            read_timeout_secs: 10,
            connect_timeout_secs: 10,
            max_concurrency: 8,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            show_progress: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub post_delay_min_ms: u64,
    pub post_delay_max_ms: u64,
    /// Fixed seed for reproducible delays; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            post_delay_min_ms: 2000,
            post_delay_max_ms: 5000,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub output_root: PathBuf,
    pub max_filename_len: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("./downloads"),
            max_filename_len: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// JSON object of cookie name to value.
    pub path: Option<PathBuf>,
    pub domain: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            path: None,
            domain: ".xiaohongshu.com".to_string(),
        }
    }
}

/// A labelled CSS selector whose text becomes one sidecar field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSelector {
    pub label: String,
    pub selector: String,
    /// Collect every match as a list instead of the first match's text.
    #[serde(default)]
    pub list: bool,
    /// A count; only the number token is kept, `N/A` when there is none.
    #[serde(default)]
    pub numeric: bool,
    /// Pick the n-th match instead of the first.
    #[serde(default)]
    pub nth: Option<usize>,
}

impl FieldSelector {
    pub fn text(label: &str, selector: &str) -> Self {
        Self {
            label: label.to_string(),
            selector: selector.to_string(),
            list: false,
            numeric: false,
            nth: None,
        }
    }

    pub fn nth(label: &str, selector: &str, nth: usize) -> Self {
        Self {
            nth: Some(nth),
            ..Self::text(label, selector)
        }
    }

    pub fn count(label: &str, selector: &str, nth: usize) -> Self {
        Self {
            numeric: true,
            ..Self::nth(label, selector, nth)
        }
    }

    pub fn list(label: &str, selector: &str) -> Self {
        Self {
            list: true,
            ..Self::text(label, selector)
        }
    }
}

/// Profile and search drill-down settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrillDownConfig {
    pub origin: String,
    pub search_url_template: String,
    pub post_path_prefix: String,
    /// Present once the listing has rendered its post links.
    pub listing_selector: String,
    pub media_marker: String,
    pub video_meta_selector: String,
    pub blocked_url_markers: Vec<String>,
    pub blocked_selector: Option<String>,
    pub title_label: String,
    pub user_name_label: String,
    pub profile_fields: Vec<FieldSelector>,
    pub post_fields: Vec<FieldSelector>,
    pub accept_invalid_certs: bool,
}

impl Default for DrillDownConfig {
    fn default() -> Self {
        Self {
            origin: "https://www.xiaohongshu.com".to_string(),
            search_url_template:
                "https://www.xiaohongshu.com/search_result?keyword={}&source=web_search_result_notes"
                    .to_string(),
            post_path_prefix: "/explore/".to_string(),
            listing_selector: "a[href^=\"/explore/\"]".to_string(),
            media_marker: "webpic".to_string(),
            video_meta_selector: "meta[name=\"og:video\"]".to_string(),
            blocked_url_markers: vec!["login".to_string()],
            blocked_selector: Some(".captcha-container".to_string()),
            title_label: "title".to_string(),
            user_name_label: "User Name".to_string(),
            profile_fields: vec![
                FieldSelector::text("User Name", ".user-name"),
                FieldSelector::text("Account number", ".user-redId"),
                FieldSelector::text("IP Location", ".user-IP"),
                FieldSelector::text("User Description", ".user-desc"),
                FieldSelector::text("Gender and Tag", ".tag-item"),
                FieldSelector::nth("Following", ".data-info .count", 0),
                FieldSelector::nth("Fans", ".data-info .count", 1),
                FieldSelector::nth("Likes and Collects", ".data-info .count", 2),
            ],
            post_fields: vec![
                FieldSelector::text("title", "#detail-title"),
                FieldSelector::text("description", "span[data-v-6b50f68a]"),
                FieldSelector::text(
                    "author",
                    "#noteContainer > div.interaction-container > div.author-container > div > div.info > a.name > span",
                ),
                FieldSelector::text("date", "span.date"),
                FieldSelector::count("likes", ".left .count", 0),
                FieldSelector::count("collects", ".left .count", 1),
                FieldSelector::count("comments", ".left .count", 2),
                FieldSelector::list("tags", "a.tag"),
            ],
            accept_invalid_certs: false,
        }
    }
}

impl DrillDownConfig {
    pub fn search_url(&self, keyword: &str) -> String {
        fill_template(&self.search_url_template, keyword)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    Generic,
    Keyword,
    Gallery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    /// Search URL with `{}` standing for the URL-encoded keyword.
    pub url_template: String,
    pub extractor: ExtractorKind,
    #[serde(default)]
    pub selectors: SelectorsConfig,
    pub user_agent: Option<String>,
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl SiteConfig {
    pub fn search_url(&self, keyword: &str) -> String {
        fill_template(&self.url_template, keyword)
    }
}

/// Substitutes the form-encoded keyword for every `{}` in `template`.
fn fill_template(template: &str, keyword: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(keyword.as_bytes()).collect();
    template.replace("{}", &encoded)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorsConfig {
    pub image: String,
    pub container: String,
    pub title: String,
    pub image_slots: Vec<String>,
    pub descriptor_attr: String,
    pub default_descriptor: String,
    pub excluded_extensions: Vec<String>,
}

impl Default for SelectorsConfig {
    fn default() -> Self {
        Self {
            image: "img".to_string(),
            container: "li.productgrid--item".to_string(),
            title: "h2.productitem--title".to_string(),
            image_slots: vec![
                "img.productitem--image-primary".to_string(),
                "img.productitem--image-alternate".to_string(),
            ],
            descriptor_attr: "alt".to_string(),
            default_descriptor: "No description".to_string(),
            excluded_extensions: vec!["svg".to_string(), "gif".to_string()],
        }
    }
}

impl Config {
    /// Layers serde defaults, the optional TOML file and `MEDIASCRAPE__*`
    /// environment variables.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()).required(false))
            .add_source(
                ::config::Environment::with_prefix("MEDIASCRAPE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.storage.max_filename_len == 0 {
            return Err(::config::ConfigError::Message(
                "storage.max_filename_len must be at least 1".to_string(),
            )
            .into());
        }
        Ok(())
    }

    /// Built-in sites merged with the configured ones; configured keys win.
    pub fn all_sites(&self) -> HashMap<String, SiteConfig> {
        let mut sites = builtin_sites();
        for (key, site) in &self.sites {
            sites.insert(key.to_lowercase(), site.clone());
        }
        sites
    }

    pub fn get_site_config(&self, site_name: &str) -> Option<SiteConfig> {
        self.all_sites().remove(&site_name.to_lowercase())
    }
}

pub fn builtin_sites() -> HashMap<String, SiteConfig> {
    let site = |name: &str, url_template: &str, extractor: ExtractorKind| SiteConfig {
        name: name.to_string(),
        url_template: url_template.to_string(),
        extractor,
        selectors: SelectorsConfig::default(),
        user_agent: None,
        headers: None,
        accept_invalid_certs: false,
    };

    let gallery_selectors = SelectorsConfig {
        image: "img.post-image".to_string(),
        ..SelectorsConfig::default()
    };

    let mut sites = HashMap::new();
    sites.insert(
        "alamour".to_string(),
        site(
            "A'mour The Label",
            "https://www.alamourthelabel.com/en-us/search?q={}",
            ExtractorKind::Keyword,
        ),
    );
    sites.insert(
        "vogue".to_string(),
        site(
            "Vogue",
            "https://www.vogue.com/search?q={}&sort=score+desc",
            ExtractorKind::Generic,
        ),
    );
    sites.insert(
        "pinterest".to_string(),
        site(
            "Pinterest",
            "https://www.pinterest.com/search/pins/?q={}&rs=typed",
            ExtractorKind::Generic,
        ),
    );
    sites.insert(
        "ins_profile".to_string(),
        SiteConfig {
            selectors: gallery_selectors.clone(),
            ..site("Picuki profile", "https://www.picuki.com/profile/{}", ExtractorKind::Gallery)
        },
    );
    sites.insert(
        "ins_tag".to_string(),
        SiteConfig {
            selectors: gallery_selectors,
            ..site("Picuki tag", "https://www.picuki.com/tag/{}", ExtractorKind::Gallery)
        },
    );
    sites
}
