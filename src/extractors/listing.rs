use super::{resolve, selector};
use crate::error::Result;
use crate::models::{MediaItem, PageSnapshot};
use crate::traits::MediaExtractor;
use scraper::Html;
use tracing::debug;
use url::Url;

/// Links to individual posts on a profile or search-results page.
pub struct PostListingExtractor {
    origin: Option<Url>,
    path_prefix: String,
}

impl PostListingExtractor {
    /// Post links are resolved against `origin` when it parses, otherwise
    /// against the page URL.
    pub fn new(origin: &str, path_prefix: &str) -> Self {
        Self {
            origin: Url::parse(origin).ok(),
            path_prefix: path_prefix.to_string(),
        }
    }
}

impl MediaExtractor for PostListingExtractor {
    fn name(&self) -> &'static str {
        "listing"
    }

    fn extract(&self, snapshot: &PageSnapshot, _keyword: &str) -> Result<Vec<MediaItem>> {
        let document = Html::parse_document(&snapshot.html);
        let link_selector = selector(&format!("a[href^=\"{}\"]", self.path_prefix))?;
        let base = self.origin.as_ref().unwrap_or(&snapshot.url);

        let items: Vec<MediaItem> = document
            .select(&link_selector)
            .filter_map(|link| link.value().attr("href"))
            .filter_map(|href| resolve(base, href))
            .map(MediaItem::post)
            .collect();

        debug!(count = items.len(), "Post links found");
        Ok(items)
    }
}
