use super::{has_extension, image_source, resolve, selector};
use crate::config::SelectorsConfig;
use crate::error::Result;
use crate::models::{MediaItem, PageSnapshot};
use crate::traits::MediaExtractor;
use scraper::Html;
use tracing::debug;

/// Gallery pages (profile or tag feeds): post images labelled by their alt text.
pub struct GalleryExtractor {
    selectors: SelectorsConfig,
}

impl GalleryExtractor {
    pub fn new(selectors: &SelectorsConfig) -> Self {
        Self {
            selectors: selectors.clone(),
        }
    }
}

impl MediaExtractor for GalleryExtractor {
    fn name(&self) -> &'static str {
        "gallery"
    }

    fn extract(&self, snapshot: &PageSnapshot, _keyword: &str) -> Result<Vec<MediaItem>> {
        let document = Html::parse_document(&snapshot.html);
        let img_selector = selector(&self.selectors.image)?;

        let mut items = Vec::new();
        for img in document.select(&img_selector) {
            let Some(url) = image_source(&img).and_then(|src| resolve(&snapshot.url, src)) else {
                continue;
            };
            if has_extension(&url, &self.selectors.excluded_extensions) {
                continue;
            }
            let descriptor = img
                .value()
                .attr(&self.selectors.descriptor_attr)
                .map(str::trim)
                .filter(|alt| !alt.is_empty())
                .unwrap_or(&self.selectors.default_descriptor);
            items.push(MediaItem::image(url).with_descriptor(descriptor));
        }

        debug!(count = items.len(), "Gallery extraction");
        Ok(items)
    }
}
