use super::{element_text, image_source, resolve, selector};
use crate::config::SelectorsConfig;
use crate::error::Result;
use crate::models::{MediaItem, PageSnapshot};
use crate::traits::MediaExtractor;
use scraper::Html;
use tracing::debug;

/// Product-grid extraction: only containers whose title mentions the keyword,
/// one image per declared slot (primary, alternate), labelled with the title.
pub struct KeywordFilteredExtractor {
    container: String,
    title: String,
    image_slots: Vec<String>,
}

impl KeywordFilteredExtractor {
    pub fn new(selectors: &SelectorsConfig) -> Self {
        Self {
            container: selectors.container.clone(),
            title: selectors.title.clone(),
            image_slots: selectors.image_slots.clone(),
        }
    }
}

impl Default for KeywordFilteredExtractor {
    fn default() -> Self {
        Self::new(&SelectorsConfig::default())
    }
}

impl MediaExtractor for KeywordFilteredExtractor {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn extract(&self, snapshot: &PageSnapshot, keyword: &str) -> Result<Vec<MediaItem>> {
        let document = Html::parse_document(&snapshot.html);
        let container_sel = selector(&self.container)?;
        let title_sel = selector(&self.title)?;
        let slot_sels = self
            .image_slots
            .iter()
            .map(|css| selector(css))
            .collect::<Result<Vec<_>>>()?;
        let needle = keyword.to_lowercase();

        let mut items = Vec::new();
        for container in document.select(&container_sel) {
            let Some(title) = container.select(&title_sel).next().map(|el| element_text(&el)) else {
                continue;
            };
            if !title.to_lowercase().contains(&needle) {
                continue;
            }

            for slot in &slot_sels {
                let source = container
                    .select(slot)
                    .next()
                    .and_then(|img| image_source(&img))
                    .and_then(|src| resolve(&snapshot.url, src));
                if let Some(url) = source {
                    items.push(MediaItem::image(url).with_descriptor(title.as_str()));
                }
            }
        }

        debug!(count = items.len(), keyword, "Keyword extraction");
        Ok(items)
    }
}
