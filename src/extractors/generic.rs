use super::{has_extension, image_source, resolve, selector};
use crate::config::SelectorsConfig;
use crate::error::Result;
use crate::models::{MediaItem, PageSnapshot};
use crate::traits::MediaExtractor;
use scraper::Html;
use tracing::debug;

/// Every image on the page, minus vector and animated formats.
pub struct GenericImageExtractor {
    image_selector: String,
    excluded_extensions: Vec<String>,
}

impl GenericImageExtractor {
    pub fn new(selectors: &SelectorsConfig) -> Self {
        Self {
            image_selector: selectors.image.clone(),
            excluded_extensions: selectors.excluded_extensions.clone(),
        }
    }
}

impl Default for GenericImageExtractor {
    fn default() -> Self {
        Self::new(&SelectorsConfig::default())
    }
}

impl MediaExtractor for GenericImageExtractor {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn extract(&self, snapshot: &PageSnapshot, _keyword: &str) -> Result<Vec<MediaItem>> {
        let document = Html::parse_document(&snapshot.html);
        let img_selector = selector(&self.image_selector)?;

        let items: Vec<MediaItem> = document
            .select(&img_selector)
            .filter_map(|img| image_source(&img))
            .filter_map(|src| resolve(&snapshot.url, src))
            .filter(|url| !has_extension(url, &self.excluded_extensions))
            .map(MediaItem::image)
            .collect();

        debug!(count = items.len(), "Generic extraction");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn snapshot(body: &str) -> PageSnapshot {
        PageSnapshot::new(
            Url::parse("https://www.vogue.com/search?q=dress").unwrap(),
            format!("<html><body>{}</body></html>", body),
        )
    }

    #[test]
    fn collects_images_in_dom_order_with_absolute_urls() {
        let page = snapshot(
            r#"
            <img src="/photos/one.jpg">
            <div><img src="https://cdn.vogue.com/two.webp"></div>
            <img data-src="lazy/three.png">
            <img srcset="/s/four-320.jpg 320w, /s/four-1280.jpg 1280w" src="/s/four-320.jpg">
            "#,
        );
        let items = GenericImageExtractor::default().extract(&page, "dress").unwrap();
        let urls: Vec<&str> = items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.vogue.com/photos/one.jpg",
                "https://cdn.vogue.com/two.webp",
                "https://www.vogue.com/lazy/three.png",
                "https://www.vogue.com/s/four-1280.jpg",
            ]
        );
    }

    #[test]
    fn skips_vector_animated_and_inline_images() {
        let page = snapshot(
            r#"
            <img src="/logo.svg">
            <img src="/spinner.GIF">
            <img src="data:image/png;base64,AAAA">
            <img>
            <img src="/keep.jpg">
            "#,
        );
        let items = GenericImageExtractor::default().extract(&page, "").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url.path(), "/keep.jpg");
    }
}
