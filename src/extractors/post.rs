use super::{element_text, resolve, selector};
use crate::config::{DrillDownConfig, FieldSelector};
use crate::error::Result;
use crate::models::{MediaItem, PageSnapshot};
use crate::storage::{FieldValue, Fields};
use crate::traits::MediaExtractor;
use regex::Regex;
use scraper::Html;
use std::sync::OnceLock;
use tracing::debug;

pub const NOT_AVAILABLE: &str = "Not available";
pub const NO_COUNT: &str = "N/A";

/// Media of a single post page: its video when one is declared, otherwise
/// the content images identified by a URL marker.
pub struct PostMediaExtractor {
    video_meta_selector: String,
    media_marker: String,
}

impl PostMediaExtractor {
    pub fn new(config: &DrillDownConfig) -> Self {
        Self {
            video_meta_selector: config.video_meta_selector.clone(),
            media_marker: config.media_marker.clone(),
        }
    }
}

impl MediaExtractor for PostMediaExtractor {
    fn name(&self) -> &'static str {
        "post"
    }

    fn extract(&self, snapshot: &PageSnapshot, _keyword: &str) -> Result<Vec<MediaItem>> {
        let document = Html::parse_document(&snapshot.html);

        let video_selector = selector(&self.video_meta_selector)?;
        let video = document
            .select(&video_selector)
            .filter_map(|meta| meta.value().attr("content"))
            .find_map(|content| resolve(&snapshot.url, content));
        if let Some(url) = video {
            debug!(%url, "Post carries a video");
            return Ok(vec![MediaItem::video(url)]);
        }

        let img_selector = selector("img")?;
        let items: Vec<MediaItem> = document
            .select(&img_selector)
            .filter_map(|img| img.value().attr("src"))
            .filter(|src| src.contains(&self.media_marker))
            .filter_map(|src| resolve(&snapshot.url, src))
            .map(MediaItem::image)
            .collect();

        debug!(count = items.len(), "Post images found");
        Ok(items)
    }
}

/// Reads labelled fields from a page. Missing text fields read
/// `Not available`, missing counts `N/A`, missing lists are empty.
pub fn extract_fields(snapshot: &PageSnapshot, selectors: &[FieldSelector]) -> Result<Fields> {
    let document = Html::parse_document(&snapshot.html);
    let mut fields = Vec::with_capacity(selectors.len());

    for field in selectors {
        let css = selector(&field.selector)?;
        let value = if field.list {
            FieldValue::List(
                document
                    .select(&css)
                    .map(|el| element_text(&el))
                    .filter(|text| !text.is_empty())
                    .collect(),
            )
        } else {
            let text = document
                .select(&css)
                .nth(field.nth.unwrap_or(0))
                .map(|el| element_text(&el))
                .filter(|text| !text.is_empty());
            let text = match text {
                Some(text) if field.numeric => count_token(&text)
                    .map(str::to_string)
                    .unwrap_or_else(|| NO_COUNT.to_string()),
                Some(text) => text,
                None if field.numeric => NO_COUNT.to_string(),
                None => NOT_AVAILABLE.to_string(),
            };
            FieldValue::Text(text)
        };
        fields.push((field.label.clone(), value));
    }

    Ok(fields)
}

/// First count in `text`, keeping abbreviations such as `1.2万` or `3k`.
fn count_token(text: &str) -> Option<&str> {
    static COUNT: OnceLock<Option<Regex>> = OnceLock::new();
    COUNT
        .get_or_init(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?[万千kKwW+]*").ok())
        .as_ref()?
        .find(text)
        .map(|m| m.as_str())
}
