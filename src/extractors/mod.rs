//! Site-specific extraction strategies.
//!
//! Each strategy maps a rendered [`PageSnapshot`](crate::models::PageSnapshot)
//! to media items in DOM discovery order, with every URL already resolved
//! against the page URL.

pub mod gallery;
pub mod generic;
pub mod keyword;
pub mod listing;
pub mod post;

use crate::error::{Result, ScrapeError};
use scraper::{ElementRef, Selector};
use url::Url;

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScrapeError::selector(css, format!("{:?}", e)))
}

/// Joins `raw` onto `base`; drops blanks and non-fetchable schemes.
pub(crate) fn resolve(base: &Url, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let url = base.join(raw).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Candidate with the largest width or density descriptor; the last entry
/// wins ties and entries without descriptors.
pub(crate) fn srcset_best(srcset: &str) -> Option<&str> {
    let mut best: Option<(&str, f64)> = None;
    for candidate in srcset.split(',') {
        let mut parts = candidate.split_whitespace();
        let Some(url) = parts.next() else { continue };
        let weight = parts
            .next()
            .and_then(|d| {
                d.strip_suffix('w')
                    .or_else(|| d.strip_suffix('x'))
                    .and_then(|n| n.parse::<f64>().ok())
            })
            .unwrap_or(0.0);
        match best {
            Some((_, current)) if weight < current => {}
            _ => best = Some((url, weight)),
        }
    }
    best.map(|(url, _)| url)
}

/// Whether the URL path ends in one of `extensions` (case-insensitive).
pub(crate) fn has_extension(url: &Url, extensions: &[String]) -> bool {
    let path = url.path().to_ascii_lowercase();
    extensions
        .iter()
        .any(|ext| path.ends_with(&format!(".{}", ext.trim_start_matches('.').to_ascii_lowercase())))
}

/// Best image reference of an `img`: srcset winner, then `src`, then `data-src`.
pub(crate) fn image_source<'a>(element: &ElementRef<'a>) -> Option<&'a str> {
    let value = element.value();
    value
        .attr("srcset")
        .and_then(srcset_best)
        .or_else(|| value.attr("src").filter(|s| !s.trim().is_empty()))
        .or_else(|| value.attr("data-src").filter(|s| !s.trim().is_empty()))
}

pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srcset_picks_widest_candidate() {
        assert_eq!(
            srcset_best("a.jpg 320w, b.jpg 1200w, c.jpg 640w"),
            Some("b.jpg")
        );
        assert_eq!(srcset_best("a.jpg 1x, b.jpg 2x"), Some("b.jpg"));
        assert_eq!(srcset_best("a.jpg, b.jpg"), Some("b.jpg"));
        assert_eq!(srcset_best("  "), None);
    }

    #[test]
    fn resolve_drops_data_uris_and_joins_relative() {
        let base = Url::parse("https://shop.test/en-us/search?q=x").unwrap();
        assert_eq!(
            resolve(&base, "/cdn/a.jpg").unwrap().as_str(),
            "https://shop.test/cdn/a.jpg"
        );
        assert_eq!(
            resolve(&base, "//img.test/b.png").unwrap().as_str(),
            "https://img.test/b.png"
        );
        assert!(resolve(&base, "data:image/png;base64,AAAA").is_none());
        assert!(resolve(&base, "").is_none());
    }

    #[test]
    fn extension_check_ignores_query() {
        let exts = vec!["svg".to_string(), "gif".to_string()];
        assert!(has_extension(&Url::parse("https://a.test/x.SVG?v=2").unwrap(), &exts));
        assert!(!has_extension(&Url::parse("https://a.test/x.jpg?f=gif").unwrap(), &exts));
    }
}
