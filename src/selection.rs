use crate::models::MediaItem;
use std::collections::HashSet;

/// Drops items whose URL was already seen, keeping first-seen order.
pub fn dedupe(items: Vec<MediaItem>) -> Vec<MediaItem> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.url.as_str().to_owned()))
        .collect()
}

/// The first `min(quota, items.len())` items.
pub fn select(items: &[MediaItem], quota: usize) -> &[MediaItem] {
    &items[..quota.min(items.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn items(urls: &[&str]) -> Vec<MediaItem> {
        urls.iter()
            .map(|u| MediaItem::image(Url::parse(&format!("https://cdn.test/{}", u)).unwrap()))
            .collect()
    }

    fn paths(items: &[MediaItem]) -> Vec<String> {
        items.iter().map(|i| i.url.path().to_string()).collect()
    }

    #[test]
    fn dedupe_keeps_first_seen_order() {
        let deduped = dedupe(items(&["c", "a", "c", "b", "a"]));
        assert_eq!(paths(&deduped), vec!["/c", "/a", "/b"]);
    }

    #[test]
    fn dedupe_is_idempotent() {
        let once = dedupe(items(&["x", "y", "x", "z", "y", "y"]));
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn dedupe_ignores_descriptor_differences() {
        let mut list = items(&["a", "a"]);
        list[1] = list[1].clone().with_descriptor("other label");
        assert_eq!(dedupe(list).len(), 1);
    }

    #[test]
    fn select_length_is_min_of_quota_and_len() {
        let list = items(&["a", "b", "c", "d"]);
        for quota in 0..7 {
            assert_eq!(select(&list, quota).len(), quota.min(list.len()));
        }
        assert_eq!(paths(select(&list, 2)), vec!["/a", "/b"]);
        assert!(select(&[], 3).is_empty());
    }
}
