use crate::cookies::CookieStore;
use crate::error::{NavigationError, Result};
use crate::models::{MediaItem, PageSnapshot};

/// A single rendered page that navigation drives.
///
/// Implementations are not expected to tolerate concurrent navigation; the
/// navigator issues one call at a time.
#[async_trait::async_trait]
pub trait PageDriver: Send + Sync {
    /// Start navigating to `url`.
    async fn goto(&self, url: &str) -> std::result::Result<(), NavigationError>;

    /// Whether the document has left the `loading` state and has a body.
    async fn is_ready(&self) -> std::result::Result<bool, NavigationError>;

    /// Full scrollable height of the document.
    async fn content_height(&self) -> Result<u64>;

    async fn scroll_to_bottom(&self) -> Result<()>;

    /// Current URL and serialized DOM.
    async fn snapshot(&self) -> Result<PageSnapshot>;

    /// Install cookies for `domain` before the next navigation.
    async fn set_cookies(&self, cookies: &CookieStore, domain: &str) -> Result<()>;
}

/// Site-specific mapping from a rendered page to candidate items.
///
/// Every implementation returns items in DOM discovery order with absolute URLs.
pub trait MediaExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, snapshot: &PageSnapshot, keyword: &str) -> Result<Vec<MediaItem>>;
}
