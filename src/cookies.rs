use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Cookie name to value, as exported from a logged-in browser session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieStore {
    cookies: BTreeMap<String, String>,
}

impl CookieStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cookies: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Reads a JSON object file. A missing or malformed file yields an empty
    /// store so the run can continue unauthenticated.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cookie file not readable");
                return Self::empty();
            }
        };

        match serde_json::from_str::<BTreeMap<String, String>>(&content) {
            Ok(cookies) => Self { cookies },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid JSON in cookie file");
                Self::empty()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
