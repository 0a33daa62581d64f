use crate::config::StorageConfig;
use crate::error::{Result, ScrapeError};
use crate::models::{MediaItem, TargetKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const USER_INFO_FILE: &str = "user_info.txt";
pub const POST_INFO_FILE: &str = "post_info.txt";
pub const DIAGNOSTIC_FILE: &str = "diagnostic.html";

/// One line (or bullet block) of a sidecar file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::List(_) => None,
        }
    }
}

pub type Fields = Vec<(String, FieldValue)>;

/// Looks up a text field by label.
pub fn field_text<'a>(fields: &'a Fields, label: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(key, _)| key == label)
        .and_then(|(_, value)| value.as_text())
}

/// Removes characters illegal on common filesystems and bounds the length.
pub fn sanitize_filename(filename: &str, max_len: usize) -> String {
    let cleaned: String = filename
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') && !c.is_control())
        .collect();
    let truncated: String = cleaned
        .trim_matches(|c| c == '.' || c == ' ')
        .chars()
        .take(max_len)
        .collect();
    let truncated = truncated.trim_end_matches(|c| c == '.' || c == ' ');

    if truncated.is_empty() {
        "untitled".chars().take(max_len).collect()
    } else {
        truncated.to_string()
    }
}

/// Renders `key: value` lines, with list values as `- item` bullets.
pub fn render_sidecar(header: Option<(&str, &str)>, fields: &Fields) -> String {
    let mut out = String::new();
    if let Some((key, value)) = header {
        out.push_str(&format!("{}: {}\n\n", key, value));
    }
    for (key, value) in fields {
        match value {
            FieldValue::Text(text) => out.push_str(&format!("{}: {}\n", key, text.trim())),
            FieldValue::List(items) => {
                out.push_str(&format!("{}:\n", key));
                for item in items {
                    out.push_str(&format!("- {}\n", item.trim()));
                }
            }
        }
    }
    out
}

pub struct StorageManager {
    config: StorageConfig,
}

impl StorageManager {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn max_filename_len(&self) -> usize {
        self.config.max_filename_len
    }

    pub fn sanitize(&self, name: &str) -> String {
        sanitize_filename(name, self.config.max_filename_len)
    }

    /// Idempotent create-if-absent.
    pub async fn ensure_directory(&self, path: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| ScrapeError::filesystem(path, e))?;
        debug!(path = %path.display(), "Directory ready");
        Ok(path.to_path_buf())
    }

    /// Root directory for a target, named from its keyword or profile name.
    pub fn target_dir(&self, root: &Path, kind: &TargetKind, profile_name: Option<&str>) -> PathBuf {
        match kind {
            TargetKind::Site { keyword, .. } => {
                root.join(self.sanitize(&format!("{}_images", keyword)))
            }
            TargetKind::Search { keyword } => root.join(self.sanitize(keyword)),
            TargetKind::Profile { url } => {
                let name = profile_name
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| profile_id(url).unwrap_or_else(|| "unknown_user".to_string()));
                root.join(self.sanitize(&name))
            }
        }
    }

    /// `<title>_<post id>`; the id survives title truncation.
    pub fn post_dir(&self, target_dir: &Path, title: &str, post_id: &str) -> PathBuf {
        let id = sanitize_filename(post_id, self.config.max_filename_len);
        let title = title.trim();
        let name = if title.is_empty() {
            format!("post_{}", id)
        } else {
            format!("{}_{}", self.sanitize(title), id)
        };
        target_dir.join(name)
    }

    /// Deterministic file name from the item's descriptor and its 1-based index.
    pub fn media_filename(&self, item: &MediaItem, index: usize) -> String {
        let stem = match item.descriptor.as_deref() {
            Some(descriptor) => format!("{}_{}", self.sanitize(descriptor), index),
            None => format!("{}_{}", item.kind.stem(), index),
        };
        match item.kind.extension() {
            Some(ext) => format!("{}.{}", stem, ext),
            None => stem,
        }
    }

    pub async fn write_sidecar(
        &self,
        dir: &Path,
        file_name: &str,
        header: Option<(&str, &str)>,
        fields: &Fields,
    ) -> Result<PathBuf> {
        let path = dir.join(file_name);
        tokio::fs::write(&path, render_sidecar(header, fields)).await?;
        info!(path = %path.display(), "Wrote metadata");
        Ok(path)
    }

    pub async fn write_diagnostic(&self, dir: &Path, html: &str) -> Result<PathBuf> {
        let path = dir.join(DIAGNOSTIC_FILE);
        tokio::fs::write(&path, html).await?;
        Ok(path)
    }
}

/// Last non-empty path segment, e.g. the post id of `/explore/<id>`.
pub fn profile_id(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}
