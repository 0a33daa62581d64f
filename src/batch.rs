use crate::error::Result;
use crate::models::{Target, TargetKind};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// A batch file: one `[[target]]` table per target.
///
/// ```toml
/// [[target]]
/// kind = "site"
/// key = "vogue"
/// keyword = "linen dress"
/// quota = 20
///
/// [[target]]
/// kind = "profile"
/// url = "https://www.xiaohongshu.com/user/profile/5f3c"
/// ```
#[derive(Debug, Deserialize)]
struct BatchFile {
    #[serde(default, rename = "target")]
    targets: Vec<TargetEntry>,
}

#[derive(Debug, Deserialize)]
struct TargetEntry {
    #[serde(flatten)]
    kind: TargetKind,
    quota: Option<usize>,
    output: Option<PathBuf>,
}

/// Parses batch TOML into validated targets. Entries without a quota or
/// output directory take the given defaults. Any invalid entry rejects the
/// whole batch.
pub fn parse_targets(content: &str, default_quota: usize, default_root: &Path) -> Result<Vec<Target>> {
    let file: BatchFile = toml::from_str(content)?;
    file.targets
        .into_iter()
        .map(|entry| {
            Target::from_kind(
                entry.kind,
                entry.quota.unwrap_or(default_quota),
                entry.output.unwrap_or_else(|| default_root.to_path_buf()),
            )
        })
        .collect()
}

pub fn load_targets(path: &Path, default_quota: usize, default_root: &Path) -> Result<Vec<Target>> {
    let content = std::fs::read_to_string(path)?;
    parse_targets(&content, default_quota, default_root)
}
