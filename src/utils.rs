//! Utility functions for identifiers, filenames and path collisions

use crate::error::{Error, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Maximum number of suffixes tried when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Characters that may not appear in a report filename
const ILLEGAL_FILENAME_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

#[allow(clippy::expect_used)]
static UPSTREAM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"id=([a-f0-9]{32})").expect("upstream id pattern is valid"));

/// Extract the 32-hex portal project identifier from a project page URL
///
/// ```
/// use nsfc_report_dl::utils::extract_upstream_id;
///
/// let url = "https://kd.nsfc.cn/finalDetails?id=0123456789abcdef0123456789abcdef";
/// assert_eq!(
///     extract_upstream_id(url).as_deref(),
///     Some("0123456789abcdef0123456789abcdef")
/// );
/// assert_eq!(extract_upstream_id("https://kd.nsfc.cn/"), None);
/// ```
pub fn extract_upstream_id(url: &str) -> Option<String> {
    UPSTREAM_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Strip characters that are illegal in filenames and trim whitespace
///
/// Returns `None` when nothing is left.
#[must_use]
pub fn sanitize_display_name(name: &str) -> Option<String> {
    let cleaned: String = name
        .chars()
        .filter(|c| !ILLEGAL_FILENAME_CHARS.contains(c))
        .collect();
    let trimmed = cleaned.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Replace characters that are illegal in filenames with `_`
#[must_use]
pub fn replace_illegal_chars(name: &str) -> String {
    name.chars()
        .map(|c| if ILLEGAL_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// First `max` characters of `s` (not bytes)
#[must_use]
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Claim `path` if nobody has yet; `None` when it already exists
///
/// Uses `create_new`, so of several concurrent callers exactly one wins.
pub async fn try_create_new(path: &Path) -> Result<Option<File>> {
    match OpenOptions::new().write(true).create_new(true).open(path).await {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Claim `path`, or the first free `stem_N.ext` next to it
pub async fn create_unique_file(path: &Path) -> Result<(PathBuf, File)> {
    if let Some(file) = try_create_new(path).await? {
        return Ok((path.to_path_buf(), file));
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Other(format!("cannot extract file stem of {}", path.display())))?;
    let extension = path.extension().and_then(|e| e.to_str());
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let candidate = match extension {
            Some(ext) => parent.join(format!("{}_{}.{}", stem, i, ext)),
            None => parent.join(format!("{}_{}", stem, i)),
        };
        if let Some(file) = try_create_new(&candidate).await? {
            return Ok((candidate, file));
        }
    }

    Err(Error::Other(format!(
        "could not find a free filename for {} after {} attempts",
        path.display(),
        MAX_RENAME_ATTEMPTS
    )))
}

/// Fill a file claimed with [`try_create_new`]; the file is removed if the write fails
pub async fn write_claimed(path: &Path, mut file: File, bytes: &[u8]) -> Result<()> {
    let written = async {
        file.write_all(bytes).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(file);
        tokio::fs::remove_file(path).await.ok();
        return Err(e.into());
    }
    Ok(())
}

/// Seconds since the Unix epoch
pub fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
