use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::io::{self, Write};
use std::sync::LazyLock;

use crate::models::Theme;

/// Extension used when neither the content type nor the URL yields a usable one.
pub const DEFAULT_EXTENSION: &str = ".img";

/// Number of hex characters of the URL digest embedded in a filename.
pub const URL_HASH_LEN: usize = 10;

static EXTENSION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]{1,10}$").expect("Invalid extension regex"));

/// Pick a file extension (with leading dot) for a downloaded image.
///
/// The `image/*` subtype of `content_type` wins; otherwise the suffix of the URL
/// path is used. Either must be a 1-10 character lowercase alphanumeric token,
/// else [`DEFAULT_EXTENSION`] is returned.
pub fn extension_from_content_type(content_type: Option<&str>, url: &str) -> String {
    if let Some(content_type) = content_type {
        let normalized = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if let Some(subtype) = normalized.strip_prefix("image/") {
            let mapped = match subtype {
                "jpeg" | "pjpeg" => "jpg",
                "svg+xml" => "svg",
                "x-icon" | "vnd.microsoft.icon" => "ico",
                other => other.split('+').next().unwrap_or(other),
            };
            if EXTENSION_TOKEN.is_match(mapped) {
                return format!(".{}", mapped);
            }
        }
    }

    let path = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    if let Some(suffix) = Utf8Path::new(&path).extension() {
        let suffix = suffix.to_ascii_lowercase();
        if EXTENSION_TOKEN.is_match(&suffix) {
            return format!(".{}", suffix);
        }
    }

    DEFAULT_EXTENSION.to_string()
}

/// Short, content-independent digest of a URL.
pub fn url_hash(url: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
    digest[..URL_HASH_LEN].to_string()
}

/// Build `<provider>_<YYYYMMDDTHHMMSS>_<hash><ext>` for a download written at `now`.
pub fn build_filename(provider: &str, url: &str, extension: &str, now: DateTime<Utc>) -> String {
    let timestamp = now.format("%Y%m%dT%H%M%S");
    let hash = url_hash(url);
    if extension.starts_with('.') {
        format!("{}_{}_{}{}", provider, timestamp, hash, extension)
    } else {
        format!("{}_{}_{}.{}", provider, timestamp, hash, extension)
    }
}

/// Directory that holds every download of `theme` under `out_dir`.
pub fn category_dir(out_dir: &Utf8Path, theme: Theme) -> Utf8PathBuf {
    out_dir.join(theme.as_str())
}

/// Write `data` to `path` through a temp file in the same directory and an atomic rename.
///
/// The temp file is removed if any step fails, so `path` is either absent or complete.
pub fn atomic_write_bytes(path: &Utf8Path, data: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    std::fs::create_dir_all(parent)?;

    let stem = path.file_stem().unwrap_or("download");
    let mut temp_file = tempfile::Builder::new()
        .prefix(&format!("{}_", stem))
        .suffix(".tmp")
        .tempfile_in(parent)?;

    temp_file.write_all(data)?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path).map_err(|e| e.error)?;

    tracing::debug!("Wrote {} bytes to {}", data.len(), path);
    Ok(())
}

/// Async wrapper around [`atomic_write_bytes`] that runs on the blocking pool.
pub async fn write_atomic<B>(path: Utf8PathBuf, data: B) -> io::Result<()>
where
    B: AsRef<[u8]> + Send + 'static,
{
    tokio::task::spawn_blocking(move || atomic_write_bytes(&path, data.as_ref()))
        .await
        .map_err(io::Error::other)?
}
