use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::settings::SettingsError;

/// Upper bound on the number of tags kept per candidate.
pub const MAX_TAGS: usize = 32;

/// Requested content category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Catgirl,
    Neko,
    Kitsune,
    Femboy,
}

impl Theme {
    pub const ALL: [Theme; 4] = [Theme::Catgirl, Theme::Neko, Theme::Kitsune, Theme::Femboy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Catgirl => "catgirl",
            Theme::Neko => "neko",
            Theme::Kitsune => "kitsune",
            Theme::Femboy => "femboy",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Theme::ALL
            .into_iter()
            .find(|theme| theme.as_str() == lowered)
            .ok_or_else(|| SettingsError::UnknownTheme(s.to_string()))
    }
}

/// Rating attached to a candidate by its provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Safe,
    Suggestive,
    Borderline,
    Explicit,
    #[default]
    Unknown,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Safe => "safe",
            Rating::Suggestive => "suggestive",
            Rating::Borderline => "borderline",
            Rating::Explicit => "explicit",
            Rating::Unknown => "unknown",
        }
    }

    /// Map a provider-reported rating onto the known set.
    ///
    /// Anything missing or unrecognised becomes [`Rating::Unknown`].
    pub fn normalize(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("safe") => Rating::Safe,
            Some("suggestive") => Rating::Suggestive,
            Some("borderline") => Rating::Borderline,
            Some("explicit") => Rating::Explicit,
            _ => Rating::Unknown,
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rating filter requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRating {
    #[default]
    Any,
    Safe,
    Suggestive,
    Borderline,
    Explicit,
}

impl UserRating {
    pub const ALL: [UserRating; 5] = [
        UserRating::Any,
        UserRating::Safe,
        UserRating::Suggestive,
        UserRating::Borderline,
        UserRating::Explicit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRating::Any => "any",
            UserRating::Safe => "safe",
            UserRating::Suggestive => "suggestive",
            UserRating::Borderline => "borderline",
            UserRating::Explicit => "explicit",
        }
    }
}

impl fmt::Display for UserRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRating {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        UserRating::ALL
            .into_iter()
            .find(|rating| rating.as_str() == lowered)
            .ok_or_else(|| SettingsError::UnknownRating(s.to_string()))
    }
}

/// Identifier of a concrete image provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    WaifuPics,
    #[serde(rename = "nekosapi")]
    NekosApi,
    NekosBest,
    NekosLife,
    Nekobot,
    E621,
    Rule34,
}

impl ProviderId {
    pub const ALL: [ProviderId; 7] = [
        ProviderId::WaifuPics,
        ProviderId::NekosApi,
        ProviderId::NekosBest,
        ProviderId::NekosLife,
        ProviderId::Nekobot,
        ProviderId::E621,
        ProviderId::Rule34,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::WaifuPics => "waifu_pics",
            ProviderId::NekosApi => "nekosapi",
            ProviderId::NekosBest => "nekos_best",
            ProviderId::NekosLife => "nekos_life",
            ProviderId::Nekobot => "nekobot",
            ProviderId::E621 => "e621",
            ProviderId::Rule34 => "rule34",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        ProviderId::ALL
            .into_iter()
            .find(|id| id.as_str() == lowered)
            .ok_or_else(|| SettingsError::UnknownProvider(s.to_string()))
    }
}

/// A discovered remote image that has not been downloaded yet.
///
/// Fields are private so a candidate cannot change once a provider has built it;
/// the URL is the identity key for deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteImage {
    provider: ProviderId,
    category: Theme,
    url: String,
    rating: Rating,
    tags: Vec<String>,
}

impl RemoteImage {
    pub fn new(
        provider: ProviderId,
        category: Theme,
        url: impl Into<String>,
        rating: Rating,
        mut tags: Vec<String>,
    ) -> Self {
        tags.truncate(MAX_TAGS);
        Self {
            provider,
            category,
            url: url.into(),
            rating,
            tags,
        }
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn category(&self) -> Theme {
        self.category
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn rating(&self) -> Rating {
        self.rating
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Outcome of a single candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Ok,
    Failed,
    SkippedDuplicate,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Ok => "ok",
            DownloadStatus::Failed => "failed",
            DownloadStatus::SkippedDuplicate => "skipped_duplicate",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error text attached to every duplicate result.
pub const DUPLICATE_URL_MESSAGE: &str = "Duplicate URL in candidate list";

/// One record per candidate that entered the pipeline.
///
/// Built only through [`DownloadResult::ok`], [`DownloadResult::failed`] and
/// [`DownloadResult::duplicate`], which keep `path` present exactly for `Ok`
/// results and `error` present exactly for non-`Ok` results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadResult {
    url: String,
    path: Option<Utf8PathBuf>,
    provider: ProviderId,
    status: DownloadStatus,
    error: Option<String>,
}

impl DownloadResult {
    pub fn ok(image: &RemoteImage, path: Utf8PathBuf) -> Self {
        Self {
            url: image.url.clone(),
            path: Some(path),
            provider: image.provider,
            status: DownloadStatus::Ok,
            error: None,
        }
    }

    pub fn failed(image: &RemoteImage, error: impl Into<String>) -> Self {
        Self {
            url: image.url.clone(),
            path: None,
            provider: image.provider,
            status: DownloadStatus::Failed,
            error: Some(error.into()),
        }
    }

    pub fn duplicate(image: &RemoteImage) -> Self {
        Self {
            url: image.url.clone(),
            path: None,
            provider: image.provider,
            status: DownloadStatus::SkippedDuplicate,
            error: Some(DUPLICATE_URL_MESSAGE.to_string()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path(&self) -> Option<&Utf8PathBuf> {
        self.path.as_ref()
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn status(&self) -> DownloadStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Overall classification of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

/// Counts derived from a run's results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadSummary {
    pub requested: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub duplicates: usize,
    pub output_dir: Utf8PathBuf,
}

impl DownloadSummary {
    /// Count statuses in `results`. Nothing is cached; call again after more results arrive.
    pub fn from_results(
        requested: usize,
        results: &[DownloadResult],
        output_dir: Utf8PathBuf,
    ) -> Self {
        let count = |status: DownloadStatus| results.iter().filter(|r| r.status == status).count();

        Self {
            requested,
            downloaded: count(DownloadStatus::Ok),
            failed: count(DownloadStatus::Failed),
            duplicates: count(DownloadStatus::SkippedDuplicate),
            output_dir,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.downloaded == self.requested
    }

    pub fn status(&self) -> RunStatus {
        if self.is_complete() && self.failed == 0 {
            RunStatus::Success
        } else if self.downloaded > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        }
    }
}
