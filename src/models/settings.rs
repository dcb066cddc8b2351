use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use super::image::{ProviderId, Theme, UserRating};

pub const COUNT_RANGE: (usize, usize) = (1, 200);
pub const CONCURRENCY_RANGE: (usize, usize) = (1, 16);
pub const RETRIES_RANGE: (u32, u32) = (0, 5);
pub const TIMEOUT_RANGE: (f64, f64) = (1.0, 120.0);

/// User agent sent to e621 when `E621_USER_AGENT` is not set.
pub const DEFAULT_E621_USER_AGENT: &str =
    concat!("catgirl-downloader/", env!("CARGO_PKG_VERSION"));

/// Errors raised while parsing or validating run settings
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: String,
        min: String,
        max: String,
    },

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Unknown theme: {0}")]
    UnknownTheme(String),

    #[error("Unknown rating: {0}")]
    UnknownRating(String),
}

/// Provider selection: a fixed provider or the auto fallback strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProviderChoice {
    #[default]
    Auto,
    Provider(ProviderId),
}

impl fmt::Display for ProviderChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderChoice::Auto => f.write_str("auto"),
            ProviderChoice::Provider(id) => f.write_str(id.as_str()),
        }
    }
}

impl FromStr for ProviderChoice {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(ProviderChoice::Auto);
        }
        s.parse().map(ProviderChoice::Provider)
    }
}

impl TryFrom<String> for ProviderChoice {
    type Error = SettingsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProviderChoice> for String {
    fn from(value: ProviderChoice) -> Self {
        value.to_string()
    }
}

/// Settings for one download run.
///
/// Immutable for the lifetime of a run; the runner takes its own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub count: usize,
    pub provider: ProviderChoice,
    pub theme: Theme,
    pub rating: UserRating,
    pub randomize: bool,
    pub out: Utf8PathBuf,
    pub concurrency: usize,
    pub retries: u32,
    /// Request timeout in seconds
    pub timeout: f64,
    pub verbose: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            count: 1,
            provider: ProviderChoice::Auto,
            theme: Theme::Catgirl,
            rating: UserRating::Any,
            randomize: false,
            out: Utf8PathBuf::from("./downloads"),
            concurrency: 4,
            retries: 3,
            timeout: 20.0,
            verbose: false,
        }
    }
}

impl RunSettings {
    /// Check every numeric field against its allowed range.
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_range("count", self.count, COUNT_RANGE)?;
        check_range("concurrency", self.concurrency, CONCURRENCY_RANGE)?;
        check_range("retries", self.retries, RETRIES_RANGE)?;
        if !self.timeout.is_finite() {
            return Err(out_of_range("timeout", self.timeout, TIMEOUT_RANGE));
        }
        check_range("timeout", self.timeout, TIMEOUT_RANGE)
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.timeout.clamp(TIMEOUT_RANGE.0, TIMEOUT_RANGE.1))
    }
}

fn check_range<T>(field: &'static str, value: T, (min, max): (T, T)) -> Result<(), SettingsError>
where
    T: PartialOrd + fmt::Display + Copy,
{
    if value < min || value > max {
        return Err(out_of_range(field, value, (min, max)));
    }
    Ok(())
}

fn out_of_range<T: fmt::Display>(
    field: &'static str,
    value: T,
    (min, max): (T, T),
) -> SettingsError {
    SettingsError::OutOfRange {
        field,
        value: value.to_string(),
        min: min.to_string(),
        max: max.to_string(),
    }
}

/// A user id / API key pair for providers that need an account.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub user: String,
    pub api_key: String,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("user", &self.user)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Provider credentials, passed explicitly into provider construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub rule34: Option<ApiCredentials>,
    pub e621: Option<ApiCredentials>,
    pub e621_user_agent: Option<String>,
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through `lookup`; blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let pair = |user_key: &str, key_key: &str| match (get(user_key), get(key_key)) {
            (Some(user), Some(api_key)) => Some(ApiCredentials { user, api_key }),
            _ => None,
        };

        Self {
            rule34: pair("RULE34_USER_ID", "RULE34_API_KEY"),
            e621: pair("E621_LOGIN", "E621_API_KEY"),
            e621_user_agent: get("E621_USER_AGENT"),
        }
    }

    pub fn e621_user_agent(&self) -> &str {
        self.e621_user_agent
            .as_deref()
            .unwrap_or(DEFAULT_E621_USER_AGENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_run_settings_defaults() {
        let settings = RunSettings::default();
        assert_eq!(settings.count, 1);
        assert_eq!(settings.provider, ProviderChoice::Auto);
        assert_eq!(settings.concurrency, 4);
        assert_eq!(settings.retries, 3);
        assert_eq!(settings.timeout_duration(), Duration::from_secs(20));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let settings = RunSettings {
            count: 201,
            ..RunSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::OutOfRange { field: "count", .. })
        ));

        let settings = RunSettings {
            concurrency: 0,
            ..RunSettings::default()
        };
        assert!(settings.validate().is_err());

        let settings = RunSettings {
            timeout: f64::NAN,
            ..RunSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_provider_choice_parsing() {
        assert_eq!("AUTO".parse::<ProviderChoice>().unwrap(), ProviderChoice::Auto);
        assert_eq!(
            "e621".parse::<ProviderChoice>().unwrap(),
            ProviderChoice::Provider(ProviderId::E621)
        );
        assert_eq!(
            "nope".parse::<ProviderChoice>(),
            Err(SettingsError::UnknownProvider("nope".to_string()))
        );
        assert_eq!(String::from(ProviderChoice::Provider(ProviderId::NekosApi)), "nekosapi");
    }

    #[test]
    fn test_credentials_require_both_halves() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("RULE34_USER_ID", "123"),
            ("RULE34_API_KEY", "secret"),
            ("E621_LOGIN", "someone"),
            ("E621_API_KEY", "   "),
        ]);
        let credentials = Credentials::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(credentials.rule34.as_ref().unwrap().user, "123");
        assert!(credentials.e621.is_none());
        assert_eq!(credentials.e621_user_agent(), DEFAULT_E621_USER_AGENT);
    }

    #[test]
    fn test_api_key_is_redacted_in_debug() {
        let credentials = ApiCredentials {
            user: "me".to_string(),
            api_key: "hunter2".to_string(),
        };
        assert!(!format!("{:?}", credentials).contains("hunter2"));
    }
}
