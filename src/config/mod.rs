use crate::models::{Credentials, RunSettings};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::fs;

/// Name of the optional settings file inside the config directory.
pub const SETTINGS_FILE_NAME: &str = "catgirl.yaml";

/// Prefix of environment overrides, e.g. `CATGIRL_COUNT=5`.
pub const ENV_PREFIX: &str = "CATGIRL";

/// Configuration manager for run settings.
///
/// Settings are layered, later sources winning:
/// 1. Built-in defaults ([`RunSettings::default`])
/// 2. `catgirl.yaml` in the config directory, if present
/// 3. `CATGIRL_*` environment variables
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager rooted at `config_dir`. The directory need not exist yet.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Self {
        let config_dir = config_dir.as_ref().to_path_buf();
        Self {
            settings_path: config_dir.join(SETTINGS_FILE_NAME),
            config_dir,
        }
    }

    /// Load and validate settings from defaults, the settings file and the process environment.
    pub fn load_settings(&self) -> Result<RunSettings> {
        self.load_settings_with_env(None)
    }

    /// Like [`load_settings`](Self::load_settings), reading overrides from `env` instead of
    /// the process environment when given.
    pub fn load_settings_with_env(
        &self,
        env: Option<HashMap<String, String>>,
    ) -> Result<RunSettings> {
        let defaults = Config::try_from(&RunSettings::default())
            .context("Failed to build default settings")?;

        if self.settings_path.exists() {
            tracing::info!("Loading settings from {}", self.settings_path);
        } else {
            tracing::debug!("No settings file at {}, using defaults", self.settings_path);
        }

        let settings: RunSettings = Config::builder()
            .add_source(defaults)
            .add_source(
                File::from(self.settings_path.as_std_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .with_context(|| format!("Failed to read settings from {}", self.settings_path))?
            .try_deserialize()
            .context("Failed to parse settings")?;

        settings.validate().context("Invalid settings")?;

        tracing::info!(
            "Loaded settings: count={}, provider={}, theme={}, rating={}, out={}",
            settings.count,
            settings.provider,
            settings.theme,
            settings.rating,
            settings.out
        );
        Ok(settings)
    }

    /// Write `settings` to the settings file as YAML, creating the config directory if needed.
    pub fn save_settings(&self, settings: &RunSettings) -> Result<()> {
        settings.validate().context("Refusing to save invalid settings")?;

        if !self.config_dir.exists() {
            fs::create_dir_all(&self.config_dir)
                .with_context(|| {
                    format!("Failed to create config directory: {}", self.config_dir)
                })?;
        }

        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Provider credentials from the process environment.
    pub fn load_credentials(&self) -> Credentials {
        let credentials = Credentials::from_env();
        tracing::debug!(
            "Credentials: rule34={}, e621={}",
            credentials.rule34.is_some(),
            credentials.e621.is_some()
        );
        credentials
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}
