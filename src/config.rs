//! Configuration file handling for bloom.
//!
//! The configuration file is stored at `$BLOOM_HOME/config.json` and contains settings for the
//! application including the data store URL, the hourly rate used for time entries, the inactivity
//! timer and the location of the credentials file.

use crate::api::Credentials;
use crate::model::DEFAULT_HOURLY_RATE;
use crate::session::{TimerSettings, WarningActivity};
use crate::{utils, Result};
use anyhow::{bail, ensure, Context};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const APP_NAME: &str = "bloom";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const CREDENTIALS_JSON: &str = "credentials.json";
const SESSION_JSON: &str = "session.json";
const CONFIG_JSON: &str = "config.json";
const INACTIVITY_LIMIT_SECS: u64 = 600;
const WARNING_SECS: u64 = 30;

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$BLOOM_HOME` and from there it loads `$BLOOM_HOME/config.json`. It provides paths
/// to other items that are either configurable or are expected in a certain location within the
/// bloom home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    store_url: Url,
}

impl Config {
    /// Creates the data directory, its subdirectories and:
    /// - Creates an initial `config.json` file using `store_url` along with default settings
    /// - Moves `credentials_file` into its default location in the data dir.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of data directory, e.g. `$HOME/bloom`
    /// - `credentials_file` - A JSON file holding `store_api_key` and `auth_api_key`. It is
    ///   validated and then moved to `$BLOOM_HOME/.secrets/credentials.json`.
    /// - `store_url` - The base URL of the hosted data store, e.g. `https://abcd.supabase.co`
    ///
    /// # Errors
    /// - Returns an error if the URL or the credentials are invalid, or if any file operation fails.
    pub async fn create(
        dir: impl Into<PathBuf>,
        credentials_file: &Path,
        store_url: &str,
    ) -> Result<Self> {
        let store_url = parse_store_url(store_url)?;
        Credentials::load(credentials_file)
            .await
            .with_context(|| format!("Invalid credentials in {}", credentials_file.display()))?;

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the bloom home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let secrets_dir = root.join(SECRETS);
        utils::make_dir(&secrets_dir).await?;
        set_owner_only(&secrets_dir).await?;

        let credentials_destination = secrets_dir.join(CREDENTIALS_JSON);
        utils::rename(credentials_file, &credentials_destination).await?;
        set_owner_only(&credentials_destination).await?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile {
            store_url: store_url.to_string(),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            secrets: secrets_dir,
            config_path,
            config_file,
            store_url,
        })
    }

    /// This will
    /// - validate that `bloom_home` exists and that the config file exists
    /// - load and validate the config file
    /// - validate that the secrets directory exists
    /// - return the loaded configuration object
    pub async fn load(bloom_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = bloom_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("Bloom home is missing, run 'bloom init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let store_url = parse_store_url(&config_file.store_url)?;

        let config = Self {
            secrets: root.join(SECRETS),
            root,
            config_path,
            config_file,
            store_url,
        };
        if !config.secrets.is_dir() {
            bail!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            )
        }
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn store_url(&self) -> &Url {
        &self.store_url
    }

    pub fn hourly_rate(&self) -> Decimal {
        self.config_file.hourly_rate
    }

    pub fn timer_settings(&self) -> TimerSettings {
        TimerSettings::new(
            Duration::from_secs(self.config_file.inactivity_limit_secs),
            Duration::from_secs(self.config_file.warning_secs),
        )
        .with_warning_activity(self.config_file.warning_activity)
    }

    /// Returns the stored `credentials_path` if it is absolute, otherwise resolves the relative
    /// path against `$BLOOM_HOME`.
    pub fn credentials_path(&self) -> PathBuf {
        self.resolve_path(self.config_file.credentials_path())
    }

    /// Where the signed-in user is remembered.
    pub fn session_path(&self) -> PathBuf {
        self.secrets.join(SESSION_JSON)
    }

    pub(crate) async fn credentials(&self) -> Result<Credentials> {
        Credentials::load(&self.credentials_path()).await
    }

    fn resolve_path(&self, p: PathBuf) -> PathBuf {
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }
}

fn parse_store_url(s: &str) -> Result<Url> {
    let url = Url::parse(s).with_context(|| format!("'{s}' is not a valid store URL"))?;
    ensure!(
        matches!(url.scheme(), "http" | "https"),
        "The store URL must use http or https, got '{s}'"
    );
    Ok(url)
}

async fn set_owner_only(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        let mode = if path.is_dir() { 0o700 } else { 0o600 };
        tokio::fs::set_permissions(path, Permissions::from_mode(mode))
            .await
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "bloom",
///   "config_version": 1,
///   "store_url": "https://abcd.supabase.co",
///   "hourly_rate": "15",
///   "inactivity_limit_secs": 600,
///   "warning_secs": 30,
///   "warning_activity": "require_confirmation",
///   "credentials_path": ".secrets/credentials.json"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "bloom"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Base URL of the hosted data store
    store_url: String,

    /// Dollars per hour for new time entries
    #[serde(default = "default_hourly_rate")]
    hourly_rate: Decimal,

    /// Seconds without input before the session is logged out
    #[serde(default = "default_inactivity_limit_secs")]
    inactivity_limit_secs: u64,

    /// Seconds of warning before the logout
    #[serde(default = "default_warning_secs")]
    warning_secs: u64,

    /// Whether ordinary input dismisses the logout warning
    #[serde(default)]
    warning_activity: WarningActivity,

    /// Path to the credentials file (optional, relative to `$BLOOM_HOME` or absolute)
    /// Defaults to $BLOOM_HOME/.secrets/credentials.json if not specified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    credentials_path: Option<PathBuf>,
}

fn default_hourly_rate() -> Decimal {
    DEFAULT_HOURLY_RATE
}

fn default_inactivity_limit_secs() -> u64 {
    INACTIVITY_LIMIT_SECS
}

fn default_warning_secs() -> u64 {
    WARNING_SECS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            store_url: String::new(),
            hourly_rate: DEFAULT_HOURLY_RATE,
            inactivity_limit_secs: INACTIVITY_LIMIT_SECS,
            warning_secs: WARNING_SECS,
            warning_activity: WarningActivity::default(),
            credentials_path: None,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile from the specified path and validates it.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path)
            .await
            .context("Unable to load the config file")?;

        ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        ensure!(
            config.config_version == CONFIG_VERSION,
            "Unsupported config_version in config file: expected {}, got {}",
            CONFIG_VERSION,
            config.config_version
        );
        ensure!(
            config.hourly_rate >= Decimal::ZERO,
            "Invalid hourly_rate in config file: {}",
            config.hourly_rate
        );
        ensure!(
            config.inactivity_limit_secs > 0,
            "Invalid inactivity_limit_secs in config file: must be greater than zero"
        );

        Ok(config)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    /// Gets the credentials path.
    ///
    /// If the path is relative, it should be interpreted as relative to `$BLOOM_HOME`.
    /// If None, defaults to $BLOOM_HOME/.secrets/credentials.json
    pub fn credentials_path(&self) -> PathBuf {
        self.credentials_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(CREDENTIALS_JSON))
    }
}

#[cfg(test)]
pub(crate) async fn write_test_config(root: &Path, store_url: &str) -> Result<()> {
    utils::make_dir(root.join(SECRETS)).await?;
    let config_file = ConfigFile {
        store_url: store_url.to_string(),
        ..ConfigFile::default()
    };
    config_file.save(root.join(CONFIG_JSON)).await?;
    crate::api::File::new(
        root.join(SECRETS).join(CREDENTIALS_JSON),
        Credentials::new("test-store-key", "test-auth-key"),
    )
    .save()
    .await
}
