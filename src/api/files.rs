//! JSON files kept under `$BLOOM_HOME/.secrets`.
//! - `credentials.json`: the API keys for the data store and the authentication provider
//! - `session.json`: the signed-in user

use crate::{utils, Result};
use anyhow::{ensure, Context};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// A file that we `Serialize`, `Deserialize`, and hold in memory in-between. Basically we are just
/// holding the `path` and the `data` here.
#[derive(Default, Debug, Clone)]
pub(crate) struct File<F>
where
    F: Serialize + DeserializeOwned + Clone + Debug,
{
    path: PathBuf,
    data: F,
}

impl<F> File<F>
where
    F: Serialize + DeserializeOwned + Clone + Debug,
{
    /// Load data from a file and create a File instance
    pub(crate) async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data: F = utils::deserialize(&path).await?;
        Ok(Self { path, data })
    }

    /// Like `load`, but a missing file is `None`.
    pub(crate) async fn load_if_exists(path: impl Into<PathBuf>) -> Result<Option<Self>> {
        let path = path.into();
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(Self::load(path).await?))
    }

    pub(crate) fn new(path: impl Into<PathBuf>, data: F) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    /// Save the current data to the file, readable only by the owner.
    pub(crate) async fn save(&self) -> Result<()> {
        let json =
            serde_json::to_string_pretty(&self.data).context("Failed to serialize data to JSON")?;
        utils::write(&self.path, json).await?;

        #[cfg(unix)]
        {
            use std::fs::Permissions;
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, Permissions::from_mode(0o600))
                .await
                .context("Failed to set file permissions")?;
        }

        Ok(())
    }

    pub(crate) async fn delete(self) -> Result<()> {
        utils::remove_file(&self.path).await
    }

    pub(crate) fn data(&self) -> &F {
        &self.data
    }

    pub(crate) fn into_data(self) -> F {
        self.data
    }
}

/// The structure of `credentials.json`.
///
/// ```json
/// {
///   "store_api_key": "eyJhbGciOi...",
///   "auth_api_key": "AIzaSyD..."
/// }
/// ```
#[derive(Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub(crate) struct Credentials {
    /// The public ("anon") key of the hosted data store, sent as the `apikey` header.
    store_api_key: String,

    /// The web API key of the authentication provider.
    auth_api_key: String,
}

impl Credentials {
    #[cfg(test)]
    pub(crate) fn new(store_api_key: impl Into<String>, auth_api_key: impl Into<String>) -> Self {
        Self {
            store_api_key: store_api_key.into(),
            auth_api_key: auth_api_key.into(),
        }
    }

    /// Loads and validates `credentials.json`.
    pub(crate) async fn load(path: &Path) -> Result<Self> {
        let credentials: Self = utils::deserialize(path)
            .await
            .context("Unable to read the credentials file")?;
        credentials.validate()?;
        Ok(credentials)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        ensure!(
            !self.store_api_key.trim().is_empty(),
            "The credentials file is missing 'store_api_key'"
        );
        ensure!(
            !self.auth_api_key.trim().is_empty(),
            "The credentials file is missing 'auth_api_key'"
        );
        Ok(())
    }

    pub(crate) fn store_api_key(&self) -> &str {
        &self.store_api_key
    }

    pub(crate) fn auth_api_key(&self) -> &str {
        &self.auth_api_key
    }
}

// Keys stay out of logs.
impl Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("store_api_key", &"<redacted>")
            .field("auth_api_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_credentials_load() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("credentials.json");
        utils::write(&p, r#"{"store_api_key": "anon-key", "auth_api_key": "web-key"}"#)
            .await
            .unwrap();
        let credentials = Credentials::load(&p).await.unwrap();
        assert_eq!(credentials.store_api_key(), "anon-key");
        assert_eq!(credentials.auth_api_key(), "web-key");
        assert!(!format!("{credentials:?}").contains("anon-key"));
    }

    #[tokio::test]
    async fn test_credentials_missing_key() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("credentials.json");
        utils::write(&p, r#"{"store_api_key": "anon-key", "auth_api_key": " "}"#)
            .await
            .unwrap();
        let message = format!("{:#}", Credentials::load(&p).await.unwrap_err());
        assert!(message.contains("auth_api_key"));
    }

    #[tokio::test]
    async fn test_file_save_load_delete() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("data.json");
        let file = File::new(&p, Credentials::new("a", "b"));
        file.save().await.unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&p).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let loaded: File<Credentials> = File::load_if_exists(&p).await.unwrap().unwrap();
        assert_eq!(loaded.data(), file.data());
        loaded.delete().await.unwrap();
        assert!(File::<Credentials>::load_if_exists(&p)
            .await
            .unwrap()
            .is_none());
    }
}
