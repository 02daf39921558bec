use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its subdirectories and:
/// - Creates an initial `config.json` file using `store_url` along with default settings
/// - Moves `credentials_file` into its default location in the data dir.
///
/// # Arguments
/// - `bloom_home` - The directory that will be the root of data directory, e.g. `$HOME/bloom`
/// - `credentials_file` - A JSON file holding `store_api_key` and `auth_api_key`.
/// - `store_url` - The base URL of the hosted data store project.
///
/// # Errors
/// - Returns an error if the URL or credentials are invalid or any file operations fail.
pub async fn init(bloom_home: &Path, credentials_file: &Path, store_url: &str) -> Result<Out<()>> {
    let _config = Config::create(bloom_home, credentials_file, store_url)
        .await
        .context("Unable to create the data directory and configs")
        .pub_result(ErrorType::Config)?;
    Ok("Successfully created the bloom directory and config".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_then_load() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("bloom");
        let keys = dir.path().join("keys.json");
        std::fs::write(&keys, r#"{"store_api_key": "a", "auth_api_key": "b"}"#).unwrap();
        let out = init(&home, &keys, "https://project.example.co").await.unwrap();
        assert!(out.message().contains("Successfully"));
        assert!(!keys.exists());
        let config = Config::load(&home).await.unwrap();
        assert_eq!(config.store_url().as_str(), "https://project.example.co/");
    }

    #[tokio::test]
    async fn test_init_bad_url_is_config_error() {
        let dir = TempDir::new().unwrap();
        let keys = dir.path().join("keys.json");
        std::fs::write(&keys, r#"{"store_api_key": "a", "auth_api_key": "b"}"#).unwrap();
        let e = init(&dir.path().join("bloom"), &keys, "ftp://nope")
            .await
            .unwrap_err();
        assert!(e.to_string().starts_with("config error:"));
    }
}
