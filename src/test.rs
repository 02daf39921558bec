//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::api::{AuthProvider, AuthSession, TestAuth, DEMO_EMAIL, DEMO_PASSWORD};
use crate::config::write_test_config;
use crate::Config;
use tempfile::TempDir;

/// Test environment that sets up a bloom home directory with a Config.
/// Holds TempDir to keep the directory alive for the duration of the test.
pub struct TestEnv {
    _temp_dir: TempDir,
    config: Config,
}

impl TestEnv {
    /// Creates a test environment where nobody is signed in.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("bloom");
        write_test_config(&root, "https://project.example.co")
            .await
            .unwrap();
        let config = Config::load(&root).await.unwrap();
        Self {
            _temp_dir: temp_dir,
            config,
        }
    }

    /// Creates a test environment with the demo user signed in.
    pub async fn signed_in() -> Self {
        let env = Self::new().await;
        env.sign_in().await;
        env
    }

    /// Signs in the demo user and saves the session.
    pub async fn sign_in(&self) -> AuthSession {
        let session = TestAuth
            .sign_in(DEMO_EMAIL, DEMO_PASSWORD)
            .await
            .unwrap();
        session.save(&self.config.session_path()).await.unwrap();
        session
    }

    /// Returns a clone of the Config.
    pub fn config(&self) -> Config {
        self.config.clone()
    }
}
