// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file is read first if present. Secrets are injected as
//! environment variables in deployment.

use crate::services::DEFAULT_MAX_SPOTS_CEILING;
use std::env;

/// Which external services back identity and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Firebase Authentication + Firestore
    Gcp,
    /// Process-local identity provider and store
    Memory,
}

impl std::str::FromStr for Backend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gcp" | "firebase" => Ok(Backend::Gcp),
            "memory" => Ok(Backend::Memory),
            _ => Err(ConfigError::Invalid("BACKEND", value.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Frontend origin allowed by CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    pub backend: Backend,
    /// Firebase Web API key, required for the GCP backend
    pub firebase_api_key: Option<String>,
    /// Namespace for the activity collection
    pub app_id: String,
    /// Largest capacity an activity may have
    pub max_spots_ceiling: u32,
}

impl Config {
    /// Config for tests: memory backend, fixed signing key.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            backend: Backend::Memory,
            firebase_api_key: None,
            app_id: "sportlink-test".to_string(),
            max_spots_ceiling: DEFAULT_MAX_SPOTS_CEILING,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let backend = match env::var("BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => Backend::Gcp,
        };

        let firebase_api_key = env::var("FIREBASE_API_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if backend == Backend::Gcp && firebase_api_key.is_none() {
            return Err(ConfigError::Missing("FIREBASE_API_KEY"));
        }

        let max_spots_ceiling = match env::var("MAX_SPOTS_CEILING") {
            Ok(value) => value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|&n| n >= 1)
                .ok_or(ConfigError::Invalid("MAX_SPOTS_CEILING", value))?,
            Err(_) => DEFAULT_MAX_SPOTS_CEILING,
        };

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            backend,
            firebase_api_key,
            app_id: env::var("APP_ID").unwrap_or_else(|_| "sportlink-demo".to_string()),
            max_spots_ceiling,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test so parallel tests never race on the process environment.
    #[test]
    fn test_config_from_env() {
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("BACKEND", "memory");
        env::set_var("MAX_SPOTS_CEILING", "20");
        env::remove_var("APP_ID");

        let config = Config::from_env().expect("Config should load");
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.max_spots_ceiling, 20);
        assert_eq!(config.app_id, "sportlink-demo");

        env::set_var("MAX_SPOTS_CEILING", "0");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid("MAX_SPOTS_CEILING", _))
        ));

        env::set_var("MAX_SPOTS_CEILING", "20");
        env::set_var("BACKEND", "gcp");
        env::remove_var("FIREBASE_API_KEY");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("FIREBASE_API_KEY"))
        ));

        env::remove_var("BACKEND");
        env::remove_var("MAX_SPOTS_CEILING");
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("Memory".parse::<Backend>().unwrap(), Backend::Memory);
        assert_eq!("gcp".parse::<Backend>().unwrap(), Backend::Gcp);
        assert!("sqlite".parse::<Backend>().is_err());
    }
}
