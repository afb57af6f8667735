//! Application configuration management.
//!
//! Holds the Cognito user pool and identity pool identifiers, the prediction
//! API invoke URL and the upload bucket. Nothing here is hardcoded: values
//! come from `~/.config/predict-portal/config.json` and may be overridden by
//! `PREDICT_PORTAL_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "predict-portal";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_SINGLE_PREDICTION_PATH: &str = "prod/singlePrediction";
const DEFAULT_BATCH_PREDICTION_PATH: &str = "prod/batchPrediction";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration value for {field}: {value}")]
    Invalid { field: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CognitoConfig {
    pub user_pool_id: String,
    pub user_pool_client_id: String,
    pub region: String,
    pub identity_pool_id: String,
    /// Override for the user pool endpoint (local stacks, tests)
    pub endpoint: Option<String>,
    /// Override for the identity pool endpoint
    pub identity_endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiConfig {
    pub invoke_url: String,
    pub single_prediction_path: String,
    pub batch_prediction_path: String,
    /// Request timeout. Unset means the HTTP client's own default.
    pub timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            invoke_url: String::new(),
            single_prediction_path: DEFAULT_SINGLE_PREDICTION_PATH.to_string(),
            batch_prediction_path: DEFAULT_BATCH_PREDICTION_PATH.to_string(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageConfig {
    pub bucket: String,
    /// Path-style endpoint override (MinIO, localstack, tests)
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub cognito: CognitoConfig,
    pub api: ApiConfig,
    pub s3: StorageConfig,
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a specific file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Override values from `PREDICT_PORTAL_*` variables found by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("PREDICT_PORTAL_{}", name)).filter(|v| !v.trim().is_empty())
        };

        if let Some(v) = get("USER_POOL_ID") {
            self.cognito.user_pool_id = v;
        }
        if let Some(v) = get("USER_POOL_CLIENT_ID") {
            self.cognito.user_pool_client_id = v;
        }
        if let Some(v) = get("REGION") {
            self.cognito.region = v;
        }
        if let Some(v) = get("IDENTITY_POOL_ID") {
            self.cognito.identity_pool_id = v;
        }
        if let Some(v) = get("COGNITO_ENDPOINT") {
            self.cognito.endpoint = Some(v);
        }
        if let Some(v) = get("IDENTITY_ENDPOINT") {
            self.cognito.identity_endpoint = Some(v);
        }
        if let Some(v) = get("API_URL") {
            self.api.invoke_url = v;
        }
        if let Some(v) = get("SINGLE_PREDICTION_PATH") {
            self.api.single_prediction_path = v;
        }
        if let Some(v) = get("BATCH_PREDICTION_PATH") {
            self.api.batch_prediction_path = v;
        }
        if let Some(v) = get("API_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.api.timeout_secs = Some(v);
        }
        if let Some(v) = get("BUCKET") {
            self.s3.bucket = v;
        }
        if let Some(v) = get("S3_ENDPOINT") {
            self.s3.endpoint = Some(v);
        }
    }

    /// Every externally supplied identifier must be present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("cognito.userPoolId", &self.cognito.user_pool_id),
            ("cognito.userPoolClientId", &self.cognito.user_pool_client_id),
            ("cognito.region", &self.cognito.region),
            ("cognito.identityPoolId", &self.cognito.identity_pool_id),
            ("api.invokeUrl", &self.api.invoke_url),
            ("s3.bucket", &self.s3.bucket),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(field));
            }
        }

        if !self.api.invoke_url.starts_with("http://") && !self.api.invoke_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                field: "api.invokeUrl",
                value: self.api.invoke_url.clone(),
            });
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Session cache directory, one per app client.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;

        let mut path = cache_dir.join(APP_NAME);
        if !self.cognito.user_pool_client_id.is_empty() {
            path = path.join(&self.cognito.user_pool_client_id);
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn complete() -> Config {
        Config {
            cognito: CognitoConfig {
                user_pool_id: "us-east-1_abcde1234".to_string(),
                user_pool_client_id: "12aa34bb56cc78dd90ee12ff34".to_string(),
                region: "us-east-1".to_string(),
                identity_pool_id: "us-east-1:1234567890".to_string(),
                ..CognitoConfig::default()
            },
            api: ApiConfig {
                invoke_url: "https://abc.execute-api.us-east-1.amazonaws.com/".to_string(),
                ..ApiConfig::default()
            },
            s3: StorageConfig {
                bucket: "uploads".to_string(),
                endpoint: None,
            },
        }
    }

    #[test]
    fn test_parse_camel_case_json() {
        let json = r#"{
            "cognito": {"userPoolId": "us-east-1_abcde1234", "userPoolClientId": "client", "region": "us-east-1", "identityPoolId": "us-east-1:1"},
            "api": {"invokeUrl": "https://api.example.com/"},
            "s3": {"bucket": "uploads"}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.cognito.user_pool_client_id, "client");
        assert_eq!(config.api.single_prediction_path, "prod/singlePrediction");
        assert_eq!(config.api.batch_prediction_path, "prod/batchPrediction");
        assert_eq!(config.api.timeout_secs, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_field() {
        let mut config = complete();
        config.s3.bucket.clear();
        assert_eq!(config.validate(), Err(ConfigError::Missing("s3.bucket")));

        assert_eq!(
            Config::default().validate(),
            Err(ConfigError::Missing("cognito.userPoolId"))
        );
    }

    #[test]
    fn test_validate_invoke_url_scheme() {
        let mut config = complete();
        config.api.invoke_url = "abc.execute-api.us-east-1.amazonaws.com".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "api.invokeUrl", .. })));
    }

    #[test]
    fn test_apply_env_overrides() {
        let env: HashMap<String, String> = [
            ("PREDICT_PORTAL_BUCKET", "other-bucket"),
            ("PREDICT_PORTAL_REGION", "eu-west-1"),
            ("PREDICT_PORTAL_API_TIMEOUT_SECS", "15"),
            ("PREDICT_PORTAL_USER_POOL_ID", "  "),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let mut config = complete();
        config.apply_env(|key| env.get(key).cloned());

        assert_eq!(config.s3.bucket, "other-bucket");
        assert_eq!(config.cognito.region, "eu-west-1");
        assert_eq!(config.api.timeout_secs, Some(15));
        // blank values do not override
        assert_eq!(config.cognito.user_pool_id, "us-east-1_abcde1234");
    }

    #[test]
    fn test_load_from_missing_file_is_default() {
        let path = std::env::temp_dir().join("predict-portal-test-missing").join("config.json");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
    }
}
