// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Provisioner Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) holding:
// - Manila endpoint, token and API microversion
// - Access key wait policy
// - Logging settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::backoff::{Backoff, MAX_BACKOFF_DELAY};

pub const API_VERSION: &str = "manila-provisioner/v1";
pub const KIND: &str = "ProvisionerConfig";

/// Largest accepted growth factor for the access key wait
pub const MAX_BACKOFF_FACTOR: f64 = 10.0;

/// Environment variable pointing at the configuration file
pub const CONFIG_PATH_ENV: &str = "MANILA_PROVISIONER_CONFIG";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionerConfigManifest {
    /// API version (must be "manila-provisioner/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "ProvisionerConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: ProvisionerConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionerConfigSpec {
    #[serde(default)]
    pub manila: ManilaConfig,

    /// Policy for waiting on cephx keys
    #[serde(default)]
    pub access_wait: Backoff,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManilaConfig {
    /// Project scoped Shared File Systems endpoint
    #[serde(default)]
    pub endpoint: String,

    /// Keystone token, literal or "env:VAR_NAME"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default = "default_microversion")]
    pub microversion: String,

    /// Per-request timeout
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

fn default_microversion() -> String {
    "2.49".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ManilaConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: None,
            microversion: default_microversion(),
            timeout: default_request_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Default for ProvisionerConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "manila-provisioner".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                labels: None,
            },
            spec: ProvisionerConfigSpec::default(),
        }
    }
}

impl ManilaConfig {
    /// Resolve the token (supports "env:VAR_NAME" syntax)
    pub fn resolve_token(&self) -> anyhow::Result<String> {
        match &self.token {
            Some(t) if t.starts_with("env:") => {
                let var_name = &t["env:".len()..];
                std::env::var(var_name)
                    .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name))
            }
            Some(t) => Ok(t.clone()),
            None => anyhow::bail!("spec.manila.token is not set"),
        }
    }
}

impl ProvisionerConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. MANILA_PROVISIONER_CONFIG environment variable
    /// 2. ./manila-provisioner.yaml (working directory)
    /// 3. ~/.manila-provisioner/config.yaml (user home)
    /// 4. /etc/manila-provisioner/config.yaml
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./manila-provisioner.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".manila-provisioner").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/manila-provisioner/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("MANILA_ENDPOINT") {
            tracing::info!("Environment override: MANILA_ENDPOINT={}", endpoint);
            self.spec.manila.endpoint = endpoint;
        }

        if let Ok(token) = std::env::var("MANILA_TOKEN") {
            tracing::info!("Environment override: MANILA_TOKEN=<redacted>");
            self.spec.manila.token = Some(token);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let manila = &self.spec.manila;
        if manila.endpoint.is_empty() {
            anyhow::bail!("spec.manila.endpoint cannot be empty");
        }
        let endpoint = url::Url::parse(&manila.endpoint)
            .map_err(|e| anyhow::anyhow!("spec.manila.endpoint is not a valid URL: {}", e))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            anyhow::bail!("spec.manila.endpoint must use http or https");
        }

        if manila.microversion.is_empty() {
            anyhow::bail!("spec.manila.microversion cannot be empty");
        }

        if manila.timeout.is_zero() {
            anyhow::bail!("spec.manila.timeout must be greater than zero");
        }

        let wait = &self.spec.access_wait;
        if wait.initial_delay.is_zero() {
            anyhow::bail!("spec.access_wait.initial_delay must be greater than zero");
        }
        if wait.initial_delay > MAX_BACKOFF_DELAY {
            anyhow::bail!(
                "spec.access_wait.initial_delay must not exceed {:?}",
                MAX_BACKOFF_DELAY
            );
        }
        if !wait.factor.is_finite() || !(1.0..=MAX_BACKOFF_FACTOR).contains(&wait.factor) {
            anyhow::bail!(
                "spec.access_wait.factor must be between 1.0 and {}",
                MAX_BACKOFF_FACTOR
            );
        }
        if wait.steps == 0 {
            anyhow::bail!("spec.access_wait.steps must be at least 1");
        }

        Ok(())
    }
}
