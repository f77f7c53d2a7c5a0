// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration domain

use crate::infrastructure::constants::{
    CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE, DEFAULT_EXEC_TIMEOUT_SECS,
    DEFAULT_POD_READY_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_TRANSFER_IMAGE,
};
use crate::shared::error::{ReplantError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Top-level configuration file (YAML).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub backup_provider: String,

    #[serde(default)]
    pub backup_providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub backup_targets: Vec<BackupTarget>,

    #[serde(default)]
    pub replant: ReplantSettings,
}

/// Definition of one backup provider instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub name: String,

    #[serde(default)]
    pub backup_repository: String,

    #[serde(default)]
    pub backup_repository_password_location: Option<String>,
}

/// A restorable location with optional hooks run around the sync-back step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupTarget {
    pub location: String,

    #[serde(rename = "pre-restore-hook", default)]
    pub pre_restore_hook: Option<Vec<String>>,

    #[serde(rename = "post-restore-hook", default)]
    pub post_restore_hook: Option<Vec<String>>,
}

/// Tunables for the volume replant flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplantSettings {
    #[serde(default = "default_pod_ready_timeout_secs")]
    pub pod_ready_timeout_secs: u64,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_exec_timeout_secs")]
    pub exec_timeout_secs: u64,

    #[serde(default = "default_transfer_image")]
    pub transfer_image: String,
}

fn default_pod_ready_timeout_secs() -> u64 {
    DEFAULT_POD_READY_TIMEOUT_SECS
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_exec_timeout_secs() -> u64 {
    DEFAULT_EXEC_TIMEOUT_SECS
}

fn default_transfer_image() -> String {
    DEFAULT_TRANSFER_IMAGE.to_string()
}

impl Default for ReplantSettings {
    fn default() -> Self {
        Self {
            pod_ready_timeout_secs: default_pod_ready_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            exec_timeout_secs: default_exec_timeout_secs(),
            transfer_image: default_transfer_image(),
        }
    }
}

/// Runtime form of [`ReplantSettings`] with resolved durations.
#[derive(Debug, Clone)]
pub struct ReplantTunables {
    pub pod_ready_timeout: Duration,
    pub poll_interval: Duration,
    pub exec_timeout: Duration,
    pub transfer_image: String,
}

impl Default for ReplantTunables {
    fn default() -> Self {
        ReplantSettings::default().tunables()
    }
}

impl ReplantSettings {
    pub fn tunables(&self) -> ReplantTunables {
        ReplantTunables {
            pod_ready_timeout: Duration::from_secs(self.pod_ready_timeout_secs),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            exec_timeout: Duration::from_secs(self.exec_timeout_secs),
            transfer_image: self.transfer_image.clone(),
        }
    }
}

impl Config {
    /// Resolve the configuration file path: environment variable first, then
    /// the default filename in the working directory.
    pub fn resolve_path() -> String {
        std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            ReplantError::config_error(format!(
                "Cannot read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = serde_yaml::from_str(&data)?;
        Ok(config)
    }

    /// Load the resolved config file, falling back to defaults when it does
    /// not exist. Replant works without a config file; backup commands need
    /// one and fail later with a provider configuration error.
    pub fn load_or_default() -> Result<Self> {
        let path = Self::resolve_path();
        if Path::new(&path).exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Find the backup target describing `location`, if any.
    pub fn target_for(&self, location: &str) -> Option<&BackupTarget> {
        self.backup_targets.iter().find(|t| t.location == location)
    }
}

/// Output format for list-style command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Table,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            "table" => Ok(OutputFormat::Table),
            other => Err(format!(
                "Invalid output format '{}': expected json, yaml or table",
                other
            )),
        }
    }
}

impl OutputFormat {
    /// Serialize `data` in this format. Table rendering is type-specific and
    /// handled by the display layer, not here.
    pub fn render<T: Serialize>(&self, data: &T) -> Result<String> {
        match self {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
            OutputFormat::Yaml => Ok(serde_yaml::to_string(data)?),
            OutputFormat::Table => Err(ReplantError::config_error(
                "table output is not supported for this data",
            )),
        }
    }
}
