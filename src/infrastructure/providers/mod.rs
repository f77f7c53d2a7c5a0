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

//! Backup provider abstraction
//!
//! Providers are registered by name; the active one is selected once at
//! startup from configuration.

pub mod restic;

use crate::domain::config::{Config, ProviderConfig};
use crate::shared::error::{ReplantError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub use restic::ResticProvider;

/// A point-in-time backup artifact exposed by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub tree: String,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub uid: i64,
    #[serde(default)]
    pub gid: i64,
    pub id: String,
    #[serde(default)]
    pub short_id: String,
}

#[async_trait::async_trait]
pub trait BackupProvider: Send + Sync + std::fmt::Debug {
    /// List available snapshots, optionally narrowed to the given paths.
    async fn list_snapshots(&self, filter_paths: &[String]) -> Result<Vec<Snapshot>>;

    /// Restore one snapshot into `target`, optionally narrowed to `paths`.
    async fn restore_snapshot(
        &self,
        snapshot_id: &str,
        target: &Path,
        paths: &[String],
    ) -> Result<()>;

    /// Mount a snapshot read-only at `mount_path`.
    async fn mount_snapshot(&self, snapshot_id: &str, mount_path: &Path) -> Result<()>;
}

type ProviderFactory = fn(&ProviderConfig) -> Box<dyn BackupProvider>;

fn provider_registry() -> HashMap<&'static str, ProviderFactory> {
    let mut registry: HashMap<&'static str, ProviderFactory> = HashMap::new();
    registry.insert("restic", |conf| {
        Box::new(ResticProvider::new(
            conf.backup_repository.clone(),
            conf.backup_repository_password_location.clone(),
        ))
    });
    registry
}

/// Instantiate the provider selected by `backupProvider` in the config.
pub fn create_provider(config: &Config) -> Result<Box<dyn BackupProvider>> {
    let active = config
        .backup_providers
        .iter()
        .find(|p| p.name == config.backup_provider)
        .ok_or_else(|| {
            ReplantError::config_error(format!(
                "Backup provider '{}' is not defined in backupProviders",
                config.backup_provider
            ))
        })?;

    let registry = provider_registry();
    let factory = registry.get(active.name.as_str()).ok_or_else(|| {
        ReplantError::config_error(format!(
            "Unknown backup provider '{}'. Known providers: {}",
            active.name,
            registry.keys().cloned().collect::<Vec<_>>().join(", ")
        ))
    })?;

    Ok(factory(active))
}
