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

use super::{BackupProvider, Snapshot};
use crate::shared::error::{ReplantError, Result};
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

const RESTIC_PASSWORD_FILE_ENV: &str = "RESTIC_PASSWORD_FILE";

/// Backup provider backed by the `restic` binary.
#[derive(Debug)]
pub struct ResticProvider {
    repository: String,
    password_file: Option<String>,
}

impl ResticProvider {
    pub fn new(repository: String, password_file: Option<String>) -> Self {
        Self {
            repository,
            password_file,
        }
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new("restic");
        cmd.args(args);
        if let Some(ref password_file) = self.password_file {
            cmd.env(RESTIC_PASSWORD_FILE_ENV, password_file);
        }
        cmd
    }

    fn list_args(&self, filter_paths: &[String]) -> Vec<String> {
        let mut args = vec![
            "snapshots".to_string(),
            "--json".to_string(),
            "-r".to_string(),
            self.repository.clone(),
        ];
        for path in filter_paths {
            args.push("--path".to_string());
            args.push(path.clone());
        }
        args
    }

    fn restore_args(&self, snapshot_id: &str, target: &Path, paths: &[String]) -> Vec<String> {
        let mut args = vec![
            "restore".to_string(),
            snapshot_id.to_string(),
            "-r".to_string(),
            self.repository.clone(),
        ];
        for path in paths {
            args.push("--path".to_string());
            args.push(path.clone());
            args.push("--include".to_string());
            args.push(path.clone());
        }
        args.push("--target".to_string());
        args.push(target.display().to_string());
        args
    }
}

#[async_trait::async_trait]
impl BackupProvider for ResticProvider {
    async fn list_snapshots(&self, filter_paths: &[String]) -> Result<Vec<Snapshot>> {
        let args = self.list_args(filter_paths);
        debug!(args = ?args, "running restic");

        let output = self.command(&args).output().await?;
        if !output.status.success() {
            return Err(ReplantError::Provider(format!(
                "restic snapshots failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let snapshots: Vec<Snapshot> = serde_json::from_slice(&output.stdout)?;
        Ok(snapshots)
    }

    async fn restore_snapshot(
        &self,
        snapshot_id: &str,
        target: &Path,
        paths: &[String],
    ) -> Result<()> {
        if snapshot_id.is_empty() {
            return Err(ReplantError::Provider(
                "snapshot id cannot be empty".to_string(),
            ));
        }

        let metadata = tokio::fs::metadata(target).await.map_err(|_| {
            ReplantError::Provider(format!(
                "restore target {} does not exist",
                target.display()
            ))
        })?;
        if !metadata.is_dir() {
            return Err(ReplantError::Provider(format!(
                "restore target {} is not a directory",
                target.display()
            )));
        }

        let args = self.restore_args(snapshot_id, target, paths);
        debug!(args = ?args, "running restic");

        let output = self.command(&args).output().await?;
        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(ReplantError::Provider(format!(
                "restic restore failed: {}",
                combined
            )));
        }

        Ok(())
    }

    async fn mount_snapshot(&self, _snapshot_id: &str, _mount_path: &Path) -> Result<()> {
        // restic mount requires a long-lived FUSE process, which does not fit
        // a one-shot CLI invocation.
        Err(ReplantError::Provider(
            "mount is not supported by the restic provider".to_string(),
        ))
    }
}
