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

//! Backup domain: snapshot listing and restore-back-into-place

use crate::domain::config::Config;
use crate::infrastructure::constants::SNAPSHOT_TARGET_PREFIX;
use crate::infrastructure::providers::{create_provider, Snapshot};
use crate::shared::error::{ReplantError, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, warn};

/// List snapshots from the configured provider.
pub async fn list_snapshots(config: &Config, filter_paths: &[String]) -> Result<Vec<Snapshot>> {
    let provider = create_provider(config)?;
    provider.list_snapshots(filter_paths).await
}

/// Restore one snapshot: stage it into a temporary directory, then sync each
/// requested path back into its original location, bracketed by the
/// per-target pre/post restore hooks.
///
/// Hooks only run once the restore-to-staging step has succeeded; a restore
/// failure aborts before anything touches the live paths. Hook failures are
/// reported but never abort the restore.
pub async fn restore_snapshot(config: &Config, snapshot_id: &str, paths: &[String]) -> Result<()> {
    ensure_absolute(paths)?;

    let provider = create_provider(config)?;
    let snapshots = provider.list_snapshots(paths).await?;

    let snapshot = find_snapshot(&snapshots, snapshot_id).ok_or_else(|| {
        ReplantError::Provider(format!("snapshot '{}' not found", snapshot_id))
    })?;

    // Staging directory is removed again once the sync-back completes.
    let staging = tempfile::Builder::new()
        .prefix(SNAPSHOT_TARGET_PREFIX)
        .tempdir()?;
    info!(
        snapshot = %snapshot.id,
        target = %staging.path().display(),
        "restoring snapshot into staging directory"
    );

    provider
        .restore_snapshot(&snapshot.id, staging.path(), paths)
        .await?;

    run_hooks(config, paths, HookKind::Pre).await;
    sync_paths(staging.path(), paths).await?;
    run_hooks(config, paths, HookKind::Post).await;

    info!(snapshot = %snapshot.id, "restore complete");
    Ok(())
}

/// Match by full id or the short prefix form providers display.
fn find_snapshot<'a>(snapshots: &'a [Snapshot], id: &str) -> Option<&'a Snapshot> {
    snapshots
        .iter()
        .find(|s| s.id == id || (!s.short_id.is_empty() && s.short_id == id))
}

#[derive(Clone, Copy)]
enum HookKind {
    Pre,
    Post,
}

async fn run_hooks(config: &Config, paths: &[String], kind: HookKind) {
    for path in paths {
        let Some(target) = config.target_for(path) else {
            continue;
        };
        let hook = match kind {
            HookKind::Pre => target.pre_restore_hook.as_ref(),
            HookKind::Post => target.post_restore_hook.as_ref(),
        };
        let Some(hook) = hook else { continue };
        let Some((program, args)) = hook.split_first() else {
            continue;
        };

        info!(path = %path, command = ?hook, "running restore hook");
        match Command::new(program).args(args).output().await {
            Ok(output) if output.status.success() => {}
            Ok(output) => warn!(
                path = %path,
                output = %String::from_utf8_lossy(&output.stderr),
                "restore hook exited with non-zero status"
            ),
            Err(e) => warn!(path = %path, error = %e, "restore hook could not be started"),
        }
    }
}

/// Restored paths are reproduced under the staging root and synced back with
/// `rsync --relative`; that composition is only defined for absolute paths.
fn ensure_absolute(paths: &[String]) -> Result<()> {
    for path in paths {
        if !Path::new(path).is_absolute() {
            return Err(ReplantError::Validation(format!(
                "restore path '{}' must be absolute",
                path
            )));
        }
    }
    Ok(())
}

/// Where an absolute restored path lives inside the staging tree.
fn staged_source(staging: &Path, path: &str) -> PathBuf {
    staging.join(path.trim_start_matches('/'))
}

/// Sync each restored path from the staging tree back into place with
/// `rsync --relative`, preserving metadata.
async fn sync_paths(staging: &Path, paths: &[String]) -> Result<()> {
    for path in paths {
        let source = staged_source(staging, path);

        let output = Command::new("rsync")
            .arg("-a")
            .arg("-v")
            .arg("--relative")
            .arg(&source)
            .arg(path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ReplantError::Provider(format!(
                "rsync of {} back to {} failed: {}",
                source.display(),
                path,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: &str, short_id: &str) -> Snapshot {
        Snapshot {
            time: String::new(),
            tree: String::new(),
            paths: Vec::new(),
            hostname: String::new(),
            username: String::new(),
            uid: 0,
            gid: 0,
            id: id.to_string(),
            short_id: short_id.to_string(),
        }
    }

    #[test]
    fn test_staged_source_composition() {
        assert_eq!(
            staged_source(Path::new("/tmp/snapshot-x"), "/var/lib/app"),
            PathBuf::from("/tmp/snapshot-x/var/lib/app")
        );
    }

    #[test]
    fn test_ensure_absolute_rejects_relative_paths() {
        assert!(ensure_absolute(&["/var/lib/app".to_string()]).is_ok());

        let err = ensure_absolute(&["var/lib/app".to_string()]).unwrap_err();
        assert!(matches!(err, ReplantError::Validation(_)));
    }

    #[tokio::test]
    async fn test_restore_rejects_relative_path_before_provider_lookup() {
        let err = restore_snapshot(&Config::default(), "f00dfeed", &["data".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ReplantError::Validation(_)));
    }

    #[test]
    fn test_find_snapshot_by_full_and_short_id() {
        let snapshots = vec![
            snapshot("aaaa1111bbbb2222", "aaaa1111"),
            snapshot("cccc3333dddd4444", "cccc3333"),
        ];

        assert!(find_snapshot(&snapshots, "cccc3333dddd4444").is_some());
        assert!(find_snapshot(&snapshots, "aaaa1111").is_some());
        assert!(find_snapshot(&snapshots, "eeee5555").is_none());
    }
}
