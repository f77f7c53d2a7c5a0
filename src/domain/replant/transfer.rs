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

use super::request::ReplantRequest;
use crate::domain::config::ReplantTunables;
use crate::infrastructure::constants::{DEST_MOUNT_PATH, SOURCE_MOUNT_PATH};
use crate::infrastructure::kubernetes::resources::TransferPodBuilder;
use crate::infrastructure::kubernetes::VolumeKubeClient;
use crate::shared::error::{ReplantError, Result};
use k8s_openapi::api::core::v1::Pod;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Drives the data copy through the temporary transfer pod.
#[derive(Clone)]
pub struct TransferAgent {
    client: Arc<dyn VolumeKubeClient>,
    tunables: ReplantTunables,
}

impl TransferAgent {
    pub fn new(client: Arc<dyn VolumeKubeClient>, tunables: ReplantTunables) -> Self {
        Self { client, tunables }
    }

    /// Create the mover pod mounting both claims.
    pub async fn create_mover(&self, request: &ReplantRequest) -> Result<Pod> {
        let builder = TransferPodBuilder::new(
            request.source_pvc.clone(),
            request.dest_claim_name(),
            request.namespace.clone(),
            self.tunables.transfer_image.clone(),
        );
        let pod = builder.build()?;

        info!(
            pod = %TransferPodBuilder::pod_name(&request.source_pvc),
            "creating transfer pod"
        );
        self.client.create_pod(&pod).await
    }

    /// Poll the pod until it reports a Running phase, bounded by the
    /// configured deadline. Never waits indefinitely.
    pub async fn await_ready(&self, pod_name: &str) -> Result<()> {
        let start = Instant::now();

        loop {
            let pod = self.client.get_pod(pod_name).await?;
            let phase = pod
                .status
                .as_ref()
                .and_then(|s| s.phase.as_deref())
                .unwrap_or("Unknown");
            debug!(pod = pod_name, phase, "polled transfer pod");

            if phase == "Running" {
                return Ok(());
            }
            // Failed and Succeeded are terminal; waiting out the deadline
            // would only delay the cleanup.
            if phase == "Failed" || phase == "Succeeded" {
                return Err(ReplantError::Kube(format!(
                    "pod '{}' reached terminal phase {} before becoming ready",
                    pod_name, phase
                )));
            }
            if start.elapsed() >= self.tunables.pod_ready_timeout {
                return Err(ReplantError::Timeout(format!(
                    "pod '{}' did not become ready within {:?} (last phase: {})",
                    pod_name, self.tunables.pod_ready_timeout, phase
                )));
            }

            tokio::time::sleep(self.tunables.poll_interval).await;
        }
    }

    /// Install the transfer tool, then copy `/source` into `/destination`.
    ///
    /// Both steps are safe to re-run: the install is a no-op when the tool
    /// is present, and the archive-mode rsync overwrites in place, so a
    /// partially copied destination from an earlier attempt converges
    /// instead of going inconsistent.
    pub async fn run_transfer(&self, pod_name: &str) -> Result<String> {
        let install: Vec<String> = ["apk", "add", "--no-cache", "rsync"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        self.exec_step(pod_name, &install, "installing transfer tool")
            .await?;

        let copy: Vec<String> = vec![
            "rsync".to_string(),
            "-a".to_string(),
            format!("{}/", SOURCE_MOUNT_PATH),
            DEST_MOUNT_PATH.to_string(),
        ];
        let output = self
            .exec_step(pod_name, &copy, "copying volume contents")
            .await?;

        info!(pod = pod_name, "volume contents transferred");
        Ok(output)
    }

    async fn exec_step(&self, pod_name: &str, command: &[String], step: &str) -> Result<String> {
        info!(pod = pod_name, command = ?command, "executing in transfer pod");

        let exec = self.client.exec_pod(pod_name, command);
        let result = tokio::time::timeout(self.tunables.exec_timeout, exec)
            .await
            .map_err(|_| {
                ReplantError::Timeout(format!(
                    "{} in pod '{}' exceeded {:?}",
                    step, pod_name, self.tunables.exec_timeout
                ))
            })??;

        if !result.success {
            return Err(ReplantError::TransferFailed {
                step: step.to_string(),
                message: result
                    .message
                    .unwrap_or_else(|| "command exited with non-zero status".to_string()),
                output: result.output,
            });
        }

        debug!(pod = pod_name, output = %result.output, "command output");
        Ok(result.output)
    }
}
