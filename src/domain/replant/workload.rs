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

use crate::infrastructure::kubernetes::VolumeKubeClient;
use crate::shared::error::{ReplantError, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::PersistentVolumeClaimVolumeSource;
use std::sync::Arc;
use tracing::info;

/// Scales a deployment and rewrites its claim binding.
///
/// Both operations are read-modify-write against the live object. A
/// conflicting external update surfaces as a hard failure; a blind retry
/// could clobber an unrelated change.
#[derive(Clone)]
pub struct WorkloadEditor {
    client: Arc<dyn VolumeKubeClient>,
}

impl WorkloadEditor {
    pub fn new(client: Arc<dyn VolumeKubeClient>) -> Self {
        Self { client }
    }

    /// Set the desired replica count and write the deployment back.
    pub async fn scale_to(&self, name: &str, replicas: i32) -> Result<Deployment> {
        let mut deployment = self.client.get_deployment(name).await?;
        if let Some(spec) = deployment.spec.as_mut() {
            spec.replicas = Some(replicas);
        } else {
            return Err(ReplantError::Kube(format!(
                "deployment '{}' has no spec",
                name
            )));
        }

        info!(deployment = name, replicas, "scaling deployment");
        self.client.update_deployment(&deployment).await
    }

    /// Point the pod-template volume entry named `volume_name` at
    /// `new_claim` and write the deployment back.
    ///
    /// A missing entry is a hard stop: writing the deployment anyway would
    /// deploy it with a dangling claim reference.
    pub async fn rebind(
        &self,
        name: &str,
        volume_name: &str,
        new_claim: &str,
    ) -> Result<Deployment> {
        let mut deployment = self.client.get_deployment(name).await?;

        let volumes = deployment
            .spec
            .as_mut()
            .and_then(|s| s.template.spec.as_mut())
            .and_then(|ps| ps.volumes.as_mut())
            .ok_or_else(|| ReplantError::BindingNotFound {
                deployment: name.to_string(),
                volume_name: volume_name.to_string(),
            })?;

        let mut found = false;
        for volume in volumes.iter_mut() {
            if volume.name == volume_name {
                volume.persistent_volume_claim = Some(PersistentVolumeClaimVolumeSource {
                    claim_name: new_claim.to_string(),
                    ..Default::default()
                });
                found = true;
            }
        }

        if !found {
            return Err(ReplantError::BindingNotFound {
                deployment: name.to_string(),
                volume_name: volume_name.to_string(),
            });
        }

        info!(
            deployment = name,
            volume = volume_name,
            claim = new_claim,
            "rebinding deployment volume"
        );
        self.client.update_deployment(&deployment).await
    }
}
