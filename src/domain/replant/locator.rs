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
use crate::shared::error::Result;
use k8s_openapi::api::apps::v1::Deployment;
use std::sync::Arc;
use tracing::debug;

/// A deployment found consuming the source claim, captured with the state
/// needed to restore it later.
#[derive(Debug, Clone)]
pub struct LocatedWorkload {
    pub name: String,
    /// Replica count observed before the scale-down; restored after rebind.
    pub replicas: i32,
    /// Name of the pod-template volume entry that references the claim.
    pub volume_name: String,
}

/// Finds the deployment (if any) whose pod template mounts a given claim.
///
/// Not finding one is a valid answer, not an error: replanting a detached
/// volume is a first-class mode.
#[derive(Clone)]
pub struct WorkloadLocator {
    client: Arc<dyn VolumeKubeClient>,
}

impl WorkloadLocator {
    pub fn new(client: Arc<dyn VolumeKubeClient>) -> Self {
        Self { client }
    }

    pub async fn find_consumer(
        &self,
        source_pvc: &str,
        deployment_hint: Option<&str>,
    ) -> Result<Option<LocatedWorkload>> {
        let deployments = self.client.list_deployments().await?;

        for deployment in &deployments {
            let name = match deployment.metadata.name.as_deref() {
                Some(n) => n,
                None => continue,
            };
            if let Some(hint) = deployment_hint {
                if name != hint {
                    continue;
                }
            }

            if let Some(volume_name) = claim_volume_name(deployment, source_pvc) {
                let replicas = deployment
                    .spec
                    .as_ref()
                    .and_then(|s| s.replicas)
                    .unwrap_or(1);
                debug!(
                    deployment = name,
                    volume = %volume_name,
                    replicas,
                    "found deployment consuming source claim"
                );
                return Ok(Some(LocatedWorkload {
                    name: name.to_string(),
                    replicas,
                    volume_name,
                }));
            }
        }

        Ok(None)
    }
}

/// The name of the first pod-template volume entry referencing `claim`.
fn claim_volume_name(deployment: &Deployment, claim: &str) -> Option<String> {
    deployment
        .spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .volumes
        .as_ref()?
        .iter()
        .find(|v| {
            v.persistent_volume_claim
                .as_ref()
                .map(|p| p.claim_name == claim)
                .unwrap_or(false)
        })
        .map(|v| v.name.clone())
}
