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

use crate::infrastructure::constants::{
    DEST_MOUNT_PATH, LABEL_APP, LABEL_APP_VALUE, SOURCE_MOUNT_PATH, TRANSFER_CONTAINER_NAME,
    TRANSFER_POD_SUFFIX, VOLUME_NAME_DESTINATION, VOLUME_NAME_SOURCE,
};
use crate::shared::error::ReplantError;
use k8s_openapi::api::core::v1::{
    Container, PersistentVolumeClaimVolumeSource, Pod, PodSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Builds the short-lived pod that bridges the source and destination claims.
///
/// The container runs an indefinite sleep so its lifetime is controlled
/// entirely by the orchestrator; the copy itself is driven through exec.
pub struct TransferPodBuilder {
    source_claim: String,
    dest_claim: String,
    namespace: String,
    image: String,
}

impl TransferPodBuilder {
    pub fn new(source_claim: String, dest_claim: String, namespace: String, image: String) -> Self {
        Self {
            source_claim,
            dest_claim,
            namespace,
            image,
        }
    }

    /// Deterministic pod name so a stale mover from a previous attempt is
    /// identifiable by name.
    pub fn pod_name(source_claim: &str) -> String {
        format!("{}{}", source_claim, TRANSFER_POD_SUFFIX)
    }

    pub fn build(&self) -> Result<Pod, ReplantError> {
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_APP.to_string(), LABEL_APP_VALUE.to_string());

        let container = Container {
            name: TRANSFER_CONTAINER_NAME.to_string(),
            image: Some(self.image.clone()),
            command: Some(vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                "while :; do sleep 2073600; done".to_string(),
            ]),
            volume_mounts: Some(vec![
                self.volume_mount(VOLUME_NAME_SOURCE, SOURCE_MOUNT_PATH),
                self.volume_mount(VOLUME_NAME_DESTINATION, DEST_MOUNT_PATH),
            ]),
            ..Default::default()
        };

        let pod = Pod {
            metadata: ObjectMeta {
                name: Some(Self::pod_name(&self.source_claim)),
                namespace: Some(self.namespace.clone()),
                labels: Some(labels),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![container],
                restart_policy: Some("Never".to_string()),
                volumes: Some(vec![
                    self.claim_volume(VOLUME_NAME_SOURCE, &self.source_claim),
                    self.claim_volume(VOLUME_NAME_DESTINATION, &self.dest_claim),
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };

        Ok(pod)
    }

    fn volume_mount(&self, name: &str, path: &str) -> VolumeMount {
        VolumeMount {
            name: name.to_string(),
            mount_path: path.to_string(),
            ..Default::default()
        }
    }

    fn claim_volume(&self, name: &str, claim_name: &str) -> Volume {
        Volume {
            name: name.to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: claim_name.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}
