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

use crate::infrastructure::constants::{DEFAULT_ACCESS_MODE, DEST_CLAIM_SUFFIX};
use crate::shared::error::ReplantError;
use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Builds the destination claim for a replant.
pub struct DestinationClaimBuilder {
    name: String,
    namespace: String,
    size: String,
    storage_class: String,
}

impl DestinationClaimBuilder {
    pub fn new(name: String, namespace: String, size: String, storage_class: String) -> Self {
        Self {
            name,
            namespace,
            size,
            storage_class,
        }
    }

    /// Deterministic destination name derived from the source claim, so
    /// repeated attempts against the same source are identifiable.
    pub fn derive_name(source_claim: &str) -> String {
        format!("{}{}", source_claim, DEST_CLAIM_SUFFIX)
    }

    pub fn build(&self) -> Result<PersistentVolumeClaim, ReplantError> {
        let mut requests = BTreeMap::new();
        requests.insert("storage".to_string(), Quantity(self.size.clone()));

        let pvc = PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                access_modes: Some(vec![DEFAULT_ACCESS_MODE.to_string()]),
                storage_class_name: Some(self.storage_class.clone()),
                resources: Some(VolumeResourceRequirements {
                    requests: Some(requests),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        Ok(pvc)
    }
}
