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
use crate::infrastructure::kubernetes::resources::DestinationClaimBuilder;
use crate::infrastructure::kubernetes::VolumeKubeClient;
use crate::shared::error::{ReplantError, Result};
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use std::sync::Arc;
use tracing::info;

/// Creates the destination claim for a replant request.
#[derive(Clone)]
pub struct VolumeProvisioner {
    client: Arc<dyn VolumeKubeClient>,
}

impl VolumeProvisioner {
    pub fn new(client: Arc<dyn VolumeKubeClient>) -> Self {
        Self { client }
    }

    pub async fn create_destination(
        &self,
        request: &ReplantRequest,
    ) -> Result<PersistentVolumeClaim> {
        let name = request.dest_claim_name();
        let builder = DestinationClaimBuilder::new(
            name.clone(),
            request.namespace.clone(),
            request.dest_size.clone(),
            request.dest_storage_class.clone(),
        );
        let pvc = builder.build()?;

        info!(
            claim = %name,
            size = %request.dest_size,
            storage_class = %request.dest_storage_class,
            "creating destination claim"
        );

        match self.client.create_pvc(&pvc).await {
            Ok(created) => Ok(created),
            // A duplicate name is a conflict, surfaced as-is; anything else
            // is a provisioning rejection (bad class, quota, ...).
            Err(e @ ReplantError::Conflict { .. }) => Err(e),
            Err(e) => Err(ReplantError::Provisioning(e.to_string())),
        }
    }
}
