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

use crate::infrastructure::kubernetes::resources::DestinationClaimBuilder;
use crate::shared::error::{ReplantError, Result};
use regex::Regex;

/// Fully specifies one volume migration attempt. Immutable once the
/// orchestrator starts.
#[derive(Debug, Clone)]
pub struct ReplantRequest {
    pub source_pvc: String,
    /// Destination claim name; derived from the source when not given.
    pub dest_pvc: Option<String>,
    pub namespace: String,
    /// Restrict the consumer search to this deployment.
    pub deployment: Option<String>,
    /// Pod-template volume entry to rebind; defaults to the entry the
    /// locator matched.
    pub deployment_volume_name: Option<String>,
    pub dest_size: String,
    pub dest_storage_class: String,
    pub dry_run: bool,
}

impl ReplantRequest {
    pub fn dest_claim_name(&self) -> String {
        self.dest_pvc
            .clone()
            .unwrap_or_else(|| DestinationClaimBuilder::derive_name(&self.source_pvc))
    }

    /// Fail fast on bad input before any cluster call is made.
    pub fn validate(&self) -> Result<()> {
        validate_resource_name("source PVC", &self.source_pvc)?;
        validate_resource_name("namespace", &self.namespace)?;
        if let Some(ref dest) = self.dest_pvc {
            validate_resource_name("destination PVC", dest)?;
        }
        if let Some(ref deployment) = self.deployment {
            validate_resource_name("deployment", deployment)?;
        }

        if self.dest_size.trim().is_empty() {
            return Err(ReplantError::config_error(
                "destination size is required (e.g. 10Gi)",
            ));
        }
        if self.dest_storage_class.trim().is_empty() {
            return Err(ReplantError::config_error(
                "destination storage class is required",
            ));
        }
        if self.dest_claim_name() == self.source_pvc {
            return Err(ReplantError::config_error(
                "destination PVC must differ from the source PVC",
            ));
        }

        Ok(())
    }
}

/// RFC 1123 label check, same rule the API server applies to object names.
fn validate_resource_name(kind: &str, name: &str) -> Result<()> {
    let pattern = Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid regex");
    if name.is_empty() || name.len() > 63 || !pattern.is_match(name) {
        return Err(ReplantError::config_error(format!(
            "Invalid {} name '{}': must be a lowercase RFC 1123 label (max 63 chars)",
            kind, name
        )));
    }
    Ok(())
}
