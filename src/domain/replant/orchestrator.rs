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

use super::locator::{LocatedWorkload, WorkloadLocator};
use super::provisioner::VolumeProvisioner;
use super::request::ReplantRequest;
use super::state::{CleanupPolicy, CleanupReport, CompensationStack, ReplantPhase};
use super::transfer::TransferAgent;
use super::workload::WorkloadEditor;
use crate::domain::config::ReplantTunables;
use crate::infrastructure::constants::LEASE_ANNOTATION;
use crate::infrastructure::kubernetes::resources::TransferPodBuilder;
use crate::infrastructure::kubernetes::VolumeKubeClient;
use crate::shared::error::{ReplantError, Result};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// The deployment that was rebound to the destination claim.
#[derive(Debug, Clone)]
pub struct ReboundWorkload {
    pub name: String,
    pub replicas: i32,
}

/// Result of one replant attempt.
#[derive(Debug, Clone)]
pub struct ReplantOutcome {
    pub phase: ReplantPhase,
    pub dest_claim: String,
    pub rebound: Option<ReboundWorkload>,
    pub dry_run: bool,
    pub cleanup: CleanupReport,
}

/// A failed attempt, with the compensation outcome attached so the caller
/// can report what was rolled back.
#[derive(Debug)]
pub struct ReplantFailure {
    pub error: ReplantError,
    pub failed_at: ReplantPhase,
    pub cleanup: CleanupReport,
}

/// Sequences one volume migration end to end.
///
/// Each forward step registers its compensation before the next step runs,
/// so any failure, timeout, or cancellation unwinds exactly the side effects
/// applied so far. The transfer pod never survives an attempt; the
/// destination claim survives only once the copy is confirmed.
pub struct ReplantOrchestrator {
    client: Arc<dyn VolumeKubeClient>,
    request: ReplantRequest,
    tunables: ReplantTunables,
}

impl ReplantOrchestrator {
    pub fn new(
        client: Arc<dyn VolumeKubeClient>,
        request: ReplantRequest,
        tunables: ReplantTunables,
    ) -> Self {
        Self {
            client,
            request,
            tunables,
        }
    }

    /// Run with ctrl-c as the cancellation trigger.
    pub async fn run(&self) -> std::result::Result<ReplantOutcome, ReplantFailure> {
        self.run_until(ctrl_c()).await
    }

    /// Run the migration, aborting and unwinding when `cancel` completes.
    pub async fn run_until(
        &self,
        cancel: impl Future<Output = ()>,
    ) -> std::result::Result<ReplantOutcome, ReplantFailure> {
        if let Err(e) = self.request.validate() {
            return Err(ReplantFailure {
                error: e,
                failed_at: ReplantPhase::Init,
                cleanup: CleanupReport::default(),
            });
        }

        let mut stack = CompensationStack::new();
        let mut phase = ReplantPhase::Init;

        let result = {
            let advance = self.advance(&mut stack, &mut phase);
            tokio::pin!(advance);
            tokio::select! {
                res = &mut advance => res,
                _ = cancel => {
                    warn!("cancellation requested, unwinding");
                    Err(ReplantError::Cancelled)
                }
            }
        };

        match result {
            Ok(mut outcome) => {
                let report = stack.unwind(false).await;
                if !report.all_succeeded() {
                    warn!("some post-completion cleanup actions failed");
                }
                outcome.cleanup = report;
                info!(phase = %outcome.phase, "replant finished");
                Ok(outcome)
            }
            Err(e) => {
                error!(error = %e, failed_at = %phase, "replant failed, running compensating cleanup");
                let report = stack.unwind(true).await;
                Err(ReplantFailure {
                    error: e,
                    failed_at: phase,
                    cleanup: report,
                })
            }
        }
    }

    async fn advance(
        &self,
        stack: &mut CompensationStack,
        phase: &mut ReplantPhase,
    ) -> Result<ReplantOutcome> {
        let request = &self.request;
        let dest_claim = request.dest_claim_name();

        info!(
            source = %request.source_pvc,
            dest = %dest_claim,
            namespace = %request.namespace,
            "starting volume replant"
        );

        // Read-only: find the consumer before touching anything.
        let locator = WorkloadLocator::new(Arc::clone(&self.client));
        let located = locator
            .find_consumer(&request.source_pvc, request.deployment.as_deref())
            .await?;
        *phase = ReplantPhase::DeploymentLocated;
        match &located {
            Some(workload) => info!(
                phase = %phase,
                deployment = %workload.name,
                replicas = workload.replicas,
                volume = %workload.volume_name,
                "deployment consumes the source claim"
            ),
            None => info!(phase = %phase, "no consuming deployment, migrating bare volume"),
        }

        if request.dry_run {
            info!("dry run: no cluster mutations will be performed");
            return Ok(ReplantOutcome {
                phase: *phase,
                dest_claim,
                rebound: None,
                dry_run: true,
                cleanup: CleanupReport::default(),
            });
        }

        // Guard against a second replant of the same source claim.
        self.acquire_lease().await?;
        {
            let client = Arc::clone(&self.client);
            let source = request.source_pvc.clone();
            stack.push(
                "release replant lease on source claim",
                CleanupPolicy::Always,
                Box::new(move || Box::pin(async move { release_lease(client, source).await })),
            );
        }

        let editor = WorkloadEditor::new(Arc::clone(&self.client));

        if let Some(workload) = &located {
            editor.scale_to(&workload.name, 0).await?;
            *phase = ReplantPhase::ScaledDown;
            info!(phase = %phase, deployment = %workload.name, "deployment scaled to zero");

            let restore_editor = editor.clone();
            let name = workload.name.clone();
            let replicas = workload.replicas;
            stack.push(
                format!("restore deployment '{}' to {} replicas", name, replicas),
                CleanupPolicy::OnFailure,
                Box::new(move || {
                    Box::pin(async move {
                        restore_editor.scale_to(&name, replicas).await?;
                        Ok(())
                    })
                }),
            );
        }

        let agent = TransferAgent::new(Arc::clone(&self.client), self.tunables.clone());
        let pod_name = TransferPodBuilder::pod_name(&request.source_pvc);

        agent.create_mover(request).await?;
        *phase = ReplantPhase::PodCreated;
        info!(phase = %phase, pod = %pod_name, "transfer pod created");
        {
            let client = Arc::clone(&self.client);
            let name = pod_name.clone();
            stack.push(
                format!("delete transfer pod '{}'", name),
                CleanupPolicy::Always,
                Box::new(move || Box::pin(async move { client.delete_pod(&name).await })),
            );
        }

        let provisioner = VolumeProvisioner::new(Arc::clone(&self.client));
        provisioner.create_destination(request).await?;
        *phase = ReplantPhase::ClaimCreated;
        info!(phase = %phase, claim = %dest_claim, "destination claim created");
        let claim_token = {
            let client = Arc::clone(&self.client);
            let name = dest_claim.clone();
            stack.push(
                format!("delete destination claim '{}'", name),
                CleanupPolicy::OnFailure,
                Box::new(move || Box::pin(async move { client.delete_pvc(&name).await })),
            )
        };

        agent.await_ready(&pod_name).await?;
        *phase = ReplantPhase::PodReady;
        info!(phase = %phase, pod = %pod_name, "transfer pod is running");

        agent.run_transfer(&pod_name).await?;
        *phase = ReplantPhase::TransferComplete;
        info!(phase = %phase, "transfer confirmed");
        // Rollback is monotonic: a confirmed transfer is never undone.
        stack.disarm(claim_token);

        let mut rebound = None;
        if let Some(LocatedWorkload {
            name,
            replicas,
            volume_name,
        }) = &located
        {
            let volume = request
                .deployment_volume_name
                .as_deref()
                .unwrap_or(volume_name);
            editor.rebind(name, volume, &dest_claim).await?;
            editor.scale_to(name, *replicas).await?;
            *phase = ReplantPhase::Rebound;
            info!(
                phase = %phase,
                deployment = %name,
                replicas,
                "deployment rebound to destination claim"
            );
            rebound = Some(ReboundWorkload {
                name: name.clone(),
                replicas: *replicas,
            });
        }

        *phase = ReplantPhase::Done;
        Ok(ReplantOutcome {
            phase: *phase,
            dest_claim,
            rebound,
            dry_run: false,
            cleanup: CleanupReport::default(),
        })
    }

    /// Annotate the source claim as lease, rejecting a second in-flight
    /// replant of the same volume. Also verifies the source claim exists
    /// before anything is mutated.
    async fn acquire_lease(&self) -> Result<()> {
        let mut pvc = self.client.get_pvc(&self.request.source_pvc).await?;
        let annotations = pvc.metadata.annotations.get_or_insert_with(Default::default);

        if let Some(held_since) = annotations.get(LEASE_ANNOTATION) {
            return Err(ReplantError::Validation(format!(
                "source claim '{}' already has a replant in progress (lease held since {}); \
                 remove the '{}' annotation if that attempt is dead",
                self.request.source_pvc, held_since, LEASE_ANNOTATION
            )));
        }

        annotations.insert(
            LEASE_ANNOTATION.to_string(),
            chrono::Utc::now().to_rfc3339(),
        );
        self.client.update_pvc(&pvc).await?;
        info!(claim = %self.request.source_pvc, "replant lease acquired");
        Ok(())
    }
}

/// Resolves once a ctrl-c is actually delivered. A failure to register the
/// handler means cancellation is unavailable, not that it happened.
async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn release_lease(client: Arc<dyn VolumeKubeClient>, source_pvc: String) -> Result<()> {
    let mut pvc = client.get_pvc(&source_pvc).await?;
    if let Some(annotations) = pvc.metadata.annotations.as_mut() {
        if annotations.remove(LEASE_ANNOTATION).is_some() {
            client.update_pvc(&pvc).await?;
        }
    }
    Ok(())
}
