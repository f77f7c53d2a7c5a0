//! Volume replant command

use crate::domain::config::Config;
use crate::domain::replant::{ReplantOrchestrator, ReplantRequest};
use crate::infrastructure::kubernetes::VolumeKubeClientImpl;
use clap::Parser;
use std::sync::Arc;

#[derive(Parser, Debug)]
pub struct ReplantCommand {
    /// Source PVC to replant
    #[arg(long = "pvc-src")]
    pub pvc_src: String,

    /// Destination PVC name (derived from the source when omitted)
    #[arg(long = "pvc-dst")]
    pub pvc_dst: Option<String>,

    /// Kubernetes namespace
    #[arg(long, short = 'n', default_value = "default")]
    pub namespace: String,

    /// Size of the destination volume (e.g. "10Gi")
    #[arg(long = "dst-size")]
    pub dst_size: String,

    /// Storage class of the destination volume
    #[arg(long = "dst-storage-classname")]
    pub dst_storage_classname: String,

    /// Only consider this deployment when searching for the consumer
    #[arg(long)]
    pub deployment: Option<String>,

    /// Pod-template volume entry to rebind (defaults to the matched entry)
    #[arg(long = "deployment-volume-name")]
    pub deployment_volume_name: Option<String>,

    /// Plan only, perform no cluster mutations
    #[arg(long)]
    pub dry_run: bool,

    /// Path to kubeconfig file
    /// If not specified, uses default kubeconfig resolution (KUBECONFIG env or ~/.kube/config)
    #[arg(long)]
    pub kubeconfig: Option<String>,

    /// Kubernetes context to use
    #[arg(long)]
    pub context: Option<String>,
}

impl ReplantCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let config = Config::load_or_default()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        let client = VolumeKubeClientImpl::new_with_config(
            self.namespace.clone(),
            self.kubeconfig.clone(),
            self.context.clone(),
        )
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

        let request = ReplantRequest {
            source_pvc: self.pvc_src.clone(),
            dest_pvc: self.pvc_dst.clone(),
            namespace: self.namespace.clone(),
            deployment: self.deployment.clone(),
            deployment_volume_name: self.deployment_volume_name.clone(),
            dest_size: self.dst_size.clone(),
            dest_storage_class: self.dst_storage_classname.clone(),
            dry_run: self.dry_run,
        };

        let orchestrator =
            ReplantOrchestrator::new(Arc::new(client), request, config.replant.tunables());
        let outcome = match orchestrator.run().await {
            Ok(outcome) => outcome,
            Err(failure) => {
                for action in &failure.cleanup.actions {
                    if action.ok {
                        println!("✓ compensated: {}", action.label);
                    } else {
                        println!(
                            "✗ compensation failed: {} ({})",
                            action.label,
                            action.detail.as_deref().unwrap_or("unknown")
                        );
                    }
                }
                return Err(anyhow::anyhow!(
                    "Replant failed at {}: {}",
                    failure.failed_at,
                    failure.error
                ));
            }
        };

        if outcome.dry_run {
            println!(
                "Dry run: would migrate '{}' to '{}' in namespace '{}'",
                self.pvc_src, outcome.dest_claim, self.namespace
            );
            return Ok(());
        }

        println!(
            "Volume '{}' replanted to '{}' successfully!",
            self.pvc_src, outcome.dest_claim
        );
        match outcome.rebound {
            Some(workload) => println!(
                "✓ Deployment '{}' rebound and scaled back to {} replica(s)",
                workload.name, workload.replicas
            ),
            None => println!("✓ No consuming deployment; bare volume migrated"),
        }
        if !outcome.cleanup.all_succeeded() {
            println!("⚠ Some cleanup actions failed; check the logs above");
        }

        Ok(())
    }
}
