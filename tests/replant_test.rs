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

#[cfg(test)]
mod tests {
    use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
    use k8s_openapi::api::core::v1::{
        PersistentVolumeClaim, PersistentVolumeClaimVolumeSource, Pod, PodSpec, PodStatus,
        PodTemplateSpec, Volume,
    };
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use replant_kube::domain::config::ReplantTunables;
    use replant_kube::domain::replant::{ReplantOrchestrator, ReplantPhase, ReplantRequest};
    use replant_kube::infrastructure::constants::LEASE_ANNOTATION;
    use replant_kube::infrastructure::kubernetes::{ExecOutput, VolumeKubeClient};
    use replant_kube::shared::error::ReplantError;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// In-memory stand-in for the namespace the orchestrator mutates.
    #[derive(Default)]
    struct FakeCluster {
        deployments: HashMap<String, Deployment>,
        pvcs: HashMap<String, PersistentVolumeClaim>,
        pods: HashMap<String, Pod>,
        /// Results handed out per exec call; empty queue means success.
        exec_results: VecDeque<ExecOutput>,
        /// Phase reported for every created pod.
        pod_phase: String,
        /// When set, `create_pvc` fails with this message.
        fail_create_pvc: Option<String>,
        /// Every mutating API call, in order.
        mutations: Vec<String>,
    }

    struct MockClient {
        namespace: String,
        state: Mutex<FakeCluster>,
    }

    impl MockClient {
        fn new(namespace: &str) -> Arc<Self> {
            let mut cluster = FakeCluster::default();
            cluster.pod_phase = "Running".to_string();
            Arc::new(Self {
                namespace: namespace.to_string(),
                state: Mutex::new(cluster),
            })
        }

        fn with<R>(&self, f: impl FnOnce(&mut FakeCluster) -> R) -> R {
            f(&mut self.state.lock().unwrap())
        }
    }

    #[async_trait::async_trait]
    impl VolumeKubeClient for MockClient {
        async fn list_deployments(&self) -> Result<Vec<Deployment>, ReplantError> {
            Ok(self.with(|c| c.deployments.values().cloned().collect()))
        }

        async fn get_deployment(&self, name: &str) -> Result<Deployment, ReplantError> {
            self.with(|c| c.deployments.get(name).cloned())
                .ok_or_else(|| ReplantError::not_found("Deployment", name, &self.namespace))
        }

        async fn update_deployment(
            &self,
            deployment: &Deployment,
        ) -> Result<Deployment, ReplantError> {
            let name = deployment.metadata.name.clone().unwrap_or_default();
            self.with(|c| {
                c.mutations.push(format!("update_deployment {}", name));
                c.deployments.insert(name, deployment.clone());
            });
            Ok(deployment.clone())
        }

        async fn get_pvc(&self, name: &str) -> Result<PersistentVolumeClaim, ReplantError> {
            self.with(|c| c.pvcs.get(name).cloned()).ok_or_else(|| {
                ReplantError::not_found("PersistentVolumeClaim", name, &self.namespace)
            })
        }

        async fn create_pvc(
            &self,
            pvc: &PersistentVolumeClaim,
        ) -> Result<PersistentVolumeClaim, ReplantError> {
            let name = pvc.metadata.name.clone().unwrap_or_default();
            self.with(|c| {
                if let Some(msg) = &c.fail_create_pvc {
                    return Err(ReplantError::Kube(msg.clone()));
                }
                if c.pvcs.contains_key(&name) {
                    return Err(ReplantError::conflict(
                        "PersistentVolumeClaim",
                        &name,
                        "already exists",
                    ));
                }
                c.mutations.push(format!("create_pvc {}", name));
                c.pvcs.insert(name, pvc.clone());
                Ok(pvc.clone())
            })
        }

        async fn update_pvc(
            &self,
            pvc: &PersistentVolumeClaim,
        ) -> Result<PersistentVolumeClaim, ReplantError> {
            let name = pvc.metadata.name.clone().unwrap_or_default();
            self.with(|c| {
                c.mutations.push(format!("update_pvc {}", name));
                c.pvcs.insert(name, pvc.clone());
            });
            Ok(pvc.clone())
        }

        async fn delete_pvc(&self, name: &str) -> Result<(), ReplantError> {
            self.with(|c| {
                c.mutations.push(format!("delete_pvc {}", name));
                c.pvcs.remove(name).map(|_| ()).ok_or_else(|| {
                    ReplantError::not_found("PersistentVolumeClaim", name, &self.namespace)
                })
            })
        }

        async fn create_pod(&self, pod: &Pod) -> Result<Pod, ReplantError> {
            let name = pod.metadata.name.clone().unwrap_or_default();
            self.with(|c| {
                let mut stored = pod.clone();
                stored.status = Some(PodStatus {
                    phase: Some(c.pod_phase.clone()),
                    ..Default::default()
                });
                c.mutations.push(format!("create_pod {}", name));
                c.pods.insert(name, stored);
            });
            Ok(pod.clone())
        }

        async fn get_pod(&self, name: &str) -> Result<Pod, ReplantError> {
            self.with(|c| c.pods.get(name).cloned())
                .ok_or_else(|| ReplantError::not_found("Pod", name, &self.namespace))
        }

        async fn delete_pod(&self, name: &str) -> Result<(), ReplantError> {
            self.with(|c| {
                c.mutations.push(format!("delete_pod {}", name));
                c.pods
                    .remove(name)
                    .map(|_| ())
                    .ok_or_else(|| ReplantError::not_found("Pod", name, &self.namespace))
            })
        }

        async fn exec_pod(
            &self,
            _name: &str,
            command: &[String],
        ) -> Result<ExecOutput, ReplantError> {
            self.with(|c| {
                c.mutations
                    .push(format!("exec {}", command.first().cloned().unwrap_or_default()));
                Ok(c.exec_results.pop_front().unwrap_or(ExecOutput {
                    success: true,
                    output: String::new(),
                    message: None,
                }))
            })
        }

        fn namespace(&self) -> &str {
            &self.namespace
        }
    }

    fn source_pvc(name: &str) -> PersistentVolumeClaim {
        PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn deployment(name: &str, replicas: i32, volume: &str, claim: &str) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(replicas),
                template: PodTemplateSpec {
                    spec: Some(PodSpec {
                        volumes: Some(vec![Volume {
                            name: volume.to_string(),
                            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                                claim_name: claim.to_string(),
                                ..Default::default()
                            }),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn request(source: &str, namespace: &str) -> ReplantRequest {
        ReplantRequest {
            source_pvc: source.to_string(),
            dest_pvc: None,
            namespace: namespace.to_string(),
            deployment: None,
            deployment_volume_name: None,
            dest_size: "10Gi".to_string(),
            dest_storage_class: "longhorn".to_string(),
            dry_run: false,
        }
    }

    fn fast_tunables() -> ReplantTunables {
        ReplantTunables {
            pod_ready_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(5),
            exec_timeout: Duration::from_secs(1),
            transfer_image: "alpine:latest".to_string(),
        }
    }

    fn bound_claim(deployment: &Deployment, volume: &str) -> Option<String> {
        deployment
            .spec
            .as_ref()?
            .template
            .spec
            .as_ref()?
            .volumes
            .as_ref()?
            .iter()
            .find(|v| v.name == volume)?
            .persistent_volume_claim
            .as_ref()
            .map(|p| p.claim_name.clone())
    }

    #[tokio::test]
    async fn test_detached_volume_migration() {
        let client = MockClient::new("ns1");
        client.with(|c| {
            c.pvcs.insert("data-pvc".to_string(), source_pvc("data-pvc"));
        });

        let orchestrator = ReplantOrchestrator::new(
            Arc::clone(&client) as Arc<dyn VolumeKubeClient>,
            request("data-pvc", "ns1"),
            fast_tunables(),
        );
        let outcome = orchestrator.run().await.expect("replant should succeed");

        assert_eq!(outcome.phase, ReplantPhase::Done);
        assert_eq!(outcome.dest_claim, "data-pvc-v2");
        assert!(outcome.rebound.is_none());
        assert!(outcome.cleanup.all_succeeded());

        client.with(|c| {
            // Destination claim provisioned as requested
            let dest = c.pvcs.get("data-pvc-v2").expect("destination claim");
            let spec = dest.spec.as_ref().expect("claim spec");
            assert_eq!(spec.storage_class_name.as_deref(), Some("longhorn"));
            let requests = spec
                .resources
                .as_ref()
                .and_then(|r| r.requests.as_ref())
                .expect("storage request");
            assert_eq!(requests.get("storage"), Some(&Quantity("10Gi".to_string())));

            // Transfer pod never survives the attempt
            assert!(c.pods.is_empty());

            // Lease released after success
            let source = c.pvcs.get("data-pvc").expect("source claim");
            let has_lease = source
                .metadata
                .annotations
                .as_ref()
                .map(|a| a.contains_key(LEASE_ANNOTATION))
                .unwrap_or(false);
            assert!(!has_lease);
        });
    }

    #[tokio::test]
    async fn test_consuming_deployment_rebound_and_restored() {
        let client = MockClient::new("ns1");
        client.with(|c| {
            c.pvcs.insert("data-pvc".to_string(), source_pvc("data-pvc"));
            c.deployments.insert(
                "web".to_string(),
                deployment("web", 3, "storage", "data-pvc"),
            );
        });

        let orchestrator = ReplantOrchestrator::new(
            Arc::clone(&client) as Arc<dyn VolumeKubeClient>,
            request("data-pvc", "ns1"),
            fast_tunables(),
        );
        let outcome = orchestrator.run().await.expect("replant should succeed");

        let rebound = outcome.rebound.expect("deployment rebound");
        assert_eq!(rebound.name, "web");
        assert_eq!(rebound.replicas, 3);

        client.with(|c| {
            let web = c.deployments.get("web").expect("deployment");
            assert_eq!(web.spec.as_ref().and_then(|s| s.replicas), Some(3));
            assert_eq!(
                bound_claim(web, "storage").as_deref(),
                Some("data-pvc-v2")
            );
            assert!(c.pods.is_empty());
        });
    }

    #[tokio::test]
    async fn test_claim_creation_failure_rolls_back() {
        let client = MockClient::new("ns1");
        client.with(|c| {
            c.pvcs.insert("data-pvc".to_string(), source_pvc("data-pvc"));
            c.deployments.insert(
                "web".to_string(),
                deployment("web", 3, "storage", "data-pvc"),
            );
            c.fail_create_pvc = Some("storage class quota exceeded".to_string());
        });

        let orchestrator = ReplantOrchestrator::new(
            Arc::clone(&client) as Arc<dyn VolumeKubeClient>,
            request("data-pvc", "ns1"),
            fast_tunables(),
        );
        let failure = orchestrator.run().await.expect_err("replant should fail");
        assert!(matches!(failure.error, ReplantError::Provisioning(_)));

        // The failure carries the compensation record: pod, replicas, lease
        assert!(failure.cleanup.all_succeeded());
        assert_eq!(failure.cleanup.actions.len(), 3);

        client.with(|c| {
            // Scale-down compensated, pod deleted, no claim left behind
            let web = c.deployments.get("web").expect("deployment");
            assert_eq!(web.spec.as_ref().and_then(|s| s.replicas), Some(3));
            assert_eq!(bound_claim(web, "storage").as_deref(), Some("data-pvc"));
            assert!(c.pods.is_empty());
            assert!(!c.pvcs.contains_key("data-pvc-v2"));

            let source = c.pvcs.get("data-pvc").expect("source claim");
            let has_lease = source
                .metadata
                .annotations
                .as_ref()
                .map(|a| a.contains_key(LEASE_ANNOTATION))
                .unwrap_or(false);
            assert!(!has_lease);
        });
    }

    #[tokio::test]
    async fn test_transfer_failure_deletes_destination_claim() {
        let client = MockClient::new("ns1");
        client.with(|c| {
            c.pvcs.insert("data-pvc".to_string(), source_pvc("data-pvc"));
            // Install succeeds, the copy itself fails
            c.exec_results.push_back(ExecOutput {
                success: true,
                output: String::new(),
                message: None,
            });
            c.exec_results.push_back(ExecOutput {
                success: false,
                output: "rsync: write failed".to_string(),
                message: Some("command terminated with exit code 11".to_string()),
            });
        });

        let orchestrator = ReplantOrchestrator::new(
            Arc::clone(&client) as Arc<dyn VolumeKubeClient>,
            request("data-pvc", "ns1"),
            fast_tunables(),
        );
        let failure = orchestrator.run().await.expect_err("replant should fail");
        match failure.error {
            ReplantError::TransferFailed { step, output, .. } => {
                assert_eq!(step, "copying volume contents");
                assert!(output.contains("rsync"));
            }
            other => panic!("unexpected error: {}", other),
        }

        client.with(|c| {
            // Unconfirmed transfer: destination claim rolled back
            assert!(!c.pvcs.contains_key("data-pvc-v2"));
            assert!(c.pods.is_empty());
        });
    }

    #[tokio::test]
    async fn test_confirmed_transfer_keeps_claim_on_later_failure() {
        let client = MockClient::new("ns1");
        client.with(|c| {
            c.pvcs.insert("data-pvc".to_string(), source_pvc("data-pvc"));
            c.deployments.insert(
                "web".to_string(),
                deployment("web", 2, "storage", "data-pvc"),
            );
        });

        // Forcing the rebind at a volume entry that does not exist makes the
        // flow fail after the copy was confirmed.
        let mut req = request("data-pvc", "ns1");
        req.deployment_volume_name = Some("missing".to_string());

        let orchestrator = ReplantOrchestrator::new(
            Arc::clone(&client) as Arc<dyn VolumeKubeClient>,
            req,
            fast_tunables(),
        );
        let failure = orchestrator.run().await.expect_err("rebind should fail");
        assert!(matches!(failure.error, ReplantError::BindingNotFound { .. }));

        client.with(|c| {
            // Rollback is monotonic: the copied data survives
            assert!(c.pvcs.contains_key("data-pvc-v2"));
            assert!(c.pods.is_empty());

            // Deployment untouched and back at its original scale
            let web = c.deployments.get("web").expect("deployment");
            assert_eq!(web.spec.as_ref().and_then(|s| s.replicas), Some(2));
            assert_eq!(bound_claim(web, "storage").as_deref(), Some("data-pvc"));
        });
    }

    #[tokio::test]
    async fn test_pod_ready_wait_is_bounded() {
        let client = MockClient::new("ns1");
        client.with(|c| {
            c.pvcs.insert("data-pvc".to_string(), source_pvc("data-pvc"));
            c.pod_phase = "Pending".to_string();
        });

        let orchestrator = ReplantOrchestrator::new(
            Arc::clone(&client) as Arc<dyn VolumeKubeClient>,
            request("data-pvc", "ns1"),
            fast_tunables(),
        );
        let failure = orchestrator.run().await.expect_err("wait should time out");
        match failure.error {
            ReplantError::Timeout(msg) => assert!(msg.contains("Pending")),
            other => panic!("unexpected error: {}", other),
        }

        client.with(|c| {
            assert!(c.pods.is_empty());
            assert!(!c.pvcs.contains_key("data-pvc-v2"));
        });
    }

    #[tokio::test]
    async fn test_cancellation_unwinds_in_flight_work() {
        let client = MockClient::new("ns1");
        client.with(|c| {
            c.pvcs.insert("data-pvc".to_string(), source_pvc("data-pvc"));
            c.deployments.insert(
                "web".to_string(),
                deployment("web", 3, "storage", "data-pvc"),
            );
            // Keeps the orchestrator parked in the readiness poll
            c.pod_phase = "Pending".to_string();
        });

        let mut tunables = fast_tunables();
        tunables.pod_ready_timeout = Duration::from_secs(30);

        let orchestrator = ReplantOrchestrator::new(
            Arc::clone(&client) as Arc<dyn VolumeKubeClient>,
            request("data-pvc", "ns1"),
            tunables,
        );
        let failure = orchestrator
            .run_until(tokio::time::sleep(Duration::from_millis(50)))
            .await
            .expect_err("cancellation should abort the attempt");
        assert!(matches!(failure.error, ReplantError::Cancelled));
        assert!(failure.cleanup.all_succeeded());

        client.with(|c| {
            // Cancellation funnels into the same unwind as a failure
            assert!(c.pods.is_empty());
            assert!(!c.pvcs.contains_key("data-pvc-v2"));

            let web = c.deployments.get("web").expect("deployment");
            assert_eq!(web.spec.as_ref().and_then(|s| s.replicas), Some(3));

            let source = c.pvcs.get("data-pvc").expect("source claim");
            let has_lease = source
                .metadata
                .annotations
                .as_ref()
                .map(|a| a.contains_key(LEASE_ANNOTATION))
                .unwrap_or(false);
            assert!(!has_lease);
        });
    }

    #[tokio::test]
    async fn test_terminal_pod_phase_fails_fast() {
        let client = MockClient::new("ns1");
        client.with(|c| {
            c.pvcs.insert("data-pvc".to_string(), source_pvc("data-pvc"));
            c.pod_phase = "Failed".to_string();
        });

        let mut tunables = fast_tunables();
        tunables.pod_ready_timeout = Duration::from_secs(30);

        let started = std::time::Instant::now();
        let orchestrator = ReplantOrchestrator::new(
            Arc::clone(&client) as Arc<dyn VolumeKubeClient>,
            request("data-pvc", "ns1"),
            tunables,
        );
        let failure = orchestrator.run().await.expect_err("pod cannot become ready");

        // Surfaced well before the readiness deadline
        assert!(started.elapsed() < Duration::from_secs(5));
        match failure.error {
            ReplantError::Kube(msg) => assert!(msg.contains("Failed")),
            other => panic!("unexpected error: {}", other),
        }

        client.with(|c| {
            assert!(c.pods.is_empty());
            assert!(!c.pvcs.contains_key("data-pvc-v2"));
        });
    }

    #[tokio::test]
    async fn test_dry_run_performs_no_mutations() {
        let client = MockClient::new("ns1");
        client.with(|c| {
            c.pvcs.insert("data-pvc".to_string(), source_pvc("data-pvc"));
            c.deployments.insert(
                "web".to_string(),
                deployment("web", 3, "storage", "data-pvc"),
            );
        });

        let mut req = request("data-pvc", "ns1");
        req.dry_run = true;

        let orchestrator = ReplantOrchestrator::new(
            Arc::clone(&client) as Arc<dyn VolumeKubeClient>,
            req,
            fast_tunables(),
        );
        let outcome = orchestrator.run().await.expect("dry run should succeed");

        assert!(outcome.dry_run);
        assert_eq!(outcome.phase, ReplantPhase::DeploymentLocated);
        client.with(|c| {
            assert!(c.mutations.is_empty());
            let web = c.deployments.get("web").expect("deployment");
            assert_eq!(web.spec.as_ref().and_then(|s| s.replicas), Some(3));
        });
    }

    #[tokio::test]
    async fn test_concurrent_replant_rejected() {
        let client = MockClient::new("ns1");
        client.with(|c| {
            let mut pvc = source_pvc("data-pvc");
            let mut annotations = std::collections::BTreeMap::new();
            annotations.insert(
                LEASE_ANNOTATION.to_string(),
                "2026-08-26T10:00:00+00:00".to_string(),
            );
            pvc.metadata.annotations = Some(annotations);
            c.pvcs.insert("data-pvc".to_string(), pvc);
            c.deployments.insert(
                "web".to_string(),
                deployment("web", 3, "storage", "data-pvc"),
            );
        });

        let orchestrator = ReplantOrchestrator::new(
            Arc::clone(&client) as Arc<dyn VolumeKubeClient>,
            request("data-pvc", "ns1"),
            fast_tunables(),
        );
        let failure = orchestrator.run().await.expect_err("lease should conflict");
        assert!(matches!(failure.error, ReplantError::Validation(_)));

        client.with(|c| {
            // Rejected before any side effect
            assert!(c.pods.is_empty());
            assert!(!c.pvcs.contains_key("data-pvc-v2"));
            let web = c.deployments.get("web").expect("deployment");
            assert_eq!(web.spec.as_ref().and_then(|s| s.replicas), Some(3));
        });
    }

    #[tokio::test]
    async fn test_rebind_is_idempotent() {
        use replant_kube::domain::replant::WorkloadEditor;

        let client = MockClient::new("ns1");
        client.with(|c| {
            c.deployments.insert(
                "web".to_string(),
                deployment("web", 3, "storage", "data-pvc"),
            );
        });

        let editor = WorkloadEditor::new(Arc::clone(&client) as Arc<dyn VolumeKubeClient>);
        editor
            .rebind("web", "storage", "data-pvc-v2")
            .await
            .expect("first rebind");
        let second = editor
            .rebind("web", "storage", "data-pvc-v2")
            .await
            .expect("second rebind");

        assert_eq!(
            bound_claim(&second, "storage").as_deref(),
            Some("data-pvc-v2")
        );
        client.with(|c| {
            let web = c.deployments.get("web").expect("deployment");
            assert_eq!(bound_claim(web, "storage").as_deref(), Some("data-pvc-v2"));
        });
    }

    #[tokio::test]
    async fn test_missing_source_claim_is_an_error() {
        let client = MockClient::new("ns1");

        let orchestrator = ReplantOrchestrator::new(
            Arc::clone(&client) as Arc<dyn VolumeKubeClient>,
            request("data-pvc", "ns1"),
            fast_tunables(),
        );
        let failure = orchestrator.run().await.expect_err("source must exist");
        assert!(matches!(failure.error, ReplantError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_deployment_hint_restricts_search() {
        let client = MockClient::new("ns1");
        client.with(|c| {
            c.pvcs.insert("data-pvc".to_string(), source_pvc("data-pvc"));
            c.deployments.insert(
                "web".to_string(),
                deployment("web", 3, "storage", "data-pvc"),
            );
            c.deployments.insert(
                "other".to_string(),
                deployment("other", 1, "storage", "data-pvc"),
            );
        });

        let mut req = request("data-pvc", "ns1");
        req.deployment = Some("web".to_string());

        let orchestrator = ReplantOrchestrator::new(
            Arc::clone(&client) as Arc<dyn VolumeKubeClient>,
            req,
            fast_tunables(),
        );
        let outcome = orchestrator.run().await.expect("replant should succeed");

        assert_eq!(outcome.rebound.expect("rebound").name, "web");
        client.with(|c| {
            // The hinted deployment was rebound, the other one left alone
            let other = c.deployments.get("other").expect("deployment");
            assert_eq!(bound_claim(other, "storage").as_deref(), Some("data-pvc"));
        });
    }
}
