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

use crate::shared::error::ReplantError;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use kube::api::{AttachParams, AttachedProcess};
use kube::{Api, Client};
use tokio::io::AsyncReadExt;

/// Outcome of a remote command execution inside a pod.
///
/// `output` carries the combined stdout/stderr stream so a failed transfer
/// can be diagnosed from the error alone.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub success: bool,
    pub output: String,
    pub message: Option<String>,
}

#[async_trait::async_trait]
pub trait VolumeKubeClient: Send + Sync {
    async fn list_deployments(&self) -> Result<Vec<Deployment>, ReplantError>;

    async fn get_deployment(&self, name: &str) -> Result<Deployment, ReplantError>;

    async fn update_deployment(&self, deployment: &Deployment)
        -> Result<Deployment, ReplantError>;

    async fn get_pvc(&self, name: &str) -> Result<PersistentVolumeClaim, ReplantError>;

    async fn create_pvc(
        &self,
        pvc: &PersistentVolumeClaim,
    ) -> Result<PersistentVolumeClaim, ReplantError>;

    async fn update_pvc(
        &self,
        pvc: &PersistentVolumeClaim,
    ) -> Result<PersistentVolumeClaim, ReplantError>;

    async fn delete_pvc(&self, name: &str) -> Result<(), ReplantError>;

    async fn create_pod(&self, pod: &Pod) -> Result<Pod, ReplantError>;

    async fn get_pod(&self, name: &str) -> Result<Pod, ReplantError>;

    async fn delete_pod(&self, name: &str) -> Result<(), ReplantError>;

    async fn exec_pod(&self, name: &str, command: &[String]) -> Result<ExecOutput, ReplantError>;

    fn namespace(&self) -> &str;
}

pub struct VolumeKubeClientImpl {
    client: Client,
    namespace: String,
}

impl VolumeKubeClientImpl {
    pub async fn new(namespace: String) -> Result<Self, ReplantError> {
        let client = Client::try_default().await.map_err(|e| {
            ReplantError::Kube(format!("Failed to create Kubernetes client: {}", e))
        })?;

        Ok(Self { client, namespace })
    }

    pub async fn new_with_config(
        namespace: String,
        kubeconfig_path: Option<String>,
        context: Option<String>,
    ) -> Result<Self, ReplantError> {
        use kube::config::{KubeConfigOptions, Kubeconfig};

        let kubeconfig = if let Some(path) = kubeconfig_path {
            Kubeconfig::read_from(path)
                .map_err(|e| ReplantError::Kube(format!("Failed to load kubeconfig: {}", e)))?
        } else {
            Kubeconfig::read()
                .map_err(|e| ReplantError::Kube(format!("Failed to load kubeconfig: {}", e)))?
        };

        let config_options = KubeConfigOptions {
            context,
            cluster: None,
            user: None,
        };

        let config = kube::Config::from_custom_kubeconfig(kubeconfig, &config_options)
            .await
            .map_err(|e| {
                ReplantError::Kube(format!("Failed to create Kubernetes config: {}", e))
            })?;

        let client = Client::try_from(config).map_err(|e| {
            ReplantError::Kube(format!("Failed to create Kubernetes client: {}", e))
        })?;

        Ok(Self { client, namespace })
    }

    fn deployments(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn pvcs(&self) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn map_get_error(&self, resource_type: &str, name: &str, e: kube::Error) -> ReplantError {
        if let kube::Error::Api(ae) = e {
            if ae.code == 404 {
                ReplantError::not_found(resource_type, name, &self.namespace)
            } else {
                ReplantError::Kube(ae.message)
            }
        } else {
            ReplantError::Kube(e.to_string())
        }
    }

    fn map_update_error(&self, resource_type: &str, name: &str, e: kube::Error) -> ReplantError {
        if let kube::Error::Api(ae) = e {
            match ae.code {
                404 => ReplantError::not_found(resource_type, name, &self.namespace),
                409 => ReplantError::conflict(resource_type, name, ae.message),
                _ => ReplantError::Kube(ae.message),
            }
        } else {
            ReplantError::Kube(e.to_string())
        }
    }

    async fn collect_exec_output(
        mut attached: AttachedProcess,
    ) -> Result<ExecOutput, ReplantError> {
        let stdout_reader = attached.stdout();
        let stderr_reader = attached.stderr();
        let status_future = attached.take_status();

        let stdout_task = async {
            let mut buf = String::new();
            if let Some(mut reader) = stdout_reader {
                let _ = reader.read_to_string(&mut buf).await;
            }
            buf
        };
        let stderr_task = async {
            let mut buf = String::new();
            if let Some(mut reader) = stderr_reader {
                let _ = reader.read_to_string(&mut buf).await;
            }
            buf
        };

        // Drain both streams before awaiting the exit status so neither side
        // can stall the connection on a full buffer.
        let (stdout, stderr) = futures::join!(stdout_task, stderr_task);

        let status = match status_future {
            Some(fut) => fut.await,
            None => None,
        };

        attached
            .join()
            .await
            .map_err(|e| ReplantError::Kube(format!("exec stream ended abnormally: {}", e)))?;

        let mut output = stdout;
        if !stderr.is_empty() {
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(&stderr);
        }

        let (success, message) = match status {
            Some(s) => (
                s.status.as_deref() == Some("Success"),
                s.message.clone().or(s.reason),
            ),
            // No status frame means the stream closed without a verdict;
            // treat it as failure rather than assuming success.
            None => (false, Some("no exit status reported".to_string())),
        };

        Ok(ExecOutput {
            success,
            output,
            message,
        })
    }
}

#[async_trait::async_trait]
impl VolumeKubeClient for VolumeKubeClientImpl {
    async fn list_deployments(&self) -> Result<Vec<Deployment>, ReplantError> {
        let lp = kube::api::ListParams::default();
        let deployments = self.deployments().list(&lp).await?;
        Ok(deployments.items)
    }

    async fn get_deployment(&self, name: &str) -> Result<Deployment, ReplantError> {
        self.deployments()
            .get(name)
            .await
            .map_err(|e| self.map_get_error("Deployment", name, e))
    }

    async fn update_deployment(
        &self,
        deployment: &Deployment,
    ) -> Result<Deployment, ReplantError> {
        let name = deployment
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| ReplantError::config_error("Deployment name is required"))?;
        let pp = kube::api::PostParams::default();

        self.deployments()
            .replace(name, &pp, deployment)
            .await
            .map_err(|e| self.map_update_error("Deployment", name, e))
    }

    async fn get_pvc(&self, name: &str) -> Result<PersistentVolumeClaim, ReplantError> {
        self.pvcs()
            .get(name)
            .await
            .map_err(|e| self.map_get_error("PersistentVolumeClaim", name, e))
    }

    async fn create_pvc(
        &self,
        pvc: &PersistentVolumeClaim,
    ) -> Result<PersistentVolumeClaim, ReplantError> {
        let name = pvc.metadata.name.as_deref().unwrap_or_default();
        let pp = kube::api::PostParams::default();

        self.pvcs()
            .create(&pp, pvc)
            .await
            .map_err(|e| self.map_update_error("PersistentVolumeClaim", name, e))
    }

    async fn update_pvc(
        &self,
        pvc: &PersistentVolumeClaim,
    ) -> Result<PersistentVolumeClaim, ReplantError> {
        let name = pvc
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| ReplantError::config_error("PersistentVolumeClaim name is required"))?;
        let pp = kube::api::PostParams::default();

        self.pvcs()
            .replace(name, &pp, pvc)
            .await
            .map_err(|e| self.map_update_error("PersistentVolumeClaim", name, e))
    }

    async fn delete_pvc(&self, name: &str) -> Result<(), ReplantError> {
        let dp = kube::api::DeleteParams::default();

        self.pvcs().delete(name, &dp).await?;
        Ok(())
    }

    async fn create_pod(&self, pod: &Pod) -> Result<Pod, ReplantError> {
        let name = pod.metadata.name.as_deref().unwrap_or_default();
        let pp = kube::api::PostParams::default();

        self.pods()
            .create(&pp, pod)
            .await
            .map_err(|e| self.map_update_error("Pod", name, e))
    }

    async fn get_pod(&self, name: &str) -> Result<Pod, ReplantError> {
        self.pods()
            .get(name)
            .await
            .map_err(|e| self.map_get_error("Pod", name, e))
    }

    async fn delete_pod(&self, name: &str) -> Result<(), ReplantError> {
        let dp = kube::api::DeleteParams::default();

        self.pods().delete(name, &dp).await?;
        Ok(())
    }

    async fn exec_pod(&self, name: &str, command: &[String]) -> Result<ExecOutput, ReplantError> {
        let ap = AttachParams::default().stdout(true).stderr(true);
        let attached = self
            .pods()
            .exec(name, command.to_vec(), &ap)
            .await
            .map_err(|e| ReplantError::Kube(format!("exec on pod '{}' failed: {}", name, e)))?;

        Self::collect_exec_output(attached).await
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}
