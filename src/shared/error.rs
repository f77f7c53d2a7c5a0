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

use thiserror::Error;
pub type Result<T> = std::result::Result<T, ReplantError>;

#[derive(Error, Debug)]
pub enum ReplantError {
    #[error("Kubernetes API error: {0}")]
    Kube(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Resource not found: {resource_type} '{name}' in namespace '{namespace}'")]
    NotFound {
        resource_type: String,
        name: String,
        namespace: String,
    },

    #[error("Conflict updating {resource_type} '{name}': {message}")]
    Conflict {
        resource_type: String,
        name: String,
        message: String,
    },

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Volume binding '{volume_name}' not found on deployment '{deployment}'")]
    BindingNotFound {
        deployment: String,
        volume_name: String,
    },

    #[error("Provisioning error: {0}")]
    Provisioning(String),

    #[error("Transfer failed while {step}: {message}\n{output}")]
    TransferFailed {
        step: String,
        message: String,
        output: String,
    },

    #[error("Backup provider error: {0}")]
    Provider(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl From<kube::Error> for ReplantError {
    fn from(err: kube::Error) -> Self {
        ReplantError::Kube(err.to_string())
    }
}

impl ReplantError {
    pub fn config_error(context: impl Into<String>) -> Self {
        Self::Config(context.into())
    }

    pub fn not_found(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    pub fn conflict(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            resource_type: resource_type.into(),
            name: name.into(),
            message: message.into(),
        }
    }
}
