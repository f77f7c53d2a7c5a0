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

/// Configuration file resolution
pub const CONFIG_ENV_VAR: &str = "REPLANT_KUBE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Transfer pod mount layout
pub const SOURCE_MOUNT_PATH: &str = "/source";
pub const DEST_MOUNT_PATH: &str = "/destination";
pub const VOLUME_NAME_SOURCE: &str = "source";
pub const VOLUME_NAME_DESTINATION: &str = "destination";

/// Transfer pod settings
pub const TRANSFER_CONTAINER_NAME: &str = "transfer";
pub const TRANSFER_POD_SUFFIX: &str = "-replant-mover";
pub const DEFAULT_TRANSFER_IMAGE: &str = "alpine:latest";

/// Destination claim naming and defaults
pub const DEST_CLAIM_SUFFIX: &str = "-v2";
pub const DEFAULT_ACCESS_MODE: &str = "ReadWriteOnce";

/// Resource labels
pub const LABEL_APP: &str = "app";
pub const LABEL_APP_VALUE: &str = "replant-mover";

/// Replant lease annotation on the source claim
pub const LEASE_ANNOTATION: &str = "replant-kube.io/lease";

/// Wait deadlines
pub const DEFAULT_POD_READY_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 3600;

/// Snapshot restore staging directory prefix
pub const SNAPSHOT_TARGET_PREFIX: &str = "snapshot-";
