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

use crate::shared::error::Result;
use futures::future::BoxFuture;
use std::fmt;
use tracing::{info, warn};

/// Progress of one replant attempt. Strictly sequential; `Failed` absorbs
/// from any other phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReplantPhase {
    Init,
    DeploymentLocated,
    ScaledDown,
    PodCreated,
    ClaimCreated,
    PodReady,
    TransferComplete,
    Rebound,
    Done,
}

impl fmt::Display for ReplantPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReplantPhase::Init => "Init",
            ReplantPhase::DeploymentLocated => "DeploymentLocated",
            ReplantPhase::ScaledDown => "ScaledDown",
            ReplantPhase::PodCreated => "PodCreated",
            ReplantPhase::ClaimCreated => "ClaimCreated",
            ReplantPhase::PodReady => "PodReady",
            ReplantPhase::TransferComplete => "TransferComplete",
            ReplantPhase::Rebound => "Rebound",
            ReplantPhase::Done => "Done",
        };
        write!(f, "{}", name)
    }
}

/// When a compensating action applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupPolicy {
    /// Only when the attempt fails or is cancelled.
    OnFailure,
    /// At the end of every attempt, success included.
    Always,
}

type CleanupAction = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

struct Compensation {
    label: String,
    policy: CleanupPolicy,
    armed: bool,
    action: Option<CleanupAction>,
}

/// Handle for disarming a pushed compensation.
#[derive(Debug, Clone, Copy)]
pub struct CompensationToken(usize);

/// Result of one executed compensating action.
#[derive(Debug, Clone)]
pub struct CleanupResult {
    pub label: String,
    pub ok: bool,
    pub detail: Option<String>,
}

/// Summary of the unwind, reported to the operator on exit.
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    pub actions: Vec<CleanupResult>,
}

impl CleanupReport {
    pub fn all_succeeded(&self) -> bool {
        self.actions.iter().all(|a| a.ok)
    }
}

/// Explicit undo list for the replant state machine.
///
/// Each forward step pushes its compensation before the next step runs; on
/// exit the applicable entries execute in reverse push order. Cleanup is
/// best-effort: a failed undo is recorded and reported, never escalated over
/// the primary error.
#[derive(Default)]
pub struct CompensationStack {
    entries: Vec<Compensation>,
}

impl CompensationStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        label: impl Into<String>,
        policy: CleanupPolicy,
        action: CleanupAction,
    ) -> CompensationToken {
        self.entries.push(Compensation {
            label: label.into(),
            policy,
            armed: true,
            action: Some(action),
        });
        CompensationToken(self.entries.len() - 1)
    }

    /// Permanently disable an entry. Used once a step's effect must survive
    /// the attempt (a confirmed transfer is never rolled back).
    pub fn disarm(&mut self, token: CompensationToken) {
        if let Some(entry) = self.entries.get_mut(token.0) {
            entry.armed = false;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run the applicable compensations in reverse push order.
    pub async fn unwind(&mut self, failed: bool) -> CleanupReport {
        let mut report = CleanupReport::default();

        for entry in self.entries.iter_mut().rev() {
            if !entry.armed {
                continue;
            }
            if entry.policy == CleanupPolicy::OnFailure && !failed {
                continue;
            }
            let Some(action) = entry.action.take() else {
                continue;
            };

            info!(action = %entry.label, "running compensating action");
            match action().await {
                Ok(()) => report.actions.push(CleanupResult {
                    label: entry.label.clone(),
                    ok: true,
                    detail: None,
                }),
                Err(e) => {
                    warn!(action = %entry.label, error = %e, "compensating action failed");
                    report.actions.push(CleanupResult {
                        label: entry.label.clone(),
                        ok: false,
                        detail: Some(e.to_string()),
                    });
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::ReplantError;
    use std::sync::{Arc, Mutex};

    fn record(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> CleanupAction {
        let log = Arc::clone(log);
        Box::new(move || {
            Box::pin(async move {
                log.lock().unwrap().push(name);
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn test_unwind_runs_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = CompensationStack::new();
        stack.push("first", CleanupPolicy::OnFailure, record(&log, "first"));
        stack.push("second", CleanupPolicy::OnFailure, record(&log, "second"));
        stack.push("third", CleanupPolicy::OnFailure, record(&log, "third"));

        let report = stack.unwind(true).await;
        assert_eq!(*log.lock().unwrap(), vec!["third", "second", "first"]);
        assert!(report.all_succeeded());
    }

    #[tokio::test]
    async fn test_on_failure_entries_skipped_on_success() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = CompensationStack::new();
        stack.push("undo", CleanupPolicy::OnFailure, record(&log, "undo"));
        stack.push("always", CleanupPolicy::Always, record(&log, "always"));

        stack.unwind(false).await;
        assert_eq!(*log.lock().unwrap(), vec!["always"]);
    }

    #[tokio::test]
    async fn test_disarmed_entry_never_runs() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = CompensationStack::new();
        let token = stack.push("undo", CleanupPolicy::OnFailure, record(&log, "undo"));
        stack.disarm(token);

        stack.unwind(true).await;
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_action_is_reported_not_escalated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = CompensationStack::new();
        stack.push("ok", CleanupPolicy::OnFailure, record(&log, "ok"));
        stack.push(
            "broken",
            CleanupPolicy::OnFailure,
            Box::new(|| {
                Box::pin(async { Err(ReplantError::Kube("boom".to_string())) })
            }),
        );

        let report = stack.unwind(true).await;
        assert!(!report.all_succeeded());
        assert_eq!(report.actions.len(), 2);
        assert!(!report.actions[0].ok);
        assert!(report.actions[1].ok);
        // The later push failed but the earlier one still ran
        assert_eq!(*log.lock().unwrap(), vec!["ok"]);
    }

    #[test]
    fn test_phase_ordering_and_display() {
        assert!(ReplantPhase::Init < ReplantPhase::ScaledDown);
        assert!(ReplantPhase::TransferComplete < ReplantPhase::Done);
        assert_eq!(ReplantPhase::PodReady.to_string(), "PodReady");
    }
}
