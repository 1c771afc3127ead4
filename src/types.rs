//! Core data model: instances, system state, configuration, results, and
//! the event records that make up a deployment's history.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Health of a single instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    /// Instance is serving traffic normally.
    Healthy,
    /// Instance is in a retry/backoff cycle after a failed update attempt.
    Degraded,
    /// Instance exhausted its retries (or timed out) and did not converge.
    Failed,
}

impl Default for Health {
    fn default() -> Self {
        Self::Healthy
    }
}

/// One instance's observed (code, configuration, health) state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState {
    /// Unique identifier of the instance within its fleet.
    pub instance_id: String,
    /// Currently running code version.
    pub code_version: String,
    /// Currently applied configuration version.
    pub configuration_version: String,
    /// Current health.
    #[serde(default)]
    pub health: Health,
}

impl InstanceState {
    /// Returns whether this instance already matches the desired pair.
    #[must_use]
    pub fn matches(&self, desired: &SystemState) -> bool {
        self.code_version == desired.code_version
            && self.configuration_version == desired.configuration_version
    }
}

/// Fleet-wide target or current (code, configuration) pair, plus the
/// re-entrancy latch used by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemState {
    /// Code version.
    pub code_version: String,
    /// Configuration version.
    pub configuration_version: String,
    /// Whether a deployment is currently mutating this fleet. Never present
    /// in a persisted desired-state document; defaults to `false` when one
    /// is loaded.
    #[serde(default)]
    pub deployment_in_progress: bool,
}

impl SystemState {
    /// Builds a system state from the given versions, with no deployment
    /// in progress.
    #[must_use]
    pub fn new(code_version: impl Into<String>, configuration_version: impl Into<String>) -> Self {
        Self {
            code_version: code_version.into(),
            configuration_version: configuration_version.into(),
            deployment_in_progress: false,
        }
    }
}

/// Tunable knobs for a single `deploy` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Number of instances updated concurrently per batch. Validated (must
    /// be positive) only when batches are actually planned, not at
    /// construction time.
    pub batch_size: i64,
    /// Absolute number of failures that trips an abort, if set.
    pub max_failures: Option<u64>,
    /// Percentage (0,100] of failures among updated instances that trips an
    /// abort, if set.
    pub failure_percentage: Option<f64>,
    /// Per-instance update timeout in seconds. Unset or non-positive means
    /// no timeout.
    pub timeout_s: Option<f64>,
    /// Number of retries after the first attempt (so total attempts is this
    /// plus one).
    pub retry_max_attempts: u32,
    /// Base delay in seconds for the exponential backoff between retries.
    pub retry_base_delay_s: f64,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_failures: None,
            failure_percentage: None,
            timeout_s: None,
            retry_max_attempts: 0,
            retry_base_delay_s: 0.1,
        }
    }
}

/// A single entry in a deployment's history, tagged by the kind of event it
/// records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// A batch began executing.
    BatchStart {
        /// 1-indexed batch number.
        batch: usize,
        /// Instance ids in this batch, in input order.
        nodes: Vec<String>,
    },
    /// A batch finished without tripping a threshold.
    BatchCompleted {
        /// 1-indexed batch number.
        batch: usize,
        /// Total instances updated successfully so far.
        updated_so_far: usize,
        /// Total instances failed so far.
        failed_so_far: usize,
    },
    /// The deployment was aborted and rolled back.
    Abort {
        /// Human-readable reason.
        reason: String,
        /// Failures observed at the time of the abort.
        failed_count: usize,
        /// Total instances that needed updating.
        total_count: usize,
    },
    /// The deployment was a dry run; nothing was mutated.
    DryRun {
        /// Number of instances that would have been updated.
        instances_planned: usize,
    },
    /// No instances needed updating.
    NoUpdatesNeeded {
        /// Always zero; retained for shape parity with other event kinds.
        count: usize,
    },
    /// A single instance converged to the desired state.
    Updated {
        /// 1-indexed batch number the instance was updated in.
        batch: usize,
    },
    /// A single instance failed to converge.
    Failed {
        /// 1-indexed batch number the instance failed in.
        batch: usize,
        /// The last error observed for this instance.
        error: String,
    },
}

/// The outcome of a single `deploy` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentResult {
    /// Whether every instance that needed updating converged.
    pub success: bool,
    /// Instance ids that converged to the desired state, in batch order.
    pub updated: Vec<String>,
    /// Instance ids that failed to converge, in batch order.
    pub failed: Vec<String>,
    /// Instance ids already at the desired state on entry.
    pub skipped: Vec<String>,
    /// Why the deployment was aborted, if it was.
    pub aborted_reason: Option<String>,
    /// Whether a rollback was performed.
    pub rolled_back: bool,
    /// Fleet-level event history, in emission order.
    pub history: Vec<Event>,
    /// Per-instance event history, keyed by instance id.
    pub per_node_history: HashMap<String, Vec<Event>>,
}

impl DeploymentResult {
    /// Records a fleet-level event.
    pub fn record(&mut self, event: Event) {
        self.history.push(event);
    }

    /// Records a per-instance event.
    pub fn record_for(&mut self, instance_id: &str, event: Event) {
        self.per_node_history
            .entry(instance_id.to_string())
            .or_default()
            .push(event);
    }
}

/// A point-in-time copy of a fleet, taken before any mutation, used to
/// restore state on rollback.
pub type Snapshot = HashMap<String, InstanceState>;

/// Builds a snapshot from the given instances.
#[must_use]
pub fn take_snapshot(instances: &[InstanceState]) -> Snapshot {
    instances
        .iter()
        .map(|i| (i.instance_id.clone(), i.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_matches_desired() {
        let desired = SystemState::new("v2", "k2");
        let inst = InstanceState {
            instance_id: "a".into(),
            code_version: "v2".into(),
            configuration_version: "k2".into(),
            health: Health::Healthy,
        };
        assert!(inst.matches(&desired));
    }

    #[test]
    fn instance_does_not_match_on_code_mismatch() {
        let desired = SystemState::new("v2", "k2");
        let inst = InstanceState {
            instance_id: "a".into(),
            code_version: "v1".into(),
            configuration_version: "k2".into(),
            health: Health::Healthy,
        };
        assert!(!inst.matches(&desired));
    }

    #[test]
    fn default_config_matches_reference_defaults() {
        let config = DeploymentConfig::default();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.retry_max_attempts, 0);
        assert!((config.retry_base_delay_s - 0.1).abs() < f64::EPSILON);
        assert!(config.max_failures.is_none());
        assert!(config.failure_percentage.is_none());
    }

    #[test]
    fn desired_document_without_flag_defaults_to_false() {
        let json = r#"{"code_version":"v2","configuration_version":"k2"}"#;
        let state: SystemState = serde_json::from_str(json).expect("parses");
        assert!(!state.deployment_in_progress);
    }

    #[test]
    fn take_snapshot_captures_all_fields() {
        let instances = vec![InstanceState {
            instance_id: "a".into(),
            code_version: "v1".into(),
            configuration_version: "k1".into(),
            health: Health::Degraded,
        }];
        let snap = take_snapshot(&instances);
        assert_eq!(snap["a"].health, Health::Degraded);
    }

    #[test]
    fn event_serializes_with_tag() {
        let event = Event::BatchStart {
            batch: 1,
            nodes: vec!["a".into()],
        };
        let json = serde_json::to_value(&event).expect("serializes");
        assert_eq!(json["event"], "batch_start");
        assert_eq!(json["batch"], 1);
    }
}
