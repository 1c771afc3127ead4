//! Retry/timeout wrapper around an [`UpdateExecutor`].
//!
//! Adds bounded retries with exponential backoff and an optional overall
//! deadline on top of a single executor invocation, and drives the health
//! transitions (`DEGRADED` between retries, `FAILED` on terminal failure)
//! that the orchestrator's per-instance history depends on.

use std::time::Duration;

use tokio::time::{sleep, timeout};

use crate::executor::{AttemptOutcome, UpdateExecutor};
use crate::types::{DeploymentConfig, Health, InstanceState, SystemState};

const MAX_BACKOFF_SECS: f64 = 30.0;

/// Runs `executor.update` against `instance` with bounded retries,
/// exponential backoff, and (if configured) an overall timeout.
///
/// On success `instance.health` is `HEALTHY` (set by the executor). On
/// terminal failure — retries exhausted or timeout — `instance.health` is
/// `FAILED`. Between retries it is `DEGRADED`.
pub async fn update_with_retry(
    executor: &dyn UpdateExecutor,
    instance: &mut InstanceState,
    desired: &SystemState,
    config: &DeploymentConfig,
) -> AttemptOutcome {
    let attempts = async {
        let max_attempts = config.retry_max_attempts + 1;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let delay = executor.delay_seconds();
            if delay > 0.0 {
                sleep(Duration::from_secs_f64(delay)).await;
            }

            let (ok, error) = executor.update(instance, desired).await;
            if ok {
                return (true, None);
            }
            last_error = error;

            if attempt < max_attempts {
                instance.health = Health::Degraded;
                let backoff = backoff_for_attempt(attempt, config.retry_base_delay_s);
                if backoff > 0.0 {
                    sleep(Duration::from_secs_f64(backoff)).await;
                }
            }
        }

        instance.health = Health::Failed;
        (false, last_error)
    };

    match config.timeout_s {
        Some(timeout_s) if timeout_s > 0.0 => {
            match timeout(Duration::from_secs_f64(timeout_s), attempts).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    instance.health = Health::Failed;
                    (false, Some("timeout".to_string()))
                }
            }
        }
        _ => attempts.await,
    }
}

/// Backoff delay between 1-indexed attempt `attempt` and the next one.
fn backoff_for_attempt(attempt: u32, base_delay_s: f64) -> f64 {
    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    (2f64.powi(exponent) * base_delay_s).min(MAX_BACKOFF_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{FailureInjector, ProductionExecutor};
    use std::collections::HashMap;

    fn instance(id: &str) -> InstanceState {
        InstanceState {
            instance_id: id.to_string(),
            code_version: "old".to_string(),
            configuration_version: "old".to_string(),
            health: Health::Healthy,
        }
    }

    #[test]
    fn backoff_doubles_and_caps_at_thirty_seconds() {
        assert!((backoff_for_attempt(1, 1.0) - 1.0).abs() < f64::EPSILON);
        assert!((backoff_for_attempt(2, 1.0) - 2.0).abs() < f64::EPSILON);
        assert!((backoff_for_attempt(3, 1.0) - 4.0).abs() < f64::EPSILON);
        assert!((backoff_for_attempt(20, 1.0) - MAX_BACKOFF_SECS).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt_with_no_retries_configured() {
        let executor = ProductionExecutor;
        let desired = SystemState::new("new", "new");
        let config = DeploymentConfig::default();
        let mut inst = instance("a");

        let (ok, err) = update_with_retry(&executor, &mut inst, &desired, &config).await;
        assert!(ok);
        assert!(err.is_none());
        assert_eq!(inst.health, Health::Healthy);
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let mut counts = HashMap::new();
        counts.insert("a".to_string(), 1);
        let executor = FailureInjector::new(counts);
        let desired = SystemState::new("new", "new");
        let config = DeploymentConfig {
            retry_max_attempts: 1,
            retry_base_delay_s: 0.001,
            ..DeploymentConfig::default()
        };
        let mut inst = instance("a");

        let (ok, _) = update_with_retry(&executor, &mut inst, &desired, &config).await;
        assert!(ok);
        assert_eq!(inst.health, Health::Healthy);
    }

    #[tokio::test]
    async fn exhausting_retries_marks_instance_failed() {
        let mut counts = HashMap::new();
        counts.insert("a".to_string(), 5);
        let executor = FailureInjector::new(counts);
        let desired = SystemState::new("new", "new");
        let config = DeploymentConfig {
            retry_max_attempts: 1,
            retry_base_delay_s: 0.001,
            ..DeploymentConfig::default()
        };
        let mut inst = instance("a");

        let (ok, err) = update_with_retry(&executor, &mut inst, &desired, &config).await;
        assert!(!ok);
        assert!(err.is_some());
        assert_eq!(inst.health, Health::Failed);
    }

    #[tokio::test]
    async fn timeout_is_terminal_and_reports_timeout_error() {
        let executor = FailureInjector::with_delay(HashMap::new(), 1.0);
        let desired = SystemState::new("new", "new");
        let config = DeploymentConfig {
            timeout_s: Some(0.05),
            retry_max_attempts: 0,
            ..DeploymentConfig::default()
        };
        let mut inst = instance("a");

        let (ok, err) = update_with_retry(&executor, &mut inst, &desired, &config).await;
        assert!(!ok);
        assert_eq!(err, Some("timeout".to_string()));
        assert_eq!(inst.health, Health::Failed);
    }

    #[tokio::test]
    async fn no_timeout_when_unset_or_non_positive() {
        let executor = ProductionExecutor;
        let desired = SystemState::new("new", "new");
        let config = DeploymentConfig {
            timeout_s: Some(0.0),
            ..DeploymentConfig::default()
        };
        let mut inst = instance("a");

        let (ok, _) = update_with_retry(&executor, &mut inst, &desired, &config).await;
        assert!(ok);
    }
}
