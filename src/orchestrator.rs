//! The deployment orchestrator: diffs a fleet against a desired state,
//! drives it there in bounded-concurrency batches, watches failure
//! thresholds, and rolls the fleet back atomically when they trip.

use futures::future::join_all;
use tracing::{info, warn};

use crate::batch::plan_batches;
use crate::error::{DeployError, DeployResult};
use crate::executor::UpdateExecutor;
use crate::retry::update_with_retry;
use crate::rollback::rollback;
use crate::threshold::breached;
use crate::types::{take_snapshot, DeploymentConfig, DeploymentResult, Event, InstanceState, SystemState};

/// Drives `instances` from their current state to `desired`, honoring
/// `config`'s batching, retry, and failure-threshold rules.
///
/// On entry, if `current.deployment_in_progress` is already `true` this
/// fails immediately with [`DeployError::ConcurrentDeployment`] and leaves
/// every instance untouched. Otherwise `current.deployment_in_progress` is
/// guaranteed to be `false` again by the time this returns, on every exit
/// path.
///
/// A `dry_run` call reports what would happen without mutating anything,
/// including `current` and the in-progress latch.
///
/// # Errors
///
/// Returns [`DeployError::ConcurrentDeployment`] per the guard above, or
/// [`DeployError::Config`] if `config.batch_size` is not positive — the
/// latter is only raised once batching is actually attempted (Phase D), so
/// a dry run or a no-op deployment with an invalid `batch_size` still
/// succeeds.
pub async fn deploy(
    instances: &mut Vec<InstanceState>,
    desired: &SystemState,
    current: &mut SystemState,
    config: &DeploymentConfig,
    dry_run: bool,
    executor: &dyn UpdateExecutor,
) -> DeployResult<DeploymentResult> {
    if current.deployment_in_progress {
        return Err(DeployError::ConcurrentDeployment);
    }

    let mut result = DeploymentResult::default();

    // Phase A: diff.
    let mut to_update_indices = Vec::new();
    for (idx, instance) in instances.iter().enumerate() {
        if instance.matches(desired) {
            result.skipped.push(instance.instance_id.clone());
        } else {
            to_update_indices.push(idx);
        }
    }

    // Phase B: short-circuit.
    if dry_run {
        result.record(Event::DryRun {
            instances_planned: to_update_indices.len(),
        });
        result.success = true;
        return Ok(result);
    }

    if to_update_indices.is_empty() {
        result.record(Event::NoUpdatesNeeded { count: 0 });
        current.code_version.clone_from(&desired.code_version);
        current
            .configuration_version
            .clone_from(&desired.configuration_version);
        result.success = true;
        return Ok(result);
    }

    // Phase C: commit intent.
    current.deployment_in_progress = true;
    let snapshot = take_snapshot(instances);

    let run_outcome = run_batches(
        instances,
        &to_update_indices,
        desired,
        config,
        executor,
        &mut result,
    )
    .await;

    // Cleanup: always clear the latch, whether batching succeeded, aborted,
    // or failed to even plan (invalid batch_size).
    current.deployment_in_progress = false;

    match run_outcome? {
        BatchLoopOutcome::Completed => {
            current.code_version.clone_from(&desired.code_version);
            current
                .configuration_version
                .clone_from(&desired.configuration_version);
            result.success = result.failed.is_empty();
            info!(
                updated = result.updated.len(),
                failed = result.failed.len(),
                success = result.success,
                "deployment finished"
            );
            Ok(result)
        }
        BatchLoopOutcome::Aborted {
            reason,
            failed_count,
            total_count,
        } => {
            result.record(Event::Abort {
                reason: reason.clone(),
                failed_count,
                total_count,
            });
            warn!(reason = %reason, failed_count, total_count, "deployment aborted, rolling back");
            rollback(instances, &snapshot);
            result.aborted_reason = Some(reason);
            result.rolled_back = true;
            result.updated.clear();
            result.success = false;
            Ok(result)
        }
    }
}

enum BatchLoopOutcome {
    Completed,
    Aborted {
        reason: String,
        failed_count: usize,
        total_count: usize,
    },
}

/// Runs every batch of `to_update_indices` to completion or until a failure
/// threshold trips. Returns the terminal outcome; never touches `current`.
async fn run_batches(
    instances: &mut [InstanceState],
    to_update_indices: &[usize],
    desired: &SystemState,
    config: &DeploymentConfig,
    executor: &dyn UpdateExecutor,
    result: &mut DeploymentResult,
) -> DeployResult<BatchLoopOutcome> {
    let batches = plan_batches(to_update_indices, config.batch_size)?;
    let total_count = to_update_indices.len();
    let mut updated_so_far = 0usize;
    let mut failed_so_far = 0usize;

    for (zero_indexed, batch_indices) in batches.into_iter().enumerate() {
        let batch = zero_indexed + 1;

        let nodes: Vec<String> = batch_indices
            .iter()
            .map(|&i| instances[i].instance_id.clone())
            .collect();
        result.record(Event::BatchStart {
            batch,
            nodes,
        });

        // Each in-flight instance is owned by exactly one task for the
        // duration of the batch: clone it out, drive it through the retry
        // wrapper, then write the (possibly mutated) value back to its
        // original slot once the whole batch has joined.
        let mut owned: Vec<InstanceState> = batch_indices.iter().map(|&i| instances[i].clone()).collect();
        let outcomes = {
            let futures = owned
                .iter_mut()
                .map(|instance| update_with_retry(executor, instance, desired, config));
            join_all(futures).await
        };

        for ((&idx, instance), (ok, error)) in
            batch_indices.iter().zip(owned.into_iter()).zip(outcomes)
        {
            let instance_id = instance.instance_id.clone();
            instances[idx] = instance;

            if ok {
                result.updated.push(instance_id.clone());
                result.record_for(&instance_id, Event::Updated { batch });
                updated_so_far += 1;
            } else {
                result.failed.push(instance_id.clone());
                let error = error.unwrap_or_else(|| "unknown error".to_string());
                result.record_for(&instance_id, Event::Failed { batch, error });
                failed_so_far += 1;
            }
        }

        if breached(total_count, failed_so_far, config) {
            return Ok(BatchLoopOutcome::Aborted {
                reason: "failure thresholds exceeded".to_string(),
                failed_count: failed_so_far,
                total_count,
            });
        }

        result.record(Event::BatchCompleted {
            batch,
            updated_so_far,
            failed_so_far,
        });
    }

    Ok(BatchLoopOutcome::Completed)
}
