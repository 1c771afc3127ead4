//! The pluggable update executor.
//!
//! An [`UpdateExecutor`] is the capability that actually mutates one
//! instance toward a desired `(code_version, configuration_version)` pair.
//! The orchestrator depends only on this trait; it never touches a concrete
//! deployment mechanism (containers, VM images, whatever) itself.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use std::collections::HashMap;

use crate::types::{Health, InstanceState, SystemState};

/// Outcome of a single update attempt.
pub type AttemptOutcome = (bool, Option<String>);

/// Mutates a single instance toward the desired state.
///
/// Implementations must be safe to call concurrently on distinct instances
/// and must never be called concurrently on the same instance — the
/// orchestrator upholds that half of the contract by construction (see
/// `orchestrator::deploy`'s batch fan-out).
pub trait UpdateExecutor: Send + Sync {
    /// Seconds to sleep before performing the attempt, modelling real work.
    fn delay_seconds(&self) -> f64;

    /// Attempt to converge `instance` to `desired`.
    ///
    /// On success the implementation sets `instance`'s `code_version`,
    /// `configuration_version` to `desired`'s and its `health` to
    /// [`Health::Healthy`], returning `(true, None)`. On failure the
    /// instance may be left unchanged; the return is `(false, Some(reason))`.
    fn update<'a>(
        &'a self,
        instance: &'a mut InstanceState,
        desired: &'a SystemState,
    ) -> Pin<Box<dyn Future<Output = AttemptOutcome> + Send + 'a>>;
}

/// Production executor: applies the update immediately, never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductionExecutor;

impl UpdateExecutor for ProductionExecutor {
    fn delay_seconds(&self) -> f64 {
        0.0
    }

    fn update<'a>(
        &'a self,
        instance: &'a mut InstanceState,
        desired: &'a SystemState,
    ) -> Pin<Box<dyn Future<Output = AttemptOutcome> + Send + 'a>> {
        Box::pin(async move {
            instance.code_version.clone_from(&desired.code_version);
            instance
                .configuration_version
                .clone_from(&desired.configuration_version);
            instance.health = Health::Healthy;
            (true, None)
        })
    }
}

/// Test seam: a per-instance fail counter. Instance `id` fails its first
/// `fail_counts[id]` attempts, then succeeds; ids absent from the map never
/// fail. Optionally paces every attempt by a fixed delay, independent of
/// the per-instance fail count, to exercise the timeout path.
#[derive(Debug, Default)]
pub struct FailureInjector {
    fail_counts: Mutex<HashMap<String, u32>>,
    delay_seconds: f64,
}

impl FailureInjector {
    /// Builds an injector with no induced delay.
    #[must_use]
    pub fn new(fail_counts: HashMap<String, u32>) -> Self {
        Self {
            fail_counts: Mutex::new(fail_counts),
            delay_seconds: 0.0,
        }
    }

    /// Builds an injector that also paces every attempt by `delay_seconds`.
    #[must_use]
    pub fn with_delay(fail_counts: HashMap<String, u32>, delay_seconds: f64) -> Self {
        Self {
            fail_counts: Mutex::new(fail_counts),
            delay_seconds,
        }
    }
}

impl UpdateExecutor for FailureInjector {
    fn delay_seconds(&self) -> f64 {
        self.delay_seconds
    }

    fn update<'a>(
        &'a self,
        instance: &'a mut InstanceState,
        desired: &'a SystemState,
    ) -> Pin<Box<dyn Future<Output = AttemptOutcome> + Send + 'a>> {
        Box::pin(async move {
            let should_fail = {
                let mut counts = self.fail_counts.lock().unwrap_or_else(|e| e.into_inner());
                match counts.get_mut(&instance.instance_id) {
                    Some(remaining) if *remaining > 0 => {
                        *remaining -= 1;
                        true
                    }
                    _ => false,
                }
            };

            if should_fail {
                (
                    false,
                    Some(format!("injected failure for {}", instance.instance_id)),
                )
            } else {
                instance.code_version.clone_from(&desired.code_version);
                instance
                    .configuration_version
                    .clone_from(&desired.configuration_version);
                instance.health = Health::Healthy;
                (true, None)
            }
        })
    }
}
