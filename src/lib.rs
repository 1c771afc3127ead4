//! `claw-rollout`: a rolling deployment engine for Clawbernetes fleets.
//!
//! Drives a fleet of instances, each tracked as a `(code_version,
//! configuration_version)` pair, to a desired pair in bounded-concurrency
//! batches. Watches failure thresholds as batches complete and rolls the
//! whole fleet back atomically to its pre-deployment snapshot when they
//! trip.
//!
//! The entry point is [`orchestrator::deploy`]; [`executor::UpdateExecutor`]
//! is the seam through which it actually mutates an instance, and
//! [`persist`] handles reading and writing the on-disk fleet, desired-state,
//! and snapshot documents the `claw-rollout` binary operates on.

#![forbid(unsafe_code)]

pub mod batch;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod persist;
pub mod retry;
pub mod rollback;
pub mod threshold;
pub mod types;

pub use error::{DeployError, DeployResult};
pub use orchestrator::deploy;
pub use types::{
    DeploymentConfig, DeploymentResult, Event, Health, InstanceState, Snapshot, SystemState,
};
