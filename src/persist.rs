//! JSON persistence for fleet, desired-state, and snapshot documents.
//!
//! Mirrors the load/save shape of the node agent's on-disk store: read the
//! whole document into memory, deserialize leniently (`#[serde(default)]`
//! fields tolerate older documents), and write back as pretty-printed JSON
//! after ensuring the parent directory exists.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::DeployResult;
use crate::types::{InstanceState, Snapshot, SystemState};

/// Loads an ordered fleet document from `path`.
///
/// # Errors
///
/// Returns [`crate::error::DeployError::Io`] if the file cannot be read, or
/// [`crate::error::DeployError::Json`] if it is not a valid fleet document.
pub fn load_fleet(path: &Path) -> DeployResult<Vec<InstanceState>> {
    let raw = fs::read_to_string(path)?;
    let fleet: Vec<InstanceState> = serde_json::from_str(&raw)?;
    debug!(path = %path.display(), count = fleet.len(), "loaded fleet document");
    Ok(fleet)
}

/// Writes `fleet` to `path` as pretty-printed JSON, creating the parent
/// directory if it does not already exist.
///
/// # Errors
///
/// Returns [`crate::error::DeployError::Io`] if the directory cannot be
/// created or the file cannot be written, or
/// [`crate::error::DeployError::Json`] if serialization fails.
pub fn save_fleet(path: &Path, fleet: &[InstanceState]) -> DeployResult<()> {
    ensure_parent_dir(path)?;
    let raw = serde_json::to_string_pretty(fleet)?;
    fs::write(path, raw)?;
    debug!(path = %path.display(), count = fleet.len(), "saved fleet document");
    Ok(())
}

/// Loads a desired-state document from `path`. `deployment_in_progress` is
/// not meaningful in a desired-state document and defaults to `false`.
///
/// # Errors
///
/// Returns [`crate::error::DeployError::Io`] if the file cannot be read, or
/// [`crate::error::DeployError::Json`] if it is not a valid document.
pub fn load_desired(path: &Path) -> DeployResult<SystemState> {
    let raw = fs::read_to_string(path)?;
    let desired: SystemState = serde_json::from_str(&raw)?;
    debug!(path = %path.display(), "loaded desired-state document");
    Ok(desired)
}

/// Loads a snapshot document from `path`.
///
/// # Errors
///
/// Returns [`crate::error::DeployError::Io`] if the file cannot be read, or
/// [`crate::error::DeployError::Json`] if it is not a valid document.
pub fn load_snapshot(path: &Path) -> DeployResult<Snapshot> {
    let raw = fs::read_to_string(path)?;
    let snapshot: Snapshot = serde_json::from_str(&raw)?;
    debug!(path = %path.display(), count = snapshot.len(), "loaded snapshot document");
    Ok(snapshot)
}

/// Writes `snapshot` to `path` as pretty-printed JSON, creating the parent
/// directory if it does not already exist.
///
/// # Errors
///
/// Returns [`crate::error::DeployError::Io`] if the directory cannot be
/// created or the file cannot be written, or
/// [`crate::error::DeployError::Json`] if serialization fails.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> DeployResult<()> {
    ensure_parent_dir(path)?;
    let raw = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, raw)?;
    debug!(path = %path.display(), count = snapshot.len(), "saved snapshot document");
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> DeployResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).inspect_err(|e| {
                warn!(path = %parent.display(), error = %e, "failed to create parent directory");
            })?;
        }
    }
    Ok(())
}
