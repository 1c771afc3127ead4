//! Rollback executor: restores instances to their pre-deployment snapshot.

use tracing::warn;

use crate::types::{InstanceState, Snapshot};

/// Overwrites `code_version`, `configuration_version`, and `health` on every
/// instance whose id is present in `snapshot`. Instances absent from the
/// snapshot are left untouched. Idempotent: applying the same snapshot
/// repeatedly yields the same state.
pub fn rollback(instances: &mut [InstanceState], snapshot: &Snapshot) {
    for instance in instances.iter_mut() {
        match snapshot.get(&instance.instance_id) {
            Some(saved) => {
                instance.code_version.clone_from(&saved.code_version);
                instance
                    .configuration_version
                    .clone_from(&saved.configuration_version);
                instance.health = saved.health;
            }
            None => {
                warn!(
                    instance_id = %instance.instance_id,
                    "no snapshot entry for instance, leaving untouched"
                );
            }
        }
    }
}
