//! Batch planning: partition an update set into fixed-size, ordered batches.

use crate::error::{DeployError, DeployResult};

/// Partitions `items` into contiguous slices of at most `batch_size`
/// elements, preserving input order. The last batch may be shorter.
///
/// # Errors
///
/// Returns [`DeployError::Config`] if `batch_size` is not positive.
pub fn plan_batches<T: Clone>(items: &[T], batch_size: i64) -> DeployResult<Vec<Vec<T>>> {
    if batch_size <= 0 {
        return Err(DeployError::invalid_batch_size(batch_size));
    }
    let batch_size = batch_size as usize;

    Ok(items
        .chunks(batch_size)
        .map(<[T]>::to_vec)
        .collect())
}
