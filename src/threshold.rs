//! Failure-threshold evaluation: decides whether an in-progress deployment
//! must be aborted and rolled back.

use crate::types::DeploymentConfig;

/// Returns whether the observed failure count trips an abort.
///
/// `total` is the count of instances being updated across the whole
/// deployment, not the whole fleet. Both thresholds are independent: either
/// one breaching is sufficient.
#[must_use]
pub fn breached(total: usize, failed: usize, config: &DeploymentConfig) -> bool {
    if total == 0 || failed == 0 {
        return false;
    }

    if let Some(max_failures) = config.max_failures {
        if failed as u64 > max_failures {
            return true;
        }
    }

    if let Some(failure_percentage) = config.failure_percentage {
        let observed = (failed as f64 / total as f64) * 100.0;
        if observed > failure_percentage {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn config_with(max_failures: Option<u64>, failure_percentage: Option<f64>) -> DeploymentConfig {
        DeploymentConfig {
            max_failures,
            failure_percentage,
            ..DeploymentConfig::default()
        }
    }

    #[test]
    fn no_failures_never_breaches() {
        let config = config_with(Some(0), Some(1.0));
        assert!(!breached(10, 0, &config));
    }

    #[test]
    fn zero_total_never_breaches() {
        let config = config_with(Some(0), Some(1.0));
        assert!(!breached(0, 0, &config));
    }

    #[test_case(10, 2, Some(2), None, false ; "equal to max_failures does not breach")]
    #[test_case(10, 3, Some(2), None, true ; "above max_failures breaches")]
    #[test_case(10, 2, None, Some(25.0), false ; "20 percent under 25 percent threshold")]
    #[test_case(10, 3, None, Some(25.0), true ; "30 percent over 25 percent threshold")]
    #[test_case(10, 9, None, None, false ; "unset thresholds never breach")]
    #[test_case(10, 2, Some(1), Some(90.0), true ; "max_failures alone is sufficient")]
    #[test_case(10, 2, Some(100), Some(10.0), true ; "failure_percentage alone is sufficient")]
    fn threshold_table(
        total: usize,
        failed: usize,
        max_failures: Option<u64>,
        failure_percentage: Option<f64>,
        expected: bool,
    ) {
        let config = config_with(max_failures, failure_percentage);
        assert_eq!(breached(total, failed, &config), expected);
    }
}
