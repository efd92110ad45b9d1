//! Percentage distribution checks for partial rollouts.
//!
//! The validator is stateless and order-independent. Ranges are half-open,
//! so `[0,50)` and `[50,100)` share a boundary without overlapping.

use std::collections::HashSet;

use rollout_core::{Allocation, PercentRange, RolloutTarget, RuleAction};

use crate::error::ValidationError;
use crate::validate::Validate;

/// Slack allowed when comparing a float sum against 100.
const SUM_EPSILON: f64 = 1e-9;

/// Options for [`DistributionValidator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DistributionOptions {
    /// Reject range sets whose widths sum above 100.
    pub check_sum: bool,
}

impl DistributionOptions {
    /// Options with the sum cap enabled.
    #[must_use]
    pub fn with_sum_check() -> Self {
        Self { check_sum: true }
    }
}

/// Validates the percent ranges or flat percentages of a rule's targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistributionValidator {
    options: DistributionOptions,
}

impl DistributionValidator {
    /// Creates a validator with the given options.
    #[must_use]
    pub fn new(options: DistributionOptions) -> Self {
        Self { options }
    }

    /// Options in effect.
    #[must_use]
    pub fn options(&self) -> DistributionOptions {
        self.options
    }

    /// Bounds and ordering of a single range.
    pub fn validate_range(range: &PercentRange) -> Result<(), ValidationError> {
        let PercentRange { start, end } = *range;
        if !(0.0..100.0).contains(&start) {
            return Err(ValidationError::InvalidStartRange { start });
        }
        if !(end > 0.0 && end <= 100.0) {
            return Err(ValidationError::InvalidEndRange { end });
        }
        if start >= end {
            return Err(ValidationError::StartNotLessThanEnd { start, end });
        }
        Ok(())
    }

    /// Every range on its own, then the optional sum cap, then pairwise
    /// overlap.
    pub fn validate_ranges(&self, ranges: &[PercentRange]) -> Result<(), ValidationError> {
        for range in ranges {
            Self::validate_range(range)?;
        }
        if self.options.check_sum {
            check_total(ranges.iter().map(PercentRange::width))?;
        }
        for (i, a) in ranges.iter().enumerate() {
            for (j, b) in ranges.iter().enumerate() {
                if i != j && a.overlaps(b) {
                    return Err(ValidationError::RangesOverlap {
                        first: a.to_string(),
                        second: b.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Flat percentages: each in `[0, 100]`, and always summing to at most
    /// 100.
    pub fn validate_percentages(&self, values: &[f64]) -> Result<(), ValidationError> {
        for &value in values {
            if !(0.0..=100.0).contains(&value) {
                return Err(ValidationError::InvalidPercentage { value });
            }
        }
        check_total(values.iter().copied())
    }

    /// Rollout targets of one action. Targets must name distinct configs and
    /// use a single allocation form.
    pub fn validate_targets(&self, targets: &[RolloutTarget]) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        for target in targets {
            let config_id = target.config_id.trim();
            if config_id.is_empty() {
                return Err(ValidationError::scalar("configId", "must not be blank"));
            }
            if !seen.insert(config_id) {
                return Err(ValidationError::DuplicateTarget {
                    config_id: config_id.to_string(),
                });
            }
        }

        let mut ranges = Vec::new();
        let mut percentages = Vec::new();
        for target in targets {
            match target.allocation {
                Allocation::Range(range) => ranges.push(range),
                Allocation::Percentage(value) => percentages.push(value),
            }
        }
        match (ranges.is_empty(), percentages.is_empty()) {
            (false, false) => Err(ValidationError::MixedAllocation),
            (false, true) => self.validate_ranges(&ranges),
            (true, false) => self.validate_percentages(&percentages),
            (true, true) => Ok(()),
        }
    }

    /// Targets carried by a rule action; actions without targets pass.
    pub fn validate_action(&self, action: &RuleAction) -> Result<(), ValidationError> {
        self.validate_targets(action.targets())
    }
}

impl Validate for DistributionValidator {
    type Input = [PercentRange];

    fn validate(&self, input: &[PercentRange]) -> Result<(), ValidationError> {
        self.validate_ranges(input)
    }
}

fn check_total(parts: impl Iterator<Item = f64>) -> Result<(), ValidationError> {
    let total: f64 = parts.sum();
    if total > 100.0 + SUM_EPSILON {
        return Err(ValidationError::TotalExceeds100 { total });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn r(start: f64, end: f64) -> PercentRange {
        PercentRange::new(start, end)
    }

    fn summed() -> DistributionValidator {
        DistributionValidator::new(DistributionOptions::with_sum_check())
    }

    #[rstest]
    #[case(r(-1.0, 10.0), "INVALID_START_RANGE")]
    #[case(r(100.0, 100.0), "INVALID_START_RANGE")]
    #[case(r(f64::NAN, 10.0), "INVALID_START_RANGE")]
    #[case(r(0.0, 0.0), "INVALID_END_RANGE")]
    #[case(r(0.0, 101.0), "INVALID_END_RANGE")]
    #[case(r(50.0, 10.0), "START_NOT_LESS_THAN_END")]
    #[case(r(10.0, 10.0), "START_NOT_LESS_THAN_END")]
    fn single_range_failures(#[case] range: PercentRange, #[case] code: &str) {
        let err = DistributionValidator::validate_range(&range).unwrap_err();
        assert_eq!(err.code(), code);
    }

    #[rstest]
    #[case(r(0.0, 100.0))]
    #[case(r(0.0, 0.5))]
    #[case(r(99.5, 100.0))]
    fn single_range_accepts(#[case] range: PercentRange) {
        assert!(DistributionValidator::validate_range(&range).is_ok());
    }

    #[test]
    fn shared_boundary_is_not_overlap() {
        let v = summed();
        assert!(v.validate_ranges(&[r(0.0, 50.0), r(50.0, 100.0)]).is_ok());
        assert!(v.validate_ranges(&[r(50.0, 100.0), r(0.0, 50.0)]).is_ok());
    }

    #[test]
    fn overlapping_ranges_are_rejected_in_either_order() {
        let v = DistributionValidator::default();
        let err = v.validate_ranges(&[r(0.0, 60.0), r(50.0, 100.0)]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::RangesOverlap {
                first: "0-60".into(),
                second: "50-100".into()
            }
        );
        let err = v.validate_ranges(&[r(50.0, 100.0), r(0.0, 60.0)]).unwrap_err();
        assert_eq!(err.code(), "RANGES_OVERLAP");
    }

    #[test]
    fn identical_ranges_overlap() {
        let err = DistributionValidator::default()
            .validate_ranges(&[r(10.0, 20.0), r(10.0, 20.0)])
            .unwrap_err();
        assert_eq!(err.code(), "RANGES_OVERLAP");
    }

    #[test]
    fn out_of_bounds_end_is_reported_before_overlap() {
        let err = DistributionValidator::default()
            .validate_ranges(&[r(0.0, 101.0)])
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidEndRange { end: 101.0 });
    }

    #[test]
    fn sum_cap_only_applies_when_requested() {
        let ranges = [r(0.0, 40.0), r(40.0, 80.0), r(79.0, 100.0)];
        let err = summed().validate_ranges(&ranges).unwrap_err();
        assert_eq!(err.code(), "TOTAL_EXCEEDS_100");

        // Without the cap the per-range checks pass and the overlap check
        // decides.
        for range in &ranges {
            assert!(DistributionValidator::validate_range(range).is_ok());
        }
        let err = DistributionValidator::default()
            .validate_ranges(&ranges)
            .unwrap_err();
        assert_eq!(err.code(), "RANGES_OVERLAP");
    }

    #[test]
    fn full_coverage_passes_with_cap() {
        let ranges = [r(0.0, 40.0), r(40.0, 80.0), r(80.0, 100.0)];
        assert!(summed().validate_ranges(&ranges).is_ok());
    }

    #[test]
    fn float_noise_in_sum_is_tolerated() {
        let values = [33.3, 33.3, 33.4];
        assert!(summed().validate_percentages(&values).is_ok());
    }

    #[rstest]
    #[case(-0.1)]
    #[case(100.1)]
    #[case(f64::NAN)]
    fn percentage_bounds(#[case] value: f64) {
        let err = summed().validate_percentages(&[value]).unwrap_err();
        assert_eq!(err.code(), "INVALID_PERCENTAGE");
    }

    #[test]
    fn targets_must_be_distinct() {
        let targets = [
            RolloutTarget::percentage("fw-1", 10.0),
            RolloutTarget::percentage(" fw-1 ", 20.0),
        ];
        let err = summed().validate_targets(&targets).unwrap_err();
        assert_eq!(
            err,
            ValidationError::DuplicateTarget {
                config_id: "fw-1".into()
            }
        );
    }

    #[test]
    fn targets_reject_blank_config() {
        let err = summed()
            .validate_targets(&[RolloutTarget::percentage("  ", 10.0)])
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_SCALAR_VALUE");
    }

    #[test]
    fn targets_reject_mixed_allocation() {
        let targets = [
            RolloutTarget::percentage("fw-1", 10.0),
            RolloutTarget::ranged("fw-2", r(10.0, 20.0)),
        ];
        assert_eq!(
            summed().validate_targets(&targets).unwrap_err(),
            ValidationError::MixedAllocation
        );
    }

    #[test]
    fn flat_percentages_always_check_sum() {
        let targets = [
            RolloutTarget::percentage("fw-1", 60.0),
            RolloutTarget::percentage("fw-2", 50.0),
        ];
        let err = DistributionValidator::default()
            .validate_targets(&targets)
            .unwrap_err();
        assert_eq!(err, ValidationError::TotalExceeds100 { total: 110.0 });
    }

    #[test]
    fn actions_without_targets_pass() {
        assert!(summed().validate_action(&RuleAction::Block).is_ok());
        assert!(summed().validate_action(&RuleAction::default()).is_ok());
    }

    #[test]
    fn validate_trait_delegates_to_ranges() {
        let v = summed();
        assert!(v.is_valid(&[r(0.0, 50.0), r(50.0, 100.0)][..]));
        assert!(!v.is_valid(&[r(0.0, 60.0), r(50.0, 100.0)][..]));
    }
}
