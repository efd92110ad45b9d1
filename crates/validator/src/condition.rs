//! Structural and semantic checks for rule condition trees.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. the tree holds at least one condition
//! 2. every compound part after the first carries a relation
//! 3. compound parts do not nest further parts
//! 4. no condition appears twice (across AND and OR alike)
//! 5. each condition has a free argument, an allowed operation and, unless
//!    the operation is `EXISTS`, a fixed argument
//! 6. the fixed argument has the shape its operation and free argument
//!    require

use std::collections::HashSet;

use regex::Regex;
use rollout_core::well_known::{is_ip_arg, is_mac_arg};
use rollout_core::{Condition, ConditionTree, FixedArg, Operation, PercentRange, RuleClass};

use crate::distribution::DistributionValidator;
use crate::error::ValidationError;
use crate::network::{IpAddress, MacAddress};
use crate::validate::Validate;

/// Validates a [`ConditionTree`] against the operations allowed for a rule
/// class.
#[derive(Debug, Clone)]
pub struct ConditionTreeValidator {
    allowed: Vec<Operation>,
}

impl ConditionTreeValidator {
    /// Creates a validator allowing exactly `allowed`.
    pub fn new(allowed: impl IntoIterator<Item = Operation>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    /// Validator using the built-in operation set of `class`.
    #[must_use]
    pub fn for_class(class: RuleClass) -> Self {
        Self::new(class.default_operations())
    }

    /// Operations this validator accepts.
    #[must_use]
    pub fn allowed_operations(&self) -> &[Operation] {
        &self.allowed
    }

    fn check_structure(tree: &ConditionTree) -> Result<(), ValidationError> {
        if tree.conditions().is_empty() {
            return Err(ValidationError::EmptyRule);
        }
        if !tree.is_compound() {
            return Ok(());
        }
        if tree.condition.is_some() {
            return Err(ValidationError::IllegalNesting { index: 0 });
        }
        for (index, part) in tree.compound_parts.iter().enumerate().skip(1) {
            if part.relation.is_none() {
                return Err(ValidationError::MissingRelation { index });
            }
        }
        for (index, part) in tree.compound_parts.iter().enumerate() {
            if part.is_compound() {
                return Err(ValidationError::IllegalNesting { index });
            }
            if part.condition.is_none() {
                return Err(ValidationError::EmptyRule);
            }
        }
        Ok(())
    }

    fn check_duplicates(tree: &ConditionTree) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        for condition in tree.conditions() {
            if !seen.insert(condition.fingerprint()) {
                return Err(ValidationError::DuplicateCondition {
                    condition: condition.to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_presence(&self, condition: &Condition) -> Result<(), ValidationError> {
        let free_arg = condition.free_arg.trim();
        if free_arg.is_empty() {
            return Err(ValidationError::MissingFreeArg);
        }
        let operation = condition.operation;
        if !self.allowed.contains(&operation) {
            return Err(ValidationError::UnknownOperation {
                operation: operation.to_string(),
            });
        }
        if operation.takes_fixed_arg() && fixed_arg_of(condition).is_none() {
            return Err(ValidationError::MissingFixedArg {
                free_arg: free_arg.to_string(),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    fn check_shape(condition: &Condition) -> Result<(), ValidationError> {
        let Some(fixed_arg) = fixed_arg_of(condition) else {
            return Ok(());
        };
        let free_arg = condition.free_arg.trim();
        match condition.operation {
            op if op.is_in_family() => check_collection(free_arg, op, fixed_arg),
            op if op.is_pattern() => check_pattern(free_arg, fixed_arg),
            Operation::Percent => check_percent(free_arg, fixed_arg),
            Operation::Range => check_range(free_arg, fixed_arg),
            Operation::Exists => Ok(()),
            op => check_scalar(free_arg, op, fixed_arg),
        }
    }
}

impl Validate for ConditionTreeValidator {
    type Input = ConditionTree;

    fn validate(&self, tree: &ConditionTree) -> Result<(), ValidationError> {
        Self::check_structure(tree)?;
        Self::check_duplicates(tree)?;
        let conditions = tree.conditions();
        for condition in &conditions {
            self.check_presence(condition)?;
        }
        for condition in &conditions {
            Self::check_shape(condition)?;
        }
        Ok(())
    }
}

/// Fixed argument of an operation that takes one, treating blank text as absent.
fn fixed_arg_of(condition: &Condition) -> Option<&FixedArg> {
    if !condition.operation.takes_fixed_arg() {
        return None;
    }
    condition
        .fixed_arg
        .as_ref()
        .filter(|arg| !(arg.is_scalar() && arg.is_blank()))
}

/// Validate `tree` allowing only `allowed` operations.
pub fn validate_condition_tree(tree: &ConditionTree, allowed: &[Operation]) -> Result<(), ValidationError> {
    ConditionTreeValidator::new(allowed.iter().copied()).validate(tree)
}

fn check_collection(free_arg: &str, operation: Operation, arg: &FixedArg) -> Result<(), ValidationError> {
    let Some(items) = arg.as_collection() else {
        return Err(ValidationError::collection(
            free_arg,
            format!("{operation} requires a list of values"),
        ));
    };
    if items.is_empty() {
        return Err(ValidationError::collection(free_arg, "list must not be empty"));
    }
    let mut seen = HashSet::new();
    for item in items {
        let item = item.trim();
        if item.is_empty() {
            return Err(ValidationError::collection(free_arg, "list contains a blank value"));
        }
        if !seen.insert(item) {
            return Err(ValidationError::collection(free_arg, format!("duplicate value {item}")));
        }
        // IN_LIST items name lists, not addresses.
        if operation == Operation::In {
            check_address_syntax(free_arg, item).map_err(|err| into_collection(err, free_arg))?;
        }
    }
    Ok(())
}

fn check_percent(free_arg: &str, arg: &FixedArg) -> Result<(), ValidationError> {
    let Some(value) = arg.as_number() else {
        return Err(ValidationError::scalar(free_arg, format!("percent {arg} is not a number")));
    };
    if !(0.0..=100.0).contains(&value) {
        return Err(ValidationError::scalar(
            free_arg,
            format!("percent {value} must be within [0, 100]"),
        ));
    }
    Ok(())
}

fn check_pattern(free_arg: &str, arg: &FixedArg) -> Result<(), ValidationError> {
    let Some(pattern) = arg.as_text() else {
        return Err(ValidationError::scalar(free_arg, "pattern must be a single value"));
    };
    Regex::new(&pattern).map_err(|err| ValidationError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: err.to_string(),
    })?;
    Ok(())
}

fn check_range(free_arg: &str, arg: &FixedArg) -> Result<(), ValidationError> {
    let Some(text) = arg.as_text() else {
        return Err(ValidationError::scalar(free_arg, "range must be a start-end value"));
    };
    let range: PercentRange = text.parse().map_err(ValidationError::from)?;
    DistributionValidator::validate_range(&range)
        .map_err(|err| ValidationError::scalar(free_arg, err.to_string()))
}

fn check_scalar(free_arg: &str, operation: Operation, arg: &FixedArg) -> Result<(), ValidationError> {
    let Some(value) = arg.as_text() else {
        return Err(ValidationError::scalar(
            free_arg,
            format!("{operation} requires a single value"),
        ));
    };
    if operation == Operation::Is {
        check_address_syntax(free_arg, &value)
    } else {
        // Ordered comparisons need a single address, never a block.
        check_address_with(free_arg, &value, IpAddress::new().address_only())
    }
}

fn check_address_syntax(free_arg: &str, value: &str) -> Result<(), ValidationError> {
    check_address_with(free_arg, value, IpAddress::new())
}

fn check_address_with(free_arg: &str, value: &str, ip: IpAddress) -> Result<(), ValidationError> {
    let checked = if is_mac_arg(free_arg) {
        MacAddress::new().validate(value)
    } else if is_ip_arg(free_arg) {
        ip.validate(value)
    } else {
        Ok(())
    };
    checked.map_err(|err| with_field(err, free_arg))
}

fn with_field(err: ValidationError, free_arg: &str) -> ValidationError {
    match err {
        ValidationError::InvalidScalarValue { reason, .. } => ValidationError::scalar(free_arg, reason),
        other => other,
    }
}

fn into_collection(err: ValidationError, free_arg: &str) -> ValidationError {
    match err {
        ValidationError::InvalidScalarValue { reason, .. } => ValidationError::collection(free_arg, reason),
        other => other,
    }
}
