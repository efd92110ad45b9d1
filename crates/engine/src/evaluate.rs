//! Matching devices against rule records.
//!
//! Records are walked in ascending priority and the first whose condition
//! tree matches wins. For firmware assignments split across several configs
//! the device's bucket picks the target.

use std::cmp::Ordering;
use std::collections::HashMap;

use moka::sync::Cache;
use regex::Regex;
use rollout_core::well_known::{ESTB_MAC, is_mac_arg};
use rollout_core::{
    Allocation, Condition, ConditionTree, FixedArg, Operation, PercentRange, RolloutTarget,
    RuleAction, RuleRecord,
};
use rollout_validator::normalize_mac;

use crate::bucket::{Bucket, PercentBucketer};

/// Attributes and named lists describing one device.
///
/// Attribute names are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct DeviceContext {
    attributes: HashMap<String, String>,
    lists: HashMap<String, Vec<String>>,
}

impl DeviceContext {
    /// An empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute.
    #[must_use = "builder methods must be chained or built"]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Register a named list for `IN_LIST` conditions.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_list<I, S>(mut self, name: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lists
            .insert(name.into(), items.into_iter().map(Into::into).collect());
        self
    }

    /// Set an attribute in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes
            .insert(name.into().to_ascii_lowercase(), value.into());
    }

    /// Attribute value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(&name.trim().to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Identifier used for target selection: the STB MAC in upper-case colon
    /// form.
    #[must_use]
    pub fn bucket_id(&self) -> Option<String> {
        self.get(ESTB_MAC).and_then(normalize_mac)
    }

    fn list_contains(&self, list: &str, free_arg: &str, value: &str) -> bool {
        self.lists
            .get(list.trim())
            .is_some_and(|items| items.iter().any(|item| same_value(free_arg, item, value)))
    }
}

/// The outcome of evaluating a partition for one device.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// First matching record.
    pub record: RuleRecord,
    /// Device bucket, when the device has a bucket identifier.
    pub bucket: Option<Bucket>,
    /// Target chosen by the bucket, for firmware split across configs.
    pub target: Option<RolloutTarget>,
}

impl Decision {
    /// Firmware config the device should receive: the chosen target, or the
    /// last known good config when the device falls outside every target.
    #[must_use]
    pub fn config_id(&self) -> Option<&str> {
        match &self.record.action {
            RuleAction::AssignFirmware {
                last_known_good, ..
            } => self
                .target
                .as_ref()
                .map(|t| t.config_id.as_str())
                .or(last_known_good.as_deref()),
            _ => None,
        }
    }
}

/// Lay targets out over the bucketing space. Explicit ranges are kept;
/// flat percentages become back-to-back ranges in declaration order.
pub fn allocate(targets: &[RolloutTarget]) -> Vec<(PercentRange, &RolloutTarget)> {
    let mut cursor = 0.0;
    targets
        .iter()
        .map(|target| match target.allocation {
            Allocation::Range(range) => (range, target),
            Allocation::Percentage(share) => {
                let range = PercentRange::new(cursor, cursor + share);
                cursor += share;
                (range, target)
            }
        })
        .collect()
}

/// Compiled patterns kept per evaluator, including ones that failed to compile.
const PATTERN_CACHE_CAPACITY: u64 = 1_000;

/// Evaluates condition trees and picks rollout targets.
#[derive(Debug)]
pub struct Evaluator {
    bucketer: PercentBucketer,
    patterns: Cache<String, Option<Regex>>,
}

impl Evaluator {
    /// Evaluator bucketing with `bucketer`.
    #[must_use]
    pub fn new(bucketer: PercentBucketer) -> Self {
        Self {
            bucketer,
            patterns: Cache::new(PATTERN_CACHE_CAPACITY),
        }
    }

    /// First record, by ascending priority, whose tree matches `device`.
    pub fn evaluate(&self, records: &[RuleRecord], device: &DeviceContext) -> Option<Decision> {
        let mut ordered: Vec<&RuleRecord> = records.iter().collect();
        ordered.sort_by_key(|r| r.priority);

        let record = ordered.into_iter().find(|r| self.matches(&r.rule, device))?;
        let bucket = device.bucket_id().map(|id| self.bucketer.bucket(&id));
        let target = bucket.and_then(|b| select_target(record.action.targets(), &b).cloned());
        tracing::debug!(
            record = %record.id,
            priority = record.priority,
            config = ?target.as_ref().map(|t| t.config_id.as_str()),
            "rule matched"
        );
        Some(Decision {
            record: record.clone(),
            bucket,
            target,
        })
    }

    /// Returns `true` when `tree` matches `device`.
    ///
    /// Parts fold left to right with AND binding tighter than OR.
    pub fn matches(&self, tree: &ConditionTree, device: &DeviceContext) -> bool {
        let matched = if tree.is_compound() {
            tree.or_branches().into_iter().any(|branch| {
                branch
                    .into_iter()
                    .all(|part| self.matches(part, device))
            })
        } else {
            tree.condition
                .as_ref()
                .is_some_and(|c| self.condition_matches(c, device))
        };
        matched != tree.negated
    }

    fn condition_matches(&self, condition: &Condition, device: &DeviceContext) -> bool {
        let free_arg = condition.free_arg.as_str();
        let Some(value) = device.get(free_arg) else {
            return false;
        };
        if condition.operation == Operation::Exists {
            return true;
        }
        let Some(fixed) = &condition.fixed_arg else {
            return false;
        };

        match condition.operation {
            Operation::Is => fixed
                .as_text()
                .is_some_and(|expected| same_value(free_arg, &expected, value)),
            Operation::Like => self.pattern_matches(fixed, value, false),
            Operation::Match => self.pattern_matches(fixed, value, true),
            Operation::In => fixed
                .as_collection()
                .is_some_and(|items| items.iter().any(|item| same_value(free_arg, item, value))),
            Operation::InList => fixed.as_collection().is_some_and(|lists| {
                lists
                    .iter()
                    .any(|list| device.list_contains(list, free_arg, value))
            }),
            Operation::Percent => fixed
                .as_number()
                .is_some_and(|limit| self.bucket_of(free_arg, value).percent < limit),
            Operation::Range => fixed
                .as_text()
                .and_then(|text| text.parse::<PercentRange>().ok())
                .is_some_and(|range| self.bucket_of(free_arg, value).is_in(&range)),
            Operation::Gte => compare(value, fixed).is_some_and(Ordering::is_ge),
            Operation::Lte => compare(value, fixed).is_some_and(Ordering::is_le),
            Operation::Exists => true,
        }
    }

    fn bucket_of(&self, free_arg: &str, value: &str) -> Bucket {
        let identifier = if is_mac_arg(free_arg) {
            normalize_mac(value).unwrap_or_else(|| value.trim().to_string())
        } else {
            value.trim().to_string()
        };
        self.bucketer.bucket(&identifier)
    }

    fn pattern_matches(&self, fixed: &FixedArg, value: &str, anchored: bool) -> bool {
        let Some(pattern) = fixed.as_text() else {
            return false;
        };
        let source = if anchored {
            format!("^(?:{pattern})$")
        } else {
            pattern.into_owned()
        };
        self.regex(source).is_some_and(|re| re.is_match(value))
    }

    fn regex(&self, source: String) -> Option<Regex> {
        if let Some(cached) = self.patterns.get(&source) {
            return cached;
        }
        let compiled = Regex::new(&source).ok();
        if compiled.is_none() {
            tracing::warn!(pattern = %source, "pattern does not compile, condition never matches");
        }
        self.patterns.insert(source, compiled.clone());
        compiled
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(PercentBucketer::default())
    }
}

fn select_target<'a>(targets: &'a [RolloutTarget], bucket: &Bucket) -> Option<&'a RolloutTarget> {
    allocate(targets)
        .into_iter()
        .find(|(range, _)| bucket.is_in(range))
        .map(|(_, target)| target)
}

fn same_value(free_arg: &str, expected: &str, actual: &str) -> bool {
    if is_mac_arg(free_arg) {
        if let (Some(a), Some(b)) = (normalize_mac(expected), normalize_mac(actual)) {
            return a == b;
        }
    }
    expected.trim().eq_ignore_ascii_case(actual.trim())
}

fn compare(value: &str, fixed: &FixedArg) -> Option<Ordering> {
    match (value.trim().parse::<f64>(), fixed.as_number()) {
        (Ok(actual), Some(expected)) => actual.partial_cmp(&expected),
        _ => Some(value.trim().cmp(fixed.as_text()?.trim())),
    }
}
