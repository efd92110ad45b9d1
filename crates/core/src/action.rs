//! Rule actions and rollout targets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::range::PercentRange;

/// How a rollout target claims its share of the device population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Allocation {
    /// An explicit `[start, end)` slice of the bucketing space.
    Range(PercentRange),
    /// A flat share; flat shares are laid out back to back in declaration
    /// order when devices are matched.
    Percentage(f64),
}

/// A firmware config bound to a share of the device population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutTarget {
    /// Identifier of the firmware config being rolled out.
    pub config_id: String,
    /// The share of devices receiving it.
    pub allocation: Allocation,
}

impl RolloutTarget {
    /// Target bound to an explicit range.
    pub fn ranged(config_id: impl Into<String>, range: PercentRange) -> Self {
        Self {
            config_id: config_id.into(),
            allocation: Allocation::Range(range),
        }
    }

    /// Target bound to a flat percentage.
    pub fn percentage(config_id: impl Into<String>, percentage: f64) -> Self {
        Self {
            config_id: config_id.into(),
            allocation: Allocation::Percentage(percentage),
        }
    }
}

/// What happens to a device matched by a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    /// Assign firmware, optionally split across several configs.
    AssignFirmware {
        /// Distribution of configs over the population.
        #[serde(default)]
        targets: Vec<RolloutTarget>,
        /// Config for devices that fall outside every target.
        #[serde(default, rename = "lastKnownGood", skip_serializing_if = "Option::is_none")]
        last_known_good: Option<String>,
    },
    /// Block the update entirely.
    Block,
    /// Apply a named filter (time window, download location, ...).
    Filter {
        /// Filter kind.
        kind: String,
        /// Filter parameters.
        #[serde(default)]
        properties: BTreeMap<String, String>,
    },
    /// Annotate the response with extra properties.
    DefineProperties {
        /// Properties to attach.
        #[serde(default)]
        properties: BTreeMap<String, String>,
    },
}

impl RuleAction {
    /// Rollout targets of a firmware assignment; empty for other actions.
    #[must_use]
    pub fn targets(&self) -> &[RolloutTarget] {
        match self {
            Self::AssignFirmware { targets, .. } => targets,
            _ => &[],
        }
    }

    /// Returns `true` when the action carries a percentage distribution.
    #[must_use]
    pub fn has_distribution(&self) -> bool {
        !self.targets().is_empty()
    }
}

impl Default for RuleAction {
    fn default() -> Self {
        Self::AssignFirmware {
            targets: Vec::new(),
            last_known_good: None,
        }
    }
}
