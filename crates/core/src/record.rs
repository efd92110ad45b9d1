//! Rule records and the priority contract they share.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::RuleAction;
use crate::condition::ConditionTree;
use crate::error::CoreError;
use crate::id::{ApplicationType, PartitionKey, RuleId};
use crate::operation::Operation;

/// Any record ranked by a dense 1..N priority within its partition.
///
/// Priorities are 1-based. Implementors only expose the fields the priority
/// reorganizer reads and writes.
pub trait Prioritized {
    /// Stable identifier of the record.
    fn id(&self) -> &str;
    /// Current 1-based priority.
    fn priority(&self) -> u32;
    /// Overwrite the priority.
    fn set_priority(&mut self, priority: u32);
}

/// Classes of rules; each class keeps its own priority sequence per
/// application type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleClass {
    /// Firmware assignment, blocking and filter rules.
    FirmwareRule,
    /// Feature enablement rules.
    FeatureRule,
    /// Device settings rules.
    SettingRule,
    /// Telemetry profile rules.
    TelemetryRule,
}

impl RuleClass {
    /// Canonical snake-case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirmwareRule => "firmware_rule",
            Self::FeatureRule => "feature_rule",
            Self::SettingRule => "setting_rule",
            Self::TelemetryRule => "telemetry_rule",
        }
    }

    /// Operations a rule of this class may use unless configuration says
    /// otherwise. Feature rules additionally accept `RANGE`.
    #[must_use]
    pub fn default_operations(&self) -> Vec<Operation> {
        let mut ops = vec![
            Operation::Is,
            Operation::Like,
            Operation::Match,
            Operation::In,
            Operation::InList,
            Operation::Percent,
            Operation::Gte,
            Operation::Lte,
            Operation::Exists,
        ];
        if matches!(self, Self::FeatureRule) {
            ops.push(Operation::Range);
        }
        ops
    }
}

impl fmt::Display for RuleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleClass {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "firmware_rule" => Ok(Self::FirmwareRule),
            "feature_rule" => Ok(Self::FeatureRule),
            "setting_rule" => Ok(Self::SettingRule),
            "telemetry_rule" => Ok(Self::TelemetryRule),
            _ => Err(CoreError::UnknownRuleClass(s.to_string())),
        }
    }
}

/// A persisted rule: a condition tree, an action, and its rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRecord {
    /// Record id.
    pub id: RuleId,
    /// Human-readable name, unique within the partition.
    pub name: String,
    /// Product line.
    #[serde(default)]
    pub application_type: ApplicationType,
    /// Rule class.
    pub class: RuleClass,
    /// 1-based evaluation rank. `0` on a new record means "append at end".
    #[serde(default)]
    pub priority: u32,
    /// Matching predicate.
    pub rule: ConditionTree,
    /// What happens to matched devices.
    #[serde(default)]
    pub action: RuleAction,
    /// Last time the record was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

impl RuleRecord {
    /// Build a record with a fresh id and an "append at end" priority.
    pub fn new(
        name: impl Into<String>,
        application_type: ApplicationType,
        class: RuleClass,
        rule: ConditionTree,
        action: RuleAction,
    ) -> Self {
        Self {
            id: RuleId::generate(),
            name: name.into(),
            application_type,
            class,
            priority: 0,
            rule,
            action,
            updated: None,
        }
    }

    /// Set the requested priority.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Use a caller-chosen id.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_id(mut self, id: impl Into<RuleId>) -> Self {
        self.id = id.into();
        self
    }

    /// The partition whose priority sequence this record belongs to.
    #[must_use]
    pub fn partition(&self) -> PartitionKey {
        PartitionKey::new(self.application_type.clone(), self.class)
    }
}

impl Prioritized for RuleRecord {
    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn set_priority(&mut self, priority: u32) {
        self.priority = priority;
    }
}
