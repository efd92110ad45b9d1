//! Identifiers and partition keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::RuleClass;

/// Identifier of a persisted rule record.
///
/// Record ids are opaque strings so that ids minted by other systems can be
/// imported unchanged; [`RuleId::generate`] mints a fresh UUID-based id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(String);

impl RuleId {
    /// Wrap an existing id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a new random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` when the id is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RuleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Product line a rule population belongs to.
///
/// Populations of different application types never share a priority
/// sequence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationType(String);

impl ApplicationType {
    /// The set-top-box application type, used when a payload names none.
    pub const STB: &'static str = "stb";

    /// Wrap an application type name. Names are stored lower-case.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().to_ascii_lowercase())
    }

    /// Borrow the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ApplicationType {
    fn default() -> Self {
        Self::new(Self::STB)
    }
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The `(ApplicationType, class)` pair that scopes one contiguous priority
/// sequence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    /// Product line.
    pub application_type: ApplicationType,
    /// Rule class.
    pub class: RuleClass,
}

impl PartitionKey {
    /// Build a partition key.
    #[must_use]
    pub fn new(application_type: ApplicationType, class: RuleClass) -> Self {
        Self {
            application_type,
            class,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.application_type, self.class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_distinct() {
        let a = RuleId::generate();
        let b = RuleId::generate();
        assert_ne!(a, b);
        assert!(!a.is_blank());
    }

    #[test]
    fn blank_id_detection() {
        assert!(RuleId::new("  ").is_blank());
        assert!(!RuleId::new("r-1").is_blank());
    }

    #[test]
    fn application_type_is_lowercased() {
        assert_eq!(ApplicationType::new("STB").as_str(), "stb");
        assert_eq!(ApplicationType::default().as_str(), ApplicationType::STB);
    }

    #[test]
    fn partition_display() {
        let key = PartitionKey::new(ApplicationType::new("xhome"), RuleClass::FeatureRule);
        assert_eq!(key.to_string(), "xhome/feature_rule");
    }

    #[test]
    fn rule_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&RuleId::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }
}
