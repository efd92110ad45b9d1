//! Condition operations and compound relations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// The closed set of operations a [`Condition`](crate::Condition) may use.
///
/// Operation names parse case-insensitively and serialize upper-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    /// Scalar equality (case-insensitive for text).
    Is,
    /// Regular-expression search.
    Like,
    /// Regular-expression full match.
    Match,
    /// Membership in an inline collection.
    In,
    /// Membership in one of the named lists.
    InList,
    /// Device bucket below the given percentage.
    Percent,
    /// Device bucket inside a `start-end` percent range.
    Range,
    /// Greater than or equal.
    Gte,
    /// Less than or equal.
    Lte,
    /// The free argument is present on the device.
    Exists,
}

impl Operation {
    /// Every operation, in declaration order.
    pub const ALL: [Operation; 10] = [
        Self::Is,
        Self::Like,
        Self::Match,
        Self::In,
        Self::InList,
        Self::Percent,
        Self::Range,
        Self::Gte,
        Self::Lte,
        Self::Exists,
    ];

    /// Canonical upper-case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Is => "IS",
            Self::Like => "LIKE",
            Self::Match => "MATCH",
            Self::In => "IN",
            Self::InList => "IN_LIST",
            Self::Percent => "PERCENT",
            Self::Range => "RANGE",
            Self::Gte => "GTE",
            Self::Lte => "LTE",
            Self::Exists => "EXISTS",
        }
    }

    /// Operations whose fixed argument is a collection.
    #[must_use]
    pub fn is_in_family(&self) -> bool {
        matches!(self, Self::In | Self::InList)
    }

    /// Operations whose fixed argument is a regular expression.
    #[must_use]
    pub fn is_pattern(&self) -> bool {
        matches!(self, Self::Like | Self::Match)
    }

    /// Operations that need no fixed argument.
    #[must_use]
    pub fn takes_fixed_arg(&self) -> bool {
        !matches!(self, Self::Exists)
    }
}

impl FromStr for Operation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| CoreError::UnknownOperation(s.to_string()))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// How a compound part joins the parts before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// Both sides must hold.
    And,
    /// Either side may hold.
    Or,
}

impl Relation {
    /// Canonical upper-case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl FromStr for Relation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            _ => Err(CoreError::UnknownRelation(s.to_string())),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Relation {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Relation {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
