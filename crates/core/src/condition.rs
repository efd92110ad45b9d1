//! Condition trees: the boolean predicate a rule matches devices against.
//!
//! A tree is either a single [`Condition`] or a flat list of compound parts
//! joined by [`Relation`]s. The shape here mirrors what callers send; the
//! well-formedness rules (one nesting level, relations on every part after
//! the first, no duplicates) are checked by the validator crate rather than
//! by construction, so that malformed payloads can be reported precisely.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::operation::{Operation, Relation};

/// The fixed (right-hand) argument of a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FixedArg {
    /// A boolean flag.
    Bool(bool),
    /// A numeric value.
    Number(f64),
    /// A text value.
    String(String),
    /// A list of text values, used by the `IN` family.
    Collection(Vec<String>),
}

impl FixedArg {
    /// Text form of a scalar argument; `None` for collections.
    #[must_use]
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::String(s) => Some(Cow::Borrowed(s.as_str())),
            Self::Number(n) => Some(Cow::Owned(n.to_string())),
            Self::Bool(b) => Some(Cow::Owned(b.to_string())),
            Self::Collection(_) => None,
        }
    }

    /// Numeric value of a number, or of text that parses as one.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Items of a collection argument.
    #[must_use]
    pub fn as_collection(&self) -> Option<&[String]> {
        match self {
            Self::Collection(items) => Some(items),
            _ => None,
        }
    }

    /// Returns `true` for scalar (non-collection) arguments.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Collection(_))
    }

    /// Returns `true` when a text argument is blank or a collection is empty.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::String(s) => s.trim().is_empty(),
            Self::Collection(items) => items.is_empty(),
            Self::Number(_) | Self::Bool(_) => false,
        }
    }

    /// Order-insensitive canonical text used to compare arguments.
    fn canonical(&self) -> String {
        match self {
            Self::Collection(items) => {
                let mut sorted: Vec<&str> = items.iter().map(|s| s.trim()).collect();
                sorted.sort_unstable();
                format!("[{}]", sorted.join(","))
            }
            other => other
                .as_text()
                .map(|t| t.trim().to_string())
                .unwrap_or_default(),
        }
    }
}

impl fmt::Display for FixedArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collection(items) => write!(f, "[{}]", items.join(", ")),
            other => f.write_str(&other.as_text().unwrap_or_default()),
        }
    }
}

impl From<&str> for FixedArg {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<f64> for FixedArg {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<Vec<String>> for FixedArg {
    fn from(items: Vec<String>) -> Self {
        Self::Collection(items)
    }
}

/// A single `free-arg OPERATION fixed-arg` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Name of the device attribute being tested.
    pub free_arg: String,
    /// Operation applied to the attribute.
    pub operation: Operation,
    /// Value the attribute is compared against. Absent for `EXISTS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_arg: Option<FixedArg>,
}

impl Condition {
    /// Build a condition.
    pub fn new(free_arg: impl Into<String>, operation: Operation, fixed_arg: impl Into<FixedArg>) -> Self {
        Self {
            free_arg: free_arg.into(),
            operation,
            fixed_arg: Some(fixed_arg.into()),
        }
    }

    /// Build an `EXISTS` condition.
    pub fn exists(free_arg: impl Into<String>) -> Self {
        Self {
            free_arg: free_arg.into(),
            operation: Operation::Exists,
            fixed_arg: None,
        }
    }

    /// Identity used for duplicate detection: free-arg, operation and a
    /// canonical form of the fixed argument.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        format!(
            "{}|{}|{}",
            self.free_arg.trim(),
            self.operation,
            self.fixed_arg.as_ref().map(FixedArg::canonical).unwrap_or_default()
        )
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fixed_arg {
            Some(arg) => write!(f, "{} {} {}", self.free_arg, self.operation, arg),
            None => write!(f, "{} {}", self.free_arg, self.operation),
        }
    }
}

/// A rule's matching predicate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionTree {
    /// Inverts the result of this node.
    #[serde(default)]
    pub negated: bool,
    /// Relation to the preceding part; only meaningful on compound parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<Relation>,
    /// The condition held by a leaf node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    /// Parts of a compound node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compound_parts: Vec<ConditionTree>,
}

impl ConditionTree {
    /// A tree holding one condition.
    #[must_use]
    pub fn single(condition: Condition) -> Self {
        Self {
            condition: Some(condition),
            ..Self::default()
        }
    }

    /// A compound tree over the given parts.
    #[must_use]
    pub fn compound(parts: Vec<ConditionTree>) -> Self {
        Self {
            compound_parts: parts,
            ..Self::default()
        }
    }

    /// A compound part joined to its predecessor by `relation`.
    #[must_use]
    pub fn part(relation: Option<Relation>, condition: Condition) -> Self {
        Self {
            relation,
            condition: Some(condition),
            ..Self::default()
        }
    }

    /// Invert this node.
    #[must_use = "builder methods must be chained or built"]
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Returns `true` when this node is a list of compound parts.
    #[must_use]
    pub fn is_compound(&self) -> bool {
        !self.compound_parts.is_empty()
    }

    /// Every condition in the tree, depth-first.
    #[must_use]
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<&'a Condition>) {
        if let Some(condition) = &self.condition {
            out.push(condition);
        }
        for part in &self.compound_parts {
            part.collect_conditions(out);
        }
    }

    /// Top-level parts grouped into OR branches; parts inside a branch are
    /// joined by AND. A single-condition tree is one branch of one part.
    #[must_use]
    pub fn or_branches(&self) -> Vec<Vec<&ConditionTree>> {
        if !self.is_compound() {
            return vec![vec![self]];
        }
        let mut branches: Vec<Vec<&ConditionTree>> = Vec::new();
        for (i, part) in self.compound_parts.iter().enumerate() {
            if i == 0 || part.relation == Some(Relation::Or) {
                branches.push(vec![part]);
            } else if let Some(last) = branches.last_mut() {
                last.push(part);
            }
        }
        branches
    }

    /// Order-insensitive normal form: sorted OR branches of sorted, negation-
    /// tagged condition fingerprints. Two trees with equal normal forms match
    /// the same devices.
    #[must_use]
    pub fn normalized(&self) -> Vec<Vec<String>> {
        let mut branches: Vec<Vec<String>> = self
            .or_branches()
            .into_iter()
            .map(|branch| {
                let mut prints: Vec<String> = branch
                    .into_iter()
                    .flat_map(|node| {
                        let prefix = if node.negated { "!" } else { "" };
                        node.conditions()
                            .into_iter()
                            .map(move |c| format!("{prefix}{}", c.fingerprint()))
                    })
                    .collect();
                prints.sort_unstable();
                prints
            })
            .collect();
        branches.sort_unstable();
        if self.negated && self.is_compound() {
            branches.insert(0, vec!["!".to_string()]);
        }
        branches
    }
}
