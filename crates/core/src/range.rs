//! Percent ranges over the `[0, 100)` bucketing space.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

/// A half-open `[start, end)` slice of the bucketing space.
///
/// Construction does not check bounds; the distribution validator reports
/// out-of-range or inverted ranges with a specific error. Deserializes from
/// either `{"start": .., "end": ..}` or a `"start-end"` string.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentRange {
    /// Inclusive lower bound.
    pub start: f64,
    /// Exclusive upper bound.
    pub end: f64,
}

impl PercentRange {
    /// Build a range.
    #[must_use]
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Width of the range.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    /// Returns `true` when `percent` falls inside `[start, end)`.
    #[must_use]
    pub fn contains(&self, percent: f64) -> bool {
        self.start <= percent && percent < self.end
    }

    /// Half-open overlap test: `self` overlaps `other` when `other` starts
    /// inside `self`. A shared boundary does not overlap.
    #[must_use]
    pub fn overlaps(&self, other: &PercentRange) -> bool {
        self.start <= other.start && other.start < self.end
    }
}

impl FromStr for PercentRange {
    type Err = CoreError;

    /// Parses `"start-end"`, e.g. `"10-25.5"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CoreError::MalformedRange(s.to_string());
        let (start, end) = s.trim().split_once('-').ok_or_else(malformed)?;
        let start: f64 = start.trim().parse().map_err(|_| malformed())?;
        let end: f64 = end.trim().parse().map_err(|_| malformed())?;
        if !start.is_finite() || !end.is_finite() {
            return Err(malformed());
        }
        Ok(Self { start, end })
    }
}

impl<'de> Deserialize<'de> for PercentRange {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Pair { start: f64, end: f64 },
        }

        match Repr::deserialize(d)? {
            Repr::Text(text) => text.parse().map_err(serde::de::Error::custom),
            Repr::Pair { start, end } => Ok(Self { start, end }),
        }
    }
}

impl fmt::Display for PercentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
