//! Deterministic percent bucketing.
//!
//! A device identifier is hashed with SipHash-2-4 under a fixed 128-bit key.
//! The signed 64-bit hash is shifted by `2^63` into `[0, 2^64-1]` and scaled
//! to a percentage. Changing the key moves every device to a new bucket, so
//! the key must be identical across all replicas of a deployment.

use std::hash::Hasher;

use rollout_core::PercentRange;
use siphasher::sip::SipHasher24;

/// Largest `f64` strictly below 100.
const MAX_PERCENT: f64 = f64::from_bits(100.0_f64.to_bits() - 1);

/// The two 64-bit halves of the SipHash key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketKey {
    /// First key half.
    pub k0: u64,
    /// Second key half.
    pub k1: u64,
}

impl BucketKey {
    /// Deployment default: key bytes `00..0f`.
    pub const DEFAULT: Self = Self {
        k0: 0x0706_0504_0302_0100,
        k1: 0x0f0e_0d0c_0b0a_0908,
    };

    /// Build a key from its halves.
    #[must_use]
    pub const fn new(k0: u64, k1: u64) -> Self {
        Self { k0, k1 }
    }
}

impl Default for BucketKey {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Where an identifier lands in the bucketing space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    /// Raw SipHash value, read as signed.
    pub hash: i64,
    /// Position in `[0, 100)`.
    pub percent: f64,
}

impl Bucket {
    /// Returns `true` when the bucket falls inside `[start, end)`.
    #[must_use]
    pub fn is_in(&self, range: &PercentRange) -> bool {
        range.contains(self.percent)
    }
}

/// Maps identifiers to stable positions in `[0, 100)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PercentBucketer {
    key: BucketKey,
}

impl PercentBucketer {
    /// Bucketer hashing under `key`.
    #[must_use]
    pub fn new(key: BucketKey) -> Self {
        Self { key }
    }

    /// Key in use.
    #[must_use]
    pub fn key(&self) -> BucketKey {
        self.key
    }

    /// Hash `identifier` and place it in the bucketing space.
    #[must_use]
    pub fn bucket(&self, identifier: &str) -> Bucket {
        let mut hasher = SipHasher24::new_with_keys(self.key.k0, self.key.k1);
        hasher.write(identifier.as_bytes());
        let hash = hasher.finish() as i64;

        // hash + 2^63, always in [0, u64::MAX]
        let unsigned = (i128::from(hash) + (1_i128 << 63)) as u64;
        let percent = unsigned as f64 / u64::MAX as f64 * 100.0;
        Bucket {
            hash,
            percent: percent.min(MAX_PERCENT),
        }
    }

    /// Position of `identifier` in `[0, 100)`.
    #[must_use]
    pub fn percent(&self, identifier: &str) -> f64 {
        self.bucket(identifier).percent
    }

    /// Returns `true` when `identifier` falls inside `range`.
    #[must_use]
    pub fn contains(&self, range: &PercentRange, identifier: &str) -> bool {
        self.bucket(identifier).is_in(range)
    }
}
