//! MAC and IP address syntax checks.
//!
//! Both validators report failures as [`ValidationError::InvalidScalarValue`]
//! with a generic field name; the condition validator rewrites the field to
//! the free argument being checked.

use std::net::IpAddr;

use crate::error::ValidationError;
use crate::validate::Validate;

const MAC_FIELD: &str = "mac address";
const IP_FIELD: &str = "ip address";

// ============================================================================
// MAC ADDRESS
// ============================================================================

/// Validates MAC addresses.
///
/// Accepted forms:
/// - colon-separated: `AA:BB:CC:DD:EE:FF`
/// - hyphen-separated: `AA-BB-CC-DD-EE-FF`
/// - dot-separated: `AABB.CCDD.EEFF`
/// - bare hex: `AABBCCDDEEFF`
#[derive(Debug, Clone, Copy, Default)]
pub struct MacAddress;

impl MacAddress {
    /// Creates a validator accepting every supported form.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn separated(input: &str, separator: char, parts: usize, width: usize) -> Result<(), ValidationError> {
        let split: Vec<&str> = input.split(separator).collect();
        if split.len() != parts {
            return Err(ValidationError::scalar(
                MAC_FIELD,
                format!("expected {parts} groups separated by '{separator}' in {input:?}"),
            ));
        }
        for part in split {
            if part.len() != width {
                return Err(ValidationError::scalar(
                    MAC_FIELD,
                    format!("group {part:?} must be {width} hex digits"),
                ));
            }
            Self::hex(part)?;
        }
        Ok(())
    }

    fn hex(digits: &str) -> Result<(), ValidationError> {
        if digits.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(())
        } else {
            Err(ValidationError::scalar(MAC_FIELD, format!("invalid hex digits: {digits}")))
        }
    }
}

impl Validate for MacAddress {
    type Input = str;

    fn validate(&self, input: &str) -> Result<(), ValidationError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ValidationError::scalar(MAC_FIELD, "must not be empty"));
        }
        if input.contains(':') {
            return Self::separated(input, ':', 6, 2);
        }
        if input.contains('-') {
            return Self::separated(input, '-', 6, 2);
        }
        if input.contains('.') {
            return Self::separated(input, '.', 3, 4);
        }
        if input.len() != 12 {
            return Err(ValidationError::scalar(
                MAC_FIELD,
                "without separators a MAC address must be exactly 12 hex digits",
            ));
        }
        Self::hex(input)
    }
}

/// Canonical upper-case, colon-separated form of a MAC address, or `None`
/// when `input` is not one.
#[must_use]
pub fn normalize_mac(input: &str) -> Option<String> {
    MacAddress.validate(input).ok()?;
    let digits: Vec<char> = input
        .chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let groups: Vec<String> = digits.chunks(2).map(|pair| pair.iter().collect()).collect();
    Some(groups.join(":"))
}

// ============================================================================
// IP ADDRESS
// ============================================================================

/// Validates IPv4/IPv6 addresses, optionally in CIDR `addr/prefix` form.
#[derive(Debug, Clone, Copy)]
pub struct IpAddress {
    allow_cidr: bool,
}

impl IpAddress {
    /// Creates a validator accepting bare addresses and CIDR blocks.
    #[must_use]
    pub fn new() -> Self {
        Self { allow_cidr: true }
    }

    /// Reject CIDR blocks.
    #[must_use = "builder methods must be chained or built"]
    pub fn address_only(mut self) -> Self {
        self.allow_cidr = false;
        self
    }

    fn parse_addr(text: &str) -> Result<IpAddr, ValidationError> {
        text.parse::<IpAddr>()
            .map_err(|_| ValidationError::scalar(IP_FIELD, format!("{text:?} is not a valid IP address")))
    }
}

impl Default for IpAddress {
    fn default() -> Self {
        Self::new()
    }
}

impl Validate for IpAddress {
    type Input = str;

    fn validate(&self, input: &str) -> Result<(), ValidationError> {
        let input = input.trim();
        let Some((addr, prefix)) = input.split_once('/') else {
            return Self::parse_addr(input).map(|_| ());
        };
        if !self.allow_cidr {
            return Err(ValidationError::scalar(IP_FIELD, "CIDR blocks are not allowed"));
        }
        let max = match Self::parse_addr(addr)? {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| ValidationError::scalar(IP_FIELD, format!("invalid prefix length {prefix:?}")))?;
        if prefix > max {
            return Err(ValidationError::scalar(
                IP_FIELD,
                format!("prefix length {prefix} exceeds {max}"),
            ));
        }
        Ok(())
    }
}
