//! Engine configuration.
//!
//! Loaded once at startup from TOML, then overridden from the environment.
//! The bucketing key must be identical on every replica of a deployment.
//!
//! ```toml
//! [bucketing]
//! key0 = "0x0706050403020100"
//! key1 = 1084818905618843912
//!
//! [operations]
//! feature_rule = ["IS", "IN", "PERCENT", "RANGE"]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use rollout_core::{Operation, RuleClass};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::bucket::BucketKey;

/// Environment variable overriding the first bucketing key half.
pub const ENV_BUCKET_KEY0: &str = "ROLLOUT_BUCKET_KEY0";
/// Environment variable overriding the second bucketing key half.
pub const ENV_BUCKET_KEY1: &str = "ROLLOUT_BUCKET_KEY1";

/// Configuration error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file {path}: {message}")]
    Read {
        /// File path.
        path: String,
        /// I/O error message.
        message: String,
    },

    /// The configuration text is not valid TOML for this schema.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A field holds an unusable value.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Dotted field path.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An environment override could not be parsed.
    #[error("failed to parse environment variable {name}: {value}")]
    EnvVarParse {
        /// Variable name.
        name: String,
        /// Raw value.
        value: String,
    },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Parse a key half written in decimal or `0x` hex.
pub fn parse_key(text: &str) -> Option<u64> {
    let text = text.trim().replace('_', "");
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// A key half; deserializes from an integer or a decimal/hex string and
/// serializes as hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyHalf(pub u64);

impl Serialize for KeyHalf {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("{:#018x}", self.0))
    }
}

impl<'de> Deserialize<'de> for KeyHalf {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Int(u64),
            Text(String),
        }

        match Repr::deserialize(d)? {
            Repr::Int(value) => Ok(Self(value)),
            Repr::Text(text) => parse_key(&text)
                .map(Self)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid key half {text:?}"))),
        }
    }
}

/// SipHash key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BucketingConfig {
    /// First key half.
    pub key0: KeyHalf,
    /// Second key half.
    pub key1: KeyHalf,
}

impl Default for BucketingConfig {
    fn default() -> Self {
        Self {
            key0: KeyHalf(BucketKey::DEFAULT.k0),
            key1: KeyHalf(BucketKey::DEFAULT.k1),
        }
    }
}

/// Process-wide engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Bucketing key.
    pub bucketing: BucketingConfig,
    /// Allowed operations per rule class, keyed by class name. Classes not
    /// listed use their built-in set.
    pub operations: BTreeMap<String, Vec<Operation>>,
}

impl EngineConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// File (if given) or defaults, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env_overrides()?;
        tracing::info!(
            overridden_classes = config.operations.len(),
            "engine configuration loaded"
        );
        Ok(config)
    }

    /// Apply `ROLLOUT_BUCKET_KEY0` / `ROLLOUT_BUCKET_KEY1`.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply key overrides from `lookup`.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (name, slot) in [
            (ENV_BUCKET_KEY0, &mut self.bucketing.key0),
            (ENV_BUCKET_KEY1, &mut self.bucketing.key1),
        ] {
            if let Some(raw) = lookup(name) {
                let value = parse_key(&raw).ok_or_else(|| ConfigError::EnvVarParse {
                    name: name.to_string(),
                    value: raw.clone(),
                })?;
                *slot = KeyHalf(value);
            }
        }
        Ok(self)
    }

    /// Check operation overrides name known classes and are non-empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (class, operations) in &self.operations {
            class
                .parse::<RuleClass>()
                .map_err(|err| ConfigError::InvalidValue {
                    field: format!("operations.{class}"),
                    reason: err.to_string(),
                })?;
            if operations.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("operations.{class}"),
                    reason: "operation list must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Bucketing key.
    #[must_use]
    pub fn bucket_key(&self) -> BucketKey {
        BucketKey::new(self.bucketing.key0.0, self.bucketing.key1.0)
    }

    /// Operations allowed for `class`.
    #[must_use]
    pub fn allowed_operations(&self, class: RuleClass) -> Vec<Operation> {
        self.operations
            .iter()
            .find(|(name, _)| name.parse::<RuleClass>().is_ok_and(|c| c == class))
            .map_or_else(|| class.default_operations(), |(_, ops)| ops.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn defaults_use_deployment_key() {
        let config = EngineConfig::default();
        assert_eq!(config.bucket_key(), BucketKey::DEFAULT);
        assert_eq!(
            config.allowed_operations(RuleClass::FeatureRule),
            RuleClass::FeatureRule.default_operations()
        );
    }

    #[test]
    fn parses_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            [bucketing]
            key0 = "0x10"
            key1 = 32

            [operations]
            firmware_rule = ["is", "IN"]
            "#,
        )
        .unwrap();
        assert_eq!(config.bucket_key(), BucketKey::new(16, 32));
        assert_eq!(
            config.allowed_operations(RuleClass::FirmwareRule),
            vec![Operation::Is, Operation::In]
        );
        assert_eq!(
            config.allowed_operations(RuleClass::SettingRule),
            RuleClass::SettingRule.default_operations()
        );
    }

    #[test]
    fn empty_text_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[rstest]
    #[case::unknown_class("[operations]\ndcm_rule = [\"IS\"]")]
    #[case::empty_list("[operations]\nfeature_rule = []")]
    fn invalid_operation_overrides(#[case] text: &str) {
        let err = EngineConfig::from_toml_str(text).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }), "{err}");
    }

    #[rstest]
    #[case::unknown_operation("[operations]\nfeature_rule = [\"BETWEEN\"]")]
    #[case::unknown_field("[bucketing]\nkey2 = 1")]
    #[case::bad_key("[bucketing]\nkey0 = \"0xZZ\"")]
    fn parse_failures(#[case] text: &str) {
        let err = EngineConfig::from_toml_str(text).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err}");
    }

    #[test]
    fn env_overrides_accept_decimal_and_hex() {
        let config = EngineConfig::default()
            .with_overrides_from(|name| match name {
                ENV_BUCKET_KEY0 => Some("0xFF".into()),
                ENV_BUCKET_KEY1 => Some("1_000".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.bucket_key(), BucketKey::new(255, 1000));
    }

    #[test]
    fn env_override_parse_failure() {
        let err = EngineConfig::default()
            .with_overrides_from(|name| (name == ENV_BUCKET_KEY1).then(|| "nope".to_string()))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::EnvVarParse {
                name: ENV_BUCKET_KEY1.into(),
                value: "nope".into()
            }
        );
    }

    #[test]
    fn missing_file() {
        let err = EngineConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn key_halves_serialize_as_hex() {
        let text = toml::to_string(&EngineConfig::default()).unwrap();
        assert!(text.contains("key0 = \"0x0706050403020100\""), "{text}");
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), EngineConfig::default());
    }
}
