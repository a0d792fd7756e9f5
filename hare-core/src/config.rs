//! Exchange configuration loaded from TOML.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::field::{FieldTable, FieldValue, ShortString};
use crate::error::HareError;
use crate::exchange::DEFAULT_EVENT_CAPACITY;
use crate::flags::{ExchangeOptions, PublishOptions};
use crate::publish::DEFAULT_MIME_TYPE;
use crate::state::{Declaration, ExchangeKind};

/// One exchange, as declared by this client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Exchange name. Empty selects the default exchange.
    pub name: String,
    /// `direct`, `fanout`, `topic`, `headers` or a broker extension.
    pub kind: String,
    /// Channel the exchange lives on.
    pub channel: u16,
    pub durable: bool,
    pub auto_delete: bool,
    pub internal: bool,
    pub passive: bool,
    pub no_wait: bool,
    /// Buffered events per subscriber before the slowest one lags.
    pub event_capacity: usize,
    /// Extra `exchange.declare` arguments, e.g. `alternate-exchange`.
    pub arguments: BTreeMap<String, ConfigValue>,
    pub confirms: ConfirmsConfig,
    pub publish: PublishConfig,
}

/// Scalar argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Publisher confirms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmsConfig {
    pub enabled: bool,
    pub no_wait: bool,
    /// Default timeout for `wait_for_confirms`.
    pub wait_timeout_ms: u64,
}

/// Defaults applied to published messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub mime_type: String,
    pub mandatory: bool,
    pub immediate: bool,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: ExchangeKind::Direct.as_str().into(),
            channel: 1,
            durable: false,
            auto_delete: false,
            internal: false,
            passive: false,
            no_wait: false,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            arguments: BTreeMap::new(),
            confirms: ConfirmsConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

impl Default for ConfirmsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            no_wait: false,
            wait_timeout_ms: 5_000,
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            mime_type: DEFAULT_MIME_TYPE.into(),
            mandatory: false,
            immediate: false,
        }
    }
}

impl From<&ConfigValue> for FieldValue {
    fn from(value: &ConfigValue) -> Self {
        match value {
            ConfigValue::Bool(b) => FieldValue::from(*b),
            ConfigValue::Int(i) => FieldValue::from(*i),
            ConfigValue::Float(f) => FieldValue::from(*f),
            ConfigValue::Str(s) => FieldValue::from(s.as_str()),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ExchangeConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Parse strictly; any error is reported.
    pub fn from_toml_str(text: &str) -> Result<Self, HareError> {
        Ok(toml::from_str(text)?)
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> Result<(), HareError> {
        let text = toml::to_string_pretty(&Self::default())
            .map_err(|e| HareError::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn options(&self) -> ExchangeOptions {
        let mut options = ExchangeOptions::empty();
        options.set(ExchangeOptions::PASSIVE, self.passive);
        options.set(ExchangeOptions::DURABLE, self.durable);
        options.set(ExchangeOptions::AUTO_DELETE, self.auto_delete);
        options.set(ExchangeOptions::INTERNAL, self.internal);
        options.set(ExchangeOptions::NO_WAIT, self.no_wait);
        options
    }

    pub fn publish_options(&self) -> PublishOptions {
        let mut options = PublishOptions::empty();
        options.set(PublishOptions::MANDATORY, self.publish.mandatory);
        options.set(PublishOptions::IMMEDIATE, self.publish.immediate);
        options
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.confirms.wait_timeout_ms)
    }

    /// The declaration described by this section. Fails on an argument
    /// name longer than a short string allows.
    pub fn declaration(&self) -> Result<Declaration, HareError> {
        let mut arguments = FieldTable::new();
        for (key, value) in &self.arguments {
            arguments.insert(ShortString::new(key.as_str())?, FieldValue::from(value));
        }
        Ok(Declaration::new(
            ExchangeKind::from(self.kind.as_str()),
            self.options(),
            arguments,
        ))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&ExchangeConfig::default()).unwrap();
        assert!(text.contains("kind"));
        assert!(text.contains("wait_timeout_ms"));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&ExchangeConfig::default()).unwrap();
        let parsed = ExchangeConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, ExchangeConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = ExchangeConfig::from_toml_str(
            r#"
            name = "logs"
            kind = "topic"
            durable = true

            [arguments]
            alternate-exchange = "unrouted"
            x-max-hops = 3

            [confirms]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(cfg.channel, 1);
        assert_eq!(cfg.confirms.wait_timeout_ms, 5_000);
        assert_eq!(cfg.publish.mime_type, "text/plain");

        let decl = cfg.declaration().unwrap();
        assert_eq!(decl.kind, ExchangeKind::Topic);
        assert_eq!(decl.options, ExchangeOptions::DURABLE);
        assert_eq!(
            decl.arguments.get("alternate-exchange"),
            Some(&FieldValue::from("unrouted"))
        );
        assert_eq!(decl.arguments.get("x-max-hops"), Some(&FieldValue::from(3i64)));
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = ExchangeConfig::from_toml_str("channel = \"one\"").unwrap_err();
        assert!(matches!(err, HareError::Config(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = ExchangeConfig::load(Path::new("/nonexistent/hare.toml"));
        assert_eq!(cfg, ExchangeConfig::default());
    }

    #[test]
    fn publish_flags() {
        let mut cfg = ExchangeConfig::default();
        cfg.publish.mandatory = true;
        assert_eq!(cfg.publish_options(), PublishOptions::MANDATORY);
    }
}
