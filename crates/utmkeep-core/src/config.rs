//! Tracker configuration, loadable from TOML.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{AttributionKey, TrackedParam};

/// How replay represents attribution inside a form.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayStrategy {
    /// Fill empty inputs found by CSS class.
    #[default]
    FillExisting,
    /// Overwrite named fields or append hidden inputs.
    AppendHidden,
    /// Fill existing inputs first, then append hidden inputs for the rest.
    Both,
}

/// Markup used for appended hidden inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HiddenFieldMarkup {
    /// Container element wrapping each hidden input; `None` appends bare.
    pub wrapper_tag: Option<String>,
    pub wrapper_class: Option<String>,
}

impl Default for HiddenFieldMarkup {
    fn default() -> Self {
        Self {
            wrapper_tag: Some("div".to_string()),
            wrapper_class: Some("utm-hidden-field".to_string()),
        }
    }
}

/// CSS class suffix bound to a non-parameter key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraBinding {
    pub suffix: String,
    pub key: AttributionKey,
}

/// Resolved class → key binding used by fill-existing replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    pub css_class: String,
    pub key: AttributionKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Primary storage key for the serialized record.
    pub storage_key: String,
    /// Cookie name used when primary storage is unavailable.
    pub fallback_cookie: String,
    /// Session storage key holding the session id.
    pub session_key: String,
    pub retention_days: u32,
    pub max_value_len: usize,
    /// Inputs are matched by `<class_prefix><param>`.
    pub class_prefix: String,
    /// Forms carrying this attribute are never touched.
    pub opt_out_attr: String,
    pub strategy: ReplayStrategy,
    pub nav_replay_delay_ms: u64,
    pub hidden_field: HiddenFieldMarkup,
    pub extra_bindings: Vec<ExtraBinding>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            storage_key: "utm_simple_data".to_string(),
            fallback_cookie: "utm_simple_data_fb".to_string(),
            session_key: "utm_session_id".to_string(),
            retention_days: 30,
            max_value_len: 200,
            class_prefix: "field-".to_string(),
            opt_out_attr: "data-no-utm".to_string(),
            strategy: ReplayStrategy::default(),
            nav_replay_delay_ms: 50,
            hidden_field: HiddenFieldMarkup::default(),
            extra_bindings: vec![
                ExtraBinding {
                    suffix: "landing_page".to_string(),
                    key: AttributionKey::LandingUrl,
                },
                ExtraBinding {
                    suffix: "referrer".to_string(),
                    key: AttributionKey::ReferrerUrl,
                },
                ExtraBinding {
                    suffix: "session_id".to_string(),
                    key: AttributionKey::SessionId,
                },
            ],
        }
    }
}

impl TrackerConfig {
    pub const MIN_VALUE_LEN: usize = 100;
    pub const MAX_VALUE_LEN: usize = 200;

    /// Parse and validate. Missing keys take their defaults.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_days == 0 {
            return Err(ConfigError::Invalid("retention_days must be at least 1".into()));
        }
        if !(Self::MIN_VALUE_LEN..=Self::MAX_VALUE_LEN).contains(&self.max_value_len) {
            return Err(ConfigError::Invalid(format!(
                "max_value_len must be within {}..={}, got {}",
                Self::MIN_VALUE_LEN,
                Self::MAX_VALUE_LEN,
                self.max_value_len
            )));
        }
        for (name, value) in [
            ("storage_key", &self.storage_key),
            ("fallback_cookie", &self.fallback_cookie),
            ("session_key", &self.session_key),
            ("opt_out_attr", &self.opt_out_attr),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must not be empty")));
            }
        }
        if let Some(binding) = self.extra_bindings.iter().find(|b| b.suffix.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "extra binding for {} has an empty class suffix",
                binding.key
            )));
        }
        Ok(())
    }

    pub fn retention(&self) -> Duration {
        Duration::days(i64::from(self.retention_days))
    }

    pub fn nav_replay_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.nav_replay_delay_ms)
    }

    /// CSS class bound to a tracked parameter.
    pub fn class_for(&self, param: TrackedParam) -> String {
        format!("{}{}", self.class_prefix, param.as_str())
    }

    /// All class → key bindings: tracked params first, then extras.
    pub fn bindings(&self) -> Vec<FieldBinding> {
        TrackedParam::ALL
            .into_iter()
            .map(|p| FieldBinding {
                css_class: self.class_for(p),
                key: AttributionKey::Param(p),
            })
            .chain(self.extra_bindings.iter().map(|b| FieldBinding {
                css_class: format!("{}{}", self.class_prefix, b.suffix),
                key: b.key,
            }))
            .collect()
    }
}
