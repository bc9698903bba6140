#![forbid(unsafe_code)]

//! Session configuration consumed by the input layer.
//!
//! Values are layered in increasing precedence:
//!
//! 1. [`SessionConfig::default`]
//! 2. key/value settings from the config-file owner via
//!    [`SessionConfig::apply`]
//! 3. environment overrides via [`SessionConfig::with_env_overrides`]
//!
//! | Variable                 | Setting            | Example   |
//! |--------------------------|--------------------|-----------|
//! | `LUMEN_ALT_SCREEN`       | `alternate_screen` | `off`     |
//! | `LUMEN_PROTOCOL`         | `protocol`         | `kitty`   |
//! | `LUMEN_FORCE_TEXT`       | `force_text`       | `1`       |
//! | `LUMEN_GAMMA`            | `gamma`            | `2.2`     |
//! | `LUMEN_PROBE_TIMEOUT_MS` | `probe_timeout_ms` | `250`     |

use std::time::Duration;

use crate::caps_probe::DEFAULT_PROBE_TIMEOUT;
use crate::error::{Error, Result};
use crate::protocol::ProtocolOverride;

/// Environment variable overriding `alternate_screen`.
pub const ENV_ALT_SCREEN: &str = "LUMEN_ALT_SCREEN";
/// Environment variable overriding `protocol`.
pub const ENV_PROTOCOL: &str = "LUMEN_PROTOCOL";
/// Environment variable overriding `force_text`.
pub const ENV_FORCE_TEXT: &str = "LUMEN_FORCE_TEXT";
/// Environment variable overriding `gamma`.
pub const ENV_GAMMA: &str = "LUMEN_GAMMA";
/// Environment variable overriding `probe_timeout_ms`.
pub const ENV_PROBE_TIMEOUT_MS: &str = "LUMEN_PROBE_TIMEOUT_MS";

/// Settings fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Enter the alternate screen buffer while raw mode is active.
    pub alternate_screen: bool,
    /// Requested graphics protocol.
    pub protocol: ProtocolOverride,
    /// Select plain text regardless of everything else.
    pub force_text: bool,
    /// Gamma handed to the media views unchanged.
    pub gamma: f32,
    /// Overall deadline for each capability probe.
    pub probe_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            alternate_screen: true,
            protocol: ProtocolOverride::Auto,
            force_text: false,
            gamma: 1.0,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// Defaults with the process environment applied.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Defaults with a custom environment lookup applied (for tests).
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().with_env_overrides(get_env)
    }

    /// Apply `LUMEN_*` overrides on top of `self`.
    ///
    /// Malformed values are skipped; the previous value stays.
    #[must_use]
    pub fn with_env_overrides<F>(mut self, get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        const OVERRIDES: [(&str, &str); 5] = [
            (ENV_ALT_SCREEN, "alternate_screen"),
            (ENV_PROTOCOL, "protocol"),
            (ENV_FORCE_TEXT, "force_text"),
            (ENV_GAMMA, "gamma"),
            (ENV_PROBE_TIMEOUT_MS, "probe_timeout_ms"),
        ];
        for (var, key) in OVERRIDES {
            if let Some(value) = get_env(var)
                && self.apply(key, &value).is_err()
            {
                crate::debug!(var, value = value.as_str(), "ignoring malformed override");
            }
        }
        self
    }

    /// Apply one `key = value` setting.
    ///
    /// Keys are case-insensitive and `-` is accepted for `_`. Keys that
    /// belong to other subsystems are ignored.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if a recognised key has a malformed value.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let normalized = key.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "alternate_screen" | "alt_screen" => {
                self.alternate_screen = parse_bool(value).ok_or_else(|| invalid(key, value))?;
            }
            "protocol" => {
                self.protocol = value.parse().map_err(|_| invalid(key, value))?;
            }
            "force_text" => {
                self.force_text = parse_bool(value).ok_or_else(|| invalid(key, value))?;
            }
            "gamma" => {
                self.gamma = value
                    .trim()
                    .parse::<f32>()
                    .ok()
                    .filter(|g| g.is_finite() && *g > 0.0)
                    .ok_or_else(|| invalid(key, value))?;
            }
            "probe_timeout_ms" => {
                let ms: u64 = value.trim().parse().map_err(|_| invalid(key, value))?;
                self.probe_timeout = Duration::from_millis(ms);
            }
            _ => {}
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str) -> Error {
    Error::invalid_argument(key, value)
}

/// Parse a boolean setting: `1/0`, `true/false`, `yes/no`, `on/off`.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn map_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn get_env<'a>(map: &'a HashMap<String, String>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let cfg = SessionConfig::default();
        assert!(cfg.alternate_screen);
        assert_eq!(cfg.protocol, ProtocolOverride::Auto);
        assert!(!cfg.force_text);
        assert!((cfg.gamma - 1.0).abs() < f32::EPSILON);
        assert_eq!(cfg.probe_timeout, Duration::from_millis(500));
    }

    #[test]
    fn parse_bool_truthy_and_falsy() {
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool(" on "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("FALSE"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn apply_recognised_keys() {
        let mut cfg = SessionConfig::default();
        cfg.apply("alternate-screen", "off").unwrap();
        cfg.apply("Protocol", "iterm").unwrap();
        cfg.apply("force_text", "yes").unwrap();
        cfg.apply("gamma", "2.2").unwrap();
        cfg.apply("probe_timeout_ms", "120").unwrap();

        assert!(!cfg.alternate_screen);
        assert_eq!(cfg.protocol, ProtocolOverride::Iterm2);
        assert!(cfg.force_text);
        assert!((cfg.gamma - 2.2).abs() < 1e-6);
        assert_eq!(cfg.probe_timeout, Duration::from_millis(120));
    }

    #[test]
    fn apply_ignores_foreign_keys() {
        let mut cfg = SessionConfig::default();
        cfg.apply("video_player", "mpv").unwrap();
        assert_eq!(cfg, SessionConfig::default());
    }

    #[test]
    fn apply_rejects_malformed_values() {
        let mut cfg = SessionConfig::default();
        for (key, value) in [
            ("alternate_screen", "sometimes"),
            ("protocol", "png"),
            ("gamma", "-1"),
            ("gamma", "NaN"),
            ("probe_timeout_ms", "soon"),
        ] {
            let err = cfg.apply(key, value).unwrap_err();
            assert!(
                matches!(&err, Error::InvalidArgument { key: k, value: v } if k == key && v == value),
                "{key}={value} gave {err}"
            );
        }
        assert_eq!(cfg, SessionConfig::default());
    }

    #[test]
    fn env_overrides_apply() {
        let env = map_env(&[
            (ENV_ALT_SCREEN, "0"),
            (ENV_PROTOCOL, "sixel"),
            (ENV_PROBE_TIMEOUT_MS, "50"),
        ]);
        let cfg = SessionConfig::from_env_with(get_env(&env));
        assert!(!cfg.alternate_screen);
        assert_eq!(cfg.protocol, ProtocolOverride::Sixel);
        assert_eq!(cfg.probe_timeout, Duration::from_millis(50));
    }

    #[test]
    fn env_overrides_take_precedence_over_settings() {
        let mut cfg = SessionConfig::default();
        cfg.apply("protocol", "kitty").unwrap();
        let env = map_env(&[(ENV_PROTOCOL, "text"), (ENV_FORCE_TEXT, "on")]);
        let cfg = cfg.with_env_overrides(get_env(&env));
        assert_eq!(cfg.protocol, ProtocolOverride::Text);
        assert!(cfg.force_text);
    }

    #[test]
    fn malformed_env_values_are_ignored() {
        let env = map_env(&[(ENV_GAMMA, "bright"), (ENV_FORCE_TEXT, "perhaps")]);
        let cfg = SessionConfig::from_env_with(get_env(&env));
        assert_eq!(cfg, SessionConfig::default());
    }
}
