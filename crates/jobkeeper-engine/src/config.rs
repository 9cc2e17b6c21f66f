//! Engine configuration.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Engine configuration.
///
/// The timezone is the business zone every cron expression is evaluated
/// in ("9pm local time", not UTC). Unknown zone names fail at
/// deserialization, before the engine is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// IANA timezone for cron evaluation.
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
}

fn default_timezone() -> Tz {
    chrono_tz::UTC
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

impl EngineConfig {
    /// Set the timezone.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_utc() {
        assert_eq!(EngineConfig::default().timezone, chrono_tz::UTC);
    }

    #[test]
    fn test_deserialize_zone_name() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"timezone": "Asia/Taipei"}"#).unwrap();
        assert_eq!(config.timezone, chrono_tz::Asia::Taipei);
    }

    #[test]
    fn test_deserialize_unknown_zone_fails() {
        let result = serde_json::from_str::<EngineConfig>(r#"{"timezone": "Mars/Olympus"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_empty_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.timezone, chrono_tz::UTC);
    }
}
