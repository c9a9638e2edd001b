//! Construction-time engine configuration.

use serde::{Deserialize, Serialize};

use crate::domain::{EngineError, Result};

pub const ENV_MAX_EVENTS: &str = "VALMON_MAX_EVENTS";
pub const ENV_KEEP_RECENT: &str = "VALMON_KEEP_RECENT";
pub const ENV_DEDUPE_WINDOW: &str = "VALMON_DEDUPE_WINDOW";

/// Windowing and dedupe bounds shared by every session of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Summarize once the recent window grows past this many events.
    pub max_events_before_summarize: usize,

    /// Events left in the recent window after a summarization.
    pub keep_recent_events: usize,

    /// How many recently seen event ids each session remembers for dedupe.
    pub dedupe_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events_before_summarize: 30,
            keep_recent_events: 15,
            dedupe_window: 1024,
        }
    }
}

fn env_usize(name: &str, fallback: usize) -> Result<usize> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| EngineError::InvalidConfig(format!("{name}={raw:?} is not a count"))),
        Err(_) => Ok(fallback),
    }
}

impl EngineConfig {
    pub fn new(max_events_before_summarize: usize, keep_recent_events: usize) -> Self {
        Self {
            max_events_before_summarize,
            keep_recent_events,
            ..Self::default()
        }
    }

    /// Defaults overridden by `VALMON_MAX_EVENTS`, `VALMON_KEEP_RECENT`
    /// and `VALMON_DEDUPE_WINDOW` when set.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            max_events_before_summarize: env_usize(
                ENV_MAX_EVENTS,
                defaults.max_events_before_summarize,
            )?,
            keep_recent_events: env_usize(ENV_KEEP_RECENT, defaults.keep_recent_events)?,
            dedupe_window: env_usize(ENV_DEDUPE_WINDOW, defaults.dedupe_window)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject bounds that cannot keep the recent window within its limit.
    pub fn validate(&self) -> Result<()> {
        if self.max_events_before_summarize == 0 {
            return Err(EngineError::InvalidConfig(
                "maxEventsBeforeSummarize must be at least 1".to_string(),
            ));
        }
        if self.keep_recent_events > self.max_events_before_summarize {
            return Err(EngineError::InvalidConfig(format!(
                "keepRecentEvents ({}) must not exceed maxEventsBeforeSummarize ({})",
                self.keep_recent_events, self.max_events_before_summarize
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.max_events_before_summarize, 30);
        assert_eq!(config.keep_recent_events, 15);
        assert_eq!(config.dedupe_window, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_keep_larger_than_max_rejected() {
        let config = EngineConfig::new(10, 11);
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_max_rejected() {
        assert!(EngineConfig::new(0, 0).validate().is_err());
    }

    #[test]
    fn test_keep_equal_to_max_allowed() {
        assert!(EngineConfig::new(5, 5).validate().is_ok());
    }

    #[test]
    fn test_config_deserializes_partial_camel_case() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"maxEventsBeforeSummarize": 10}"#).expect("deserialize");
        assert_eq!(config.max_events_before_summarize, 10);
        assert_eq!(config.keep_recent_events, 15);
    }
}
