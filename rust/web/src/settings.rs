use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Tunables of the room coordinator and the connection hub
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppSettings {
    /// Delay between both players readying up and the match starting
    pub countdown_secs: u64,
    /// Outbound events buffered per connection before it is dropped
    pub outbound_buffer: usize,
    /// Longest accepted display name, in characters
    pub max_name_len: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            countdown_secs: 5,
            outbound_buffer: 64,
            max_name_len: 32,
        }
    }
}

impl AppSettings {
    /// Validate settings values
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.countdown_secs > 60 {
            return Err(SettingsError::InvalidValue(
                "countdown_secs must be at most 60".to_string(),
            ));
        }

        if self.outbound_buffer == 0 {
            return Err(SettingsError::InvalidValue(
                "outbound_buffer must be greater than 0".to_string(),
            ));
        }

        if self.max_name_len == 0 {
            return Err(SettingsError::InvalidValue(
                "max_name_len must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.countdown_secs)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = AppSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.countdown(), Duration::from_secs(5));
    }

    #[test]
    fn rejects_zero_buffer() {
        let settings = AppSettings {
            outbound_buffer: 0,
            ..AppSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    #[test]
    fn rejects_long_countdown() {
        let settings = AppSettings {
            countdown_secs: 600,
            ..AppSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let json = r#"{"countdown_secs":3,"outbound_buffer":16,"max_name_len":20}"#;
        let settings: AppSettings = serde_json::from_str(json).expect("deserialize");
        assert_eq!(settings.countdown_secs, 3);
        assert!(settings.validate().is_ok());
    }
}
