//! Process-wide settings for the post-auction pipeline.
//!
//! Settings are read from TOML and merged with environment variables
//! prefixed with `RTB_EXCHANGE__`. For example `RTB_EXCHANGE__TRACKER__ENDPOINT`
//! overrides `tracker.endpoint`.

use config::{Config, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::constants::BIDDER_PUBMATIC;
use crate::error::ExchangeError;

pub const ENVIRONMENT_VARIABLE_PREFIX: &str = "RTB_EXCHANGE";
pub const ENVIRONMENT_VARIABLE_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct TrackerSettings {
    /// Base URL of the impression tracker.
    #[validate(url)]
    pub endpoint: String,
    /// Base URL of the video error tracker. Empty disables error trackers.
    #[serde(default)]
    pub error_endpoint: String,
    /// Script loaded by Open-Measurement enabled banner trackers.
    #[serde(default = "default_om_script_url")]
    #[validate(url)]
    pub om_script_url: String,
    /// `<AdSystem>` of VAST wrappers generated for redirect creatives.
    #[serde(default = "default_wrapper_ad_system")]
    #[validate(length(min = 1))]
    pub wrapper_ad_system: String,
}

fn default_om_script_url() -> String {
    "https://ads.pubmatic.com/AdServer/js/owobjectverification.js".to_string()
}

fn default_wrapper_ad_system() -> String {
    "PubMatic Wrapper".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct FloorSettings {
    /// Global kill switch for floor enforcement.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Percentage of requests on which floors are enforced when the
    /// account does not say otherwise.
    #[serde(default = "default_enforce_floor_rate")]
    #[validate(range(max = 100))]
    pub enforce_floor_rate: u32,
    #[serde(default)]
    pub enforce_deal_floors: bool,
}

impl Default for FloorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            enforce_floor_rate: default_enforce_floor_rate(),
            enforce_deal_floors: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_enforce_floor_rate() -> u32 {
    100
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct MarketplaceSettings {
    /// Bidder whose slot metadata is copied onto alternate-bidder-code trackers.
    #[serde(default = "default_parent_bidder")]
    #[validate(length(min = 1))]
    pub parent_bidder: String,
}

impl Default for MarketplaceSettings {
    fn default() -> Self {
        Self {
            parent_bidder: default_parent_bidder(),
        }
    }
}

fn default_parent_bidder() -> String {
    BIDDER_PUBMATIC.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct StatsSettings {
    #[serde(default = "default_queue_size")]
    #[validate(range(min = 1))]
    pub queue_size: usize,
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
        }
    }
}

fn default_queue_size() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub tracker: TrackerSettings,
    #[serde(default)]
    #[validate(nested)]
    pub floors: FloorSettings,
    #[serde(default)]
    #[validate(nested)]
    pub marketplace: MarketplaceSettings,
    #[serde(default)]
    #[validate(nested)]
    pub stats: StatsSettings,
}

impl Settings {
    /// Parse settings from TOML and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Configuration`] when the TOML is malformed,
    /// required keys are missing, or validation fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, Report<ExchangeError>> {
        let environment = Environment::default()
            .prefix(ENVIRONMENT_VARIABLE_PREFIX)
            .separator(ENVIRONMENT_VARIABLE_SEPARATOR);

        let toml = File::from_str(toml_str, FileFormat::Toml);
        let config = Config::builder()
            .add_source(toml)
            .add_source(environment)
            .build()
            .change_context(ExchangeError::Configuration {
                message: "Failed to build configuration".to_string(),
            })?;

        let settings: Self =
            config
                .try_deserialize()
                .change_context(ExchangeError::Configuration {
                    message: "Failed to deserialize configuration".to_string(),
                })?;

        settings
            .validate()
            .change_context(ExchangeError::Configuration {
                message: "Settings validation failed".to_string(),
            })?;

        Ok(settings)
    }

    /// Serialize the effective settings (after environment overrides).
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Configuration`] if serialization fails.
    pub fn to_canonical_toml(&self) -> Result<String, Report<ExchangeError>> {
        toml::to_string(self).change_context(ExchangeError::Configuration {
            message: "Failed to serialize settings".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::tests::crate_test_settings_str;

    #[test]
    fn test_settings_from_valid_toml() {
        let settings =
            Settings::from_toml(&crate_test_settings_str()).expect("should parse test settings");

        assert_eq!(settings.tracker.endpoint, "https://t.test-exchange.com/wt");
        assert_eq!(
            settings.tracker.error_endpoint,
            "https://t.test-exchange.com/wv"
        );
        assert!(settings.floors.enabled);
        assert_eq!(settings.floors.enforce_floor_rate, 100);
        assert_eq!(settings.marketplace.parent_bidder, "pubmatic");
        assert_eq!(settings.stats.queue_size, 16);
    }

    #[test]
    fn test_settings_defaults_for_optional_sections() {
        let toml_str = r#"
            [tracker]
            endpoint = "https://t.example.com/wt"
            "#;

        let settings = Settings::from_toml(toml_str).expect("should parse minimal settings");

        assert!(settings.tracker.error_endpoint.is_empty());
        assert_eq!(settings.tracker.wrapper_ad_system, "PubMatic Wrapper");
        assert!(settings.floors.enabled);
        assert!(!settings.floors.enforce_deal_floors);
        assert_eq!(settings.marketplace.parent_bidder, "pubmatic");
        assert_eq!(settings.stats.queue_size, 1024);
    }

    #[test]
    fn test_settings_missing_tracker_section() {
        let toml_str = r#"
            [floors]
            enabled = false
            "#;

        let settings = Settings::from_toml(toml_str);
        assert!(settings.is_err(), "tracker section is required");
    }

    #[test]
    fn test_settings_rejects_out_of_range_floor_rate() {
        let toml_str = r#"
            [tracker]
            endpoint = "https://t.example.com/wt"

            [floors]
            enforce_floor_rate = 150
            "#;

        let err = Settings::from_toml(toml_str).expect_err("rate above 100 must fail");
        assert!(format!("{err}").contains("Settings validation failed"));
    }

    #[test]
    fn test_settings_rejects_invalid_endpoint() {
        let toml_str = r#"
            [tracker]
            endpoint = "not a url"
            "#;

        assert!(Settings::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_settings_environment_override() {
        temp_env::with_var(
            "RTB_EXCHANGE__MARKETPLACE__PARENT_BIDDER",
            Some("appnexus"),
            || {
                let settings = Settings::from_toml(&crate_test_settings_str())
                    .expect("should parse test settings");
                assert_eq!(settings.marketplace.parent_bidder, "appnexus");
            },
        );
    }

    #[test]
    fn test_settings_canonical_toml_round_trips() {
        let settings =
            Settings::from_toml(&crate_test_settings_str()).expect("should parse test settings");
        let canonical = settings
            .to_canonical_toml()
            .expect("should serialize settings");

        let reparsed = Settings::from_toml(&canonical).expect("should parse canonical toml");
        assert_eq!(reparsed.tracker.endpoint, settings.tracker.endpoint);
        assert_eq!(
            reparsed.floors.enforce_floor_rate,
            settings.floors.enforce_floor_rate
        );
    }
}
