use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::radar::OutputFormat;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadarConfig {
    #[serde(default = "default_name")]
    pub name: String,

    /// Seconds a cached composite stays valid; 0 disables caching.
    #[serde(default = "default_delta")]
    pub delta: f64,

    /// Display time in milliseconds for each of the 24 older frames.
    #[serde(default = "default_previous_images_time")]
    pub previous_images_time: u32,

    /// Display time in milliseconds for the newest frame.
    #[serde(default = "default_current_image_time")]
    pub current_image_time: u32,

    pub latitude: Option<f64>,

    pub longitude: Option<f64>,

    /// Draw a marker at the configured coordinates on every frame.
    #[serde(default)]
    pub mark_location: bool,

    /// Animation container: "webp" or "gif".
    #[serde(default = "default_image_format")]
    pub image_format: String,
}

fn default_name() -> String {
    "DHMZ Radar".to_string()
}

fn default_delta() -> f64 {
    300.0
}

fn default_previous_images_time() -> u32 {
    125
}

fn default_current_image_time() -> u32 {
    2000
}

fn default_image_format() -> String {
    "webp".to_string()
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            delta: default_delta(),
            previous_images_time: default_previous_images_time(),
            current_image_time: default_current_image_time(),
            latitude: None,
            longitude: None,
            mark_location: false,
            image_format: default_image_format(),
        }
    }
}

impl RadarConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path))?;
        let config: RadarConfig =
            toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject invalid combinations before the camera is built.
    pub fn validate(&self) -> Result<()> {
        if !self.delta.is_finite() || self.delta < 0.0 {
            bail!("delta must be a non-negative number of seconds: {}", self.delta);
        }

        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => {
                if !(-90.0..=90.0).contains(&latitude) {
                    bail!("latitude out of range: {}", latitude);
                }
                if !(-180.0..=180.0).contains(&longitude) {
                    bail!("longitude out of range: {}", longitude);
                }
            }
            (None, None) => {
                if self.mark_location {
                    bail!("mark_location requires latitude and longitude");
                }
            }
            _ => bail!("latitude and longitude must be configured together"),
        }

        self.image_format.parse::<OutputFormat>()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RadarConfig::default();
        assert_eq!(config.delta, 300.0);
        assert_eq!(config.previous_images_time, 125);
        assert_eq!(config.current_image_time, 2000);
        assert_eq!(config.image_format, "webp");
        assert!(!config.mark_location);
        config.validate().unwrap();
    }

    #[test]
    fn coordinates_must_come_in_pairs() {
        let config = RadarConfig {
            latitude: Some(45.8),
            ..RadarConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RadarConfig {
            latitude: Some(45.8),
            longitude: Some(15.97),
            ..RadarConfig::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn mark_location_requires_coordinates() {
        let config = RadarConfig {
            mark_location: true,
            ..RadarConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_image_format_rejected() {
        let config = RadarConfig {
            image_format: "tiff".to_string(),
            ..RadarConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_toml_with_defaults() {
        let config: RadarConfig = toml::from_str(
            r#"
            name = "Radar Zagreb"
            latitude = 45.815
            longitude = 15.982
            mark_location = true
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.name, "Radar Zagreb");
        assert_eq!(config.delta, 300.0);
        assert!(config.mark_location);
    }
}
