//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field is optional:
//!
//! ```toml
//! [left_stick]
//! enabled = true
//! axes = [0, 1]
//! epsilon = 0.02
//! min_interval_s = 0.02
//!
//! [right_stick]
//! enabled = true
//! axes = [3, 4]
//!
//! [stream]
//! rest_ms = 1
//! ```

use serde::de::Error;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{PadError, Result};
use crate::normalizer::{ChannelConfig, SessionConfig, Stick};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_left_stick", deserialize_with = "left_stick_section")]
    pub left_stick: StickConfig,

    #[serde(default = "default_right_stick", deserialize_with = "right_stick_section")]
    pub right_stick: StickConfig,

    #[serde(default)]
    pub stream: StreamConfig,
}

/// Analog stick channel configuration
#[derive(Debug, Clone, PartialEq)]
pub struct StickConfig {
    pub enabled: bool,

    /// (x, y) axis indices. Defaults to (0, 1) on the left stick and (2, 3)
    /// on the right; the right stick varies between (2, 3) and (3, 4).
    pub axes: [usize; 2],

    pub epsilon: f32,

    pub min_interval_s: f64,
}

/// A stick section as written in the file, before per-stick defaults apply
#[derive(Debug, Deserialize)]
struct StickSection {
    #[serde(default)]
    enabled: bool,

    #[serde(default)]
    axes: Option<[usize; 2]>,

    #[serde(default = "default_epsilon")]
    epsilon: f32,

    #[serde(default = "default_min_interval_s")]
    min_interval_s: f64,
}

impl StickSection {
    fn resolve(self, stick: Stick) -> StickConfig {
        let (x, y) = stick.default_axes();
        StickConfig {
            enabled: self.enabled,
            axes: self.axes.unwrap_or([x, y]),
            epsilon: self.epsilon,
            min_interval_s: self.min_interval_s,
        }
    }
}

fn left_stick_section<'de, D>(deserializer: D) -> std::result::Result<StickConfig, D::Error>
where
    D: Deserializer<'de>,
{
    StickSection::deserialize(deserializer).map(|section| section.resolve(Stick::Left))
}

fn right_stick_section<'de, D>(deserializer: D) -> std::result::Result<StickConfig, D::Error>
where
    D: Deserializer<'de>,
{
    StickSection::deserialize(deserializer).map(|section| section.resolve(Stick::Right))
}

/// Poll loop configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StreamConfig {
    #[serde(default = "default_rest_ms")]
    pub rest_ms: u64,
}

// Default value functions
fn default_left_stick() -> StickConfig { StickConfig::disabled(Stick::Left) }
fn default_right_stick() -> StickConfig { StickConfig::disabled(Stick::Right) }

fn default_epsilon() -> f32 { 0.02 }
fn default_min_interval_s() -> f64 { 0.02 }
fn default_rest_ms() -> u64 { 1 }

/// Longest accepted spacing between stick emissions
const MAX_MIN_INTERVAL_S: f64 = 10.0;
/// Longest accepted rest between iterations
const MAX_REST_MS: u64 = 1000;

impl Default for Config {
    fn default() -> Self {
        Self {
            left_stick: default_left_stick(),
            right_stick: default_right_stick(),
            stream: StreamConfig::default(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { rest_ms: default_rest_ms() }
    }
}

impl StickConfig {
    /// Disabled channel on the stick's conventional axes
    pub fn disabled(stick: Stick) -> Self {
        let (x, y) = stick.default_axes();
        Self {
            enabled: false,
            axes: [x, y],
            epsilon: default_epsilon(),
            min_interval_s: default_min_interval_s(),
        }
    }

    fn channel_config(&self) -> Option<ChannelConfig> {
        self.enabled.then(|| ChannelConfig {
            axes: (self.axes[0], self.axes[1]),
            epsilon: self.epsilon,
            min_interval: Duration::from_secs_f64(self.min_interval_s),
        })
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 || self.epsilon > 1.0 {
            return Err(PadError::Config(toml::de::Error::custom(format!(
                "{}.epsilon must be between 0.0 and 1.0",
                name
            ))));
        }

        if !self.min_interval_s.is_finite()
            || self.min_interval_s < 0.0
            || self.min_interval_s > MAX_MIN_INTERVAL_S
        {
            return Err(PadError::Config(toml::de::Error::custom(format!(
                "{}.min_interval_s must be between 0.0 and {}",
                name, MAX_MIN_INTERVAL_S
            ))));
        }

        if self.axes[0] == self.axes[1] {
            return Err(PadError::Config(toml::de::Error::custom(format!(
                "{}.axes must name two different axes",
                name
            ))));
        }

        Ok(())
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use padstream::config::Config;
    ///
    /// let config = Config::load("padstream.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        self.left_stick.validate("left_stick")?;
        self.right_stick.validate("right_stick")?;

        if self.stream.rest_ms > MAX_REST_MS {
            return Err(PadError::Config(toml::de::Error::custom(format!(
                "rest_ms must be at most {}",
                MAX_REST_MS
            ))));
        }

        Ok(())
    }

    /// Settings for a normalizer session
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            left: self.left_stick.channel_config(),
            right: self.right_stick.channel_config(),
            rest_period: Duration::from_millis(self.stream.rest_ms),
        }
    }
}
