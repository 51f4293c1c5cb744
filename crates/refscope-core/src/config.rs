//! Configuration types for the catalog
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Where ingestion snapshots are written (disabled when `None`)
    #[serde(default)]
    pub export: Option<ExportConfig>,

    /// Thresholds separating small changes from big ones
    #[serde(default)]
    pub change: ChangeTolerance,

    /// Width of the "changed recently" search window (in seconds)
    #[serde(default = "default_recent_window_secs")]
    pub recent_window_secs: u64,

    /// Names whose value records start out blacklisted
    #[serde(default)]
    pub blacklist: Vec<String>,

    /// Async driver settings
    #[serde(default)]
    pub poller: PollerConfig,
}

impl CatalogConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            export: None,
            change: ChangeTolerance::default(),
            recent_window_secs: default_recent_window_secs(),
            blacklist: Vec::new(),
            poller: PollerConfig::default(),
        }
    }

    /// Enable snapshot export below `base_dir`
    pub fn with_export_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.export = Some(ExportConfig {
            base_dir: base_dir.into(),
        });
        self
    }

    /// Replace the blacklist
    pub fn with_blacklist<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blacklist = names.into_iter().map(Into::into).collect();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.recent_window_secs == 0 {
            return Err(crate::Error::config("Recent window must be > 0 seconds"));
        }

        if let Some(export) = &self.export {
            export.validate()?;
        }

        self.change.validate()?;
        self.poller.validate()?;

        Ok(())
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Host base directory; files land in `Output/preferences` below it
    pub base_dir: PathBuf,
}

impl ExportConfig {
    /// Validate the export configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.base_dir.as_os_str().is_empty() {
            return Err(crate::Error::config("Export base directory cannot be empty"));
        }
        Ok(())
    }
}

/// Big-change thresholds for numeric samples
///
/// A numeric difference is "big" when it exceeds
/// `max(absolute, relative * |previous|)`. Non-numeric samples ignore these
/// thresholds: any difference is big.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangeTolerance {
    /// Absolute floor below which a change is small
    #[serde(default = "default_absolute_tolerance")]
    pub absolute: f64,

    /// Fraction of the previous magnitude below which a change is small
    #[serde(default = "default_relative_tolerance")]
    pub relative: f64,
}

impl ChangeTolerance {
    /// Tolerance under which every difference counts as big
    pub const EXACT: Self = Self {
        absolute: 0.0,
        relative: 0.0,
    };

    /// Validate the tolerance
    pub fn validate(&self) -> Result<(), crate::Error> {
        for (label, value) in [("absolute", self.absolute), ("relative", self.relative)] {
            if !value.is_finite() || value < 0.0 {
                return Err(crate::Error::config(format!(
                    "Change tolerance {} must be a finite, non-negative number (got {})",
                    label, value
                )));
            }
        }
        Ok(())
    }
}

impl Default for ChangeTolerance {
    fn default() -> Self {
        Self {
            absolute: default_absolute_tolerance(),
            relative: default_relative_tolerance(),
        }
    }
}

/// Poller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Interval between update ticks (in milliseconds)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Capacity of the request channel feeding the poller
    #[serde(default = "default_command_channel_capacity")]
    pub command_channel_capacity: usize,

    /// Capacity of the outgoing event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl PollerConfig {
    /// Validate the poller configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.tick_interval_ms == 0 {
            return Err(crate::Error::config("Tick interval must be > 0 ms"));
        }
        if self.command_channel_capacity == 0 {
            return Err(crate::Error::config("Command channel capacity must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            command_channel_capacity: default_command_channel_capacity(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_recent_window_secs() -> u64 {
    10
}

fn default_absolute_tolerance() -> f64 {
    0.001
}

fn default_relative_tolerance() -> f64 {
    0.01
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_command_channel_capacity() -> usize {
    64
}

fn default_event_channel_capacity() -> usize {
    1000
}
