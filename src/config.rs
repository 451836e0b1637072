//! # Flow Configuration
//!
//! Settings shared by every operator of a flow.
//!
//! ```rust
//! use streamweave_windowing::config::FlowConfig;
//!
//! let config = FlowConfig::from_json(r#"{ "name": "clicks", "channel_capacity": 16 }"#).unwrap();
//! assert_eq!(config.channel_capacity, 16);
//! assert_eq!(config.default_partitions, 1);
//! ```

use crate::error::FlowError;
use crate::window::LateDataPolicy;
use serde::{Deserialize, Serialize};

/// Configuration of a [`Flow`](crate::flow::Flow).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
  /// Name used in logs.
  pub name: String,
  /// Partition count of a repartition that does not set one.
  pub default_partitions: usize,
  /// Capacity of every shuffle channel.
  pub channel_capacity: usize,
  /// What window-wise operators do with late elements.
  pub late_data: LateDataPolicy,
  /// Window length used by window-wise operators without an upstream
  /// window-wise operator and without explicit windowing.
  pub processing_time_window_ms: u64,
}

impl Default for FlowConfig {
  fn default() -> Self {
    Self {
      name: "flow".to_string(),
      default_partitions: 1,
      channel_capacity: 64,
      late_data: LateDataPolicy::Drop,
      processing_time_window_ms: 1_000,
    }
  }
}

impl FlowConfig {
  /// Default configuration with the given name.
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Self::default()
    }
  }

  /// Parses a JSON configuration; missing fields take their defaults.
  pub fn from_json(json: &str) -> Result<Self, FlowError> {
    let config: FlowConfig =
      serde_json::from_str(json).map_err(|e| FlowError::Config(format!("invalid config: {}", e)))?;
    config.validate()?;
    Ok(config)
  }

  /// Sets the default partition count.
  pub fn with_default_partitions(mut self, partitions: usize) -> Self {
    self.default_partitions = partitions;
    self
  }

  /// Sets the shuffle channel capacity.
  pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
    self.channel_capacity = capacity;
    self
  }

  /// Sets the late-data policy.
  pub fn with_late_data(mut self, policy: LateDataPolicy) -> Self {
    self.late_data = policy;
    self
  }

  /// Sets the processing-time window length.
  pub fn with_processing_time_window_ms(mut self, millis: u64) -> Self {
    self.processing_time_window_ms = millis;
    self
  }

  /// Rejects values no flow can run with.
  pub fn validate(&self) -> Result<(), FlowError> {
    if self.default_partitions == 0 {
      return Err(FlowError::Config(
        "default_partitions must be >= 1".to_string(),
      ));
    }
    if self.channel_capacity == 0 {
      return Err(FlowError::Config("channel_capacity must be >= 1".to_string()));
    }
    if self.processing_time_window_ms == 0 {
      return Err(FlowError::Config(
        "processing_time_window_ms must be >= 1".to_string(),
      ));
    }
    Ok(())
  }
}
