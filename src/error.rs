//! # Error Handling
//!
//! Errors surfaced by a [`Flow`](crate::flow::Flow).
//!
//! Configuration problems are reported when the dataflow is built, never
//! at runtime. A failure inside a user function aborts the whole run and
//! is returned from [`Flow::run`](crate::flow::Flow::run) with the
//! [`ComponentInfo`] of the operator it came from.
//!
//! ## Example
//!
//! ```rust
//! use streamweave_windowing::error::{ComponentInfo, FlowError};
//!
//! let error = FlowError::Aggregation {
//!   component: ComponentInfo::new("word-count".to_string(), "ReduceByKey".to_string()),
//!   source: "overflow".into(),
//! };
//! assert!(error.to_string().contains("word-count"));
//! ```

use crate::window::WindowError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Boxed error type returned by fallible user functions, sources and sinks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for flow construction and execution.
pub type FlowResult<T> = Result<T, FlowError>;

/// Identifies an operator in errors, logs and statistics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentInfo {
  /// Name of the operator instance.
  pub name: String,
  /// Type of the operator.
  pub type_name: String,
}

impl ComponentInfo {
  /// Creates component information.
  pub fn new(name: String, type_name: String) -> Self {
    Self { name, type_name }
  }
}

impl Default for ComponentInfo {
  fn default() -> Self {
    Self {
      name: "default".to_string(),
      type_name: "unknown".to_string(),
    }
  }
}

impl fmt::Display for ComponentInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.name, self.type_name)
  }
}

/// Errors produced while building or running a flow.
#[derive(Debug, Error)]
pub enum FlowError {
  /// Invalid dataflow configuration, detected at construction time.
  #[error("Configuration error: {0}")]
  Config(String),
  /// A user combine or reduce function failed.
  #[error("Aggregation failed in {component}: {source}")]
  Aggregation {
    /// The operator whose function failed.
    component: ComponentInfo,
    /// The error returned by the user function.
    #[source]
    source: BoxError,
  },
  /// A data source failed to produce an element.
  #[error("Source failed: {0}")]
  Source(#[source] BoxError),
  /// A data sink failed to accept an element.
  #[error("Sink failed: {0}")]
  Sink(#[source] BoxError),
  /// A windowing strategy or trigger rejected an operation.
  #[error(transparent)]
  Window(#[from] WindowError),
  /// The run was cancelled through its cancellation token.
  #[error("Flow cancelled")]
  Cancelled,
  /// A partition task panicked or could not be joined.
  #[error("Task failed: {0}")]
  Task(String),
}

impl FlowError {
  /// Wraps a user function failure with the operator it occurred in.
  pub fn aggregation(component: &ComponentInfo, source: BoxError) -> Self {
    FlowError::Aggregation {
      component: component.clone(),
      source,
    }
  }

  /// Returns true for errors raised while building the dataflow.
  pub fn is_config(&self) -> bool {
    matches!(self, FlowError::Config(_) | FlowError::Window(WindowError::InvalidConfig(_)))
  }
}
