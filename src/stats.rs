//! # Operator Statistics
//!
//! Counters maintained by every window-wise operator, shared by all of its
//! partitions.

use crate::error::ComponentInfo;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters of one operator.
#[derive(Debug, Default)]
pub struct OperatorStats {
  elements: AtomicU64,
  windows_fired: AtomicU64,
  early_firings: AtomicU64,
  merges: AtomicU64,
  late_elements: AtomicU64,
}

impl OperatorStats {
  /// Counts an input element.
  pub fn record_element(&self) {
    self.elements.fetch_add(1, Ordering::Relaxed);
  }

  /// Counts a final window emission.
  pub fn record_fired(&self) {
    self.windows_fired.fetch_add(1, Ordering::Relaxed);
  }

  /// Counts an early snapshot.
  pub fn record_early(&self) {
    self.early_firings.fetch_add(1, Ordering::Relaxed);
  }

  /// Counts a session merge.
  pub fn record_merge(&self) {
    self.merges.fetch_add(1, Ordering::Relaxed);
  }

  /// Counts a late element.
  pub fn record_late(&self) {
    self.late_elements.fetch_add(1, Ordering::Relaxed);
  }

  /// Reads all counters.
  pub fn snapshot(&self) -> StatsSnapshot {
    StatsSnapshot {
      elements: self.elements.load(Ordering::Relaxed),
      windows_fired: self.windows_fired.load(Ordering::Relaxed),
      early_firings: self.early_firings.load(Ordering::Relaxed),
      merges: self.merges.load(Ordering::Relaxed),
      late_elements: self.late_elements.load(Ordering::Relaxed),
    }
  }
}

/// Point-in-time copy of an operator's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
  /// Input elements processed.
  pub elements: u64,
  /// Final (key, window) emissions.
  pub windows_fired: u64,
  /// Early snapshots emitted.
  pub early_firings: u64,
  /// Session merges performed.
  pub merges: u64,
  /// Late elements dropped or side-output.
  pub late_elements: u64,
}

/// Statistics of one operator, as returned by
/// [`Flow::stats`](crate::flow::Flow::stats).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorReport {
  /// The operator.
  pub component: ComponentInfo,
  /// Its counters.
  pub stats: StatsSnapshot,
}
