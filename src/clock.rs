//! # Clocks
//!
//! Wall-clock sources for processing-time windowing.

use chrono::Utc;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of processing time.
pub trait Clock: Send + Sync + fmt::Debug {
  /// Current time in epoch milliseconds.
  fn now_millis(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_millis(&self) -> i64 {
    Utc::now().timestamp_millis()
  }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
  now: AtomicI64,
}

impl ManualClock {
  /// Creates a clock reading `millis`.
  pub fn new(millis: i64) -> Self {
    Self {
      now: AtomicI64::new(millis),
    }
  }

  /// Sets the current time.
  pub fn set(&self, millis: i64) {
    self.now.store(millis, Ordering::SeqCst);
  }

  /// Moves the clock forward.
  pub fn advance(&self, millis: i64) {
    self.now.fetch_add(millis, Ordering::SeqCst);
  }
}

impl Clock for ManualClock {
  fn now_millis(&self) -> i64 {
    self.now.load(Ordering::SeqCst)
  }
}
