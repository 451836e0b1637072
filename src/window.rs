//! # Windows
//!
//! Window labels: the immutable buckets elements are assigned to for
//! aggregation.
//!
//! # Window Types
//!
//! - [`TimeInterval`]: half-open `[start, end)` interval of a fixed duration
//! - [`CountWindow`]: an opaque ordinal; closes after N elements
//! - [`SessionWindow`]: a gap-based interval scoped to a group; replaced by a
//!   new window whenever it merges with another session
//!
//! [`Window`] is the runtime label carried by every element emitted from a
//! window-wise operator. Downstream attached operators reuse it verbatim.
//!
//! # Example
//!
//! ```rust
//! use streamweave_windowing::window::TimeInterval;
//!
//! let window = TimeInterval::of(2_100, 1_000);
//! assert_eq!(window.start_millis(), 2_000);
//! assert_eq!(window.end_millis(), 3_000);
//! ```

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use thiserror::Error;

/// Policy for handling late data (elements arriving for a window that
/// already closed for their key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateDataPolicy {
  /// Drop late elements (logged).
  #[default]
  Drop,
  /// Hand late elements to the operator's late-data collector.
  SideOutput,
}

/// Error type for window operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
  /// Invalid window configuration.
  #[error("Invalid window config: {0}")]
  InvalidConfig(String),
  /// The window already reached its terminal state.
  #[error("Window closed: {0}")]
  WindowClosed(String),
}

/// Result type for window operations.
pub type WindowResult<T> = Result<T, WindowError>;

fn format_millis(f: &mut fmt::Formatter<'_>, millis: i64) -> fmt::Result {
  match DateTime::from_timestamp_millis(millis) {
    Some(ts) => write!(f, "{}", ts.format("%H:%M:%S%.3f")),
    None => write!(f, "{}", millis),
  }
}

/// A half-open time interval `[start, end)` in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeInterval {
  start_millis: i64,
  end_millis: i64,
}

impl TimeInterval {
  /// Creates an interval with explicit bounds.
  pub fn new(start_millis: i64, end_millis: i64) -> Self {
    Self {
      start_millis,
      end_millis,
    }
  }

  /// Returns the interval of length `duration_millis` containing `timestamp`.
  ///
  /// The start is `floor(timestamp / duration) * duration`, also for
  /// negative timestamps.
  pub fn of(timestamp: i64, duration_millis: i64) -> Self {
    let start = timestamp.div_euclid(duration_millis) * duration_millis;
    Self::new(start, start + duration_millis)
  }

  /// Start of the interval (inclusive).
  pub fn start_millis(&self) -> i64 {
    self.start_millis
  }

  /// End of the interval (exclusive).
  pub fn end_millis(&self) -> i64 {
    self.end_millis
  }

  /// Length of the interval.
  pub fn duration_millis(&self) -> i64 {
    self.end_millis - self.start_millis
  }

  /// Returns true if the timestamp falls within this interval.
  pub fn contains(&self, timestamp: i64) -> bool {
    timestamp >= self.start_millis && timestamp < self.end_millis
  }

  /// Returns true if this interval overlaps another.
  pub fn intersects(&self, other: &TimeInterval) -> bool {
    self.start_millis < other.end_millis && other.start_millis < self.end_millis
  }
}

impl fmt::Display for TimeInterval {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[")?;
    format_millis(f, self.start_millis)?;
    write!(f, ", ")?;
    format_millis(f, self.end_millis)?;
    write!(f, ")")
  }
}

/// A count-based window: the ordinal of a key's run of N elements.
///
/// Ordinals are counted per key, so the label also carries the key's
/// [`GroupTag`]. Two keys never share a count label and each label is closed
/// by exactly one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CountWindow {
  ordinal: u64,
  group: GroupTag,
}

impl CountWindow {
  /// Creates the `ordinal`-th count window of the key tagged `group`.
  pub fn new(group: GroupTag, ordinal: u64) -> Self {
    Self { ordinal, group }
  }

  /// Returns the window ordinal.
  pub fn ordinal(&self) -> u64 {
    self.ordinal
  }

  /// Returns the tag of the key owning the window.
  pub fn group(&self) -> GroupTag {
    self.group
  }
}

impl fmt::Display for CountWindow {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "CountWindow({}, {:016x})", self.ordinal, self.group.0)
  }
}

/// The interval covered by a session, in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionInterval {
  start_millis: i64,
  end_millis: i64,
}

impl SessionInterval {
  /// Creates a session interval.
  pub fn new(start_millis: i64, end_millis: i64) -> Self {
    Self {
      start_millis,
      end_millis,
    }
  }

  /// Start of the session.
  pub fn start_millis(&self) -> i64 {
    self.start_millis
  }

  /// End of the session.
  pub fn end_millis(&self) -> i64 {
    self.end_millis
  }

  /// Returns true if the two intervals overlap or touch.
  ///
  /// Touching endpoints merge; a strict gap does not.
  pub fn touches(&self, other: &SessionInterval) -> bool {
    self.end_millis >= other.start_millis && other.end_millis >= self.start_millis
  }

  /// Smallest interval covering both.
  pub fn span(&self, other: &SessionInterval) -> SessionInterval {
    SessionInterval::new(
      self.start_millis.min(other.start_millis),
      self.end_millis.max(other.end_millis),
    )
  }
}

impl fmt::Display for SessionInterval {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Session[")?;
    format_millis(f, self.start_millis)?;
    write!(f, ", ")?;
    format_millis(f, self.end_millis)?;
    write!(f, ")")
  }
}

/// A session window: an interval scoped to a group.
///
/// Sessions are only ever merged with sessions of the same group. A merge
/// produces a new `SessionWindow` replacing its constituents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionWindow<G> {
  group: G,
  interval: SessionInterval,
}

impl<G> SessionWindow<G> {
  /// Creates a session window.
  pub fn new(group: G, interval: SessionInterval) -> Self {
    Self { group, interval }
  }

  /// The group this session belongs to.
  pub fn group(&self) -> &G {
    &self.group
  }

  /// The interval covered by this session.
  pub fn interval(&self) -> SessionInterval {
    self.interval
  }

  /// Start of the session.
  pub fn start_millis(&self) -> i64 {
    self.interval.start_millis
  }

  /// End of the session.
  pub fn end_millis(&self) -> i64 {
    self.interval.end_millis
  }
}

/// Fingerprint of a session group or reduce key.
///
/// Runtime session labels carry the fingerprint instead of the user's group
/// value so that every label has the same concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupTag(pub u64);

impl GroupTag {
  /// Fingerprints a hashable value. Equal values produce equal tags in every
  /// partition of a flow and across runs of the same build; tags are not
  /// stable across Rust toolchain versions and must not be persisted.
  pub fn of<G: Hash + ?Sized>(group: &G) -> Self {
    let mut hasher = DefaultHasher::new();
    group.hash(&mut hasher);
    Self(hasher.finish())
  }
}

/// The window label attached to elements emitted by window-wise operators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Window {
  /// Fixed-duration time window.
  Time(TimeInterval),
  /// Count window.
  Count(CountWindow),
  /// Session window.
  Session(SessionWindow<GroupTag>),
}

impl Window {
  fn rank(&self) -> u8 {
    match self {
      Window::Time(_) => 0,
      Window::Count(_) => 1,
      Window::Session(_) => 2,
    }
  }

  /// Returns the time interval if this is a time window.
  pub fn as_time(&self) -> Option<TimeInterval> {
    match self {
      Window::Time(interval) => Some(*interval),
      _ => None,
    }
  }

  /// Returns the session window if this is a session label.
  pub fn as_session(&self) -> Option<&SessionWindow<GroupTag>> {
    match self {
      Window::Session(session) => Some(session),
      _ => None,
    }
  }

  /// Start of the window in epoch milliseconds, for time-bounded labels.
  pub fn start_millis(&self) -> Option<i64> {
    match self {
      Window::Time(interval) => Some(interval.start_millis()),
      Window::Session(session) => Some(session.start_millis()),
      Window::Count(_) => None,
    }
  }

  /// End of the window in epoch milliseconds, for time-bounded labels.
  pub fn end_millis(&self) -> Option<i64> {
    match self {
      Window::Time(interval) => Some(interval.end_millis()),
      Window::Session(session) => Some(session.end_millis()),
      Window::Count(_) => None,
    }
  }
}

impl PartialOrd for Window {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Window {
  fn cmp(&self, other: &Self) -> Ordering {
    match (self, other) {
      (Window::Time(a), Window::Time(b)) => a.cmp(b),
      (Window::Count(a), Window::Count(b)) => a.cmp(b),
      (Window::Session(a), Window::Session(b)) => a
        .interval
        .cmp(&b.interval)
        .then_with(|| a.group.cmp(&b.group)),
      _ => self.rank().cmp(&other.rank()),
    }
  }
}

impl fmt::Display for Window {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Window::Time(interval) => interval.fmt(f),
      Window::Count(count) => count.fmt(f),
      Window::Session(session) => session.interval.fmt(f),
    }
  }
}

impl From<TimeInterval> for Window {
  fn from(interval: TimeInterval) -> Self {
    Window::Time(interval)
  }
}

impl From<CountWindow> for Window {
  fn from(window: CountWindow) -> Self {
    Window::Count(window)
  }
}

impl From<SessionWindow<GroupTag>> for Window {
  fn from(window: SessionWindow<GroupTag>) -> Self {
    Window::Session(window)
  }
}
