//! # Windowing Strategies
//!
//! Assigners deciding which window(s) an element belongs to.
//!
//! - [`TimeWindowing`]: fixed-size windows over event time or, when no
//!   event-time function is given, processing (arrival) time
//! - [`CountWindowing`]: windows of N elements per key
//! - [`SessionWindowing`]: gap-based sessions per group, merged downstream
//! - [`Windowing::Attached`]: reuse the labels of the upstream window-wise
//!   operator
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use streamweave_windowing::windowing::TimeWindowing;
//!
//! let windowing = TimeWindowing::<(String, i64)>::seconds(1)
//!   .using(|(_, ts)| *ts)
//!   .early_triggering(Duration::from_millis(500));
//! assert_eq!(windowing.duration_millis(), 1_000);
//! assert!(!windowing.uses_processing_time());
//! ```

use crate::merge::{WindowMerger, merge_session_windows};
use crate::window::{
  CountWindow, GroupTag, SessionInterval, SessionWindow, TimeInterval, Window, WindowError,
  WindowResult,
};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

/// Extracts an element's event time in epoch milliseconds.
pub type EventTimeFn<T> = Arc<dyn Fn(&T) -> i64 + Send + Sync>;

/// Extracts the session group of an element.
pub type GroupFn<T, G> = Arc<dyn Fn(&T) -> G + Send + Sync>;

/// Per-element information available to assigners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignContext {
  /// Wall-clock arrival time at the operator.
  pub arrival_millis: i64,
  /// Number of elements previously seen for the element's key.
  pub sequence: u64,
  /// Fingerprint of the element's reduce key.
  pub key_group: GroupTag,
  /// Label assigned by the upstream window-wise operator, if any.
  pub upstream: Option<Window>,
}

/// The family of windows an assigner produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
  /// Fixed-size time windows.
  Time,
  /// Windows of the given number of elements.
  Count(usize),
  /// Mergeable session windows.
  Session,
}

/// Assigns elements to windows.
pub trait WindowAssigner<T>: Send + Sync {
  /// Returns the windows the element belongs to.
  fn assign_windows(&self, element: &T, ctx: &AssignContext) -> Vec<Window>;

  /// The family of windows produced.
  fn kind(&self) -> WindowKind;

  /// Period of early snapshots while a window is open.
  fn early_triggering_period(&self) -> Option<Duration> {
    None
  }

  /// Checks the configuration; called when the operator is built.
  fn validate(&self) -> WindowResult<()> {
    Ok(())
  }

  /// The group an element is shuffled by when its windows can span keys.
  ///
  /// Every element of a group must reach the same partition for the group's
  /// windows to be independent of the partition count. `None` shuffles by
  /// the reduce key.
  fn routing_group(&self, _element: &T) -> Option<GroupTag> {
    None
  }
}

/// Fixed-size time windows.
pub struct TimeWindowing<T> {
  duration_millis: i64,
  early_triggering: Option<Duration>,
  event_time_fn: Option<EventTimeFn<T>>,
}

impl<T> TimeWindowing<T> {
  /// Windows of the given duration over processing time.
  pub fn of(duration: Duration) -> Self {
    Self {
      duration_millis: i64::try_from(duration.as_millis()).unwrap_or(i64::MAX),
      early_triggering: None,
      event_time_fn: None,
    }
  }

  /// Windows of `millis` milliseconds.
  pub fn millis(millis: u64) -> Self {
    Self::of(Duration::from_millis(millis))
  }

  /// Windows of `seconds` seconds.
  pub fn seconds(seconds: u64) -> Self {
    Self::of(Duration::from_secs(seconds))
  }

  /// Windows of `minutes` minutes.
  pub fn minutes(minutes: u64) -> Self {
    Self::of(Duration::from_secs(minutes * 60))
  }

  /// Windows of `hours` hours.
  pub fn hours(hours: u64) -> Self {
    Self::of(Duration::from_secs(hours * 3_600))
  }

  /// Uses the given function as the element's event time.
  pub fn using<F>(mut self, event_time_fn: F) -> Self
  where
    F: Fn(&T) -> i64 + Send + Sync + 'static,
  {
    self.event_time_fn = Some(Arc::new(event_time_fn));
    self
  }

  /// Emits snapshots of open windows every `period`.
  pub fn early_triggering(mut self, period: Duration) -> Self {
    self.early_triggering = Some(period);
    self
  }

  /// Window length in milliseconds.
  pub fn duration_millis(&self) -> i64 {
    self.duration_millis
  }

  /// Period of early snapshots, if configured.
  pub fn early_triggering_period(&self) -> Option<Duration> {
    self.early_triggering
  }

  /// Returns true when windows are bucketed by arrival time.
  pub fn uses_processing_time(&self) -> bool {
    self.event_time_fn.is_none()
  }

  /// The configured event-time function.
  pub fn event_time_fn(&self) -> Option<&EventTimeFn<T>> {
    self.event_time_fn.as_ref()
  }

  /// The window containing `timestamp`.
  pub fn window_for(&self, timestamp: i64) -> TimeInterval {
    TimeInterval::of(timestamp, self.duration_millis)
  }
}

impl<T> Clone for TimeWindowing<T> {
  fn clone(&self) -> Self {
    Self {
      duration_millis: self.duration_millis,
      early_triggering: self.early_triggering,
      event_time_fn: self.event_time_fn.clone(),
    }
  }
}

impl<T> fmt::Debug for TimeWindowing<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TimeWindowing")
      .field("duration_millis", &self.duration_millis)
      .field("early_triggering", &self.early_triggering)
      .field("processing_time", &self.uses_processing_time())
      .finish()
  }
}

impl<T> WindowAssigner<T> for TimeWindowing<T> {
  fn assign_windows(&self, element: &T, ctx: &AssignContext) -> Vec<Window> {
    let timestamp = match &self.event_time_fn {
      Some(event_time) => event_time(element),
      None => ctx.arrival_millis,
    };
    vec![Window::Time(self.window_for(timestamp))]
  }

  fn kind(&self) -> WindowKind {
    WindowKind::Time
  }

  fn early_triggering_period(&self) -> Option<Duration> {
    self.early_triggering
  }

  fn validate(&self) -> WindowResult<()> {
    if self.duration_millis <= 0 {
      return Err(WindowError::InvalidConfig(
        "time window duration must be at least one millisecond".to_string(),
      ));
    }
    if self.early_triggering.is_some_and(|p| p.is_zero()) {
      return Err(WindowError::InvalidConfig(
        "early triggering period must be positive".to_string(),
      ));
    }
    Ok(())
  }
}

/// Windows of a fixed number of elements per key.
///
/// Labels are scoped to the key: the `n`-th run of one key and the `n`-th run
/// of another are different windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountWindowing {
  size: usize,
}

impl CountWindowing {
  /// Windows of `size` elements.
  pub fn of(size: usize) -> Self {
    Self { size }
  }

  /// Elements per window.
  pub fn size(&self) -> usize {
    self.size
  }
}

impl<T> WindowAssigner<T> for CountWindowing {
  fn assign_windows(&self, _element: &T, ctx: &AssignContext) -> Vec<Window> {
    let size = self.size.max(1) as u64;
    vec![Window::Count(CountWindow::new(ctx.key_group, ctx.sequence / size))]
  }

  fn kind(&self) -> WindowKind {
    WindowKind::Count(self.size)
  }

  fn validate(&self) -> WindowResult<()> {
    if self.size == 0 {
      return Err(WindowError::InvalidConfig(
        "count window size must be at least one".to_string(),
      ));
    }
    Ok(())
  }
}

/// Gap-based session windows.
///
/// Every element opens a session `[ts, ts + gap)` which is merged with the
/// overlapping or touching sessions of its group. Without a group function
/// the reduce key is the group.
///
/// The group function must be deterministic: merging is undefined when the
/// same element maps to different groups across calls.
pub struct SessionWindowing<T, G = GroupTag> {
  gap_millis: i64,
  group_fn: Option<GroupFn<T, G>>,
  event_time_fn: Option<EventTimeFn<T>>,
}

impl<T> SessionWindowing<T, GroupTag> {
  /// Sessions closing after `gap` of inactivity.
  pub fn of(gap: Duration) -> Self {
    Self {
      gap_millis: i64::try_from(gap.as_millis()).unwrap_or(i64::MAX),
      group_fn: None,
      event_time_fn: None,
    }
  }
}

impl<T, G> SessionWindowing<T, G> {
  /// Uses explicit group and event-time functions.
  pub fn using<G2, GF, EF>(self, group_fn: GF, event_time_fn: EF) -> SessionWindowing<T, G2>
  where
    GF: Fn(&T) -> G2 + Send + Sync + 'static,
    EF: Fn(&T) -> i64 + Send + Sync + 'static,
  {
    SessionWindowing {
      gap_millis: self.gap_millis,
      group_fn: Some(Arc::new(group_fn)),
      event_time_fn: Some(Arc::new(event_time_fn)),
    }
  }

  /// Uses the given event-time function; the group is the reduce key.
  pub fn using_event_time<EF>(mut self, event_time_fn: EF) -> Self
  where
    EF: Fn(&T) -> i64 + Send + Sync + 'static,
  {
    self.event_time_fn = Some(Arc::new(event_time_fn));
    self
  }

  /// Inactivity gap in milliseconds.
  pub fn gap_millis(&self) -> i64 {
    self.gap_millis
  }

  /// Assigns the element to a fresh session of its group.
  ///
  /// Fails when either the group or the event-time function is missing.
  pub fn assign_windows(&self, element: &T) -> WindowResult<Vec<SessionWindow<G>>> {
    let group_fn = self.group_fn.as_ref().ok_or_else(|| {
      WindowError::InvalidConfig("session group defaults to the reduce key".to_string())
    })?;
    let timestamp = self.event_time(element)?;
    Ok(vec![SessionWindow::new(
      group_fn(element),
      SessionInterval::new(timestamp, timestamp.saturating_add(self.gap_millis)),
    )])
  }

  fn event_time(&self, element: &T) -> WindowResult<i64> {
    self
      .event_time_fn
      .as_ref()
      .map(|f| f(element))
      .ok_or_else(|| {
        WindowError::InvalidConfig("session windowing requires an event-time function".to_string())
      })
  }
}

impl<T, G: Ord + Clone> WindowMerger<SessionWindow<G>> for SessionWindowing<T, G> {
  fn merge_windows(&self, windows: &[SessionWindow<G>]) -> Vec<(Vec<SessionWindow<G>>, SessionWindow<G>)> {
    merge_session_windows(windows)
  }
}

impl<T, G> fmt::Debug for SessionWindowing<T, G> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SessionWindowing")
      .field("gap_millis", &self.gap_millis)
      .field("grouped", &self.group_fn.is_some())
      .finish()
  }
}

impl<T, G> WindowAssigner<T> for SessionWindowing<T, G>
where
  G: Hash,
{
  fn assign_windows(&self, element: &T, ctx: &AssignContext) -> Vec<Window> {
    let group = match &self.group_fn {
      Some(group_fn) => GroupTag::of(&group_fn(element)),
      None => ctx.key_group,
    };
    let timestamp = self.event_time(element).unwrap_or(ctx.arrival_millis);
    vec![Window::Session(SessionWindow::new(
      group,
      SessionInterval::new(timestamp, timestamp.saturating_add(self.gap_millis)),
    ))]
  }

  fn kind(&self) -> WindowKind {
    WindowKind::Session
  }

  fn routing_group(&self, element: &T) -> Option<GroupTag> {
    self
      .group_fn
      .as_ref()
      .map(|group_fn| GroupTag::of(&group_fn(element)))
  }

  fn validate(&self) -> WindowResult<()> {
    if self.gap_millis <= 0 {
      return Err(WindowError::InvalidConfig(
        "session gap must be at least one millisecond".to_string(),
      ));
    }
    if self.event_time_fn.is_none() {
      return Err(WindowError::InvalidConfig(
        "session windowing requires an event-time function".to_string(),
      ));
    }
    Ok(())
  }
}

/// Windowing of a window-wise operator.
pub enum Windowing<T> {
  /// An explicit assigner.
  Assigned(Arc<dyn WindowAssigner<T>>),
  /// Reuse the labels of the upstream window-wise operator.
  Attached,
}

impl<T> Windowing<T> {
  /// Shorthand for [`TimeWindowing::of`].
  pub fn time(duration: Duration) -> TimeWindowing<T> {
    TimeWindowing::of(duration)
  }

  /// Shorthand for [`CountWindowing::of`].
  pub fn count(size: usize) -> CountWindowing {
    CountWindowing::of(size)
  }

  /// Shorthand for [`SessionWindowing::of`].
  pub fn session(gap: Duration) -> SessionWindowing<T> {
    SessionWindowing::of(gap)
  }
}

impl<T> Clone for Windowing<T> {
  fn clone(&self) -> Self {
    match self {
      Windowing::Assigned(assigner) => Windowing::Assigned(assigner.clone()),
      Windowing::Attached => Windowing::Attached,
    }
  }
}

impl<T> fmt::Debug for Windowing<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Windowing::Assigned(assigner) => write!(f, "Assigned({:?})", assigner.kind()),
      Windowing::Attached => write!(f, "Attached"),
    }
  }
}

impl<T: 'static> From<TimeWindowing<T>> for Windowing<T> {
  fn from(windowing: TimeWindowing<T>) -> Self {
    Windowing::Assigned(Arc::new(windowing))
  }
}

impl<T> From<CountWindowing> for Windowing<T> {
  fn from(windowing: CountWindowing) -> Self {
    Windowing::Assigned(Arc::new(windowing))
  }
}

impl<T: 'static, G: Hash + 'static> From<SessionWindowing<T, G>> for Windowing<T> {
  fn from(windowing: SessionWindowing<T, G>) -> Self {
    Windowing::Assigned(Arc::new(windowing))
  }
}
