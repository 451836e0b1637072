//! # Triggers
//!
//! Per-(key, window) firing state machines.
//!
//! Each window slot owns one [`WindowTrigger`]. The operator feeds it explicit
//! events ([`TriggerEvent`]) and acts on the returned [`TriggerResult`]; there
//! is no shared trigger table and no global clock.
//!
//! ```text
//! OPEN --(EarlyTimer)--> EARLY_FIRED(n) --(EarlyTimer)--> EARLY_FIRED(n+1)
//!   |                         |
//!   +---- closing event ------+----> CLOSED (terminal)
//! ```

use crate::window::WindowError;
use std::fmt;
use std::time::Duration;

/// Result of trigger evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerResult {
  /// Continue accumulating elements.
  Continue,
  /// Emit a snapshot of the accumulator but keep it.
  Fire,
  /// Emit the accumulator and discard it.
  FireAndPurge,
}

/// Lifecycle of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
  /// Accepting elements, nothing emitted yet.
  Open,
  /// Accepting elements; emitted the given number of early snapshots.
  EarlyFired(u32),
  /// Terminal: the accumulator was emitted and discarded.
  Closed,
}

/// Events delivered to a window's trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
  /// An element was added to the window.
  Element,
  /// An element of a later window arrived on the same key.
  LaterWindowObserved,
  /// An element arrived strictly after the end of this session.
  GapObserved,
  /// Every upstream origin closed (or finished) this window label.
  UpstreamClosed,
  /// The early-triggering period elapsed.
  EarlyTimer,
  /// The input is exhausted.
  EndOfStream,
}

/// When a window fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPolicy {
  /// Time windows: fire when a later window is observed, optionally with
  /// periodic snapshots while open.
  EndOfWindow {
    /// Period of early snapshots, if any.
    early: Option<Duration>,
  },
  /// Count windows: fire once `n` elements were added.
  CountFull(usize),
  /// Session windows: fire once a gap confirms the session is final.
  SessionGap,
  /// Attached windows: fire when the upstream closes the label.
  Attached,
}

/// Firing state machine of a single window.
#[derive(Debug, Clone)]
pub struct WindowTrigger {
  policy: TriggerPolicy,
  state: TriggerState,
  elements: usize,
}

impl WindowTrigger {
  /// Creates an open trigger for the given policy.
  pub fn new(policy: TriggerPolicy) -> Self {
    Self {
      policy,
      state: TriggerState::Open,
      elements: 0,
    }
  }

  /// Current state.
  pub fn state(&self) -> TriggerState {
    self.state
  }

  /// The firing policy.
  pub fn policy(&self) -> TriggerPolicy {
    self.policy
  }

  /// Number of elements added so far.
  pub fn elements(&self) -> usize {
    self.elements
  }

  /// Returns true once the trigger reached its terminal state.
  pub fn is_closed(&self) -> bool {
    self.state == TriggerState::Closed
  }

  /// Takes over the elements of a trigger whose window merged into this one.
  pub fn absorb(&mut self, other: &WindowTrigger) {
    self.elements += other.elements;
  }

  /// Advances the state machine.
  ///
  /// Events on a closed trigger are rejected: a closed window never reopens.
  pub fn on_event(&mut self, event: TriggerEvent) -> Result<TriggerResult, WindowError> {
    if self.state == TriggerState::Closed {
      return Err(WindowError::WindowClosed(format!(
        "{:?} delivered to a closed {:?} trigger",
        event, self.policy
      )));
    }

    let result = match (event, self.policy) {
      (TriggerEvent::Element, TriggerPolicy::CountFull(n)) => {
        self.elements += 1;
        if self.elements >= n {
          TriggerResult::FireAndPurge
        } else {
          TriggerResult::Continue
        }
      }
      (TriggerEvent::Element, _) => {
        self.elements += 1;
        TriggerResult::Continue
      }
      (TriggerEvent::LaterWindowObserved, TriggerPolicy::EndOfWindow { .. }) => {
        TriggerResult::FireAndPurge
      }
      (TriggerEvent::GapObserved, TriggerPolicy::SessionGap) => TriggerResult::FireAndPurge,
      (TriggerEvent::UpstreamClosed, TriggerPolicy::Attached) => TriggerResult::FireAndPurge,
      (TriggerEvent::EarlyTimer, TriggerPolicy::EndOfWindow { early: Some(_) }) => {
        TriggerResult::Fire
      }
      (TriggerEvent::EndOfStream, _) => TriggerResult::FireAndPurge,
      _ => TriggerResult::Continue,
    };

    self.state = match (result, self.state) {
      (TriggerResult::FireAndPurge, _) => TriggerState::Closed,
      (TriggerResult::Fire, TriggerState::EarlyFired(n)) => TriggerState::EarlyFired(n + 1),
      (TriggerResult::Fire, _) => TriggerState::EarlyFired(1),
      (TriggerResult::Continue, state) => state,
    };
    Ok(result)
  }
}

impl fmt::Display for WindowTrigger {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:?}/{:?}", self.policy, self.state)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_count_trigger_fires_on_nth_element() {
    let mut trigger = WindowTrigger::new(TriggerPolicy::CountFull(3));
    assert_eq!(trigger.on_event(TriggerEvent::Element), Ok(TriggerResult::Continue));
    assert_eq!(trigger.on_event(TriggerEvent::Element), Ok(TriggerResult::Continue));
    assert_eq!(
      trigger.on_event(TriggerEvent::Element),
      Ok(TriggerResult::FireAndPurge)
    );
    assert!(trigger.is_closed());
  }

  #[test]
  fn test_closed_trigger_rejects_events() {
    let mut trigger = WindowTrigger::new(TriggerPolicy::SessionGap);
    assert_eq!(
      trigger.on_event(TriggerEvent::EndOfStream),
      Ok(TriggerResult::FireAndPurge)
    );
    assert!(matches!(
      trigger.on_event(TriggerEvent::Element),
      Err(WindowError::WindowClosed(_))
    ));
  }

  #[test]
  fn test_early_timer_moves_through_early_fired() {
    let mut trigger = WindowTrigger::new(TriggerPolicy::EndOfWindow {
      early: Some(Duration::from_millis(10)),
    });
    trigger.on_event(TriggerEvent::Element).unwrap();
    assert_eq!(trigger.on_event(TriggerEvent::EarlyTimer), Ok(TriggerResult::Fire));
    assert_eq!(trigger.state(), TriggerState::EarlyFired(1));
    assert_eq!(trigger.on_event(TriggerEvent::EarlyTimer), Ok(TriggerResult::Fire));
    assert_eq!(trigger.state(), TriggerState::EarlyFired(2));
    assert_eq!(
      trigger.on_event(TriggerEvent::LaterWindowObserved),
      Ok(TriggerResult::FireAndPurge)
    );
    assert_eq!(trigger.state(), TriggerState::Closed);
  }

  #[test]
  fn test_early_timer_ignored_without_period() {
    let mut trigger = WindowTrigger::new(TriggerPolicy::EndOfWindow { early: None });
    assert_eq!(
      trigger.on_event(TriggerEvent::EarlyTimer),
      Ok(TriggerResult::Continue)
    );
    assert_eq!(trigger.state(), TriggerState::Open);
  }

  #[test]
  fn test_events_for_other_policies_continue() {
    let mut attached = WindowTrigger::new(TriggerPolicy::Attached);
    assert_eq!(
      attached.on_event(TriggerEvent::LaterWindowObserved),
      Ok(TriggerResult::Continue)
    );
    assert_eq!(
      attached.on_event(TriggerEvent::UpstreamClosed),
      Ok(TriggerResult::FireAndPurge)
    );

    let mut session = WindowTrigger::new(TriggerPolicy::SessionGap);
    assert_eq!(
      session.on_event(TriggerEvent::UpstreamClosed),
      Ok(TriggerResult::Continue)
    );
    assert_eq!(
      session.on_event(TriggerEvent::GapObserved),
      Ok(TriggerResult::FireAndPurge)
    );
  }

  #[test]
  fn test_end_of_stream_closes_partial_count_window() {
    let mut trigger = WindowTrigger::new(TriggerPolicy::CountFull(3));
    trigger.on_event(TriggerEvent::Element).unwrap();
    assert_eq!(trigger.elements(), 1);
    assert_eq!(
      trigger.on_event(TriggerEvent::EndOfStream),
      Ok(TriggerResult::FireAndPurge)
    );
  }
}
