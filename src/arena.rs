//! Arena of live session records.
//!
//! Sessions change identity when they merge. Records are addressed by
//! stable ids; a merge allocates a new record and retires its constituents
//! so that no window is ever referenced after being superseded.

use crate::window::{GroupTag, SessionWindow};
use std::collections::HashMap;

/// Stable id of a session record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u64);

/// A live session and its per-key state.
#[derive(Debug)]
pub struct SessionRecord<S> {
  /// The session's current window.
  pub window: SessionWindow<GroupTag>,
  /// State attached to the session.
  pub state: S,
}

/// Owner of all live session records of a partition.
#[derive(Debug)]
pub struct SessionArena<S> {
  records: HashMap<RecordId, SessionRecord<S>>,
  next_id: u64,
}

impl<S> Default for SessionArena<S> {
  fn default() -> Self {
    Self {
      records: HashMap::new(),
      next_id: 0,
    }
  }
}

impl<S> SessionArena<S> {
  /// Creates an empty arena.
  pub fn new() -> Self {
    Self::default()
  }

  /// Allocates a record for a new session.
  pub fn allocate(&mut self, window: SessionWindow<GroupTag>, state: S) -> RecordId {
    let id = RecordId(self.next_id);
    self.next_id += 1;
    self.records.insert(id, SessionRecord { window, state });
    id
  }

  /// Returns a live record.
  pub fn get(&self, id: RecordId) -> Option<&SessionRecord<S>> {
    self.records.get(&id)
  }

  /// Returns a live record mutably.
  pub fn get_mut(&mut self, id: RecordId) -> Option<&mut SessionRecord<S>> {
    self.records.get_mut(&id)
  }

  /// Removes a record, e.g. once its session fired.
  pub fn remove(&mut self, id: RecordId) -> Option<SessionRecord<S>> {
    self.records.remove(&id)
  }

  /// Replaces `superseded` by one new record covering `window`.
  ///
  /// The states of the superseded records are folded into `state` with
  /// `absorb`, in the order given. Ids that are not live are skipped.
  pub fn merge<E>(
    &mut self,
    superseded: &[RecordId],
    window: SessionWindow<GroupTag>,
    mut state: S,
    mut absorb: impl FnMut(&mut S, S) -> Result<(), E>,
  ) -> Result<RecordId, E> {
    for id in superseded {
      if let Some(record) = self.records.remove(id) {
        absorb(&mut state, record.state)?;
      }
    }
    Ok(self.allocate(window, state))
  }

  /// Number of live records.
  pub fn len(&self) -> usize {
    self.records.len()
  }

  /// Returns true if no record is live.
  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }
}
