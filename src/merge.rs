//! # Session Merging
//!
//! Coalesces session windows whose intervals overlap or touch.
//!
//! Within one group the intervals are sorted by start and scanned left to
//! right. The next interval is absorbed into the current candidate when its
//! start is `<=` the candidate's end; a strict gap closes the candidate.
//! Candidates that absorbed nothing are not reported, so running the merge
//! on an already merged set yields no merges.

use crate::window::{SessionInterval, SessionWindow};

/// Computes the merges required by a set of live windows.
pub trait WindowMerger<W> {
  /// Returns every merge as `(merged-away windows, resulting window)`.
  ///
  /// Windows not taking part in any merge are left out.
  fn merge_windows(&self, windows: &[W]) -> Vec<(Vec<W>, W)>;
}

/// Merges intervals of a single group.
///
/// Returns the indices (into `intervals`) absorbed by each merge together
/// with the covering interval.
pub fn merge_intervals(intervals: &[SessionInterval]) -> Vec<(Vec<usize>, SessionInterval)> {
  let mut order: Vec<usize> = (0..intervals.len()).collect();
  order.sort_by_key(|&i| (intervals[i].start_millis(), intervals[i].end_millis()));

  let mut merges = Vec::new();
  let mut current: Option<(Vec<usize>, SessionInterval)> = None;
  for i in order {
    let next = intervals[i];
    match current.as_mut() {
      Some((members, span)) if next.start_millis() <= span.end_millis() => {
        members.push(i);
        *span = span.span(&next);
      }
      _ => {
        if let Some((members, span)) = current.take() {
          if members.len() > 1 {
            merges.push((members, span));
          }
        }
        current = Some((vec![i], next));
      }
    }
  }
  if let Some((members, span)) = current {
    if members.len() > 1 {
      merges.push((members, span));
    }
  }
  merges
}

/// Merges session windows of any number of groups.
///
/// Sessions are only ever merged with sessions of the same group.
pub fn merge_session_windows<G>(
  windows: &[SessionWindow<G>],
) -> Vec<(Vec<SessionWindow<G>>, SessionWindow<G>)>
where
  G: Ord + Clone,
{
  let mut by_group: Vec<&SessionWindow<G>> = windows.iter().collect();
  by_group.sort_by(|a, b| a.group().cmp(b.group()));

  let mut merges = Vec::new();
  for group in by_group.chunk_by(|a, b| a.group() == b.group()) {
    let intervals: Vec<SessionInterval> = group.iter().map(|w| w.interval()).collect();
    for (members, span) in merge_intervals(&intervals) {
      let merged_away = members.iter().map(|&i| group[i].clone()).collect();
      merges.push((merged_away, SessionWindow::new(group[0].group().clone(), span)));
    }
  }
  merges
}
