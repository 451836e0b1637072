//! # Window Operator
//!
//! Per-partition state machine of a keyed window-wise operator.
//!
//! A [`WindowOperator`] owns every accumulator of the keys routed to its
//! partition and reacts to explicit events: an element arrived, an upstream
//! origin closed a window or finished, the early-trigger period elapsed, or
//! the input ended. Each event appends the resulting output messages to a
//! buffer; [`run_partition`] drives the operator over a partition stream.
//!
//! Closing rules:
//!
//! - Time: an element whose window starts at `s` closes every open window
//!   of its key ending at or before `s`; lateness is judged per key. A key
//!   not yet seen may still contribute to any window, so the partition
//!   announces time windows closed only at end-of-stream.
//! - Count: the Nth element of a (key, window) closes it. Count labels are
//!   scoped to their key and announced as soon as they fire.
//! - Session: an element at `ts` closes every session of its group ending
//!   strictly before `ts`.
//! - Attached: a label closes once every partition of the upstream
//!   operator closed it or finished.
//!
//! At end-of-stream every remaining window fires in label order.

use crate::accumulator::{Accumulator, Aggregator};
use crate::arena::{RecordId, SessionArena, SessionRecord};
use crate::clock::Clock;
use crate::dataset::UpstreamInfo;
use crate::error::{ComponentInfo, FlowError};
use crate::flow::PartitionStream;
use crate::merge::merge_intervals;
use crate::message::{Element, Notification, Origin, StreamMessage};
use crate::reduce_by_key::WindowedPair;
use crate::sink::LateDataCollector;
use crate::stats::OperatorStats;
use crate::trigger::{TriggerEvent, TriggerPolicy, TriggerResult, WindowTrigger};
use crate::window::{
  CountWindow, GroupTag, LateDataPolicy, SessionInterval, SessionWindow, TimeInterval, Window,
};
use crate::windowing::{AssignContext, WindowAssigner, WindowKind};
use async_stream::try_stream;
use futures::StreamExt;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

type Output<K, R> = StreamMessage<WindowedPair<K, R>>;

/// User functions of a keyed window-wise operator.
pub(crate) struct OperatorFns<T, K, V, R> {
  pub key_fn: Arc<dyn Fn(&T) -> K + Send + Sync>,
  pub value_fn: Arc<dyn Fn(&T) -> V + Send + Sync>,
  pub aggregator: Arc<dyn Aggregator<V, Output = R>>,
}

impl<T, K, V, R> Clone for OperatorFns<T, K, V, R> {
  fn clone(&self) -> Self {
    Self {
      key_fn: self.key_fn.clone(),
      value_fn: self.value_fn.clone(),
      aggregator: self.aggregator.clone(),
    }
  }
}

/// Windowing after resolving attached and source-attached operators.
pub(crate) enum ResolvedWindowing<T> {
  Assigned(Arc<dyn WindowAssigner<T>>),
  Attached(UpstreamInfo),
}

impl<T> Clone for ResolvedWindowing<T> {
  fn clone(&self) -> Self {
    match self {
      ResolvedWindowing::Assigned(assigner) => ResolvedWindowing::Assigned(assigner.clone()),
      ResolvedWindowing::Attached(info) => ResolvedWindowing::Attached(*info),
    }
  }
}

/// Where late elements go.
pub(crate) struct LateData<T> {
  policy: LateDataPolicy,
  collector: Option<LateDataCollector<T>>,
  warned: HashSet<Window>,
}

impl<T> LateData<T> {
  pub(crate) fn new(policy: LateDataPolicy, collector: Option<LateDataCollector<T>>) -> Self {
    Self {
      policy,
      collector,
      warned: HashSet::new(),
    }
  }

  fn handle(&mut self, component: &ComponentInfo, window: Window, element: T) {
    match (self.policy, &self.collector) {
      (LateDataPolicy::SideOutput, Some(collector)) => {
        debug!(operator = %component, window = %window, "late element sent to side output");
        collector.push(element);
      }
      _ => {
        if self.warned.insert(window.clone()) {
          warn!(operator = %component, window = %window, "dropping late element");
        } else {
          debug!(operator = %component, window = %window, "dropping late element");
        }
      }
    }
  }
}

enum Placement {
  Placed,
  Late(Window),
}

struct Slot<V> {
  acc: Accumulator<V>,
  trigger: WindowTrigger,
}

/// Emits results and notifications of one partition.
struct Emitter<V, R> {
  component: ComponentInfo,
  origin: Origin,
  aggregator: Arc<dyn Aggregator<V, Output = R>>,
  stats: Arc<OperatorStats>,
}

impl<V, R> Emitter<V, R> {
  fn open(&self, policy: TriggerPolicy) -> Slot<V> {
    Slot {
      acc: self.aggregator.create(),
      trigger: WindowTrigger::new(policy),
    }
  }

  fn add<K: Clone>(
    &self,
    window: &Window,
    key: &K,
    slot: &mut Slot<V>,
    value: V,
    out: &mut Vec<Output<K, R>>,
  ) -> Result<TriggerResult, FlowError> {
    self
      .aggregator
      .add(&mut slot.acc, value)
      .map_err(|e| FlowError::aggregation(&self.component, e))?;
    self.on_event(window, key, slot, TriggerEvent::Element, out)
  }

  fn absorb(&self, into: &mut Slot<V>, other: Slot<V>) -> Result<(), FlowError> {
    into.trigger.absorb(&other.trigger);
    self
      .aggregator
      .merge(&mut into.acc, other.acc)
      .map_err(|e| FlowError::aggregation(&self.component, e))
  }

  /// Feeds an event to the slot's trigger and emits what it decides.
  fn on_event<K: Clone>(
    &self,
    window: &Window,
    key: &K,
    slot: &mut Slot<V>,
    event: TriggerEvent,
    out: &mut Vec<Output<K, R>>,
  ) -> Result<TriggerResult, FlowError> {
    let result = slot.trigger.on_event(event)?;
    match result {
      TriggerResult::FireAndPurge => {
        let acc = std::mem::replace(&mut slot.acc, self.aggregator.create());
        let value = self
          .aggregator
          .finish(acc)
          .map_err(|e| FlowError::aggregation(&self.component, e))?;
        if let Some(value) = value {
          self.stats.record_fired();
          debug!(
            operator = %self.component,
            partition = self.origin.partition,
            window = %window,
            elements = slot.trigger.elements(),
            "window fired"
          );
          self.emit(window, key, value, out);
        }
      }
      TriggerResult::Fire => {
        let value = self
          .aggregator
          .snapshot(&slot.acc)
          .map_err(|e| FlowError::aggregation(&self.component, e))?;
        if let Some(value) = value {
          self.stats.record_early();
          trace!(operator = %self.component, window = %window, "early snapshot");
          self.emit(window, key, value, out);
        }
      }
      TriggerResult::Continue => {}
    }
    Ok(result)
  }

  fn emit<K: Clone>(&self, window: &Window, key: &K, value: R, out: &mut Vec<Output<K, R>>) {
    out.push(StreamMessage::Data(Element::windowed(
      window.clone(),
      WindowedPair::new(window.clone(), key.clone(), value),
    )));
  }

  fn closed<K>(&self, window: Window, out: &mut Vec<Output<K, R>>) {
    trace!(operator = %self.component, window = %window, "window closed");
    out.push(StreamMessage::WindowClosed(Notification {
      window,
      origin: self.origin,
    }));
  }
}

struct TimeKey<V> {
  open: BTreeMap<TimeInterval, Slot<V>>,
  closed_through: Option<i64>,
}

impl<V> Default for TimeKey<V> {
  fn default() -> Self {
    Self {
      open: BTreeMap::new(),
      closed_through: None,
    }
  }
}

struct TimeState<T, K, V> {
  assigner: Arc<dyn WindowAssigner<T>>,
  early: Option<Duration>,
  keys: HashMap<K, TimeKey<V>>,
  pending: BTreeSet<TimeInterval>,
}

impl<T, K: Hash + Eq + Clone, V: Clone> TimeState<T, K, V> {
  fn on_element<R>(
    &mut self,
    em: &Emitter<V, R>,
    key: K,
    value: V,
    payload: &T,
    ctx: &AssignContext,
    out: &mut Vec<Output<K, R>>,
  ) -> Result<Placement, FlowError> {
    let mut placed = false;
    let mut late = None;
    for window in self.assigner.assign_windows(payload, ctx) {
      let Some(interval) = window.as_time() else {
        continue;
      };
      let entry = self.keys.entry(key.clone()).or_default();

      let expired: Vec<TimeInterval> = entry
        .open
        .keys()
        .filter(|open| open.end_millis() <= interval.start_millis())
        .copied()
        .collect();
      for open in expired {
        if let Some(mut slot) = entry.open.remove(&open) {
          em.on_event(
            &Window::Time(open),
            &key,
            &mut slot,
            TriggerEvent::LaterWindowObserved,
            out,
          )?;
          entry.closed_through = entry.closed_through.max(Some(open.end_millis()));
        }
      }

      if !entry.open.contains_key(&interval)
        && entry.closed_through.is_some_and(|c| interval.end_millis() <= c)
      {
        late = Some(window);
        continue;
      }
      let early = self.early;
      let slot = entry
        .open
        .entry(interval)
        .or_insert_with(|| em.open(TriggerPolicy::EndOfWindow { early }));
      em.add(&window, &key, slot, value.clone(), out)?;
      self.pending.insert(interval);
      placed = true;
    }
    Ok(match (placed, late) {
      (false, Some(window)) => Placement::Late(window),
      _ => Placement::Placed,
    })
  }

  fn on_early_timer<R>(&mut self, em: &Emitter<V, R>, out: &mut Vec<Output<K, R>>) -> Result<(), FlowError> {
    for (key, entry) in self.keys.iter_mut() {
      for (window, slot) in entry.open.iter_mut() {
        em.on_event(&Window::Time(*window), key, slot, TriggerEvent::EarlyTimer, out)?;
      }
    }
    Ok(())
  }

  fn on_end_of_stream<R>(&mut self, em: &Emitter<V, R>, out: &mut Vec<Output<K, R>>) -> Result<(), FlowError> {
    let mut remaining = Vec::new();
    for (key, entry) in self.keys.drain() {
      for (window, slot) in entry.open {
        remaining.push((window, key.clone(), slot));
      }
    }
    remaining.sort_by_key(|(window, _, _)| *window);
    for (window, key, mut slot) in remaining {
      em.on_event(&Window::Time(window), &key, &mut slot, TriggerEvent::EndOfStream, out)?;
    }
    for window in std::mem::take(&mut self.pending) {
      em.closed(Window::Time(window), out);
    }
    Ok(())
  }
}

struct CountKey<V> {
  sequence: u64,
  open: Option<(CountWindow, Slot<V>)>,
}

impl<V> Default for CountKey<V> {
  fn default() -> Self {
    Self {
      sequence: 0,
      open: None,
    }
  }
}

struct CountState<T, K, V> {
  assigner: Arc<dyn WindowAssigner<T>>,
  size: usize,
  keys: HashMap<K, CountKey<V>>,
}

impl<T, K: Hash + Eq + Clone, V: Clone> CountState<T, K, V> {
  fn on_element<R>(
    &mut self,
    em: &Emitter<V, R>,
    key: K,
    value: V,
    payload: &T,
    mut ctx: AssignContext,
    out: &mut Vec<Output<K, R>>,
  ) -> Result<Placement, FlowError> {
    let entry = self.keys.entry(key.clone()).or_default();
    ctx.sequence = entry.sequence;
    entry.sequence += 1;

    for window in self.assigner.assign_windows(payload, &ctx) {
      let Window::Count(count) = window else {
        continue;
      };
      if entry.open.as_ref().is_some_and(|(open, _)| *open != count) {
        if let Some((open, mut slot)) = entry.open.take() {
          em.on_event(&Window::Count(open), &key, &mut slot, TriggerEvent::EndOfStream, out)?;
          em.closed(Window::Count(open), out);
        }
      }
      let size = self.size;
      let (_, slot) = entry
        .open
        .get_or_insert_with(|| (count, em.open(TriggerPolicy::CountFull(size))));
      if em.add(&window, &key, slot, value.clone(), out)? == TriggerResult::FireAndPurge {
        entry.open = None;
        em.closed(window, out);
      }
    }
    Ok(Placement::Placed)
  }

  fn on_end_of_stream<R>(&mut self, em: &Emitter<V, R>, out: &mut Vec<Output<K, R>>) -> Result<(), FlowError> {
    let mut remaining: Vec<(CountWindow, K, Slot<V>)> = self
      .keys
      .drain()
      .filter_map(|(key, entry)| entry.open.map(|(window, slot)| (window, key, slot)))
      .collect();
    remaining.sort_by_key(|(window, _, _)| *window);
    let mut closed = BTreeSet::new();
    for (window, key, mut slot) in remaining {
      em.on_event(&Window::Count(window), &key, &mut slot, TriggerEvent::EndOfStream, out)?;
      closed.insert(window);
    }
    for window in closed {
      em.closed(Window::Count(window), out);
    }
    Ok(())
  }
}

#[derive(Default)]
struct SessionGroup {
  live: Vec<RecordId>,
  closed_through: Option<i64>,
}

struct SessionState<T, K, V> {
  assigner: Arc<dyn WindowAssigner<T>>,
  arena: SessionArena<HashMap<K, Slot<V>>>,
  groups: HashMap<GroupTag, SessionGroup>,
}

impl<T, K: Hash + Eq + Clone, V: Clone> SessionState<T, K, V> {
  fn fire<R>(
    em: &Emitter<V, R>,
    record: SessionRecord<HashMap<K, Slot<V>>>,
    event: TriggerEvent,
    out: &mut Vec<Output<K, R>>,
  ) -> Result<(), FlowError> {
    let label = Window::Session(record.window);
    for (key, mut slot) in record.state {
      em.on_event(&label, &key, &mut slot, event, out)?;
    }
    em.closed(label, out);
    Ok(())
  }

  fn on_element<R>(
    &mut self,
    em: &Emitter<V, R>,
    key: K,
    value: V,
    payload: &T,
    ctx: &AssignContext,
    out: &mut Vec<Output<K, R>>,
  ) -> Result<Placement, FlowError> {
    let mut placed = false;
    let mut late = None;
    for window in self.assigner.assign_windows(payload, ctx) {
      let Some(session) = window.as_session().cloned() else {
        continue;
      };
      let timestamp = session.start_millis();
      let group_tag = *session.group();
      let group = self.groups.entry(group_tag).or_default();
      if group.closed_through.is_some_and(|c| timestamp <= c) {
        late = Some(window);
        continue;
      }

      let arena = &mut self.arena;
      let mut expired: Vec<(SessionInterval, RecordId)> = Vec::new();
      group.live.retain(|id| match arena.get(*id) {
        Some(record) if record.window.end_millis() < timestamp => {
          expired.push((record.window.interval(), *id));
          false
        }
        Some(_) => true,
        None => false,
      });
      expired.sort();
      for (interval, id) in expired {
        if let Some(record) = arena.remove(id) {
          Self::fire(em, record, TriggerEvent::GapObserved, out)?;
          group.closed_through = group.closed_through.max(Some(interval.end_millis()));
        }
      }

      let mut slot = em.open(TriggerPolicy::SessionGap);
      em.add(&window, &key, &mut slot, value.clone(), out)?;
      let mut slots = HashMap::new();
      slots.insert(key.clone(), slot);
      let id = arena.allocate(session, slots);
      group.live.push(id);
      placed = true;

      let live: Vec<(RecordId, SessionInterval)> = group
        .live
        .iter()
        .filter_map(|id| arena.get(*id).map(|record| (*id, record.window.interval())))
        .collect();
      let intervals: Vec<SessionInterval> = live.iter().map(|(_, interval)| *interval).collect();
      for (members, span) in merge_intervals(&intervals) {
        let superseded: Vec<RecordId> = members.iter().map(|&i| live[i].0).collect();
        let merged = arena.merge(
          &superseded,
          SessionWindow::new(group_tag, span),
          HashMap::new(),
          |into: &mut HashMap<K, Slot<V>>, other| {
            for (key, slot) in other {
              match into.entry(key) {
                Entry::Vacant(vacant) => {
                  vacant.insert(slot);
                }
                Entry::Occupied(mut occupied) => em.absorb(occupied.get_mut(), slot)?,
              }
            }
            Ok::<(), FlowError>(())
          },
        )?;
        group.live.retain(|id| !superseded.contains(id));
        group.live.push(merged);
        em.stats.record_merge();
        debug!(
          operator = %em.component,
          merged = superseded.len(),
          window = %span,
          "sessions merged"
        );
      }
    }
    Ok(match (placed, late) {
      (false, Some(window)) => Placement::Late(window),
      _ => Placement::Placed,
    })
  }

  fn on_end_of_stream<R>(&mut self, em: &Emitter<V, R>, out: &mut Vec<Output<K, R>>) -> Result<(), FlowError> {
    let mut remaining: Vec<SessionRecord<HashMap<K, Slot<V>>>> = Vec::new();
    for (_, group) in self.groups.drain() {
      for id in group.live {
        if let Some(record) = self.arena.remove(id) {
          remaining.push(record);
        }
      }
    }
    remaining.sort_by(|a, b| {
      a.window
        .interval()
        .cmp(&b.window.interval())
        .then_with(|| a.window.group().cmp(b.window.group()))
    });
    for record in remaining {
      Self::fire(em, record, TriggerEvent::EndOfStream, out)?;
    }
    Ok(())
  }
}

struct AttachedState<K, V> {
  upstream: UpstreamInfo,
  open: BTreeMap<Window, HashMap<K, Slot<V>>>,
  closed: HashMap<Window, HashSet<usize>>,
  announced: HashSet<Window>,
  done: HashSet<usize>,
}

impl<K: Hash + Eq + Clone, V> AttachedState<K, V> {
  fn on_element<R>(
    &mut self,
    em: &Emitter<V, R>,
    key: K,
    value: V,
    label: Option<Window>,
    out: &mut Vec<Output<K, R>>,
  ) -> Result<Placement, FlowError> {
    let window = label.ok_or_else(|| {
      FlowError::Config(format!(
        "{} received an element without a window label",
        em.component
      ))
    })?;
    let slots = self.open.entry(window.clone()).or_default();
    let slot = slots
      .entry(key.clone())
      .or_insert_with(|| em.open(TriggerPolicy::Attached));
    em.add(&window, &key, slot, value, out)?;
    Ok(Placement::Placed)
  }

  fn is_complete(&self, window: &Window) -> bool {
    let closed = self.closed.get(window);
    (0..self.upstream.partitions)
      .all(|p| self.done.contains(&p) || closed.is_some_and(|c| c.contains(&p)))
  }

  fn try_fire<R>(&mut self, em: &Emitter<V, R>, window: &Window, out: &mut Vec<Output<K, R>>) -> Result<(), FlowError> {
    if !self.is_complete(window) {
      return Ok(());
    }
    let fired = match self.open.remove(window) {
      Some(slots) => {
        for (key, mut slot) in slots {
          em.on_event(window, &key, &mut slot, TriggerEvent::UpstreamClosed, out)?;
        }
        true
      }
      None => false,
    };
    let first = self.announced.insert(window.clone());
    if fired || first {
      em.closed(window.clone(), out);
    }
    Ok(())
  }

  fn on_notification<R>(
    &mut self,
    em: &Emitter<V, R>,
    notification: Notification,
    out: &mut Vec<Output<K, R>>,
  ) -> Result<(), FlowError> {
    if notification.origin.operator != self.upstream.operator {
      return Ok(());
    }
    self
      .closed
      .entry(notification.window.clone())
      .or_default()
      .insert(notification.origin.partition);
    self.try_fire(em, &notification.window, out)
  }

  fn on_origin_done<R>(&mut self, em: &Emitter<V, R>, origin: Origin, out: &mut Vec<Output<K, R>>) -> Result<(), FlowError> {
    if origin.operator != self.upstream.operator {
      return Ok(());
    }
    self.done.insert(origin.partition);
    let mut candidates: Vec<Window> = self
      .open
      .keys()
      .chain(self.closed.keys())
      .cloned()
      .collect();
    candidates.sort();
    candidates.dedup();
    for window in candidates {
      self.try_fire(em, &window, out)?;
    }
    Ok(())
  }

  fn on_end_of_stream<R>(&mut self, em: &Emitter<V, R>, out: &mut Vec<Output<K, R>>) -> Result<(), FlowError> {
    for (window, slots) in std::mem::take(&mut self.open) {
      for (key, mut slot) in slots {
        em.on_event(&window, &key, &mut slot, TriggerEvent::EndOfStream, out)?;
      }
      em.closed(window, out);
    }
    Ok(())
  }
}

enum State<T, K, V> {
  Time(TimeState<T, K, V>),
  Count(CountState<T, K, V>),
  Session(SessionState<T, K, V>),
  Attached(AttachedState<K, V>),
}

/// One partition of a keyed window-wise operator.
pub(crate) struct WindowOperator<T, K, V, R> {
  emitter: Emitter<V, R>,
  key_fn: Arc<dyn Fn(&T) -> K + Send + Sync>,
  value_fn: Arc<dyn Fn(&T) -> V + Send + Sync>,
  clock: Arc<dyn Clock>,
  late: LateData<T>,
  state: State<T, K, V>,
}

impl<T, K, V, R> WindowOperator<T, K, V, R>
where
  K: Hash + Eq + Clone,
  V: Clone,
{
  pub(crate) fn new(
    component: ComponentInfo,
    origin: Origin,
    fns: OperatorFns<T, K, V, R>,
    windowing: ResolvedWindowing<T>,
    clock: Arc<dyn Clock>,
    late: LateData<T>,
    stats: Arc<OperatorStats>,
  ) -> Self {
    let state = match windowing {
      ResolvedWindowing::Assigned(assigner) => match assigner.kind() {
        WindowKind::Time => State::Time(TimeState {
          early: assigner.early_triggering_period(),
          assigner,
          keys: HashMap::new(),
          pending: BTreeSet::new(),
        }),
        WindowKind::Count(size) => State::Count(CountState {
          assigner,
          size,
          keys: HashMap::new(),
        }),
        WindowKind::Session => State::Session(SessionState {
          assigner,
          arena: SessionArena::new(),
          groups: HashMap::new(),
        }),
      },
      ResolvedWindowing::Attached(upstream) => State::Attached(AttachedState {
        upstream,
        open: BTreeMap::new(),
        closed: HashMap::new(),
        announced: HashSet::new(),
        done: HashSet::new(),
      }),
    };
    Self {
      emitter: Emitter {
        component,
        origin,
        aggregator: fns.aggregator,
        stats,
      },
      key_fn: fns.key_fn,
      value_fn: fns.value_fn,
      clock,
      late,
      state,
    }
  }

  /// Period of early snapshots, for time windows that request them.
  pub(crate) fn early_period(&self) -> Option<Duration> {
    match &self.state {
      State::Time(state) => state.early,
      _ => None,
    }
  }

  pub(crate) fn on_message(
    &mut self,
    message: StreamMessage<T>,
    out: &mut Vec<Output<K, R>>,
  ) -> Result<(), FlowError> {
    match message {
      StreamMessage::Data(element) => self.on_element(element, out),
      StreamMessage::WindowClosed(notification) => match &mut self.state {
        State::Attached(state) => state.on_notification(&self.emitter, notification, out),
        _ => Ok(()),
      },
      StreamMessage::OriginDone(origin) => match &mut self.state {
        State::Attached(state) => state.on_origin_done(&self.emitter, origin, out),
        _ => Ok(()),
      },
    }
  }

  fn on_element(&mut self, element: Element<T>, out: &mut Vec<Output<K, R>>) -> Result<(), FlowError> {
    self.emitter.stats.record_element();
    let key = (self.key_fn)(&element.payload);
    let value = (self.value_fn)(&element.payload);
    let ctx = AssignContext {
      arrival_millis: self.clock.now_millis(),
      sequence: 0,
      key_group: GroupTag::of(&key),
      upstream: element.window.clone(),
    };
    let em = &self.emitter;
    let placement = match &mut self.state {
      State::Time(state) => state.on_element(em, key, value, &element.payload, &ctx, out)?,
      State::Count(state) => state.on_element(em, key, value, &element.payload, ctx, out)?,
      State::Session(state) => state.on_element(em, key, value, &element.payload, &ctx, out)?,
      State::Attached(state) => state.on_element(em, key, value, element.window.clone(), out)?,
    };
    if let Placement::Late(window) = placement {
      self.emitter.stats.record_late();
      self.late.handle(&self.emitter.component, window, element.payload);
    }
    Ok(())
  }

  pub(crate) fn on_early_timer(&mut self, out: &mut Vec<Output<K, R>>) -> Result<(), FlowError> {
    match &mut self.state {
      State::Time(state) => state.on_early_timer(&self.emitter, out),
      _ => Ok(()),
    }
  }

  pub(crate) fn on_end_of_stream(&mut self, out: &mut Vec<Output<K, R>>) -> Result<(), FlowError> {
    let em = &self.emitter;
    match &mut self.state {
      State::Time(state) => state.on_end_of_stream(em, out)?,
      State::Count(state) => state.on_end_of_stream(em, out)?,
      State::Session(state) => state.on_end_of_stream(em, out)?,
      State::Attached(state) => state.on_end_of_stream(em, out)?,
    }
    debug!(operator = %em.component, partition = em.origin.partition, "partition finished");
    out.push(StreamMessage::OriginDone(em.origin));
    Ok(())
  }
}

enum Step<M> {
  Input(Option<M>),
  Tick,
}

/// Drives an operator over one partition.
pub(crate) fn run_partition<T, K, V, R>(
  mut input: PartitionStream<T>,
  mut operator: WindowOperator<T, K, V, R>,
) -> PartitionStream<WindowedPair<K, R>>
where
  T: Send + 'static,
  K: Hash + Eq + Clone + Send + Sync + 'static,
  V: Clone + Send + 'static,
  R: Send + 'static,
{
  Box::pin(try_stream! {
    let mut ticker = operator.early_period().map(|period| {
      let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      ticker
    });
    let mut out = Vec::new();
    loop {
      let step = match ticker.as_mut() {
        Some(ticker) => tokio::select! {
          message = input.next() => Step::Input(message),
          _ = ticker.tick() => Step::Tick,
        },
        None => Step::Input(input.next().await),
      };
      match step {
        Step::Input(Some(message)) => operator.on_message(message?, &mut out)?,
        Step::Input(None) => {
          operator.on_end_of_stream(&mut out)?;
          for message in out.drain(..) {
            yield message;
          }
          break;
        }
        Step::Tick => operator.on_early_timer(&mut out)?,
      }
      for message in out.drain(..) {
        yield message;
      }
    }
  })
}
