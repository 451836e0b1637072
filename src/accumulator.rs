//! # Accumulators
//!
//! Per-(key, window) running aggregates.
//!
//! An [`Aggregator`] either folds every value into a single partial
//! aggregate ([`AggregateMode::Combinable`]) or buffers all values until the
//! window fires ([`AggregateMode::FullReduce`]). Merging two accumulators
//! (session merges) preserves every contribution exactly once.
//!
//! Accumulators are owned by the partition processing their key; they are
//! never shared between tasks.

use crate::error::BoxError;
use std::fmt;
use std::sync::Arc;

/// How an aggregator maintains its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateMode {
  /// Values are folded into one partial aggregate of the value type.
  Combinable,
  /// Values are retained until the window fires.
  FullReduce,
}

/// State of a single (key, window) aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator<V> {
  /// Folded partial aggregate; `None` until the first value.
  Partial(Option<V>),
  /// Every value added so far, in arrival order.
  Buffered(Vec<V>),
}

impl<V> Accumulator<V> {
  /// Returns true if no value was added.
  pub fn is_empty(&self) -> bool {
    match self {
      Accumulator::Partial(value) => value.is_none(),
      Accumulator::Buffered(values) => values.is_empty(),
    }
  }

  fn into_values(self) -> Vec<V> {
    match self {
      Accumulator::Partial(value) => value.into_iter().collect(),
      Accumulator::Buffered(values) => values,
    }
  }
}

/// Aggregation function of a window-wise operator.
pub trait Aggregator<V>: Send + Sync {
  /// Type of the emitted aggregate.
  type Output;

  /// The aggregation mode.
  fn mode(&self) -> AggregateMode;

  /// Creates an empty accumulator.
  fn create(&self) -> Accumulator<V> {
    match self.mode() {
      AggregateMode::Combinable => Accumulator::Partial(None),
      AggregateMode::FullReduce => Accumulator::Buffered(Vec::new()),
    }
  }

  /// Adds a value.
  fn add(&self, acc: &mut Accumulator<V>, value: V) -> Result<(), BoxError>;

  /// Merges `other` into `into`.
  fn merge(&self, into: &mut Accumulator<V>, other: Accumulator<V>) -> Result<(), BoxError> {
    for value in other.into_values() {
      self.add(into, value)?;
    }
    Ok(())
  }

  /// Computes the current aggregate without consuming the accumulator.
  fn snapshot(&self, acc: &Accumulator<V>) -> Result<Option<Self::Output>, BoxError>;

  /// Computes the final aggregate. Empty accumulators produce nothing.
  fn finish(&self, acc: Accumulator<V>) -> Result<Option<Self::Output>, BoxError>;
}

type CombineFn<V> = Arc<dyn Fn(V, V) -> Result<V, BoxError> + Send + Sync>;
type ReduceFn<V, R> = Arc<dyn Fn(Vec<V>) -> Result<R, BoxError> + Send + Sync>;

/// Associative, commutative binary combine.
pub struct Combine<V> {
  combine: CombineFn<V>,
}

impl<V> Combine<V> {
  /// Wraps a fallible combine function.
  pub fn new<F>(combine: F) -> Self
  where
    F: Fn(V, V) -> Result<V, BoxError> + Send + Sync + 'static,
  {
    Self {
      combine: Arc::new(combine),
    }
  }

  fn fold(&self, slot: &mut Option<V>, value: V) -> Result<(), BoxError> {
    let folded = match slot.take() {
      Some(current) => (self.combine)(current, value)?,
      None => value,
    };
    *slot = Some(folded);
    Ok(())
  }
}

impl<V> fmt::Debug for Combine<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Combine")
  }
}

impl<V: Clone + Send> Aggregator<V> for Combine<V> {
  type Output = V;

  fn mode(&self) -> AggregateMode {
    AggregateMode::Combinable
  }

  fn add(&self, acc: &mut Accumulator<V>, value: V) -> Result<(), BoxError> {
    match acc {
      Accumulator::Partial(slot) => self.fold(slot, value),
      Accumulator::Buffered(values) => {
        values.push(value);
        Ok(())
      }
    }
  }

  fn snapshot(&self, acc: &Accumulator<V>) -> Result<Option<V>, BoxError> {
    self.finish(acc.clone())
  }

  fn finish(&self, acc: Accumulator<V>) -> Result<Option<V>, BoxError> {
    let mut folded = None;
    for value in acc.into_values() {
      self.fold(&mut folded, value)?;
    }
    Ok(folded)
  }
}

/// Reduction over the complete collection of a window's values.
pub struct Reduce<V, R> {
  reduce: ReduceFn<V, R>,
}

impl<V, R> Reduce<V, R> {
  /// Wraps a fallible reduce function.
  pub fn new<F>(reduce: F) -> Self
  where
    F: Fn(Vec<V>) -> Result<R, BoxError> + Send + Sync + 'static,
  {
    Self {
      reduce: Arc::new(reduce),
    }
  }
}

impl<V, R> fmt::Debug for Reduce<V, R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Reduce")
  }
}

impl<V: Clone + Send, R> Aggregator<V> for Reduce<V, R> {
  type Output = R;

  fn mode(&self) -> AggregateMode {
    AggregateMode::FullReduce
  }

  fn add(&self, acc: &mut Accumulator<V>, value: V) -> Result<(), BoxError> {
    match acc {
      Accumulator::Buffered(values) => values.push(value),
      Accumulator::Partial(slot) => {
        let mut values: Vec<V> = slot.take().into_iter().collect();
        values.push(value);
        *acc = Accumulator::Buffered(values);
      }
    }
    Ok(())
  }

  fn snapshot(&self, acc: &Accumulator<V>) -> Result<Option<R>, BoxError> {
    self.finish(acc.clone())
  }

  fn finish(&self, acc: Accumulator<V>) -> Result<Option<R>, BoxError> {
    let values = acc.into_values();
    if values.is_empty() {
      return Ok(None);
    }
    (self.reduce)(values).map(Some)
  }
}

/// A collection reduce declared combinable by its author.
///
/// The function is applied incrementally: the first value becomes
/// `f([v])`, every further value `f([acc, v])`.
pub struct CombinableReduce<V> {
  reduce: ReduceFn<V, V>,
}

impl<V> CombinableReduce<V> {
  /// Wraps a fallible combinable reduce function.
  pub fn new<F>(reduce: F) -> Self
  where
    F: Fn(Vec<V>) -> Result<V, BoxError> + Send + Sync + 'static,
  {
    Self {
      reduce: Arc::new(reduce),
    }
  }

  fn fold(&self, slot: &mut Option<V>, value: V) -> Result<(), BoxError> {
    let folded = match slot.take() {
      Some(current) => (self.reduce)(vec![current, value])?,
      None => (self.reduce)(vec![value])?,
    };
    *slot = Some(folded);
    Ok(())
  }
}

impl<V> fmt::Debug for CombinableReduce<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("CombinableReduce")
  }
}

impl<V: Clone + Send> Aggregator<V> for CombinableReduce<V> {
  type Output = V;

  fn mode(&self) -> AggregateMode {
    AggregateMode::Combinable
  }

  fn add(&self, acc: &mut Accumulator<V>, value: V) -> Result<(), BoxError> {
    match acc {
      Accumulator::Partial(slot) => self.fold(slot, value),
      Accumulator::Buffered(values) => {
        values.push(value);
        Ok(())
      }
    }
  }

  fn merge(&self, into: &mut Accumulator<V>, other: Accumulator<V>) -> Result<(), BoxError> {
    match (into, other) {
      (Accumulator::Partial(slot), Accumulator::Partial(Some(value))) => match slot.take() {
        Some(current) => {
          *slot = Some((self.reduce)(vec![current, value])?);
          Ok(())
        }
        None => {
          *slot = Some(value);
          Ok(())
        }
      },
      (into, other) => {
        for value in other.into_values() {
          self.add(into, value)?;
        }
        Ok(())
      }
    }
  }

  fn snapshot(&self, acc: &Accumulator<V>) -> Result<Option<V>, BoxError> {
    self.finish(acc.clone())
  }

  fn finish(&self, acc: Accumulator<V>) -> Result<Option<V>, BoxError> {
    match acc {
      Accumulator::Partial(value) => Ok(value),
      Accumulator::Buffered(values) if values.is_empty() => Ok(None),
      Accumulator::Buffered(values) => (self.reduce)(values).map(Some),
    }
  }
}
