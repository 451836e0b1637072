//! # Sinks
//!
//! Partitioned outputs of a flow, and the collector for late elements.

use crate::error::BoxError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

/// A partitioned output.
///
/// Partitions are written concurrently; elements of one partition arrive in
/// the order the partition produced them.
#[async_trait]
pub trait DataSink<T>: Send + Sync {
  /// Number of partitions the sink accepts.
  fn num_partitions(&self) -> usize;

  /// Writes one element to a partition.
  async fn write(&self, partition: usize, element: T) -> Result<(), BoxError>;

  /// Called once a partition received its last element.
  async fn commit(&self, _partition: usize) -> Result<(), BoxError> {
    Ok(())
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// An in-memory sink keeping one list per partition.
#[derive(Debug, Clone)]
pub struct ListSink<T> {
  outputs: Arc<Mutex<Vec<Vec<T>>>>,
}

impl<T> ListSink<T> {
  /// A sink with `partitions` partitions.
  pub fn new(partitions: usize) -> Self {
    Self {
      outputs: Arc::new(Mutex::new((0..partitions).map(|_| Vec::new()).collect())),
    }
  }
}

impl<T: Clone> ListSink<T> {
  /// Copies the elements of every partition.
  pub fn outputs(&self) -> Vec<Vec<T>> {
    lock(&self.outputs).clone()
  }

  /// Copies the elements of one partition.
  pub fn output(&self, partition: usize) -> Vec<T> {
    lock(&self.outputs)
      .get(partition)
      .cloned()
      .unwrap_or_default()
  }
}

#[async_trait]
impl<T: Send + 'static> DataSink<T> for ListSink<T> {
  fn num_partitions(&self) -> usize {
    lock(&self.outputs).len()
  }

  async fn write(&self, partition: usize, element: T) -> Result<(), BoxError> {
    let mut outputs = lock(&self.outputs);
    let target = outputs
      .get_mut(partition)
      .ok_or_else(|| format!("no such partition: {}", partition))?;
    target.push(element);
    Ok(())
  }
}

/// Collects late elements of window-wise operators using
/// [`LateDataPolicy::SideOutput`](crate::window::LateDataPolicy::SideOutput).
#[derive(Debug)]
pub struct LateDataCollector<T> {
  elements: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for LateDataCollector<T> {
  fn clone(&self) -> Self {
    Self {
      elements: self.elements.clone(),
    }
  }
}

impl<T> Default for LateDataCollector<T> {
  fn default() -> Self {
    Self {
      elements: Arc::new(Mutex::new(Vec::new())),
    }
  }
}

impl<T> LateDataCollector<T> {
  /// Creates an empty collector.
  pub fn new() -> Self {
    Self::default()
  }

  /// Records a late element.
  pub fn push(&self, element: T) {
    lock(&self.elements).push(element);
  }

  /// Number of late elements collected.
  pub fn len(&self) -> usize {
    lock(&self.elements).len()
  }

  /// Returns true if nothing was collected.
  pub fn is_empty(&self) -> bool {
    lock(&self.elements).is_empty()
  }
}

impl<T: Clone> LateDataCollector<T> {
  /// Copies the collected elements.
  pub fn elements(&self) -> Vec<T> {
    lock(&self.elements).clone()
  }
}
