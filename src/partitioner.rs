//! # Partitioners
//!
//! Decide which output partition of a shuffle an element goes to. The
//! returned value is reduced modulo the number of output partitions.

use crate::window::GroupTag;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Chooses a target partition for an element.
pub trait Partitioner<T>: Send + Sync {
  /// Returns the target partition (taken modulo the partition count).
  fn partition(&self, element: &T) -> usize;
}

impl<T, F> Partitioner<T> for F
where
  F: Fn(&T) -> usize + Send + Sync,
{
  fn partition(&self, element: &T) -> usize {
    self(element)
  }
}

/// Partitions by the hash of the element; equal elements always land in the
/// same partition.
#[derive(Debug)]
pub struct HashPartitioner<T> {
  _marker: PhantomData<fn(&T)>,
}

impl<T> Default for HashPartitioner<T> {
  fn default() -> Self {
    Self {
      _marker: PhantomData,
    }
  }
}

impl<T> HashPartitioner<T> {
  /// Creates a hash partitioner.
  pub fn new() -> Self {
    Self::default()
  }
}

impl<T: Hash> Partitioner<T> for HashPartitioner<T> {
  fn partition(&self, element: &T) -> usize {
    GroupTag::of(element).0 as usize
  }
}

/// Spreads elements evenly in arrival order.
#[derive(Debug, Default)]
pub struct RoundRobinPartitioner {
  next: AtomicUsize,
}

impl RoundRobinPartitioner {
  /// Creates a round-robin partitioner.
  pub fn new() -> Self {
    Self::default()
  }
}

impl<T> Partitioner<T> for RoundRobinPartitioner {
  fn partition(&self, _element: &T) -> usize {
    self.next.fetch_add(1, Ordering::Relaxed)
  }
}

/// Picks a random partition for every element.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPartitioner;

impl<T> Partitioner<T> for RandomPartitioner {
  fn partition(&self, _element: &T) -> usize {
    rand::random::<usize>()
  }
}
