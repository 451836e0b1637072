//! # Sources
//!
//! Partitioned inputs of a flow.

use crate::error::BoxError;
use async_stream::stream;
use futures::stream::BoxStream;
use std::time::Duration;

/// A partitioned input.
pub trait DataSource<T>: Send {
  /// Number of partitions the source produces.
  fn num_partitions(&self) -> usize;

  /// Consumes the source into one stream per partition.
  fn into_partitions(self) -> Vec<BoxStream<'static, Result<T, BoxError>>>
  where
    Self: Sized;
}

/// An in-memory source with one list per partition.
///
/// A bounded source is read as fast as the flow consumes it. An unbounded
/// source simulates an arrival rate by sleeping before every element.
#[derive(Debug, Clone)]
pub struct ListSource<T> {
  partitions: Vec<Vec<T>>,
  sleep: Option<Duration>,
  bounded: bool,
}

impl<T> ListSource<T> {
  /// A bounded source over the given partitions.
  pub fn bounded(partitions: Vec<Vec<T>>) -> Self {
    Self {
      partitions,
      sleep: None,
      bounded: true,
    }
  }

  /// An unbounded source over the given partitions.
  pub fn unbounded(partitions: Vec<Vec<T>>) -> Self {
    Self {
      partitions,
      sleep: None,
      bounded: false,
    }
  }

  /// Sleeps `sleep` before emitting each element of an unbounded source.
  /// Bounded sources ignore it.
  pub fn set_sleep_time(mut self, sleep: Duration) -> Self {
    self.sleep = Some(sleep);
    self
  }

  /// Returns true for bounded sources.
  pub fn is_bounded(&self) -> bool {
    self.bounded
  }
}

impl<T: Send + 'static> DataSource<T> for ListSource<T> {
  fn num_partitions(&self) -> usize {
    self.partitions.len()
  }

  fn into_partitions(self) -> Vec<BoxStream<'static, Result<T, BoxError>>> {
    let sleep = if self.bounded { None } else { self.sleep };
    self
      .partitions
      .into_iter()
      .map(|items| {
        let s: BoxStream<'static, Result<T, BoxError>> = Box::pin(stream! {
          for item in items {
            if let Some(delay) = sleep {
              tokio::time::sleep(delay).await;
            }
            yield Ok(item);
          }
        });
        s
      })
      .collect()
  }
}
