//! # Datasets
//!
//! A [`Dataset`] is a partitioned stream of elements inside a [`Flow`].
//!
//! Element-wise operators ([`map`](Dataset::map),
//! [`flat_map`](Dataset::flat_map), [`filter`](Dataset::filter)) work on each
//! partition in place, keep every element's window label, and forward
//! control messages. [`repartition`](Dataset::repartition) shuffles
//! elements without touching their labels, so a downstream window-wise
//! operator attached to the same upstream windowing reconstructs the same
//! windows regardless of partitioning.

use crate::error::FlowError;
use crate::flow::{Flow, PartitionStream};
use crate::message::{Element, NodeId, StreamMessage};
use crate::partitioner::{Partitioner, RandomPartitioner, RoundRobinPartitioner};
use crate::shuffle::{RouteFn, exchange};
use crate::sink::DataSink;
use async_stream::try_stream;
use futures::StreamExt;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// An output partitioning of a window-wise operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamInfo {
  /// The window-wise operator.
  pub operator: NodeId,
  /// Its number of output partitions.
  pub partitions: usize,
}

/// Windowing carried by a dataset's elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamWindowing {
  /// No window-wise operator precedes the dataset.
  None,
  /// Elements carry the labels of this operator.
  Operator(UpstreamInfo),
  /// Elements come from several window-wise operators.
  Ambiguous,
}

/// A partitioned collection of elements.
pub struct Dataset<T> {
  flow: Flow,
  partitions: Vec<PartitionStream<T>>,
  lineage: NodeId,
  windowing: UpstreamWindowing,
}

impl<T> fmt::Debug for Dataset<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Dataset")
      .field("partitions", &self.partitions.len())
      .field("lineage", &self.lineage)
      .field("windowing", &self.windowing)
      .finish()
  }
}

impl<T: Send + 'static> Dataset<T> {
  pub(crate) fn new(
    flow: Flow,
    partitions: Vec<PartitionStream<T>>,
    lineage: NodeId,
    windowing: UpstreamWindowing,
  ) -> Self {
    Self {
      flow,
      partitions,
      lineage,
      windowing,
    }
  }

  pub(crate) fn into_parts(self) -> (Flow, Vec<PartitionStream<T>>, NodeId, UpstreamWindowing) {
    (self.flow, self.partitions, self.lineage, self.windowing)
  }

  /// The flow this dataset belongs to.
  pub fn flow(&self) -> &Flow {
    &self.flow
  }

  /// Number of partitions.
  pub fn num_partitions(&self) -> usize {
    self.partitions.len()
  }

  /// Windowing carried by the elements.
  pub fn windowing(&self) -> UpstreamWindowing {
    self.windowing
  }

  /// Transforms every element.
  pub fn map<U, F>(self, f: F) -> Dataset<U>
  where
    U: Send + 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
  {
    let f = Arc::new(f);
    let mapped = self
      .partitions
      .into_iter()
      .map(|partition| {
        let f = f.clone();
        let stream: PartitionStream<U> = Box::pin(partition.map(move |message| {
          message.map(|message| match message.into_control() {
            Ok(control) => control,
            Err(element) => StreamMessage::Data(element.map(|payload| f(payload))),
          })
        }));
        stream
      })
      .collect();
    Dataset {
      flow: self.flow,
      partitions: mapped,
      lineage: self.lineage,
      windowing: self.windowing,
    }
  }

  /// Transforms every element into zero or more elements with its label.
  pub fn flat_map<U, I, F>(self, f: F) -> Dataset<U>
  where
    U: Send + 'static,
    I: IntoIterator<Item = U>,
    F: Fn(T) -> I + Send + Sync + 'static,
  {
    let f = Arc::new(f);
    let partitions = self
      .partitions
      .into_iter()
      .map(|mut partition| {
        let f = f.clone();
        let stream: PartitionStream<U> = Box::pin(try_stream! {
          while let Some(message) = partition.next().await {
            match message?.into_control() {
              Ok(control) => yield control,
              Err(element) => {
                let items: Vec<U> = f(element.payload).into_iter().collect();
                for payload in items {
                  yield StreamMessage::Data(Element {
                    window: element.window.clone(),
                    payload,
                  });
                }
              }
            }
          }
        });
        stream
      })
      .collect();
    Dataset {
      flow: self.flow,
      partitions,
      lineage: self.lineage,
      windowing: self.windowing,
    }
  }

  /// Keeps the elements matching the predicate.
  pub fn filter<F>(self, predicate: F) -> Dataset<T>
  where
    F: Fn(&T) -> bool + Send + Sync + 'static,
  {
    let predicate = Arc::new(predicate);
    let partitions: Vec<PartitionStream<T>> = self
      .partitions
      .into_iter()
      .map(|partition| {
        let predicate = predicate.clone();
        let stream: PartitionStream<T> = Box::pin(partition.filter(move |message| {
          let keep = match message {
            Ok(StreamMessage::Data(element)) => predicate(&element.payload),
            _ => true,
          };
          futures::future::ready(keep)
        }));
        stream
      })
      .collect();
    Dataset {
      flow: self.flow,
      partitions,
      lineage: self.lineage,
      windowing: self.windowing,
    }
  }

  /// Concatenates the partitions of two datasets of the same flow.
  ///
  /// The result carries a definite windowing only when neither side is
  /// windowed; otherwise a downstream attached operator is rejected.
  pub fn union(self, other: Dataset<T>) -> Dataset<T> {
    let windowing = match (self.windowing, other.windowing) {
      (UpstreamWindowing::None, UpstreamWindowing::None) => UpstreamWindowing::None,
      _ => UpstreamWindowing::Ambiguous,
    };
    let lineage = self.flow.next_node_id();
    let mut partitions = self.partitions;
    partitions.extend(other.partitions);
    Dataset {
      flow: self.flow,
      partitions,
      lineage,
      windowing,
    }
  }

  /// Starts building a repartition of this dataset.
  pub fn repartition(self) -> Repartition<T> {
    Repartition {
      input: self,
      num_partitions: None,
      partitioner: None,
    }
  }

  /// Writes the dataset to a sink.
  ///
  /// The dataset is redistributed round-robin when the sink has a different
  /// number of partitions.
  pub fn persist<S>(self, sink: S) -> Result<(), FlowError>
  where
    S: DataSink<T> + 'static,
  {
    let sink_partitions = sink.num_partitions();
    if sink_partitions == 0 {
      return Err(FlowError::Config("sink has no partitions".to_string()));
    }
    let input = if sink_partitions != self.num_partitions() {
      debug!(
        from = self.num_partitions(),
        to = sink_partitions,
        "repartitioning for sink"
      );
      self
        .repartition()
        .set_num_partitions(sink_partitions)
        .set_partitioner(RoundRobinPartitioner::new())
        .output()?
    } else {
      self
    };

    let sink = Arc::new(sink);
    let flow = input.flow.clone();
    for (partition, mut stream) in input.partitions.into_iter().enumerate() {
      let sink = sink.clone();
      flow.add_task(Box::pin(async move {
        while let Some(message) = stream.next().await {
          if let StreamMessage::Data(element) = message? {
            sink
              .write(partition, element.payload)
              .await
              .map_err(FlowError::Sink)?;
          }
        }
        sink.commit(partition).await.map_err(FlowError::Sink)
      }));
    }
    Ok(())
  }
}

/// Builder of a repartition.
pub struct Repartition<T> {
  input: Dataset<T>,
  num_partitions: Option<usize>,
  partitioner: Option<Arc<dyn Partitioner<T>>>,
}

impl<T: Send + 'static> Repartition<T> {
  /// Number of output partitions; defaults to the flow's
  /// `default_partitions`.
  pub fn set_num_partitions(mut self, partitions: usize) -> Self {
    self.num_partitions = Some(partitions);
    self
  }

  /// Partitioner choosing each element's output partition; defaults to a
  /// random partitioner.
  pub fn set_partitioner<P>(mut self, partitioner: P) -> Self
  where
    P: Partitioner<T> + 'static,
  {
    self.partitioner = Some(Arc::new(partitioner));
    self
  }

  /// Builds the repartitioned dataset.
  pub fn output(self) -> Result<Dataset<T>, FlowError> {
    let (flow, partitions, lineage, windowing) = self.input.into_parts();
    let num_partitions = self
      .num_partitions
      .unwrap_or(flow.config().default_partitions);
    if num_partitions == 0 {
      return Err(FlowError::Config(
        "repartition needs at least one partition".to_string(),
      ));
    }
    let partitioner = self
      .partitioner
      .unwrap_or_else(|| Arc::new(RandomPartitioner));
    let route: RouteFn<T> = Arc::new(move |element: &T| partitioner.partition(element));
    let outputs = exchange(&flow, partitions, num_partitions, lineage, route);
    let lineage = flow.next_node_id();
    Ok(Dataset::new(flow, outputs, lineage, windowing))
  }
}
