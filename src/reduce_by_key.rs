//! # Reduce By Key
//!
//! Keyed window-wise aggregation.
//!
//! ```rust
//! use streamweave_windowing::flow::Flow;
//! use streamweave_windowing::reduce_by_key::ReduceByKey;
//! use streamweave_windowing::sink::ListSink;
//! use streamweave_windowing::source::ListSource;
//! use streamweave_windowing::windowing::CountWindowing;
//!
//! # async fn example() -> Result<(), streamweave_windowing::error::FlowError> {
//! let flow = Flow::create("counts");
//! let words = flow.create_input(ListSource::bounded(vec![vec!["a", "b", "a"]]));
//! let sink = ListSink::new(1);
//! ReduceByKey::of(words)
//!   .key_by(|word: &&str| word.to_string())
//!   .value_by(|_| 1u64)
//!   .combine_by(|a, b| a + b)
//!   .window_by(CountWindowing::of(2))
//!   .output()?
//!   .persist(sink.clone())?;
//! flow.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Elements are shuffled by key, or by session group when the sessions are
//! grouped by something other than the key, so every window is aggregated
//! in a single partition. The result is a dataset of [`WindowedPair`]s (or plain
//! pairs via [`output`](ReduceByKeyOperator::output)) labelled with their
//! window; a downstream operator with attached windowing reuses the labels.

use crate::accumulator::{Aggregator, CombinableReduce, Combine, Reduce};
use crate::dataset::{Dataset, UpstreamInfo, UpstreamWindowing};
use crate::error::{BoxError, ComponentInfo, FlowError};
use crate::flow::Flow;
use crate::message::Origin;
use crate::operator::{LateData, OperatorFns, ResolvedWindowing, WindowOperator, run_partition};
use crate::partitioner::{HashPartitioner, Partitioner};
use crate::shuffle::{RouteFn, exchange};
use crate::sink::LateDataCollector;
use crate::window::{GroupTag, LateDataPolicy, Window};
use crate::windowing::{TimeWindowing, Windowing};
use std::hash::Hash;
use std::sync::Arc;
use tracing::info;

/// A result of a window-wise operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowedPair<K, V> {
  window: Window,
  key: K,
  value: V,
}

impl<K, V> WindowedPair<K, V> {
  /// Creates a pair.
  pub fn new(window: Window, key: K, value: V) -> Self {
    Self { window, key, value }
  }

  /// The window the value was aggregated over.
  pub fn window(&self) -> &Window {
    &self.window
  }

  /// The reduce key.
  pub fn key(&self) -> &K {
    &self.key
  }

  /// The aggregate.
  pub fn value(&self) -> &V {
    &self.value
  }

  /// Drops the window.
  pub fn into_pair(self) -> (K, V) {
    (self.key, self.value)
  }
}

/// Entry point of the reduce-by-key builder.
pub struct ReduceByKey;

impl ReduceByKey {
  /// Starts building a keyed aggregation of `input`.
  pub fn of<T: Send + 'static>(input: Dataset<T>) -> KeyBy<T> {
    KeyBy { input }
  }
}

/// Builder step choosing the key.
pub struct KeyBy<T> {
  input: Dataset<T>,
}

impl<T: Send + 'static> KeyBy<T> {
  /// Sets the key extractor.
  pub fn key_by<K, F>(self, key_fn: F) -> ValueBy<T, K>
  where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    F: Fn(&T) -> K + Send + Sync + 'static,
  {
    ValueBy {
      input: self.input,
      key_fn: Arc::new(key_fn),
    }
  }
}

/// Builder step choosing the value.
pub struct ValueBy<T, K> {
  input: Dataset<T>,
  key_fn: Arc<dyn Fn(&T) -> K + Send + Sync>,
}

impl<T: Send + 'static, K> ValueBy<T, K> {
  /// Sets the value extractor.
  pub fn value_by<V, F>(self, value_fn: F) -> ReduceBy<T, K, V>
  where
    V: Clone + Send + 'static,
    F: Fn(&T) -> V + Send + Sync + 'static,
  {
    ReduceBy {
      input: self.input,
      key_fn: self.key_fn,
      value_fn: Arc::new(value_fn),
    }
  }
}

/// Builder step choosing the aggregation.
pub struct ReduceBy<T, K, V> {
  input: Dataset<T>,
  key_fn: Arc<dyn Fn(&T) -> K + Send + Sync>,
  value_fn: Arc<dyn Fn(&T) -> V + Send + Sync>,
}

impl<T, K, V> ReduceBy<T, K, V>
where
  T: Send + 'static,
  K: Hash + Eq + Clone + Send + Sync + 'static,
  V: Clone + Send + 'static,
{
  /// Aggregates with an associative, commutative binary function.
  pub fn combine_by<F>(self, combine: F) -> ReduceByKeyOperator<T, K, V, V>
  where
    F: Fn(V, V) -> V + Send + Sync + 'static,
  {
    self.aggregate_by(Combine::new(move |a: V, b: V| Ok(combine(a, b))))
  }

  /// Like [`combine_by`](Self::combine_by) with a fallible function.
  pub fn try_combine_by<F>(self, combine: F) -> ReduceByKeyOperator<T, K, V, V>
  where
    F: Fn(V, V) -> Result<V, BoxError> + Send + Sync + 'static,
  {
    self.aggregate_by(Combine::new(combine))
  }

  /// Aggregates the complete collection of each window's values.
  pub fn reduce_by<R, F>(self, reduce: F) -> ReduceByKeyOperator<T, K, V, R>
  where
    R: Send + 'static,
    F: Fn(Vec<V>) -> R + Send + Sync + 'static,
  {
    self.aggregate_by(Reduce::new(move |values: Vec<V>| Ok(reduce(values))))
  }

  /// Like [`reduce_by`](Self::reduce_by) with a fallible function.
  pub fn try_reduce_by<R, F>(self, reduce: F) -> ReduceByKeyOperator<T, K, V, R>
  where
    R: Send + 'static,
    F: Fn(Vec<V>) -> Result<R, BoxError> + Send + Sync + 'static,
  {
    self.aggregate_by(Reduce::new(reduce))
  }

  /// Aggregates with a collection reduce that may be applied to partial
  /// results.
  pub fn combinable_reduce_by<F>(self, reduce: F) -> ReduceByKeyOperator<T, K, V, V>
  where
    F: Fn(Vec<V>) -> V + Send + Sync + 'static,
  {
    self.aggregate_by(CombinableReduce::new(move |values: Vec<V>| Ok(reduce(values))))
  }

  /// Aggregates with a custom aggregator.
  pub fn aggregate_by<R, A>(self, aggregator: A) -> ReduceByKeyOperator<T, K, V, R>
  where
    R: Send + 'static,
    A: Aggregator<V, Output = R> + 'static,
  {
    ReduceByKeyOperator {
      input: self.input,
      fns: OperatorFns {
        key_fn: self.key_fn,
        value_fn: self.value_fn,
        aggregator: Arc::new(aggregator),
      },
      windowing: None,
      num_partitions: None,
      late_data: None,
      name: None,
    }
  }
}

/// A configured reduce-by-key operator.
pub struct ReduceByKeyOperator<T, K, V, R> {
  input: Dataset<T>,
  fns: OperatorFns<T, K, V, R>,
  windowing: Option<Windowing<T>>,
  num_partitions: Option<usize>,
  late_data: Option<LateDataCollector<T>>,
  name: Option<String>,
}

impl<T, K, V, R> ReduceByKeyOperator<T, K, V, R>
where
  T: Send + 'static,
  K: Hash + Eq + Clone + Send + Sync + 'static,
  V: Clone + Send + 'static,
  R: Send + 'static,
{
  /// Sets the windowing. Without one the operator attaches to the windowing
  /// of its input, or uses processing-time windows directly after a source.
  pub fn window_by(mut self, windowing: impl Into<Windowing<T>>) -> Self {
    self.windowing = Some(windowing.into());
    self
  }

  /// Number of output partitions; defaults to the input's.
  pub fn set_num_partitions(mut self, partitions: usize) -> Self {
    self.num_partitions = Some(partitions);
    self
  }

  /// Sends late elements to `collector` instead of dropping them.
  pub fn late_data_output(mut self, collector: LateDataCollector<T>) -> Self {
    self.late_data = Some(collector);
    self
  }

  /// Names the operator in logs, errors and statistics.
  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Builds the operator; each output element is a key with its aggregate,
  /// labelled with its window.
  pub fn output(self) -> Result<Dataset<(K, R)>, FlowError> {
    Ok(self.output_windowed()?.map(WindowedPair::into_pair))
  }

  /// Builds the operator, keeping the window in each output element.
  pub fn output_windowed(self) -> Result<Dataset<WindowedPair<K, R>>, FlowError> {
    let (flow, partitions, lineage, upstream) = self.input.into_parts();
    let id = flow.next_node_id();
    let component = ComponentInfo::new(
      self
        .name
        .unwrap_or_else(|| format!("reduce_by_key-{}", id.0)),
      "ReduceByKey".to_string(),
    );

    let windowing = resolve(self.windowing, upstream, &flow)
      .map_err(|e| match e {
        FlowError::Config(message) => FlowError::Config(format!("{}: {}", component, message)),
        other => other,
      })?;

    let policy = if self.late_data.is_some() {
      LateDataPolicy::SideOutput
    } else {
      flow.config().late_data
    };
    if policy == LateDataPolicy::SideOutput && self.late_data.is_none() {
      return Err(FlowError::Config(format!(
        "{}: late data side output requested without a collector",
        component
      )));
    }

    let num_partitions = self
      .num_partitions
      .unwrap_or_else(|| partitions.len().max(1));
    if num_partitions == 0 {
      return Err(FlowError::Config(format!(
        "{}: needs at least one partition",
        component
      )));
    }

    let key_fn = self.fns.key_fn.clone();
    let assigner = match &windowing {
      ResolvedWindowing::Assigned(assigner) => Some(assigner.clone()),
      ResolvedWindowing::Attached(_) => None,
    };
    let by_key = HashPartitioner::<K>::new();
    let by_group = HashPartitioner::<GroupTag>::new();
    let route: RouteFn<T> = Arc::new(move |element: &T| {
      match assigner.as_ref().and_then(|a| a.routing_group(element)) {
        Some(group) => by_group.partition(&group),
        None => by_key.partition(&key_fn(element)),
      }
    });
    let inputs = exchange(&flow, partitions, num_partitions, lineage, route);

    let stats = flow.register_stats(component.clone());
    let clock = flow.clock();
    info!(
      operator = %component,
      partitions = num_partitions,
      attached = matches!(windowing, ResolvedWindowing::Attached(_)),
      "building window-wise operator"
    );

    let outputs = inputs
      .into_iter()
      .enumerate()
      .map(|(partition, input)| {
        let operator = WindowOperator::new(
          component.clone(),
          Origin::new(id, partition),
          self.fns.clone(),
          windowing.clone(),
          clock.clone(),
          LateData::new(policy, self.late_data.clone()),
          stats.clone(),
        );
        run_partition(input, operator)
      })
      .collect();

    Ok(Dataset::new(
      flow,
      outputs,
      id,
      UpstreamWindowing::Operator(UpstreamInfo {
        operator: id,
        partitions: num_partitions,
      }),
    ))
  }
}

fn resolve<T: Send + 'static>(
  windowing: Option<Windowing<T>>,
  upstream: UpstreamWindowing,
  flow: &Flow,
) -> Result<ResolvedWindowing<T>, FlowError> {
  match windowing {
    Some(Windowing::Assigned(assigner)) => {
      assigner.validate()?;
      Ok(ResolvedWindowing::Assigned(assigner))
    }
    Some(Windowing::Attached) | None => match upstream {
      UpstreamWindowing::Operator(info) => Ok(ResolvedWindowing::Attached(info)),
      UpstreamWindowing::None => Ok(ResolvedWindowing::Assigned(Arc::new(
        TimeWindowing::<T>::millis(flow.config().processing_time_window_ms),
      ))),
      UpstreamWindowing::Ambiguous => Err(FlowError::Config(
        "cannot attach to the windowing of a union of windowed datasets; set an explicit windowing"
          .to_string(),
      )),
    },
  }
}
