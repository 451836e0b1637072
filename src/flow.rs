//! # Flows
//!
//! A [`Flow`] owns the dataflow being built and runs it.
//!
//! Building a dataflow only wires lazy partition streams together. Shuffle
//! drivers and sink writers are registered as tasks and start when
//! [`Flow::run`] is awaited; every task runs concurrently and the run ends
//! when all of them finished, the first of them failed, or the flow was
//! cancelled.
//!
//! ```rust
//! use streamweave_windowing::flow::Flow;
//! use streamweave_windowing::sink::ListSink;
//! use streamweave_windowing::source::ListSource;
//!
//! # async fn example() -> Result<(), streamweave_windowing::error::FlowError> {
//! let flow = Flow::create("doubling");
//! let sink = ListSink::new(1);
//! flow
//!   .create_input(ListSource::bounded(vec![vec![1, 2, 3]]))
//!   .map(|x| x * 2)
//!   .persist(sink.clone())?;
//! flow.run().await?;
//! assert_eq!(sink.output(0), vec![2, 4, 6]);
//! # Ok(())
//! # }
//! ```

use crate::clock::{Clock, SystemClock};
use crate::config::FlowConfig;
use crate::dataset::{Dataset, UpstreamWindowing};
use crate::error::{ComponentInfo, FlowError};
use crate::message::{Element, NodeId, StreamMessage};
use crate::source::DataSource;
use crate::stats::{OperatorReport, OperatorStats};
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// One partition of a dataset.
pub type PartitionStream<T> = BoxStream<'static, Result<StreamMessage<T>, FlowError>>;

/// A task of a flow run.
pub(crate) type FlowTask = BoxFuture<'static, Result<(), FlowError>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct FlowInner {
  config: FlowConfig,
  clock: RwLock<Arc<dyn Clock>>,
  next_node: AtomicU64,
  tasks: Mutex<Vec<FlowTask>>,
  stats: Mutex<Vec<(ComponentInfo, Arc<OperatorStats>)>>,
  cancel: CancellationToken,
}

/// A dataflow under construction, and its executor.
#[derive(Clone)]
pub struct Flow {
  inner: Arc<FlowInner>,
}

impl std::fmt::Debug for Flow {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Flow")
      .field("name", &self.inner.config.name)
      .field("pending_tasks", &lock(&self.inner.tasks).len())
      .finish()
  }
}

impl Flow {
  /// Creates a flow with the default configuration.
  pub fn create(name: &str) -> Self {
    Self::build(FlowConfig::new(name))
  }

  /// Creates a flow with an explicit configuration.
  pub fn from_config(config: FlowConfig) -> Result<Self, FlowError> {
    config.validate()?;
    Ok(Self::build(config))
  }

  fn build(config: FlowConfig) -> Self {
    Self {
      inner: Arc::new(FlowInner {
        config,
        clock: RwLock::new(Arc::new(SystemClock)),
        next_node: AtomicU64::new(0),
        tasks: Mutex::new(Vec::new()),
        stats: Mutex::new(Vec::new()),
        cancel: CancellationToken::new(),
      }),
    }
  }

  /// Replaces the processing-time clock of operators built afterwards.
  pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
    *self
      .inner
      .clock
      .write()
      .unwrap_or_else(|poisoned| poisoned.into_inner()) = clock;
    self
  }

  /// The flow's configuration.
  pub fn config(&self) -> &FlowConfig {
    &self.inner.config
  }

  /// The flow's name.
  pub fn name(&self) -> &str {
    &self.inner.config.name
  }

  pub(crate) fn clock(&self) -> Arc<dyn Clock> {
    self
      .inner
      .clock
      .read()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .clone()
  }

  pub(crate) fn next_node_id(&self) -> NodeId {
    NodeId(self.inner.next_node.fetch_add(1, Ordering::Relaxed))
  }

  pub(crate) fn add_task(&self, task: FlowTask) {
    lock(&self.inner.tasks).push(task);
  }

  pub(crate) fn register_stats(&self, component: ComponentInfo) -> Arc<OperatorStats> {
    let stats = Arc::new(OperatorStats::default());
    lock(&self.inner.stats).push((component, stats.clone()));
    stats
  }

  /// Statistics of every window-wise operator.
  pub fn stats(&self) -> Vec<OperatorReport> {
    lock(&self.inner.stats)
      .iter()
      .map(|(component, stats)| OperatorReport {
        component: component.clone(),
        stats: stats.snapshot(),
      })
      .collect()
  }

  /// Token aborting the run when cancelled.
  pub fn cancellation_token(&self) -> CancellationToken {
    self.inner.cancel.clone()
  }

  /// Creates a dataset reading from a source.
  pub fn create_input<T, S>(&self, source: S) -> Dataset<T>
  where
    T: Send + 'static,
    S: DataSource<T>,
  {
    let partitions = source
      .into_partitions()
      .into_iter()
      .map(|partition| {
        let stream: PartitionStream<T> = Box::pin(partition.map(|item| {
          item
            .map(|payload| StreamMessage::Data(Element::new(payload)))
            .map_err(FlowError::Source)
        }));
        stream
      })
      .collect();
    Dataset::new(
      self.clone(),
      partitions,
      self.next_node_id(),
      UpstreamWindowing::None,
    )
  }

  /// Runs every registered task to completion.
  ///
  /// Returns the first error of any task; the remaining tasks are aborted
  /// and their state discarded. Cancelling the flow's token aborts the run
  /// with [`FlowError::Cancelled`].
  pub async fn run(&self) -> Result<(), FlowError> {
    let tasks = std::mem::take(&mut *lock(&self.inner.tasks));
    info!(flow = %self.name(), tasks = tasks.len(), "starting flow");

    let mut set = JoinSet::new();
    for task in tasks {
      set.spawn(task);
    }

    let result = loop {
      tokio::select! {
        _ = self.inner.cancel.cancelled() => {
          set.abort_all();
          break Err(FlowError::Cancelled);
        }
        next = set.join_next() => match next {
          None => break Ok(()),
          Some(Ok(Ok(()))) => {}
          Some(Ok(Err(e))) => {
            set.abort_all();
            break Err(e);
          }
          Some(Err(e)) => {
            set.abort_all();
            break Err(FlowError::Task(e.to_string()));
          }
        }
      }
    };

    match &result {
      Ok(()) => {
        for report in self.stats() {
          info!(
            flow = %self.name(),
            operator = %report.component,
            elements = report.stats.elements,
            windows_fired = report.stats.windows_fired,
            early_firings = report.stats.early_firings,
            merges = report.stats.merges,
            late_elements = report.stats.late_elements,
            "operator finished"
          );
        }
        info!(flow = %self.name(), "flow finished");
      }
      Err(e) => error!(flow = %self.name(), error = %e, "flow aborted"),
    }
    result
  }
}
