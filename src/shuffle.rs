//! # Shuffles
//!
//! Redistribution of elements between partitions.
//!
//! Every input partition is drained by its own driver task which routes
//! `Data` to one output partition and broadcasts control messages to all of
//! them. Each output partition is a bounded channel fed by all drivers.
//!
//! On the receiving side a [`NotificationBarrier`] forwards a control
//! message only once every driver that carries it has delivered its copy.
//! Since a channel preserves the order of each sender, every element a
//! driver routed before a notification is then already in the output.

use crate::error::FlowError;
use crate::flow::{Flow, PartitionStream};
use crate::message::{NodeId, Notification, Origin, StreamMessage};
use async_stream::stream;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::trace;

/// Routing function of a shuffle.
pub(crate) type RouteFn<T> = Arc<dyn Fn(&T) -> usize + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ControlKey {
  Closed(Notification),
  Done(Origin),
}

/// Deduplicates broadcast control messages on one output partition.
///
/// A control message of operator `X` is carried by a single driver when the
/// shuffle input is `X`'s own output partitioning, otherwise by every
/// driver. Copies are counted per driver, so a message repeated by its
/// origin passes once per round of copies.
#[derive(Debug)]
pub struct NotificationBarrier {
  input_lineage: NodeId,
  senders: usize,
  pending: HashMap<ControlKey, HashMap<usize, usize>>,
}

impl NotificationBarrier {
  /// Creates a barrier for a shuffle with `senders` drivers whose input has
  /// lineage `input_lineage`.
  pub fn new(input_lineage: NodeId, senders: usize) -> Self {
    Self {
      input_lineage,
      senders,
      pending: HashMap::new(),
    }
  }

  fn expected(&self, origin: &Origin) -> usize {
    if origin.operator == self.input_lineage {
      1
    } else {
      self.senders
    }
  }

  /// Admits a message from driver `sender`; returns it when it may pass.
  pub fn admit<T>(&mut self, sender: usize, message: StreamMessage<T>) -> Option<StreamMessage<T>> {
    let key = match &message {
      StreamMessage::Data(_) => return Some(message),
      StreamMessage::WindowClosed(notification) => ControlKey::Closed(notification.clone()),
      StreamMessage::OriginDone(origin) => ControlKey::Done(*origin),
    };
    let expected = match &key {
      ControlKey::Closed(notification) => self.expected(&notification.origin),
      ControlKey::Done(origin) => self.expected(origin),
    };
    let copies = self.pending.entry(key.clone()).or_default();
    *copies.entry(sender).or_default() += 1;
    if copies.len() < expected {
      trace!(sender, seen = copies.len(), expected, "holding control message");
      return None;
    }
    copies.retain(|_, count| {
      *count -= 1;
      *count > 0
    });
    if copies.is_empty() {
      self.pending.remove(&key);
    }
    Some(message)
  }
}

/// Shuffles `inputs` into `num_outputs` partitions.
///
/// Driver tasks are registered with the flow and start when it runs.
pub(crate) fn exchange<T: Send + 'static>(
  flow: &Flow,
  inputs: Vec<PartitionStream<T>>,
  num_outputs: usize,
  input_lineage: NodeId,
  route: RouteFn<T>,
) -> Vec<PartitionStream<T>> {
  let capacity = flow.config().channel_capacity;
  let senders = inputs.len();
  let (txs, rxs): (Vec<_>, Vec<_>) = (0..num_outputs)
    .map(|_| mpsc::channel::<(usize, StreamMessage<T>)>(capacity))
    .unzip();

  for (sender, input) in inputs.into_iter().enumerate() {
    flow.add_task(Box::pin(drive(sender, input, txs.clone(), route.clone())));
  }
  drop(txs);

  rxs
    .into_iter()
    .map(|rx| {
      let mut barrier = NotificationBarrier::new(input_lineage, senders);
      let output: PartitionStream<T> = Box::pin(stream! {
        let mut messages = ReceiverStream::new(rx);
        while let Some((sender, message)) = messages.next().await {
          if let Some(message) = barrier.admit(sender, message) {
            yield Ok(message);
          }
        }
      });
      output
    })
    .collect()
}

async fn drive<T: Send + 'static>(
  sender: usize,
  mut input: PartitionStream<T>,
  outputs: Vec<mpsc::Sender<(usize, StreamMessage<T>)>>,
  route: RouteFn<T>,
) -> Result<(), FlowError> {
  while let Some(message) = input.next().await {
    match message? {
      StreamMessage::Data(element) => {
        let target = route(&element.payload) % outputs.len();
        trace!(sender, target, "routing element");
        if outputs[target]
          .send((sender, StreamMessage::Data(element)))
          .await
          .is_err()
        {
          return Ok(());
        }
      }
      control => {
        for output in &outputs {
          let copy = match control.control_copy() {
            Some(copy) => copy,
            None => continue,
          };
          if output.send((sender, copy)).await.is_err() {
            return Ok(());
          }
        }
      }
    }
  }
  Ok(())
}
