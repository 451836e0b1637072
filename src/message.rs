//! # Stream Messages
//!
//! The envelope carried by every partition stream.
//!
//! Data elements travel together with the window label assigned by the
//! nearest upstream window-wise operator. Window-wise operators also emit
//! control messages describing their progress:
//!
//! - [`StreamMessage::WindowClosed`]: one origin partition will emit no more
//!   data for a window
//! - [`StreamMessage::OriginDone`]: one origin partition reached end-of-stream
//!
//! Element-wise operators forward control messages untouched; shuffles
//! broadcast them to every output partition.

use crate::window::Window;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an operator (or lineage) in a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// An output partition of a window-wise operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
  /// The window-wise operator.
  pub operator: NodeId,
  /// The operator's output partition.
  pub partition: usize,
}

impl Origin {
  /// Creates an origin.
  pub fn new(operator: NodeId, partition: usize) -> Self {
    Self {
      operator,
      partition,
    }
  }
}

/// A window closed by one origin partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Notification {
  /// The closed window.
  pub window: Window,
  /// The partition that closed it.
  pub origin: Origin,
}

/// A data element with its window label.
#[derive(Debug, Clone, PartialEq)]
pub struct Element<T> {
  /// Label assigned by the nearest upstream window-wise operator.
  pub window: Option<Window>,
  /// The element itself.
  pub payload: T,
}

impl<T> Element<T> {
  /// An unlabelled element, as produced by sources.
  pub fn new(payload: T) -> Self {
    Self {
      window: None,
      payload,
    }
  }

  /// A labelled element.
  pub fn windowed(window: Window, payload: T) -> Self {
    Self {
      window: Some(window),
      payload,
    }
  }

  /// Transforms the payload, keeping the label.
  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Element<U> {
    Element {
      window: self.window,
      payload: f(self.payload),
    }
  }
}

/// Message flowing through a partition stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage<T> {
  /// A data element.
  Data(Element<T>),
  /// An origin partition closed a window.
  WindowClosed(Notification),
  /// An origin partition finished.
  OriginDone(Origin),
}

impl<T> StreamMessage<T> {
  /// Returns the element if this is `Data`.
  #[inline]
  pub fn data(&self) -> Option<&Element<T>> {
    match self {
      Self::Data(element) => Some(element),
      _ => None,
    }
  }

  /// Returns `true` if this is `Data`.
  #[inline]
  pub fn is_data(&self) -> bool {
    matches!(self, Self::Data(_))
  }

  /// Returns the origin of a control message.
  pub fn origin(&self) -> Option<Origin> {
    match self {
      Self::Data(_) => None,
      Self::WindowClosed(notification) => Some(notification.origin),
      Self::OriginDone(origin) => Some(*origin),
    }
  }

  /// Re-types a control message; gives `Data` back unchanged.
  pub fn into_control<U>(self) -> Result<StreamMessage<U>, Element<T>> {
    match self {
      Self::Data(element) => Err(element),
      Self::WindowClosed(notification) => Ok(StreamMessage::WindowClosed(notification)),
      Self::OriginDone(origin) => Ok(StreamMessage::OriginDone(origin)),
    }
  }

  /// Copies a control message; `None` for `Data`.
  pub fn control_copy<U>(&self) -> Option<StreamMessage<U>> {
    match self {
      Self::Data(_) => None,
      Self::WindowClosed(notification) => Some(StreamMessage::WindowClosed(notification.clone())),
      Self::OriginDone(origin) => Some(StreamMessage::OriginDone(*origin)),
    }
  }
}
