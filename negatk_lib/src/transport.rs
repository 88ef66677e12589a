//! Ordered message passing between the foreground consumer and the search worker.
//!
//! Messages are encoded to [`serde_json::Value`] before they are handed to the
//! underlying channel, so each side only ever holds its own decoded copy. The
//! channel is FIFO and never drops or duplicates a message; a hung-up peer is
//! reported as [`TransportError::Closed`].

use crate::messages::{FailureReason, RequestId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::mpsc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
   #[error("channel closed")]
   Closed,
   #[error("failed to encode message: {0}")]
   Encode(#[source] serde_json::Error),
   #[error("failed to decode message: {0}")]
   Decode(#[source] serde_json::Error),
}

impl TransportError {
   pub fn reason(&self) -> FailureReason {
      match self {
         TransportError::Closed => FailureReason::ChannelClosed,
         TransportError::Encode(_) | TransportError::Decode(_) => FailureReason::DecodeFailure,
      }
   }
}

/// One side of a bidirectional channel: sends `Out`, receives values that decode as `In`.
pub struct Endpoint<Out, In> {
   sender: mpsc::Sender<Value>,
   receiver: mpsc::Receiver<Value>,
   _marker: PhantomData<fn(Out) -> In>,
}

/// Creates two connected endpoints.
pub fn channel<A, B>() -> (Endpoint<A, B>, Endpoint<B, A>) {
   let (a_tx, a_rx) = mpsc::channel(); // A to B
   let (b_tx, b_rx) = mpsc::channel(); // B to A
   (
      Endpoint {
         sender: a_tx,
         receiver: b_rx,
         _marker: PhantomData,
      },
      Endpoint {
         sender: b_tx,
         receiver: a_rx,
         _marker: PhantomData,
      },
   )
}

impl<Out: Serialize, In: DeserializeOwned> Endpoint<Out, In> {
   pub fn send(&self, message: &Out) -> Result<(), TransportError> {
      let value = serde_json::to_value(message).map_err(TransportError::Encode)?;
      self.send_value(value)
   }

   /// Sends an already encoded value, well-formed or not.
   pub fn send_value(&self, value: Value) -> Result<(), TransportError> {
      self.sender.send(value).map_err(|_| TransportError::Closed)
   }

   pub fn recv(&self) -> Result<Value, TransportError> {
      self.receiver.recv().map_err(|_| TransportError::Closed)
   }

   /// `Ok(None)` when nothing has arrived yet.
   pub fn try_recv(&self) -> Result<Option<Value>, TransportError> {
      match self.receiver.try_recv() {
         Ok(value) => Ok(Some(value)),
         Err(mpsc::TryRecvError::Empty) => Ok(None),
         Err(mpsc::TryRecvError::Disconnected) => Err(TransportError::Closed),
      }
   }

   /// `Ok(None)` when `timeout` passes without a message.
   pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Value>, TransportError> {
      match self.receiver.recv_timeout(timeout) {
         Ok(value) => Ok(Some(value)),
         Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
         Err(mpsc::RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
      }
   }

   pub fn decode(value: Value) -> Result<In, TransportError> {
      decode(value)
   }
}

pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, TransportError> {
   serde_json::from_value(value).map_err(TransportError::Decode)
}

/// Best effort: the `requestId` of a payload that may not decode as a whole.
pub fn request_id_of(value: &Value) -> Option<RequestId> {
   value.get("requestId").and_then(Value::as_u64)
}
