use crate::adapter::Player;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Interthread Communication Messages
//
// Everything here crosses the transport as a JSON value, never by reference.

pub type RequestId = u64;

/// Tags a result that could not be traced back to a request. Never assigned to a request.
pub const UNATTRIBUTED: RequestId = 0;

// Interface to Engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InterfaceMessage<S> {
   Search(SearchRequest<S>), // Search `depth_limit` plies and respond with the best move
}

// Engine to Interface
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EngineMessage<M> {
   Result(SearchResult<M>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest<S> {
   pub request_id: RequestId,
   pub player: Player,
   pub depth_limit: u32,
   pub state: S,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult<M> {
   pub request_id: RequestId,
   pub outcome: Outcome<M>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Outcome<M> {
   Move {
      #[serde(rename = "move")]
      a_move: M,
   },
   /// No legal move at the root: the game is over, not broken.
   NoMove,
   Error { reason: FailureReason },
}

impl<M> Outcome<M> {
   pub fn failed(reason: FailureReason) -> Outcome<M> {
      Outcome::Error { reason }
   }

   pub fn is_error(&self) -> bool {
      matches!(self, Outcome::Error { .. })
   }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
   /// The adapter faulted while searching the submitted state
   #[error("malformed-state")]
   MalformedState,
   #[error("channel-closed")]
   ChannelClosed,
   #[error("decode-failure")]
   DecodeFailure,
}
