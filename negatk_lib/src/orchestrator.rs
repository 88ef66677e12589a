//! Runs searches on a background thread and hands results back over the transport.
//!
//! The consumer holds an [`Orchestrator`], which never blocks on a search:
//! [`Orchestrator::submit`] returns as soon as the request is on the channel.
//! Only the newest request counts. A search that gets superseded still runs to
//! completion on the worker (a CPU-bound search can't be stopped from outside),
//! but its result carries its own request id and the handle drops it on
//! arrival.

use crate::adapter::{GameAdapter, Player};
use crate::engine;
use crate::messages::{
   EngineMessage, FailureReason, InterfaceMessage, Outcome, RequestId, SearchRequest, SearchResult, UNATTRIBUTED,
};
use crate::transport::{self, Endpoint, TransportError};
use log::{debug, error, trace, warn};
use serde_json::Value;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

pub type ConsumerEndpoint<A> =
   Endpoint<InterfaceMessage<<A as GameAdapter>::State>, EngineMessage<<A as GameAdapter>::Move>>;
pub type WorkerEndpoint<A> =
   Endpoint<EngineMessage<<A as GameAdapter>::Move>, InterfaceMessage<<A as GameAdapter>::State>>;

/// Serves search requests until the consumer hangs up.
///
/// Requests are answered one at a time, in arrival order, each with the id it
/// was sent with. Nothing raised while handling a request escapes this loop:
/// undecodable requests and adapter panics become error outcomes.
pub fn start<A: GameAdapter>(adapter: &A, endpoint: WorkerEndpoint<A>) {
   while let Ok(value) = endpoint.recv() {
      let result = handle(adapter, value);
      let request_id = result.request_id;
      match endpoint.send(&EngineMessage::Result(result)) {
         Ok(()) => (),
         Err(TransportError::Closed) => break,
         Err(e) => {
            error!("couldn't encode the result of request {}: {}", request_id, e);
            let fallback: EngineMessage<A::Move> = EngineMessage::Result(SearchResult {
               request_id,
               outcome: Outcome::failed(e.reason()),
            });
            if endpoint.send(&fallback).is_err() {
               break;
            }
         }
      }
   }
   debug!("consumer hung up, search worker stopping");
}

fn handle<A: GameAdapter>(adapter: &A, value: Value) -> SearchResult<A::Move> {
   let request_id = transport::request_id_of(&value);
   match transport::decode::<InterfaceMessage<A::State>>(value) {
      Ok(InterfaceMessage::Search(request)) => run_search(adapter, request),
      Err(e) => {
         warn!("undecodable search request {:?}: {}", request_id, e);
         SearchResult {
            request_id: request_id.unwrap_or(UNATTRIBUTED),
            outcome: Outcome::failed(FailureReason::DecodeFailure),
         }
      }
   }
}

/// Searches one request, turning an adapter panic into `malformed-state`.
pub fn run_search<A: GameAdapter>(adapter: &A, request: SearchRequest<A::State>) -> SearchResult<A::Move> {
   let SearchRequest {
      request_id,
      player,
      depth_limit,
      state,
   } = request;
   trace!("request {}: searching {} plies for {}", request_id, depth_limit, player);
   let searched = panic::catch_unwind(AssertUnwindSafe(|| {
      engine::negamax(adapter, depth_limit, player, &state)
   }));
   let outcome = match searched {
      Ok(Some(a_move)) => Outcome::Move { a_move },
      Ok(None) => Outcome::NoMove,
      Err(cause) => {
         warn!(
            "request {}: adapter faulted during search: {}",
            request_id,
            panic_message(cause.as_ref())
         );
         Outcome::failed(FailureReason::MalformedState)
      }
   };
   SearchResult { request_id, outcome }
}

fn panic_message(cause: &(dyn Any + Send)) -> &str {
   if let Some(s) = cause.downcast_ref::<&str>() {
      *s
   } else if let Some(s) = cause.downcast_ref::<String>() {
      s.as_str()
   } else {
      "unknown panic"
   }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
   Idle,
   Pending(RequestId),
}

#[derive(Clone, Copy)]
enum Wait {
   Poll,
   Block,
   Until(Instant),
}

/// Foreground handle to a search worker.
pub struct Orchestrator<A: GameAdapter> {
   endpoint: ConsumerEndpoint<A>,
   last_request_id: RequestId,
   status: Status,
   // failures detected on this side, delivered like any other result
   undelivered: VecDeque<SearchResult<A::Move>>,
}

impl<A> Orchestrator<A>
where
   A: GameAdapter + Send + 'static,
   A::State: 'static,
   A::Move: 'static,
{
   /// Starts a worker thread that owns `adapter`.
   ///
   /// The worker stops once the handle is dropped and its current search, if
   /// any, has finished.
   pub fn spawn(adapter: A) -> Orchestrator<A> {
      let (consumer, worker) = transport::channel();
      thread::spawn(move || {
         start(&adapter, worker);
      });
      Orchestrator::connect(consumer)
   }
}

impl<A: GameAdapter> Orchestrator<A> {
   /// A handle talking to whatever serves the other end of `endpoint`.
   ///
   /// Results tagged [`UNATTRIBUTED`] are taken as the answer to whichever
   /// request is pending, even if they were produced for an older one. [`start`]
   /// only uses that tag for a request it could not read an id from, which this
   /// handle never sends; a different worker should do the same.
   pub fn connect(endpoint: ConsumerEndpoint<A>) -> Orchestrator<A> {
      Orchestrator {
         endpoint,
         last_request_id: UNATTRIBUTED,
         status: Status::Idle,
         undelivered: VecDeque::new(),
      }
   }

   pub fn status(&self) -> Status {
      self.status
   }

   pub fn last_request_id(&self) -> RequestId {
      self.last_request_id
   }

   /// Asks for the best move for `player` in `state`, superseding any request
   /// still outstanding. Returns without waiting for the search.
   pub fn submit(&mut self, player: Player, depth_limit: u32, state: A::State) -> RequestId {
      self.last_request_id += 1;
      let request_id = self.last_request_id;
      if let Status::Pending(old) = self.status {
         debug!("request {} supersedes request {}", request_id, old);
      }
      self.status = Status::Pending(request_id);
      let request = InterfaceMessage::Search(SearchRequest {
         request_id,
         player,
         depth_limit,
         state,
      });
      if let Err(e) = self.endpoint.send(&request) {
         error!("couldn't deliver request {}: {}", request_id, e);
         self.undelivered.push_back(SearchResult {
            request_id,
            outcome: Outcome::failed(e.reason()),
         });
      }
      request_id
   }

   /// Stops waiting on the outstanding request. Its result will be discarded.
   pub fn cancel(&mut self) {
      if let Status::Pending(id) = self.status {
         debug!("request {} cancelled", id);
      }
      self.status = Status::Idle;
   }

   /// The result of the outstanding request, if it has arrived.
   pub fn try_recv(&mut self) -> Option<SearchResult<A::Move>> {
      self.next_result(Wait::Poll)
   }

   /// Blocks until the outstanding request resolves. `None` if nothing is outstanding.
   pub fn recv(&mut self) -> Option<SearchResult<A::Move>> {
      self.next_result(Wait::Block)
   }

   /// Like [`Orchestrator::recv`], giving up after `timeout`. The request
   /// stays pending on a timeout.
   pub fn recv_timeout(&mut self, timeout: Duration) -> Option<SearchResult<A::Move>> {
      self.next_result(Wait::Until(Instant::now() + timeout))
   }

   fn next_result(&mut self, wait: Wait) -> Option<SearchResult<A::Move>> {
      loop {
         let pending = match self.status {
            Status::Pending(id) => id,
            Status::Idle => {
               self.discard_stale();
               return None;
            }
         };
         while let Some(result) = self.undelivered.pop_front() {
            if let Some(result) = self.honor(result) {
               return Some(result);
            }
         }
         let received = match wait {
            Wait::Poll => self.endpoint.try_recv(),
            Wait::Block => self.endpoint.recv().map(Some),
            Wait::Until(deadline) => {
               self.endpoint.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
         };
         let result = match received {
            Ok(Some(value)) => decode_result(value, pending),
            Ok(None) => return None,
            Err(e) => {
               error!("lost the search worker while waiting on request {}: {}", pending, e);
               SearchResult {
                  request_id: pending,
                  outcome: Outcome::failed(e.reason()),
               }
            }
         };
         if let Some(result) = self.honor(result) {
            return Some(result);
         }
      }
   }

   fn honor(&mut self, result: SearchResult<A::Move>) -> Option<SearchResult<A::Move>> {
      match self.status {
         Status::Pending(id) if result.request_id == id || result.request_id == UNATTRIBUTED => {
            self.status = Status::Idle;
            Some(SearchResult {
               request_id: id,
               outcome: result.outcome,
            })
         }
         _ => {
            debug!("discarding stale result for request {}", result.request_id);
            None
         }
      }
   }

   fn discard_stale(&mut self) {
      self.undelivered.clear();
      while let Ok(Some(value)) = self.endpoint.try_recv() {
         debug!("discarding stale result for request {:?}", transport::request_id_of(&value));
      }
   }
}

fn decode_result<M: serde::de::DeserializeOwned>(value: Value, pending: RequestId) -> SearchResult<M> {
   let request_id = transport::request_id_of(&value);
   match transport::decode::<EngineMessage<M>>(value) {
      Ok(EngineMessage::Result(result)) => result,
      Err(e) => {
         warn!("undecodable search result {:?}: {}", request_id, e);
         SearchResult {
            request_id: request_id.unwrap_or(pending),
            outcome: Outcome::failed(FailureReason::DecodeFailure),
         }
      }
   }
}
