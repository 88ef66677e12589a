use anyhow::Context;
use log::{error, trace, warn};
use negatk_lib::messages::{EngineMessage, FailureReason, Outcome, RequestId, SearchResult, UNATTRIBUTED};
use negatk_lib::orchestrator::{self, ConsumerEndpoint, WorkerEndpoint};
use negatk_lib::tictactoe::{Cell, TicTacToe};
use negatk_lib::transport::{self, TransportError};
use serde_json::Value;
use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub(crate) fn main_loop() -> anyhow::Result<()> {
   let stdout = io::stdout();
   let mut out_handle = stdout.lock();
   serve(io::BufReader::new(io::stdin()), &mut out_handle)
}

// One request per input line, one result per output line. Every result the
// worker produces is written as soon as it arrives, superseded or not; the
// client matches results to requests by `requestId`.
fn serve(input: impl BufRead + Send + 'static, out: &mut impl Write) -> anyhow::Result<()> {
   let (consumer, worker): (ConsumerEndpoint<TicTacToe>, WorkerEndpoint<TicTacToe>) = transport::channel();
   thread::spawn(move || {
      orchestrator::start(&TicTacToe, worker);
   });
   relay_requests(&consumer, spawn_line_reader(input), out)
}

fn relay_requests(
   consumer: &ConsumerEndpoint<TicTacToe>,
   lines: mpsc::Receiver<anyhow::Result<String>>,
   out: &mut impl Write,
) -> anyhow::Result<()> {
   let mut outstanding = 0u64;
   loop {
      let line = if outstanding > 0 {
         // keep answering while the client is quiet
         if relay(consumer.recv_timeout(POLL_INTERVAL), out)? {
            outstanding -= 1;
         }
         match lines.try_recv() {
            Ok(line) => line,
            Err(mpsc::TryRecvError::Empty) => continue,
            Err(mpsc::TryRecvError::Disconnected) => break,
         }
      } else {
         match lines.recv() {
            Ok(line) => line,
            Err(_) => break,
         }
      };
      let line = line?;
      let line = line.trim();
      if line.is_empty() {
         continue;
      }
      match serde_json::from_str::<Value>(line) {
         Ok(value) => {
            let request_id = transport::request_id_of(&value);
            trace!("relaying request {:?}", request_id);
            if consumer.send_value(value).is_err() {
               write_failure(out, request_id.unwrap_or(UNATTRIBUTED), FailureReason::ChannelClosed)?;
               anyhow::bail!("search worker is gone");
            }
            outstanding += 1;
         }
         Err(e) => {
            error!("request line is not JSON: {}", e);
            write_failure(out, UNATTRIBUTED, FailureReason::DecodeFailure)?;
         }
      }
   }

   while outstanding > 0 {
      relay(consumer.recv().map(Some), out)?;
      outstanding -= 1;
   }
   Ok(())
}

fn spawn_line_reader(input: impl BufRead + Send + 'static) -> mpsc::Receiver<anyhow::Result<String>> {
   let (tx, rx) = mpsc::channel();
   thread::spawn(move || {
      for line in input.lines() {
         let failed = line.is_err();
         if let Err(e) = &line {
            warn!("Encountered I/O error reading stdin: {}", e);
         }
         if tx.send(line.context("reading a request line")).is_err() || failed {
            break;
         }
      }
   });
   rx
}

/// Writes out a received result. `false` when nothing had arrived.
fn relay(received: Result<Option<Value>, TransportError>, out: &mut impl Write) -> anyhow::Result<bool> {
   match received {
      Ok(Some(value)) => {
         writeln!(out, "{}", value)?;
         out.flush()?;
         Ok(true)
      }
      Ok(None) => Ok(false),
      Err(e) => {
         write_failure(out, UNATTRIBUTED, e.reason())?;
         Err(e).context("search worker is gone")
      }
   }
}

fn write_failure(out: &mut impl Write, request_id: RequestId, reason: FailureReason) -> anyhow::Result<()> {
   let message: EngineMessage<Cell> = EngineMessage::Result(SearchResult {
      request_id,
      outcome: Outcome::failed(reason),
   });
   writeln!(out, "{}", serde_json::to_string(&message)?)?;
   out.flush()?;
   Ok(())
}
