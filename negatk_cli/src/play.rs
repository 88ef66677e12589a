use log::{debug, warn};
use negatk_lib::adapter::Player;
use negatk_lib::messages::{FailureReason, Outcome, RequestId, SearchResult};
use negatk_lib::orchestrator::{Orchestrator, Status};
use negatk_lib::tictactoe::{Board, Cell, TicTacToe};
use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

const HELP: &str = "cells are numbered 0-8, row by row from the top left
  <cell>  mark a cell
  new     start over (also cancels a search in progress)
  quit    leave";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
   HumanTurn,
   EngineThinking(RequestId),
   GameOver,
   Failed(FailureReason),
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
   Continue,
   Quit,
}

struct Game {
   orchestrator: Orchestrator<TicTacToe>,
   board: Board,
   human: Player,
   depth: u32,
   phase: Phase,
}

impl Game {
   fn new(orchestrator: Orchestrator<TicTacToe>, human: Player, depth: u32) -> Game {
      Game {
         orchestrator,
         board: Board::new(),
         human,
         depth,
         phase: Phase::HumanTurn,
      }
   }

   fn engine(&self) -> Player {
      !self.human
   }

   /// Starts a fresh game, abandoning any search still running.
   fn reset(&mut self, out: &mut impl Write) -> io::Result<()> {
      self.orchestrator.cancel();
      self.board = Board::new();
      writeln!(out, "new game, you are {}", self.human)?;
      self.advance(out)
   }

   // Decide what happens after the board changed.
   fn advance(&mut self, out: &mut impl Write) -> io::Result<()> {
      writeln!(out, "{}\n", self.board)?;
      if self.board.is_over() {
         return self.finish(out);
      }
      if self.board.side_to_move() == self.engine() {
         let id = self.orchestrator.submit(self.engine(), self.depth, self.board);
         self.phase = Phase::EngineThinking(id);
         writeln!(out, "thinking...")
      } else {
         self.phase = Phase::HumanTurn;
         writeln!(out, "your move")
      }
   }

   fn on_line(&mut self, line: &str, out: &mut impl Write) -> io::Result<Flow> {
      match line.trim() {
         "" => {}
         "quit" | "exit" => return Ok(Flow::Quit),
         "new" | "reset" => self.reset(out)?,
         "help" | "?" => writeln!(out, "{}", HELP)?,
         other => match (self.phase, other.parse::<Cell>()) {
            (Phase::HumanTurn, Ok(cell)) => match self.board.place(cell, self.human) {
               Some(board) => {
                  self.board = board;
                  self.advance(out)?;
               }
               None => writeln!(out, "cell {} isn't open", cell)?,
            },
            (Phase::EngineThinking(_), Ok(_)) => writeln!(out, "still thinking; type new to start over")?,
            (Phase::GameOver, Ok(_)) | (Phase::Failed(_), Ok(_)) => {
               writeln!(out, "this game is finished; type new to start over")?
            }
            (_, Err(_)) => writeln!(out, "unknown command '{}', type help", other)?,
         },
      }
      Ok(Flow::Continue)
   }

   fn on_result(&mut self, result: SearchResult<Cell>, out: &mut impl Write) -> io::Result<()> {
      if self.phase != Phase::EngineThinking(result.request_id) {
         debug!("ignoring result for request {} in phase {:?}", result.request_id, self.phase);
         return Ok(());
      }
      match result.outcome {
         Outcome::Move { a_move } => match self.board.place(a_move, self.engine()) {
            Some(board) => {
               writeln!(out, "engine plays {}", a_move)?;
               self.board = board;
               self.advance(out)
            }
            None => {
               warn!("engine answered with a cell that isn't open: {}", a_move);
               self.fail(FailureReason::MalformedState, out)
            }
         },
         // an ordinary end of game, not an error
         Outcome::NoMove => self.finish(out),
         Outcome::Error { reason } => self.fail(reason, out),
      }
   }

   fn finish(&mut self, out: &mut impl Write) -> io::Result<()> {
      self.phase = Phase::GameOver;
      match self.board.winner() {
         Some(p) if p == self.human => writeln!(out, "you win! type new to play again"),
         Some(_) => writeln!(out, "engine wins. type new to play again"),
         None => writeln!(out, "draw. type new to play again"),
      }
   }

   fn fail(&mut self, reason: FailureReason, out: &mut impl Write) -> io::Result<()> {
      self.phase = Phase::Failed(reason);
      writeln!(out, "the engine couldn't move ({}). type new to start over", reason)
   }
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
   let (tx, rx) = mpsc::channel();
   thread::spawn(move || {
      let stdin = io::stdin();
      for line in stdin.lock().lines() {
         let line = match line {
            Ok(line) => line,
            Err(e) => {
               warn!("Encountered I/O error reading stdin: {}", e);
               break;
            }
         };
         if tx.send(line).is_err() {
            break;
         }
      }
   });
   rx
}

pub(crate) fn main_loop(human: Player, depth: u32) -> anyhow::Result<()> {
   let lines = spawn_stdin_reader();
   let stdout = io::stdout();
   let mut out_handle = stdout.lock();

   let mut game = Game::new(Orchestrator::spawn(TicTacToe), human, depth);
   writeln!(out_handle, "{}", HELP)?;
   game.reset(&mut out_handle)?;

   loop {
      let line = match game.orchestrator.status() {
         // keep reading input while the engine thinks
         Status::Pending(_) => {
            if let Some(result) = game.orchestrator.recv_timeout(POLL_INTERVAL) {
               game.on_result(result, &mut out_handle)?;
            }
            match lines.try_recv() {
               Ok(line) => line,
               Err(mpsc::TryRecvError::Empty) => continue,
               Err(mpsc::TryRecvError::Disconnected) => break,
            }
         }
         Status::Idle => match lines.recv() {
            Ok(line) => line,
            Err(_) => break,
         },
      };
      if game.on_line(&line, &mut out_handle)? == Flow::Quit {
         break;
      }
   }
   Ok(())
}
