use anyhow::{anyhow, bail};
use log::{info, trace};
use negatk_lib::adapter::Player;
use negatk_lib::messages::Outcome;
use negatk_lib::orchestrator::Orchestrator;
use negatk_lib::tictactoe::{Board, Cell, TicTacToe};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Tally {
   pub wins: u32,
   pub draws: u32,
   pub losses: u32,
}

/// Engine against a uniformly random mover, alternating who starts.
pub(crate) fn run(games: u32, depth: u32, seed: u64) -> anyhow::Result<Tally> {
   let mut rng = StdRng::seed_from_u64(seed);
   let mut orchestrator = Orchestrator::spawn(TicTacToe);
   let mut tally = Tally::default();

   for game in 0..games {
      let engine = if game % 2 == 0 { Player::A } else { Player::B };
      let mut board = Board::new();
      while !board.is_over() {
         let to_move = board.side_to_move();
         let cell: Cell = if to_move == engine {
            orchestrator.submit(to_move, depth, board);
            let result = orchestrator
               .recv()
               .ok_or_else(|| anyhow!("search request went missing"))?;
            match result.outcome {
               Outcome::Move { a_move } => a_move,
               Outcome::NoMove => bail!("engine found no move on an open board:\n{}", board),
               Outcome::Error { reason } => bail!("engine failed: {}", reason),
            }
         } else {
            let open: Vec<Cell> = board.empty_cells().collect();
            *open.choose(&mut rng).ok_or_else(|| anyhow!("no open cell to play"))?
         };
         board = board
            .place(cell, to_move)
            .ok_or_else(|| anyhow!("cell {} isn't open:\n{}", cell, board))?;
      }
      match board.winner() {
         Some(p) if p == engine => tally.wins += 1,
         Some(_) => tally.losses += 1,
         None => tally.draws += 1,
      }
      trace!("game {} over:\n{}", game, board);
   }
   info!("{:?} after {} games", tally, games);
   Ok(tally)
}
