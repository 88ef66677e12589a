use crate::adapter::{GameAdapter, Player};
use log::trace;
use noisy_float::prelude::*;
use rayon::prelude::*;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct SearchReport<M> {
   pub best_move: Option<M>,
   /// Negamax value of `best_move` for the player to move, `None` when no move was selected
   pub value: Option<f64>,
   pub nodes_expanded: u64,
   pub nodes_generated: u64,
   pub elapsed: Duration,
}

/// Best move for `player` found by a `depth`-ply negamax search.
///
/// Returns `None` when `depth` is 0, the state is terminal, or `player` has no
/// legal move. Equal-valued moves are resolved in favour of the one generated
/// first.
///
/// # Panics
///
/// Panics if the adapter panics or scores a position as NaN. The engine does
/// not guard against adapters that break their contract.
pub fn negamax<A: GameAdapter>(adapter: &A, depth: u32, player: Player, state: &A::State) -> Option<A::Move> {
   search(adapter, depth, player, state).best_move
}

/// Same search as [`negamax`], keeping the root value and node counts.
pub fn search<A: GameAdapter>(adapter: &A, depth: u32, player: Player, state: &A::State) -> SearchReport<A::Move> {
   let search_time_start = Instant::now();
   if depth == 0 || adapter.is_terminal(state) {
      trace!("search @ depth {}: nothing to select at the root", depth);
      return SearchReport {
         best_move: None,
         value: None,
         nodes_expanded: 0,
         nodes_generated: 1,
         elapsed: search_time_start.elapsed(),
      };
   }
   let moves = adapter.generate_moves(player, state);
   let mut nodes_expanded = 1;
   let mut nodes_generated = 1 + moves.len() as u64;
   let opponent = adapter.next(player);

   // collect keeps generation order, which the tie-break below depends on
   let scores: Vec<_> = moves
      .into_vec()
      .into_par_iter()
      .map(|a_move| {
         let child = adapter.apply_move(player, state, &a_move);
         let mut ne = 0;
         let mut ng = 0;
         let score = -nega_max(
            adapter,
            depth - 1,
            opponent,
            child,
            n64(f64::NEG_INFINITY),
            n64(f64::INFINITY),
            &mut ne,
            &mut ng,
         );
         (a_move, score, ne, ng)
      })
      .collect();

   let mut best: Option<(A::Move, N64)> = None;
   for (a_move, score, ne, ng) in scores {
      nodes_expanded += ne;
      nodes_generated += ng;
      if best.as_ref().map_or(true, |(_, max)| score > *max) {
         best = Some((a_move, score));
      }
   }
   trace!(
      "nodes generated: {} nodes expanded: {}",
      nodes_generated,
      nodes_expanded
   );
   let elapsed = search_time_start.elapsed();
   match &best {
      Some((b, v)) => trace!(
         "search @ depth {} took {}. best move: {:?} ({})",
         depth,
         elapsed.as_secs_f64(),
         b,
         v
      ),
      None => trace!("search @ depth {} took {}. no legal move", depth, elapsed.as_secs_f64()),
   }
   let (best_move, value) = match best {
      Some((m, v)) => (Some(m), Some(v.raw())),
      None => (None, None),
   };
   SearchReport {
      best_move,
      value,
      nodes_expanded,
      nodes_generated,
      elapsed,
   }
}

fn score_of<A: GameAdapter>(adapter: &A, player: Player, state: &A::State) -> N64 {
   let raw = adapter.score(player, state);
   N64::try_new(raw).unwrap_or_else(|| panic!("adapter scored a position as {}", raw))
}

// Fail-soft alpha-beta. Called with a full window it returns the exact
// negamax value, so pruning never changes which root move is chosen.
#[allow(clippy::too_many_arguments)]
fn nega_max<A: GameAdapter>(
   adapter: &A,
   depth: u32,
   player: Player,
   state: A::State,
   mut alpha: N64,
   beta: N64,
   nodes_expanded: &mut u64,
   nodes_generated: &mut u64,
) -> N64 {
   if depth == 0 || adapter.is_terminal(&state) {
      return score_of(adapter, player, &state);
   }
   let moves = adapter.generate_moves(player, &state);
   *nodes_expanded += 1;
   *nodes_generated += moves.len() as u64;
   if moves.is_empty() {
      return score_of(adapter, player, &state);
   }
   let opponent = adapter.next(player);
   let mut max = n64(f64::NEG_INFINITY);
   for a_move in moves {
      let child = adapter.apply_move(player, &state, &a_move);
      let score = -nega_max(
         adapter,
         depth - 1,
         opponent,
         child,
         -beta,
         -alpha,
         nodes_expanded,
         nodes_generated,
      );
      if score > max {
         max = score;
      }
      if max > alpha {
         alpha = max;
      }
      if alpha >= beta {
         break;
      }
   }
   max
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::adapter::MoveList;

   /// One-ply game: move `i` ends the game worth `values[i]` to A.
   struct Fixed {
      values: Vec<f64>,
   }

   impl GameAdapter for Fixed {
      type State = Option<usize>;
      type Move = usize;

      fn generate_moves(&self, _player: Player, state: &Option<usize>) -> MoveList<usize> {
         match state {
            None => (0..self.values.len()).collect(),
            Some(_) => MoveList::new(),
         }
      }

      fn apply_move(&self, _player: Player, _state: &Option<usize>, a_move: &usize) -> Option<usize> {
         Some(*a_move)
      }

      fn score(&self, player: Player, state: &Option<usize>) -> f64 {
         let v = state.map(|i| self.values[i]).unwrap_or(0.0);
         match player {
            Player::A => v,
            Player::B => -v,
         }
      }

      fn is_terminal(&self, state: &Option<usize>) -> bool {
         state.is_some()
      }
   }

   #[test]
   fn picks_the_highest_value() {
      let game = Fixed {
         values: vec![1.0, -4.0, 9.0, 2.0],
      };
      let report = search(&game, 1, Player::A, &None);
      assert_eq!(report.best_move, Some(2));
      assert_eq!(report.value, Some(9.0));
      assert_eq!(report.nodes_generated, 5);
   }

   #[test]
   fn minimizes_for_the_other_player() {
      let game = Fixed {
         values: vec![1.0, -4.0, 9.0, 2.0],
      };
      assert_eq!(negamax(&game, 3, Player::B, &None), Some(1));
   }

   #[test]
   fn ties_go_to_the_first_generated_move() {
      let game = Fixed {
         values: vec![5.0, 7.0, 7.0, 7.0],
      };
      for depth in 1..5 {
         assert_eq!(negamax(&game, depth, Player::A, &None), Some(1));
      }
      let all_equal = Fixed { values: vec![0.0; 6] };
      assert_eq!(negamax(&all_equal, 2, Player::B, &None), Some(0));
   }

   #[test]
   fn no_move_at_depth_zero() {
      let game = Fixed { values: vec![3.0] };
      let report = search(&game, 0, Player::A, &None);
      assert!(report.best_move.is_none());
      assert!(report.value.is_none());
   }

   #[test]
   fn no_move_from_terminal_or_empty_states() {
      let game = Fixed { values: vec![3.0, 4.0] };
      for depth in 0..4 {
         assert_eq!(negamax(&game, depth, Player::A, &Some(1)), None);
      }
      let empty = Fixed { values: vec![] };
      for depth in 0..4 {
         assert_eq!(negamax(&empty, depth, Player::A, &None), None);
      }
   }

   #[test]
   #[should_panic(expected = "NaN")]
   fn nan_scores_are_rejected() {
      let game = Fixed {
         values: vec![1.0, f64::NAN],
      };
      negamax(&game, 1, Player::A, &None);
   }

   /// Counts down from a number; each player removes 1 or 2, whoever takes
   /// the last one wins. The state remembers whose turn it is.
   struct Subtraction;

   impl GameAdapter for Subtraction {
      type State = (u32, Player);
      type Move = u32;

      fn generate_moves(&self, _player: Player, state: &(u32, Player)) -> MoveList<u32> {
         (1..=2).filter(|x| *x <= state.0).collect()
      }

      fn apply_move(&self, player: Player, state: &(u32, Player), a_move: &u32) -> (u32, Player) {
         (state.0 - a_move, !player)
      }

      fn score(&self, player: Player, state: &(u32, Player)) -> f64 {
         // the player to move at zero has lost
         match state {
            (0, to_move) if *to_move == player => -1.0,
            (0, _) => 1.0,
            _ => 0.0,
         }
      }

      fn is_terminal(&self, state: &(u32, Player)) -> bool {
         state.0 == 0
      }
   }

   #[test]
   fn finds_the_winning_subtraction() {
      // leave a multiple of 3 behind
      assert_eq!(negamax(&Subtraction, 10, Player::A, &(7, Player::A)), Some(1));
      assert_eq!(negamax(&Subtraction, 10, Player::A, &(8, Player::A)), Some(2));
      assert_eq!(negamax(&Subtraction, 10, Player::B, &(4, Player::B)), Some(1));
      // lost anyway: first generated move
      let report = search(&Subtraction, 10, Player::A, &(9, Player::A));
      assert_eq!(report.best_move, Some(1));
      assert_eq!(report.value, Some(-1.0));
   }

   #[test]
   fn subtraction_scores_are_zero_sum() {
      let samples: Vec<_> = (0..6).flat_map(|n| [(n, Player::A), (n, Player::B)]).collect();
      assert_eq!(crate::adapter::check_negation(&Subtraction, &samples), Ok(()));
   }

   #[test]
   fn searches_are_deterministic() {
      let first = search(&Subtraction, 12, Player::A, &(20, Player::A));
      for _ in 0..5 {
         let again = search(&Subtraction, 12, Player::A, &(20, Player::A));
         assert_eq!(again.best_move, first.best_move);
         assert_eq!(again.value, first.value);
         assert_eq!(again.nodes_expanded, first.nodes_expanded);
      }
   }
}
