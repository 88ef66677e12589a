use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
   A,
   B,
}

impl std::ops::Not for Player {
   type Output = Player;
   fn not(self) -> Player {
      match self {
         Player::A => Player::B,
         Player::B => Player::A,
      }
   }
}

impl fmt::Display for Player {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      match self {
         Player::A => write!(f, "A"),
         Player::B => write!(f, "B"),
      }
   }
}

impl std::str::FromStr for Player {
   type Err = String;

   fn from_str(s: &str) -> Result<Player, String> {
      match s {
         "A" | "a" => Ok(Player::A),
         "B" | "b" => Ok(Player::B),
         _ => Err(format!("unknown player '{}', expected A or B", s)),
      }
   }
}

pub type MoveList<M> = SmallVec<[M; 32]>;

/// The rules of one game, as seen by the search.
///
/// Every function must be deterministic and free of side effects. States are
/// values: `apply_move` builds a new state and leaves its input alone.
///
/// `score` must be zero-sum: `score(p, s) == -score(next(p), s)` for every
/// reachable `s`. Negamax is only correct under that symmetry; use
/// [`check_negation`] to test an implementation against sample states.
pub trait GameAdapter: Sync {
   type State: Clone + Send + Sync + Serialize + DeserializeOwned;
   type Move: Clone + Send + fmt::Debug + Serialize + DeserializeOwned;

   /// Legal moves for `player`, empty when there are none.
   fn generate_moves(&self, player: Player, state: &Self::State) -> MoveList<Self::Move>;

   fn apply_move(&self, player: Player, state: &Self::State, a_move: &Self::Move) -> Self::State;

   /// Heuristic value of `state` from `player`'s point of view.
   fn score(&self, player: Player, state: &Self::State) -> f64;

   fn is_terminal(&self, state: &Self::State) -> bool;

   fn next(&self, player: Player) -> Player {
      !player
   }
}

#[derive(Debug, Error, PartialEq)]
pub enum NegationViolation {
   #[error("sample {index}: score({player}) = {score} but score of the opponent = {opponent_score}")]
   Asymmetric {
      index: usize,
      player: Player,
      score: f64,
      opponent_score: f64,
   },
   #[error("next is not involutive: next(next({0})) = {1}")]
   NotInvolutive(Player, Player),
}

/// Checks `next(next(p)) == p` and `score(p, s) == -score(next(p), s)` over
/// the sample states, reporting the first failure.
pub fn check_negation<A: GameAdapter>(adapter: &A, states: &[A::State]) -> Result<(), NegationViolation> {
   for player in [Player::A, Player::B] {
      let back = adapter.next(adapter.next(player));
      if back != player {
         return Err(NegationViolation::NotInvolutive(player, back));
      }
   }
   for (index, state) in states.iter().enumerate() {
      for player in [Player::A, Player::B] {
         let score = adapter.score(player, state);
         let opponent_score = adapter.score(adapter.next(player), state);
         // -0.0 == 0.0, NaN never matches
         if score != -opponent_score {
            return Err(NegationViolation::Asymmetric {
               index,
               player,
               score,
               opponent_score,
            });
         }
      }
   }
   Ok(())
}
