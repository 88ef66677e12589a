//! Reference adapter: 3x3 tic-tac-toe, `A` (X) moves first.
//!
//! Cells are numbered 0-8, row by row from the top left. A move is the index
//! of the cell to mark.

use crate::adapter::{GameAdapter, MoveList, Player};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type Cell = u8;

const LINES: [[usize; 3]; 8] = [
   [0, 1, 2],
   [3, 4, 5],
   [6, 7, 8],
   [0, 3, 6],
   [1, 4, 7],
   [2, 5, 8],
   [0, 4, 8],
   [2, 4, 6],
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
   cells: [Option<Player>; 9],
}

impl Board {
   pub fn new() -> Board {
      Board::default()
   }

   pub fn get(&self, cell: Cell) -> Option<Player> {
      self.cells.get(cell as usize).copied().flatten()
   }

   /// `None` if `cell` is off the board or already taken.
   pub fn place(&self, cell: Cell, player: Player) -> Option<Board> {
      match self.cells.get(cell as usize) {
         Some(None) => {
            let mut board = *self;
            board.cells[cell as usize] = Some(player);
            Some(board)
         }
         _ => None,
      }
   }

   pub fn empty_cells(&self) -> impl Iterator<Item = Cell> + '_ {
      self.cells.iter().enumerate().filter(|(_, x)| x.is_none()).map(|(i, _)| i as Cell)
   }

   pub fn winner(&self) -> Option<Player> {
      LINES.iter().find_map(|line| {
         let first = self.cells[line[0]]?;
         if line.iter().all(|i| self.cells[*i] == Some(first)) {
            Some(first)
         } else {
            None
         }
      })
   }

   pub fn is_full(&self) -> bool {
      self.cells.iter().all(Option::is_some)
   }

   pub fn is_over(&self) -> bool {
      self.winner().is_some() || self.is_full()
   }

   pub fn side_to_move(&self) -> Player {
      let a_count = self.cells.iter().filter(|x| **x == Some(Player::A)).count();
      let b_count = self.cells.iter().filter(|x| **x == Some(Player::B)).count();
      if a_count > b_count {
         Player::B
      } else {
         Player::A
      }
   }
}

impl FromStr for Board {
   type Err = String;

   /// Nine cells of `X`, `O` or `.`; whitespace and `|` are ignored.
   fn from_str(s: &str) -> Result<Board, String> {
      let mut board = Board::new();
      let mut i = 0;
      for c in s.chars().filter(|c| !c.is_whitespace() && *c != '|') {
         if i >= 9 {
            return Err(format!("too many cells in '{}'", s));
         }
         board.cells[i] = match c {
            'X' | 'x' => Some(Player::A),
            'O' | 'o' => Some(Player::B),
            '.' | '-' => None,
            _ => return Err(format!("unexpected character '{}' in board", c)),
         };
         i += 1;
      }
      if i != 9 {
         return Err(format!("expected 9 cells, found {}", i));
      }
      Ok(board)
   }
}

impl fmt::Display for Board {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      for row in 0..3 {
         for col in 0..3 {
            let c = match self.cells[row * 3 + col] {
               Some(Player::A) => 'X',
               Some(Player::B) => 'O',
               None => '.',
            };
            write!(f, "{}", c)?;
         }
         if row < 2 {
            writeln!(f)?;
         }
      }
      Ok(())
   }
}

pub struct TicTacToe;

impl GameAdapter for TicTacToe {
   type State = Board;
   type Move = Cell;

   fn generate_moves(&self, _player: Player, state: &Board) -> MoveList<Cell> {
      if state.winner().is_some() {
         return MoveList::new();
      }
      state.empty_cells().collect()
   }

   fn apply_move(&self, player: Player, state: &Board, a_move: &Cell) -> Board {
      match state.place(*a_move, player) {
         Some(board) => board,
         None => panic!("cell {} is not open on\n{}", a_move, state),
      }
   }

   fn score(&self, player: Player, state: &Board) -> f64 {
      // quicker wins leave more empty cells and score higher
      let magnitude = 1.0 + state.empty_cells().count() as f64;
      match state.winner() {
         Some(w) if w == player => magnitude,
         Some(_) => -magnitude,
         None => 0.0,
      }
   }

   fn is_terminal(&self, state: &Board) -> bool {
      state.is_over()
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::adapter::check_negation;
   use crate::engine::{negamax, search};
   use proptest::prelude::*;

   fn board(s: &str) -> Board {
      s.parse().unwrap()
   }

   /// Plays `cells` in order from an empty board, skipping taken cells and
   /// stopping once the game is over.
   fn play_out(cells: &[Cell]) -> Board {
      let mut board = Board::new();
      for cell in cells {
         if board.is_over() {
            break;
         }
         if let Some(next) = board.place(*cell, board.side_to_move()) {
            board = next;
         }
      }
      board
   }

   /// Unpruned negamax value, for checking the engine against.
   fn plain_value(depth: u32, player: Player, state: &Board) -> f64 {
      let game = TicTacToe;
      if depth == 0 || game.is_terminal(state) {
         return game.score(player, state);
      }
      let moves = game.generate_moves(player, state);
      if moves.is_empty() {
         return game.score(player, state);
      }
      moves
         .iter()
         .map(|m| -plain_value(depth - 1, !player, &game.apply_move(player, state, m)))
         .fold(f64::NEG_INFINITY, f64::max)
   }

   #[test]
   fn parse_and_display() {
      let b = board("XO. .X. ..O");
      assert_eq!(b.get(0), Some(Player::A));
      assert_eq!(b.get(1), Some(Player::B));
      assert_eq!(b.get(2), None);
      assert_eq!(b.get(9), None);
      assert_eq!(b.to_string(), "XO.\n.X.\n..O");
      assert_eq!(b.to_string().parse::<Board>(), Ok(b));
      assert!("XO".parse::<Board>().is_err());
      assert!("XOXOXOXOXO".parse::<Board>().is_err());
      assert!("XOXOXOXO?".parse::<Board>().is_err());
   }

   #[test]
   fn winners_and_turns() {
      assert_eq!(board("XXX OO. ...").winner(), Some(Player::A));
      assert_eq!(board("XX. OOO X..").winner(), Some(Player::B));
      assert_eq!(board("X.O .XO ..X").winner(), Some(Player::A));
      assert_eq!(board("XOX XOO OXX").winner(), None);
      assert!(board("XOX XOO OXX").is_full());
      assert_eq!(Board::new().side_to_move(), Player::A);
      assert_eq!(board("X.. ... ...").side_to_move(), Player::B);
      assert_eq!(board("X.. .O. ...").side_to_move(), Player::A);
   }

   #[test]
   fn place_rejects_taken_and_off_board_cells() {
      let b = board("X.. ... ...");
      assert_eq!(b.place(0, Player::B), None);
      assert_eq!(b.place(9, Player::B), None);
      assert_eq!(b.place(4, Player::B).map(|x| x.get(4)), Some(Some(Player::B)));
      // the original is untouched
      assert_eq!(b.get(4), None);
   }

   #[test]
   fn no_moves_after_a_win() {
      let won = board("XXX OO. ...");
      assert!(TicTacToe.generate_moves(Player::B, &won).is_empty());
      assert!(TicTacToe.is_terminal(&won));
      assert_eq!(TicTacToe.score(Player::A, &won), 5.0);
      assert_eq!(TicTacToe.score(Player::B, &won), -5.0);
   }

   #[test]
   #[should_panic(expected = "not open")]
   fn applying_to_a_taken_cell_panics() {
      TicTacToe.apply_move(Player::B, &board("X.. ... ..."), &0);
   }

   #[test]
   fn empty_board_full_depth() {
      let report = search(&TicTacToe, 9, Player::A, &Board::new());
      let best = report.best_move.unwrap();
      assert!(best < 9);
      // every opening draws under perfect play
      assert_eq!(report.value, Some(0.0));
      assert_eq!(negamax(&TicTacToe, 9, Player::A, &Board::new()), Some(best));
   }

   #[test]
   fn takes_the_immediate_win() {
      // blocking at 2 comes first in generation order, winning at 5 is better
      let b = board("OO. XX. ...");
      assert_eq!(negamax(&TicTacToe, 9, Player::A, &b), Some(5));
      // B to move takes its own win
      let b = board("XX. OO. X..");
      assert_eq!(negamax(&TicTacToe, 9, Player::B, &b), Some(5));
   }

   #[test]
   fn blocks_the_only_threat() {
      let b = board("X.. XO. ...");
      assert_eq!(negamax(&TicTacToe, 9, Player::B, &b), Some(6));
   }

   #[test]
   fn avoids_the_corner_fork() {
      // X holds opposite corners: a corner reply loses to a fork, an edge draws
      let b = board("X.. .O. ..X");
      let report = search(&TicTacToe, 9, Player::B, &b);
      assert_eq!(report.value, Some(0.0));
      assert!(matches!(report.best_move, Some(1) | Some(3) | Some(5) | Some(7)));
   }

   #[test]
   fn full_drawn_board_has_no_move() {
      let b = board("XOX XOO OXX");
      for depth in 0..10 {
         assert_eq!(negamax(&TicTacToe, depth, Player::B, &b), None);
      }
   }

   fn moves_strategy() -> impl Strategy<Value = Vec<Cell>> {
      prop::collection::vec(0u8..9, 0..9)
   }

   proptest! {
      #![proptest_config(ProptestConfig::with_cases(32))]

      #[test]
      fn chosen_move_is_legal(cells in moves_strategy(), depth in 1u32..=9) {
         let b = play_out(&cells);
         let player = b.side_to_move();
         let legal = TicTacToe.generate_moves(player, &b);
         match negamax(&TicTacToe, depth, player, &b) {
            Some(m) => prop_assert!(legal.contains(&m)),
            None => prop_assert!(b.is_over()),
         }
      }

      #[test]
      fn search_is_deterministic(cells in moves_strategy(), depth in 1u32..=9) {
         let b = play_out(&cells);
         let player = b.side_to_move();
         let first = negamax(&TicTacToe, depth, player, &b);
         prop_assert_eq!(negamax(&TicTacToe, depth, player, &b), first);
      }

      #[test]
      fn scores_are_zero_sum(cells in moves_strategy()) {
         let b = play_out(&cells);
         prop_assert_eq!(check_negation(&TicTacToe, &[b]), Ok(()));
      }

      #[test]
      fn pruning_keeps_the_exact_value(cells in moves_strategy(), depth in 1u32..=9) {
         let b = play_out(&cells);
         prop_assume!(!b.is_over());
         let player = b.side_to_move();
         let report = search(&TicTacToe, depth, player, &b);
         prop_assert_eq!(report.value, Some(plain_value(depth, player, &b)));
         // the chosen move is the first one reaching that value
         let first_best = TicTacToe
            .generate_moves(player, &b)
            .into_iter()
            .find(|m| -plain_value(depth - 1, !player, &TicTacToe.apply_move(player, &b, m)) == report.value.unwrap());
         prop_assert_eq!(report.best_move, first_best);
      }
   }
}
