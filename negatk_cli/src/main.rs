mod bench;
mod pipe;
mod play;

use negatk_lib::adapter::Player;
use structopt::StructOpt;

/// A negamax engine that plays tic-tac-toe
#[derive(StructOpt, Debug)]
#[structopt(name = "negatk")]
struct Opt {
   /// Search depth in plies; 9 searches every game to the end
   #[structopt(short = "d", long = "depth", default_value = "9")]
   depth: u32,
   /// The side you play in interactive mode (A moves first)
   #[structopt(long = "human", default_value = "A")]
   human: Player,
   /// Speak the JSON line protocol on stdin/stdout instead of playing
   #[structopt(short = "p", long = "pipe")]
   pipe: bool,
   /// Play this many games against a random mover and report the tally
   #[structopt(long = "bench")]
   bench: Option<u32>,
   /// Seed for the random mover
   #[structopt(long = "seed", default_value = "0")]
   seed: u64,
}

fn main() -> anyhow::Result<()> {
   pretty_env_logger::init();
   let opt = Opt::from_args();

   if let Some(games) = opt.bench {
      let tally = bench::run(games, opt.depth, opt.seed)?;
      println!(
         "{} games: {} won, {} drawn, {} lost",
         games, tally.wins, tally.draws, tally.losses
      );
      return Ok(());
   }

   if opt.pipe {
      pipe::main_loop()
   } else {
      play::main_loop(opt.human, opt.depth)
   }
}
