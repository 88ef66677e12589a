pub mod adapter;
pub mod engine;
pub mod messages;
pub mod orchestrator;
pub mod tictactoe;
pub mod transport;
