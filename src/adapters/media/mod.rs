//! Media player adapters. Implement MediaPlayerPort.

pub mod simulated_player;

pub use simulated_player::SimulatedPlayer;
