pub mod combat;
pub mod config;
pub mod constants;
pub mod engine;
pub mod game;
pub mod rng;
pub mod roster;
pub mod server_protocol;
pub mod server_utils;
pub mod types;
