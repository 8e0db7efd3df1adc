pub mod board;
pub mod filter;
pub mod game;
pub mod rules;
pub mod session;
