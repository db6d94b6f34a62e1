pub mod board;
pub mod game;
pub mod outcome;
pub mod rating;
