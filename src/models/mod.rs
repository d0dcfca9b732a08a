// src/models/mod.rs

pub mod attempt;
pub mod leaderboard;
pub mod question;
pub mod test;
pub mod user;
