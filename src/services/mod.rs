// src/services/mod.rs

pub mod attempt;
pub mod availability;
pub mod leaderboard;
pub mod scoring;
