//! Banneret - Turn-Based Tactics Simulation Core

pub mod ai;
pub mod board;
pub mod combat;
pub mod components;
pub mod context;
pub mod core;
pub mod equations;
pub mod item;
pub mod rng;
pub mod skill;
pub mod unit;
