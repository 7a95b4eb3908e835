//! Farol server library: configuration loading and startup helpers

pub mod config;
pub mod startup;
