//! Core domain types and logic.

pub mod ohlcv;
pub mod position;
pub mod portfolio;
pub mod indicator;
pub mod price_history;
pub mod strategy;
pub mod simulation;
pub mod config_validation;
pub mod error;
