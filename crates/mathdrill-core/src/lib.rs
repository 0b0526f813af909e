//! mathdrill-core — Problem generation, grading, and hot-score leaderboards.
//!
//! This crate defines the data model, the expression composer and problem
//! generator, the store traits, the score ledger, and the drill service that
//! ties them together.

pub mod composer;
pub mod config;
pub mod error;
pub mod generator;
pub mod ledger;
pub mod model;
pub mod scheduler;
pub mod service;
pub mod statistics;
pub mod traits;

pub use error::{DrillError, StoreError};
