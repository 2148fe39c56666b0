//! learnscreen-core: Screening engine, risk classification, and scoring.
//!
//! This crate runs the timed mini-games (trial clock, response recorder and
//! session state machine), classifies each completed level against
//! per-domain thresholds, and folds game summaries into a whole-child risk
//! profile. Persistence is reached only through the [`traits::GameStore`]
//! trait.

pub mod aggregate;
pub mod bank;
pub mod classifier;
pub mod clock;
pub mod engine;
pub mod error;
pub mod model;
pub mod parser;
pub mod recorder;
pub mod report;
pub mod session;
pub mod traits;
