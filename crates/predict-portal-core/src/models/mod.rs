//! Data models for prediction requests and results.
//!
//! - `Features`: the four-value single-record request
//! - `Outcome`, `PredictionDisplay`: classification of a probability
//! - `BatchFile`: a file submitted for batch prediction

pub mod prediction;

pub use prediction::{download_link, pred_proba, BatchFile, Features, Outcome, PredictionDisplay};
