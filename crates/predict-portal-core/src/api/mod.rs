//! REST client module for the prediction API.
//!
//! This module provides the `PredictionClient` for the two prediction
//! endpoints. Requests carry the raw Cognito id token in the
//! `Authorization` header.

pub mod client;
pub mod error;

pub use client::{build_http_client, PredictionClient};
pub use error::ApiError;
