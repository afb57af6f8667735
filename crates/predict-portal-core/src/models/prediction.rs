use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::ApiError;

/// Probabilities at or below this value are a good outcome.
const OUTCOME_THRESHOLD: f64 = 0.5;

/// The four feature values of a single-record prediction.
/// Field names are the wire names the model was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Features {
    pub var_1: f64,
    pub var_2: f64,
    pub var_3: f64,
    pub var_4: f64,
}

impl Features {
    pub fn new(var_1: f64, var_2: f64, var_3: f64, var_4: f64) -> Self {
        Self {
            var_1,
            var_2,
            var_3,
            var_4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Good,
    Bad,
}

impl Outcome {
    /// Classify a predicted probability. The boundary is inclusive on the good side.
    pub fn classify(pred_proba: f64) -> Self {
        if pred_proba <= OUTCOME_THRESHOLD {
            Outcome::Good
        } else {
            Outcome::Bad
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Good => "good",
            Outcome::Bad => "bad",
        }
    }

    /// Human readable report line shown next to the probability.
    pub fn report(&self) -> &'static str {
        match self {
            Outcome::Good => "Good result",
            Outcome::Bad => "Bad result",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the page renders for a single prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionDisplay {
    pub pred_proba: f64,
    pub outcome: Outcome,
}

impl PredictionDisplay {
    pub fn new(pred_proba: f64) -> Self {
        Self {
            pred_proba,
            outcome: Outcome::classify(pred_proba),
        }
    }

    pub fn report(&self) -> &'static str {
        self.outcome.report()
    }
}

#[derive(Debug, Deserialize)]
struct SinglePredictionBody {
    pred_proba: f64,
}

/// Extract `body.pred_proba` from a single-prediction response.
///
/// Lambda proxy integrations return `body` as a JSON-encoded string, direct
/// integrations as an object; both are accepted.
pub fn pred_proba(response: &Value) -> Result<f64, ApiError> {
    let body = response
        .get("body")
        .ok_or_else(|| ApiError::InvalidResponse("response has no body field".to_string()))?;

    let parsed = match body {
        Value::String(encoded) => serde_json::from_str::<SinglePredictionBody>(encoded),
        other => SinglePredictionBody::deserialize(other),
    };

    parsed
        .map(|b| b.pred_proba)
        .map_err(|e| ApiError::InvalidResponse(format!("missing pred_proba: {}", e)))
}

/// Extract `downloadLink` from a batch-prediction response, at the top level
/// or inside `body` (object or JSON-encoded string, as with `pred_proba`).
pub fn download_link(response: &Value) -> Option<String> {
    let non_empty = |value: &Value| {
        value
            .get("downloadLink")
            .and_then(Value::as_str)
            .filter(|link| !link.is_empty())
            .map(str::to_string)
    };

    non_empty(response).or_else(|| match response.get("body")? {
        Value::String(encoded) => non_empty(&serde_json::from_str::<Value>(encoded).ok()?),
        other => non_empty(other),
    })
}

/// A file selected for batch prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl BatchFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing its content type from the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid file name: {}", path.display()))?
            .to_string();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let content_type = content_type_for(&name);
        Ok(Self::new(name, content_type, bytes))
    }
}

fn content_type_for(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "csv" => "text/csv",
        "json" => "application/json",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
