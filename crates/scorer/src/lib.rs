//! Success-probability scoring from a pre-trained model file.
//!
//! The model is a logistic regression exported as JSON:
//!
//! ```json
//! {
//!   "features": ["dist_target", "dist_sl", "rsi", "ema_ratio", "atr", "mom", "macd"],
//!   "coefficients": [-3.1, 2.4, 0.02, 1.7, 0.0, 0.0, 0.0],
//!   "intercept": -1.2,
//!   "fill": { "rsi": 50.0 }
//! }
//! ```
//!
//! `features` may list any subset of [`FeatureVector::NAMES`] in any order;
//! `fill` supplies values for inputs that are missing at scoring time.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use common::{round2, Error, FeatureVector, ProbabilityScorer, Result};

/// Neutral RSI used when neither the indicator nor the model supplies one.
pub const DEFAULT_RSI_FILL: f64 = 50.0;

#[derive(Debug, Clone, Deserialize)]
pub struct LogisticModel {
    pub features: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    #[serde(default)]
    pub fill: HashMap<String, f64>,
}

impl LogisticModel {
    pub fn from_json(text: &str) -> Result<Self> {
        let model: LogisticModel = serde_json::from_str(text)?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if self.features.len() != self.coefficients.len() {
            return Err(Error::Config(format!(
                "model has {} features but {} coefficients",
                self.features.len(),
                self.coefficients.len()
            )));
        }
        if let Some(unknown) = self
            .features
            .iter()
            .find(|f| !FeatureVector::NAMES.contains(&f.as_str()))
        {
            return Err(Error::Config(format!("model uses unknown feature '{unknown}'")));
        }
        Ok(())
    }

    /// Probability of the positive class, in percent.
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        let values: HashMap<&str, Option<f64>> = features.values().into_iter().collect();

        let z = self.features.iter().zip(&self.coefficients).fold(
            self.intercept,
            |acc, (name, coef)| {
                let x = values
                    .get(name.as_str())
                    .copied()
                    .flatten()
                    .or_else(|| self.fill.get(name).copied())
                    .unwrap_or(if name == "rsi" { DEFAULT_RSI_FILL } else { 0.0 });
                acc + coef * x
            },
        );

        round2(100.0 / (1.0 + (-z).exp()))
    }
}

/// [`ProbabilityScorer`] backed by an optional model; without one every
/// score is unavailable.
#[derive(Debug, Clone, Default)]
pub struct ModelScorer {
    model: Option<LogisticModel>,
}

impl ModelScorer {
    pub fn new(model: Option<LogisticModel>) -> Self {
        Self { model }
    }

    /// Load the model at `path`. A missing or unreadable file yields a
    /// scorer with no model rather than an error.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            warn!(path = %path.display(), "No probability model found; scores default to 0");
            return Self::default();
        }
        match std::fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|text| LogisticModel::from_json(&text))
        {
            Ok(model) => {
                info!(path = %path.display(), features = model.features.len(), "Probability model loaded");
                Self::new(Some(model))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Probability model rejected; scores default to 0");
                Self::default()
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }
}

impl ProbabilityScorer for ModelScorer {
    fn score(&self, features: &FeatureVector) -> Option<f64> {
        self.model.as_ref().map(|m| m.predict(features))
    }
}
