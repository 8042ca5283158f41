use anyhow::{bail, Result};
use candle_core::{Device, Tensor};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ExerciseInput {
    pub features: Vec<f32>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub prediction: usize,
    pub probabilities: Vec<f32>,
}

pub trait ClassifyHandler: Send + Sync {
    /// Runs a forward pass over a `(rows, features)` batch and returns `(rows, classes)` scores.
    fn run_infer(&self, batch: &Tensor) -> Result<Tensor>;

    /// Classifies a single feature vector.
    ///
    /// The vector length is not checked against the model here, a mismatch surfaces as an
    /// inference error.
    fn run_classify(&self, request: ExerciseInput) -> Result<PredictionResult> {
        let feature_count = request.features.len();
        let batch = Tensor::from_vec(request.features, (1, feature_count), &Device::Cpu)?;
        let scores = self.run_infer(&batch)?;

        let Some(probabilities) = scores.to_vec2::<f32>()?.into_iter().next() else {
            bail!("Model returned no score rows")
        };
        let Some(prediction) = argmax(&probabilities) else {
            bail!("Model returned an empty score row")
        };

        Ok(PredictionResult {
            prediction,
            probabilities,
        })
    }
}

/// Index of the largest score, the lowest index wins on ties.
///
/// A NaN score counts as the largest, so the first NaN is returned if one is present.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    if scores.is_empty() {
        return None;
    }
    let mut best = 0;
    for (index, &score) in scores.iter().enumerate().skip(1) {
        if scores[best].is_nan() {
            break;
        }
        if score > scores[best] || score.is_nan() {
            best = index;
        }
    }
    Some(best)
}
