use std::path::Path;

use anyhow::Result;
use candle_core::Tensor;
use tracing::info;

use crate::inference::classifier_pipeline::ClassifierPipeline;
use crate::inference::task::classify::ClassifyHandler;

#[derive(Clone)]
pub struct ExerciseClassifier {
    classifier_pipeline: ClassifierPipeline,
}

impl ExerciseClassifier {
    #[tracing::instrument(level = "info", skip_all, fields(model_path = %model_path.display()))]
    pub fn new(model_path: &Path) -> Result<Self> {
        let classifier_pipeline = ClassifierPipeline::with_safetensors(model_path)?;
        info!(
            "Loaded classifier with {} layers, {} input features and {} classes",
            classifier_pipeline.layer_count(),
            classifier_pipeline.input_features(),
            classifier_pipeline.classes()
        );

        Ok(Self {
            classifier_pipeline,
        })
    }
}

impl ClassifyHandler for ExerciseClassifier {
    #[tracing::instrument(level = "debug", skip_all)]
    fn run_infer(&self, batch: &Tensor) -> Result<Tensor> {
        self.classifier_pipeline.forward(batch)
    }
}
