use std::path::Path;

use anyhow::{bail, Context, Result};
use candle_core::{DType, Device, Tensor, D};
use candle_nn::ops::softmax;
use candle_nn::{Linear, Module};
use tracing::warn;

/// Dense feed-forward classifier read from a safetensors file.
///
/// Layers are stored as `layers.{i}.weight` with shape `(out, in)` and an optional
/// `layers.{i}.bias` with shape `(out)`. Hidden layers use ReLU and the output layer is
/// normalized with a softmax over the classes.
#[derive(Clone)]
pub struct ClassifierPipeline {
    layers: Vec<Linear>,
    device: Device,
    input_features: usize,
    classes: usize,
}

impl ClassifierPipeline {
    pub fn with_safetensors(path: &Path) -> Result<ClassifierPipeline> {
        let device = Device::Cpu;
        let mut tensors = candle_core::safetensors::load(path, &device)
            .with_context(|| format!("Failed to load model file {}", path.display()))?;

        let mut layers = Vec::new();
        let mut shapes: Vec<(usize, usize)> = Vec::new();
        for index in 0.. {
            let Some(weight) = tensors.remove(&format!("layers.{index}.weight")) else {
                break;
            };
            let weight = weight.to_dtype(DType::F32)?;
            let (out_dim, in_dim) = weight
                .dims2()
                .with_context(|| format!("Weight of layer {index} must be two-dimensional"))?;
            if let Some(&(prev_out, _)) = shapes.last() {
                if prev_out != in_dim {
                    bail!(
                        "Layer {index} expects {in_dim} inputs but the previous layer produces {prev_out}"
                    );
                }
            }

            let bias = match tensors.remove(&format!("layers.{index}.bias")) {
                Some(bias) => {
                    let bias = bias.to_dtype(DType::F32)?;
                    if bias.dims() != [out_dim] {
                        bail!(
                            "Bias of layer {index} has shape {:?}, expected [{out_dim}]",
                            bias.dims()
                        );
                    }
                    Some(bias)
                }
                None => None,
            };

            layers.push(Linear::new(weight, bias));
            shapes.push((out_dim, in_dim));
        }

        let (Some(&(_, input_features)), Some(&(classes, _))) = (shapes.first(), shapes.last())
        else {
            bail!("Model file {} has no layers.0.weight tensor", path.display())
        };
        if !tensors.is_empty() {
            let mut unused: Vec<_> = tensors.keys().collect();
            unused.sort();
            warn!("Ignoring unexpected tensors in model file: {:?}", unused);
        }

        Ok(ClassifierPipeline {
            layers,
            device,
            input_features,
            classes,
        })
    }

    /// Maps a `(rows, input_features)` batch to `(rows, classes)` probabilities.
    pub fn forward(&self, batch: &Tensor) -> Result<Tensor> {
        let mut xs = batch.to_device(&self.device)?.to_dtype(DType::F32)?;
        let last = self.layers.len() - 1;
        for (index, layer) in self.layers.iter().enumerate() {
            xs = layer.forward(&xs)?;
            if index < last {
                xs = xs.relu()?;
            }
        }
        Ok(softmax(&xs, D::Minus1)?)
    }

    pub fn input_features(&self) -> usize {
        self.input_features
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}
