use ndarray::Array4;
use std::path::Path;
use std::sync::Mutex;
use tch::{CModule, Device, Kind, Tensor};

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Failed to load model from {path}: {source}")]
    Load {
        path: String,
        source: tch::TchError,
    },
    #[error("Model error: {0}")]
    Model(#[from] tch::TchError),
    #[error("Input tensor is not contiguous")]
    NonContiguousInput,
    #[error("Model returned {actual} scores but {expected} labels are configured")]
    OutputArity { expected: usize, actual: usize },
    #[error("Model returned no finite scores")]
    NoFiniteScore,
    #[error("Model lock poisoned by a panicked forward pass")]
    Poisoned,
    #[error("Inference task failed: {0}")]
    Task(String),
}

/// Forward pass over a preprocessed NHWC batch, returning one score per class.
pub trait Classifier: Send + Sync {
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError>;
}

/// TorchScript export of the trained network, pinned to the CPU.
pub struct TorchScriptModel {
    module: Mutex<CModule>,
}

impl TorchScriptModel {
    pub fn load(model_path: &Path) -> Result<Self, InferenceError> {
        if tch::Cuda::is_available() {
            log::info!(
                "CUDA reports {} device(s); ignoring them and running on CPU",
                tch::Cuda::device_count()
            );
        } else {
            log::info!("No CUDA devices found, running on CPU");
        }

        let mut module =
            CModule::load_on_device(model_path, Device::Cpu).map_err(|source| InferenceError::Load {
                path: model_path.display().to_string(),
                source,
            })?;
        module.set_eval();

        log::info!("Loaded TorchScript model from {}", model_path.display());
        Ok(Self {
            module: Mutex::new(module),
        })
    }
}

impl Classifier for TorchScriptModel {
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let data = input.as_slice().ok_or(InferenceError::NonContiguousInput)?;
        let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let tensor = Tensor::from_slice(data).view(shape.as_slice());

        let module = self.module.lock().map_err(|_| InferenceError::Poisoned)?;
        let output = tch::no_grad(|| module.forward_ts(&[tensor]))?;
        let output_flat = output.to_kind(Kind::Float).reshape([-1]);
        let scores = Vec::<f32>::try_from(output_flat)?;
        Ok(scores)
    }
}

/// Softmax over raw logits, for exports that stop before the activation layer.
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_normalizes_and_preserves_order() {
        let probs = softmax(&[1.0, 3.0, 0.5, 2.0]);
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(probs[1] > probs[3] && probs[3] > probs[0] && probs[0] > probs[2]);
    }

    #[test]
    fn softmax_is_stable_for_large_logits() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert!((probs[0] - 0.5).abs() < 1e-6);
        assert!(probs.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn missing_model_file_is_a_load_error() {
        let result = TorchScriptModel::load(Path::new("/nonexistent/alzheimer_model.pt"));
        assert!(matches!(result, Err(InferenceError::Load { .. })));
    }
}
