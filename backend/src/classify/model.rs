#[cfg(any(feature = "torch", test))]
use image::DynamicImage;
#[cfg(any(feature = "torch", test))]
use shared::Prediction;
use std::path::Path;

use super::config::{ModelConfig, WEIGHTS_FILE};
use super::{Classifier, ModelError};
#[cfg(feature = "torch")]
use super::{InferenceError, prediction_from_scores, preprocess::to_input_tensor};

/// Opens the classifier exported to `model_dir`.
pub fn load_classifier(model_dir: &Path) -> Result<Box<dyn Classifier>, ModelError> {
    if !model_dir.is_dir() {
        return Err(ModelError::MissingDirectory(model_dir.to_path_buf()));
    }
    let config = ModelConfig::load(model_dir)?;
    let weights = model_dir.join(WEIGHTS_FILE);
    if !weights.is_file() {
        return Err(ModelError::Weights {
            path: weights,
            reason: "file not found".to_string(),
        });
    }
    open_weights(&weights, config)
}

#[cfg(feature = "torch")]
fn open_weights(weights: &Path, config: ModelConfig) -> Result<Box<dyn Classifier>, ModelError> {
    Ok(Box::new(TorchClassifier::load(weights, config)?))
}

#[cfg(not(feature = "torch"))]
fn open_weights(weights: &Path, _config: ModelConfig) -> Result<Box<dyn Classifier>, ModelError> {
    Err(ModelError::BackendUnavailable(weights.to_path_buf()))
}

#[cfg(feature = "torch")]
pub struct TorchClassifier {
    model: std::sync::Mutex<tch::CModule>,
    config: ModelConfig,
}

#[cfg(feature = "torch")]
impl TorchClassifier {
    pub fn load(weights: &Path, config: ModelConfig) -> Result<Self, ModelError> {
        let model = tch::CModule::load_on_device(weights, tch::Device::Cpu).map_err(|e| {
            ModelError::Weights {
                path: weights.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            model: std::sync::Mutex::new(model),
            config,
        })
    }

    fn probabilities(&self, image: &DynamicImage) -> Result<Vec<f32>, InferenceError> {
        use tch::nn::ModuleT;

        let input = to_input_tensor(image, &self.config)?;
        let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let data = input
            .as_slice()
            .ok_or_else(|| InferenceError::Preprocessing("non-contiguous input".to_string()))?;
        let tensor = tch::Tensor::from_slice(data).view(shape.as_slice());

        let model = self
            .model
            .lock()
            .map_err(|_| InferenceError::Model("model lock poisoned".to_string()))?;
        let output = tch::no_grad(|| model.forward_t(&tensor, false));
        softmax_scores(&output)
    }
}

/// Softmax over the last dimension, flattened to one score per class.
#[cfg(feature = "torch")]
fn softmax_scores(output: &tch::Tensor) -> Result<Vec<f32>, InferenceError> {
    let probabilities = output.softmax(-1, tch::Kind::Float).view([-1]);
    Vec::<f32>::try_from(&probabilities).map_err(|e| InferenceError::Model(e.to_string()))
}

#[cfg(feature = "torch")]
impl Classifier for TorchClassifier {
    fn classes(&self) -> &[String] {
        &self.config.classes
    }

    fn predict(&self, image: &DynamicImage) -> Result<Prediction, InferenceError> {
        let scores = self.probabilities(image)?;
        prediction_from_scores(&self.config.classes, scores)
    }
}

/// Fixed-answer classifier for exercising the request paths without libtorch.
#[cfg(test)]
pub struct StaticClassifier {
    pub classes: Vec<String>,
    pub scores: Vec<f32>,
}

#[cfg(test)]
impl StaticClassifier {
    pub fn new(classes: &[&str], scores: &[f32]) -> Self {
        Self {
            classes: classes.iter().map(|c| c.to_string()).collect(),
            scores: scores.to_vec(),
        }
    }
}

#[cfg(test)]
impl Classifier for StaticClassifier {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict(&self, _image: &DynamicImage) -> Result<Prediction, super::InferenceError> {
        let index = super::argmax(&self.scores);
        Ok(Prediction {
            label: self.classes[index].clone(),
            index,
            scores: self.scores.clone(),
        })
    }
}
