pub mod config;
pub mod model;
pub mod preprocess;
pub mod registry;

use image::DynamicImage;
use shared::Prediction;
use std::path::PathBuf;

pub use registry::ModelRegistry;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model directory not found: {0}")]
    MissingDirectory(PathBuf),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid model descriptor {path}: {reason}")]
    Descriptor { path: PathBuf, reason: String },
    #[error("Failed to load model weights {path}: {reason}")]
    Weights { path: PathBuf, reason: String },
    #[error("Built without the `torch` feature, cannot load {0}")]
    BackendUnavailable(PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Preprocessing error: {0}")]
    Preprocessing(String),
    #[error("Model error: {0}")]
    Model(String),
    #[error("Model produced {actual} scores for {expected} classes")]
    ClassCountMismatch { expected: usize, actual: usize },
}

/// A pre-trained image classifier with a fixed, ordered label set.
pub trait Classifier: Send + Sync {
    fn classes(&self) -> &[String];

    fn predict(&self, image: &DynamicImage) -> Result<Prediction, InferenceError>;
}

/// Picks the label for class probabilities already normalized by the backend.
pub fn prediction_from_scores(
    classes: &[String],
    scores: Vec<f32>,
) -> Result<Prediction, InferenceError> {
    if scores.len() != classes.len() {
        return Err(InferenceError::ClassCountMismatch {
            expected: classes.len(),
            actual: scores.len(),
        });
    }

    let index = argmax(&scores);
    Ok(Prediction {
        label: classes[index].clone(),
        index,
        scores,
    })
}

/// First index holding the maximum score.
pub fn argmax(scores: &[f32]) -> usize {
    scores
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, best_score), (i, &score)| {
            if score > best_score {
                (i, score)
            } else {
                (best, best_score)
            }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.4, 0.4, 0.2]), 0);
        assert_eq!(argmax(&[0.1, 0.2, 0.7]), 2);
    }

    #[test]
    fn prediction_from_scores_picks_label() {
        let classes = labels(&["front", "rear", "side"]);
        let prediction = prediction_from_scores(&classes, vec![0.1, 0.7, 0.2]).unwrap();
        assert_eq!(prediction.index, 1);
        assert_eq!(prediction.label, "rear");
        assert_eq!(prediction.scores, vec![0.1, 0.7, 0.2]);
    }

    #[test]
    fn prediction_from_scores_rejects_wrong_length() {
        let classes = labels(&["damaged", "whole"]);
        let err = prediction_from_scores(&classes, vec![0.1, 0.2, 0.7]).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::ClassCountMismatch { expected: 2, actual: 3 }
        ));
    }
}
