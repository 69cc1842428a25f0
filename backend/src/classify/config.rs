use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::ModelError;

pub const DESCRIPTOR_FILE: &str = "model.yaml";
pub const WEIGHTS_FILE: &str = "model.pt";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub version: f32,
    pub classes: Vec<String>,
    pub image: ImageConfig,
    #[serde(default)]
    pub normalization: NormalizationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    pub size: Vec<u32>,
    pub channels: u32,
    #[serde(default)]
    pub preprocessing: PreprocessingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    pub resize_method: String,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            resize_method: "triangle".to_string(),
        }
    }
}

/// Per-channel mean/std, ImageNet statistics unless the export says otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationConfig {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            mean: vec![0.485, 0.456, 0.406],
            std: vec![0.229, 0.224, 0.225],
        }
    }
}

impl ModelConfig {
    pub fn load(model_dir: &Path) -> Result<Self, ModelError> {
        let config_path = model_dir.join(DESCRIPTOR_FILE);
        let config_str = std::fs::read_to_string(&config_path).map_err(|e| ModelError::Io {
            path: config_path.clone(),
            source: e,
        })?;
        Self::from_yaml(&config_str).map_err(|e| match e {
            ModelError::Descriptor { reason, .. } => ModelError::Descriptor {
                path: config_path,
                reason,
            },
            other => other,
        })
    }

    pub fn from_yaml(source: &str) -> Result<Self, ModelError> {
        let config: ModelConfig =
            serde_yaml::from_str(source).map_err(|e| ModelError::Descriptor {
                path: DESCRIPTOR_FILE.into(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ModelError> {
        let invalid = |reason: &str| ModelError::Descriptor {
            path: DESCRIPTOR_FILE.into(),
            reason: reason.to_string(),
        };

        if self.classes.is_empty() {
            return Err(invalid("classes must not be empty"));
        }
        if self.image.size.len() != 2 || self.image.size.contains(&0) {
            return Err(invalid("image.size must be two non-zero values [height, width]"));
        }
        if self.image.channels != 3 {
            return Err(invalid("only 3-channel RGB models are supported"));
        }
        let channels = self.image.channels as usize;
        if self.normalization.mean.len() != channels || self.normalization.std.len() != channels {
            return Err(invalid("normalization mean/std must match image.channels"));
        }
        if self.normalization.std.contains(&0.0) {
            return Err(invalid("normalization std must be non-zero"));
        }
        self.filter_type()?;
        Ok(())
    }

    pub fn height(&self) -> u32 {
        self.image.size[0]
    }

    pub fn width(&self) -> u32 {
        self.image.size[1]
    }

    pub fn filter_type(&self) -> Result<FilterType, ModelError> {
        match self.image.preprocessing.resize_method.to_ascii_lowercase().as_str() {
            "nearest" => Ok(FilterType::Nearest),
            "triangle" | "bilinear" => Ok(FilterType::Triangle),
            "catmullrom" | "bicubic" => Ok(FilterType::CatmullRom),
            "gaussian" => Ok(FilterType::Gaussian),
            "lanczos3" => Ok(FilterType::Lanczos3),
            other => Err(ModelError::Descriptor {
                path: DESCRIPTOR_FILE.into(),
                reason: format!("unknown resize_method '{}'", other),
            }),
        }
    }
}
