use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use shared::ClassLabel;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse manifest: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Manifest lists no labels")]
    NoLabels,
    #[error("Manifest lists label {0:?} more than once")]
    DuplicateLabel(String),
    #[error("Input size must be non-zero, got {width}x{height}")]
    ZeroInputSize { width: u32, height: u32 },
    #[error("Channel difference threshold must be a positive number, got {0}")]
    InvalidThreshold(f64),
}

/// Describes the contract between the serialized model and the code feeding it.
/// Ships next to the model artifact so the label order travels with the weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub version: u32,
    pub labels: Vec<String>,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub screening: ScreeningConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub width: u32,
    pub height: u32,
    pub resize_filter: ResizeFilter,
    pub normalization: Normalization,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub apply_softmax: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    pub max_channel_difference: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

/// Pixel normalization used by the backbone family during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Scale into [-1, 1] (MobileNet, Inception, Xception).
    Tf,
    /// Scale into [0, 1] then standardize with ImageNet mean/std.
    Torch,
    /// Swap to BGR and subtract ImageNet means, no scaling.
    Caffe,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            width: 224,
            height: 224,
            resize_filter: ResizeFilter::CatmullRom,
            normalization: Normalization::Tf,
        }
    }
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            max_channel_difference: 15.0,
        }
    }
}

impl Default for ModelManifest {
    fn default() -> Self {
        Self {
            version: 1,
            labels: ClassLabel::ordered_names(),
            input: InputConfig::default(),
            output: OutputConfig::default(),
            screening: ScreeningConfig::default(),
        }
    }
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl ModelManifest {
    /// Reads the manifest at `path`. A missing file falls back to the built-in
    /// defaults; a file that exists but does not validate is an error.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        if !path.exists() {
            log::warn!(
                "No model manifest at {}, using built-in label order and input settings",
                path.display()
            );
            return Ok(Self::default());
        }

        let manifest_str = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let manifest = Self::from_yaml(&manifest_str)?;
        log::info!(
            "Loaded model manifest v{} from {} ({} labels)",
            manifest.version,
            path.display(),
            manifest.labels.len()
        );
        Ok(manifest)
    }

    pub fn from_yaml(manifest_str: &str) -> Result<Self, ManifestError> {
        let manifest: ModelManifest = serde_yaml::from_str(manifest_str)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.labels.is_empty() {
            return Err(ManifestError::NoLabels);
        }

        let mut seen = HashSet::new();
        for label in &self.labels {
            if !seen.insert(label.as_str()) {
                return Err(ManifestError::DuplicateLabel(label.clone()));
            }
        }

        if self.input.width == 0 || self.input.height == 0 {
            return Err(ManifestError::ZeroInputSize {
                width: self.input.width,
                height: self.input.height,
            });
        }

        let threshold = self.screening.max_channel_difference;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ManifestError::InvalidThreshold(threshold));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_MANIFEST: &str = r#"
version: 1
labels:
  - Mild Impairment
  - Moderate Impairment
  - No Impairment
  - Very Mild Impairment
input:
  width: 224
  height: 224
  resize_filter: lanczos3
  normalization: torch
output:
  apply_softmax: true
screening:
  max_channel_difference: 12.5
"#;

    #[test]
    fn parses_full_manifest() {
        let manifest = ModelManifest::from_yaml(FULL_MANIFEST).unwrap();
        assert_eq!(manifest.labels, ClassLabel::ordered_names());
        assert_eq!(manifest.input.resize_filter, ResizeFilter::Lanczos3);
        assert_eq!(manifest.input.normalization, Normalization::Torch);
        assert!(manifest.output.apply_softmax);
        assert_eq!(manifest.screening.max_channel_difference, 12.5);
    }

    #[test]
    fn omitted_sections_take_defaults() {
        let manifest = ModelManifest::from_yaml("version: 2\nlabels: [a, b]\n").unwrap();
        assert_eq!(manifest.input, InputConfig::default());
        assert!(!manifest.output.apply_softmax);
        assert_eq!(manifest.screening.max_channel_difference, 15.0);
    }

    #[test]
    fn rejects_invalid_manifests() {
        assert!(matches!(
            ModelManifest::from_yaml("version: 1\nlabels: []\n"),
            Err(ManifestError::NoLabels)
        ));
        assert!(matches!(
            ModelManifest::from_yaml("version: 1\nlabels: [a, b, a]\n"),
            Err(ManifestError::DuplicateLabel(label)) if label == "a"
        ));
        assert!(matches!(
            ModelManifest::from_yaml("version: 1\nlabels: [a]\ninput:\n  width: 0\n"),
            Err(ManifestError::ZeroInputSize { width: 0, height: 224 })
        ));
        assert!(matches!(
            ModelManifest::from_yaml(
                "version: 1\nlabels: [a]\nscreening:\n  max_channel_difference: -1.0\n"
            ),
            Err(ManifestError::InvalidThreshold(_))
        ));
        assert!(matches!(
            ModelManifest::from_yaml("version: 1\nlabels: [a]\ninput:\n  normalization: bogus\n"),
            Err(ManifestError::Parse(_))
        ));
    }

    #[test]
    fn shipped_manifest_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../model/alzheimer_model.yaml");
        assert_eq!(ModelManifest::load(&path).unwrap(), ModelManifest::default());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let manifest = ModelManifest::load(Path::new("/nonexistent/alzheimer_model.yaml")).unwrap();
        assert_eq!(manifest, ModelManifest::default());
    }
}
