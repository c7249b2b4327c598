use image::RgbImage;
use ndarray::Array4;
use std::sync::Arc;

use super::config::ModelManifest;
use super::model::{Classifier, InferenceError, softmax};
use super::preprocess::Preprocessor;
use super::screening::{MriScreen, Screening};

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub index: usize,
    pub label: String,
    /// Winning score as a percentage, rounded to two decimals.
    pub confidence: f64,
    pub scores: Vec<f32>,
}

/// The shared, read-only model handle plus everything needed to feed it.
/// Built once at startup and handed to request handlers.
#[derive(Clone)]
pub struct Predictor {
    model: Arc<dyn Classifier>,
    labels: Arc<[String]>,
    preprocessor: Preprocessor,
    screen: Arc<MriScreen>,
    apply_softmax: bool,
}

impl Predictor {
    pub fn new(model: Arc<dyn Classifier>, manifest: ModelManifest) -> Self {
        Self {
            model,
            labels: manifest.labels.into(),
            preprocessor: Preprocessor::new(manifest.input),
            screen: Arc::new(MriScreen::new(manifest.screening.max_channel_difference)),
            apply_softmax: manifest.output.apply_softmax,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Runs one forward pass on an all-zero batch and checks the score count
    /// against the label list, so a model/manifest mismatch fails at startup.
    pub fn warm_up(&self) -> Result<(), InferenceError> {
        let input = Array4::<f32>::zeros(self.preprocessor.input_shape());
        let scores = self.model.forward(&input)?;
        self.check_arity(&scores)?;
        log::info!(
            "Model warm-up produced {} scores, matching {} labels",
            scores.len(),
            self.labels.len()
        );
        Ok(())
    }

    pub fn screen(&self, image: &RgbImage) -> Screening {
        self.screen.assess(image)
    }

    pub fn predict(&self, image: &RgbImage) -> Result<Prediction, InferenceError> {
        let input = self.preprocessor.prepare(image);
        let raw = self.model.forward(&input)?;
        let scores = if self.apply_softmax { softmax(&raw) } else { raw };
        self.check_arity(&scores)?;

        let (index, best) = argmax(&scores).ok_or(InferenceError::NoFiniteScore)?;
        Ok(Prediction {
            index,
            label: self.labels[index].clone(),
            confidence: confidence_percent(best),
            scores,
        })
    }

    fn check_arity(&self, scores: &[f32]) -> Result<(), InferenceError> {
        if scores.len() != self.labels.len() {
            return Err(InferenceError::OutputArity {
                expected: self.labels.len(),
                actual: scores.len(),
            });
        }
        Ok(())
    }
}

/// Index and value of the largest finite score; ties go to the lowest index.
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        .fold(None, |best, (i, s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
}

pub fn confidence_percent(score: f32) -> f64 {
    (f64::from(score) * 100.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};
    use std::sync::Mutex;

    struct FixedScores {
        scores: Vec<f32>,
        seen_shapes: Mutex<Vec<Vec<usize>>>,
    }

    impl FixedScores {
        fn new(scores: Vec<f32>) -> Self {
            Self {
                scores,
                seen_shapes: Mutex::new(Vec::new()),
            }
        }
    }

    impl Classifier for FixedScores {
        fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            self.seen_shapes.lock().unwrap().push(input.shape().to_vec());
            Ok(self.scores.clone())
        }
    }

    fn scan() -> RgbImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(120, 90, |x, y| Luma([((x + y) % 200) as u8])))
            .into_rgb8()
    }

    #[test]
    fn argmax_picks_first_maximum_and_skips_nan() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), Some((1, 0.7)));
        assert_eq!(argmax(&[f32::NAN, 0.3, 0.2]), Some((1, 0.3)));
        assert_eq!(argmax(&[f32::NAN]), None);
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn confidence_is_rounded_percentage() {
        assert_eq!(confidence_percent(1.0), 100.0);
        assert_eq!(confidence_percent(0.0), 0.0);
        assert_eq!(confidence_percent(0.5), 50.0);
        assert_eq!(confidence_percent(0.123456), 12.35);
        assert_eq!(confidence_percent(0.98761), 98.76);
    }

    #[test]
    fn prediction_follows_argmax_and_label_order() {
        let model = Arc::new(FixedScores::new(vec![0.05, 0.1, 0.8, 0.05]));
        let predictor = Predictor::new(model.clone(), ModelManifest::default());
        let prediction = predictor.predict(&scan()).unwrap();

        assert_eq!(prediction.index, 2);
        assert_eq!(prediction.label, "No Impairment");
        assert_eq!(prediction.confidence, 80.0);
        assert_eq!(model.seen_shapes.lock().unwrap()[0], vec![1, 224, 224, 3]);
    }

    #[test]
    fn near_uniform_scores_still_yield_a_prediction() {
        let model = Arc::new(FixedScores::new(vec![0.25, 0.25, 0.25, 0.2501]));
        let predictor = Predictor::new(model, ModelManifest::default());
        let prediction = predictor.predict(&scan()).unwrap();
        assert_eq!(prediction.label, "Very Mild Impairment");
        assert_eq!(prediction.confidence, 25.01);
    }

    #[test]
    fn softmax_applied_when_manifest_requests_it() {
        let mut manifest = ModelManifest::default();
        manifest.output.apply_softmax = true;
        let model = Arc::new(FixedScores::new(vec![0.0, 0.0, 0.0, 0.0]));
        let prediction = Predictor::new(model, manifest).predict(&scan()).unwrap();
        assert_eq!(prediction.index, 0);
        assert_eq!(prediction.confidence, 25.0);
    }

    #[test]
    fn mismatched_output_length_is_an_error() {
        let model = Arc::new(FixedScores::new(vec![0.5, 0.5]));
        let predictor = Predictor::new(model, ModelManifest::default());
        assert!(matches!(
            predictor.predict(&scan()),
            Err(InferenceError::OutputArity { expected: 4, actual: 2 })
        ));
        assert!(predictor.warm_up().is_err());
    }

    #[test]
    fn warm_up_accepts_matching_model() {
        let model = Arc::new(FixedScores::new(vec![0.1, 0.2, 0.3, 0.4]));
        assert!(Predictor::new(model, ModelManifest::default()).warm_up().is_ok());
    }

    #[test]
    fn screening_uses_manifest_threshold() {
        let tinted = RgbImage::from_pixel(10, 10, image::Rgb([100, 110, 100]));
        let model: Arc<dyn Classifier> = Arc::new(FixedScores::new(vec![1.0, 0.0, 0.0, 0.0]));

        let default_threshold = Predictor::new(model.clone(), ModelManifest::default());
        let verdict = default_threshold.screen(&tinted);
        assert!(verdict.admitted);
        assert_eq!(verdict.spread.red_green, 10.0);

        let mut manifest = ModelManifest::default();
        manifest.screening.max_channel_difference = 5.0;
        assert!(!Predictor::new(model, manifest).screen(&tinted).admitted);
    }
}
