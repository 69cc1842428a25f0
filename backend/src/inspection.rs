use image::DynamicImage;
use shared::{ClassifierKind, DAMAGED_CLASS_INDEX, DamageReport, Prediction};

use crate::classify::preprocess::decode_image;
use crate::classify::{InferenceError, ModelRegistry};

/// Runs the damage classifier on a stored image and, when it reports damage,
/// the side and level classifiers on the same decoded image.
pub fn inspect(
    models: &ModelRegistry,
    file_name: &str,
    file_url: String,
    bytes: &[u8],
) -> Result<DamageReport, InferenceError> {
    let image = decode_image(bytes)?;

    let damage = classify(models, ClassifierKind::Damage, &image)?;
    let (side, level) = if damage.index == DAMAGED_CLASS_INDEX {
        (
            Some(classify(models, ClassifierKind::Side, &image)?),
            Some(classify(models, ClassifierKind::Level, &image)?),
        )
    } else {
        (None, None)
    };

    Ok(DamageReport {
        file_name: file_name.to_string(),
        file_url,
        damage,
        side,
        level,
    })
}

fn classify(
    models: &ModelRegistry,
    kind: ClassifierKind,
    image: &DynamicImage,
) -> Result<Prediction, InferenceError> {
    let classifier = models.get(kind);
    let prediction = classifier.predict(image)?;
    if prediction.scores.len() != classifier.classes().len() {
        return Err(InferenceError::ClassCountMismatch {
            expected: classifier.classes().len(),
            actual: prediction.scores.len(),
        });
    }
    log_stats(kind, classifier.classes(), &prediction);
    Ok(prediction)
}

fn log_stats(kind: ClassifierKind, classes: &[String], prediction: &Prediction) {
    log::info!("======== {} ========", kind);
    log::info!("Data classes: {:?}", classes);
    log::info!("Predicted class: {}", prediction.label);
    log::info!("Predicted index: {}", prediction.index);
    log::info!("Outputs: {:?}", prediction.scores);
}
