//! One-shot driver behind the command line: build (or load), optionally save,
//! optionally classify a single image file.

use std::path::Path;

use crate::classifier::{ClassifierBuilder, ClassifierError, Prediction};
use crate::imaging::load_grayscale_image;

/// Receives human-readable progress lines from [`run_classifier_model`].
pub trait ProgressSink {
    fn info(&self, message: &str);
}

impl<F: Fn(&str)> ProgressSink for F {
    fn info(&self, message: &str) {
        self(message)
    }
}

/// Forwards progress to the `log` facade at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn info(&self, message: &str) {
        log::info!("{}", message);
    }
}

/// Trains a classifier from scratch, or loads it from `load`, then saves the weights
/// to `save` and classifies the image at `image` when those are given.
///
/// Returns the prediction when an image was classified.
pub fn run_classifier_model(
    load: Option<&Path>,
    image: Option<&Path>,
    save: Option<&Path>,
    sink: &dyn ProgressSink,
) -> Result<Option<Prediction>, ClassifierError> {
    run_with_builder(ClassifierBuilder::new(), load, image, save, sink)
}

/// Same as [`run_classifier_model`], starting from a caller-configured builder.
pub fn run_with_builder(
    builder: ClassifierBuilder,
    load: Option<&Path>,
    image: Option<&Path>,
    save: Option<&Path>,
    sink: &dyn ProgressSink,
) -> Result<Option<Prediction>, ClassifierError> {
    let builder = match load {
        Some(path) => {
            sink.info(&format!("Loading weights from {}", path.display()));
            builder.with_weights(path)
        }
        None => {
            sink.info("Training a new model");
            builder
        }
    };
    let classifier = builder.build()?;
    sink.info("Classifier ready");

    if let Some(path) = save {
        classifier.save_weights(path)?;
        sink.info(&format!("Saved weights to {}", path.display()));
    }

    let Some(path) = image else {
        return Ok(None);
    };

    sink.info(&format!("Classifying {}", path.display()));
    let pixels = load_grayscale_image(path)?;
    let prediction = classifier.test(pixels.view())?;
    sink.info(&format!(
        "Predicted class {}: {}",
        prediction.class_index, prediction.class_name
    ));
    Ok(Some(prediction))
}
