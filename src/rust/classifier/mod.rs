mod batcher;
mod builder;
#[allow(clippy::module_inception)]
mod classifier;
mod error;
mod model;
mod utils;

use serde::Serialize;

pub use batcher::{FashionBatch, FashionBatcher, FashionDataset, FashionItem, NormalizedImages};
pub use builder::ClassifierBuilder;
pub use classifier::{FashionClassifier, TrainingConfig, CLASS_NAMES};
pub use error::ClassifierError;
pub use model::{validate_record, FashionNet, FashionNetConfig};

/// Where a classifier is in its lifecycle.
///
/// `Built` holds freshly initialized parameters; the other two states are ready
/// for inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleState {
    Built,
    Trained,
    WeightsLoaded,
}

/// The arg-max class of a single image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prediction {
    pub class_index: usize,
    pub class_name: String,
}

impl From<Prediction> for (usize, String) {
    fn from(prediction: Prediction) -> Self {
        (prediction.class_index, prediction.class_name)
    }
}

/// Mean loss and accuracy over an evaluated split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub loss: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifierInfo {
    pub state: LifecycleState,
    pub data_loaded: bool,
    pub num_params: usize,
    pub class_names: Vec<String>,
    pub train_size: Option<usize>,
    pub test_size: Option<usize>,
}
