//! A small Fashion-MNIST image classifier built on burn's ndarray backend.
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use atelier::FashionClassifier;
//!
//! // Downloads the dataset on first use and trains for ten epochs
//! let mut classifier = FashionClassifier::builder().build()?;
//! classifier.save_weights("fashion.bin")?;
//!
//! let image = classifier.get_test_image(0)?;
//! let prediction = classifier.test(image.view())?;
//! println!("Predicted class: {}", prediction.class_name);
//! # Ok(())
//! # }
//! ```
//!
//! # Custom Data
//!
//! Any [`DatasetProvider`] can stand in for the downloaded dataset:
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use atelier::{DatasetSplits, FashionClassifier, InMemoryProvider, LabeledImages, TrainingConfig};
//! use ndarray::{Array1, Array3};
//!
//! let set = LabeledImages::new(Array3::zeros((10, 28, 28)), Array1::from_iter(0..10u8))?;
//! let provider = InMemoryProvider::new(DatasetSplits { train: set.clone(), test: set })?;
//!
//! let classifier = FashionClassifier::builder()
//!     .with_dataset_provider(Arc::new(provider))
//!     .with_training_config(TrainingConfig::new().with_num_epochs(1))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod dataset;
pub mod dataset_manager;
pub mod imaging;
pub mod run;
mod runtime;

pub use classifier::{
    ClassifierBuilder, ClassifierError, ClassifierInfo, Evaluation, FashionClassifier, FashionNet,
    FashionNetConfig, LifecycleState, NormalizedImages, Prediction, TrainingConfig, CLASS_NAMES,
};
pub use dataset::{
    DatasetProvider, DatasetSplits, FashionMnistProvider, InMemoryProvider, LabeledImages, IMAGE_SIZE,
    NUM_CLASSES,
};
pub use dataset_manager::{DatasetError, DatasetFile, DatasetManager};
pub use imaging::{load_grayscale_image, save_grayscale_image};
pub use run::{run_classifier_model, run_with_builder, LogSink, ProgressSink};
pub use runtime::{Device, InferenceBackend, RuntimeConfig, TrainingBackend};

pub fn init_logger() {
    env_logger::init();
}
