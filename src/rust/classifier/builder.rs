use std::path::{Path, PathBuf};
use std::sync::Arc;
use log::info;

use super::classifier::{FashionClassifier, TrainingConfig, CLASS_NAMES};
use super::error::ClassifierError;
use crate::dataset::{DatasetProvider, FashionMnistProvider, IMAGE_SIZE};
use crate::runtime::RuntimeConfig;

/// A builder for constructing a FashionClassifier with a fluent interface.
#[derive(Default, Debug)]
pub struct ClassifierBuilder {
    weights: Option<PathBuf>,
    provider: Option<Arc<dyn DatasetProvider>>,
    training_config: Option<TrainingConfig>,
    runtime_config: RuntimeConfig,
}

impl ClassifierBuilder {
    /// Creates a new empty ClassifierBuilder instance with default configuration
    ///
    /// # Example
    /// ```
    /// use atelier::ClassifierBuilder;
    ///
    /// let builder = ClassifierBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self {
            weights: None,
            provider: None,
            training_config: None,
            runtime_config: RuntimeConfig::default(),
        }
    }

    /// Loads the network from a weights file instead of training it.
    ///
    /// # Example
    /// ```
    /// use atelier::ClassifierBuilder;
    ///
    /// let builder = ClassifierBuilder::new()
    ///     .with_weights("fashion.bin");
    /// ```
    pub fn with_weights(mut self, path: impl AsRef<Path>) -> Self {
        self.weights = Some(path.as_ref().to_path_buf());
        self
    }

    /// Replaces the default Fashion-MNIST download with another source of images.
    pub fn with_dataset_provider(mut self, provider: Arc<dyn DatasetProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Sets the epochs, batch size, learning rate and network shape used for training
    ///
    /// # Example
    /// ```
    /// use atelier::{ClassifierBuilder, TrainingConfig};
    ///
    /// let builder = ClassifierBuilder::new()
    ///     .with_training_config(TrainingConfig::new().with_num_epochs(2));
    /// ```
    pub fn with_training_config(mut self, config: TrainingConfig) -> Self {
        self.training_config = Some(config);
        self
    }

    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Validates the training configuration against the fixed input and label space:
    /// - Images must be 28×28
    /// - The network must have exactly one output per class name
    /// - Batches must hold at least one image
    fn validate_config(config: &TrainingConfig) -> Result<(), ClassifierError> {
        if config.model.image_size != IMAGE_SIZE {
            return Err(ClassifierError::shape_mismatch(
                (IMAGE_SIZE, IMAGE_SIZE),
                (config.model.image_size, config.model.image_size),
            ));
        }
        if config.model.num_classes != CLASS_NAMES.len() {
            return Err(ClassifierError::Config(format!(
                "the network must have {} outputs, one per class name, found {}",
                CLASS_NAMES.len(),
                config.model.num_classes
            )));
        }
        if config.batch_size == 0 {
            return Err(ClassifierError::Config("batch size must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Builds the network and then either loads the weights or trains from scratch.
    ///
    /// # Returns
    /// * `Result<FashionClassifier, ClassifierError>` - The constructed classifier, or an error if:
    ///   - The training configuration does not fit the 28×28, 10-class problem
    ///   - The weights file cannot be read or belongs to another architecture
    ///   - The dataset cannot be fetched (training only)
    pub fn build(self) -> Result<FashionClassifier, ClassifierError> {
        let training_config = self.training_config.unwrap_or_else(TrainingConfig::new);
        Self::validate_config(&training_config)?;

        let provider: Arc<dyn DatasetProvider> = match self.provider {
            Some(provider) => provider,
            None => Arc::new(FashionMnistProvider::new_default()),
        };

        let mut classifier = FashionClassifier::from_parts(provider, training_config, self.runtime_config);

        match self.weights {
            Some(path) => {
                info!("Loading pre-trained weights from {:?}", path);
                classifier.load_weights(&path)?;
            }
            None => {
                info!("No weights given, training from scratch");
                classifier.load_data()?;
                classifier.train()?;
            }
        }

        Ok(classifier)
    }

    /// Builds the network with fresh parameters and stops there: no weights are
    /// loaded, no data is fetched and nothing is trained. Any weights path set on
    /// the builder is ignored.
    pub fn build_untrained(self) -> Result<FashionClassifier, ClassifierError> {
        let training_config = self.training_config.unwrap_or_else(TrainingConfig::new);
        Self::validate_config(&training_config)?;

        let provider: Arc<dyn DatasetProvider> = match self.provider {
            Some(provider) => provider,
            None => Arc::new(FashionMnistProvider::new_default()),
        };
        Ok(FashionClassifier::from_parts(provider, training_config, self.runtime_config))
    }
}
