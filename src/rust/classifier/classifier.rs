use std::fs;
use std::path::Path;
use std::sync::Arc;

use burn::{
    config::Config,
    data::dataloader::DataLoaderBuilder,
    module::{AutodiffModule, Module},
    optim::{AdamConfig, GradientsParams, Optimizer},
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{backend::Backend, ElementConversion, Int, Tensor},
};
use log::{debug, info};
use ndarray::{s, Array2, ArrayView2};

use super::batcher::{FashionBatcher, FashionDataset, NormalizedImages};
use super::error::ClassifierError;
use super::model::{validate_record, FashionNet, FashionNetConfig};
use super::utils::{argmax, denormalize_image, normalize_image, normalize_images};
use super::{ClassifierInfo, Evaluation, LifecycleState, Prediction};
use crate::dataset::{DatasetProvider, LabeledImages, NUM_CLASSES};
use crate::runtime::{InferenceBackend, RuntimeConfig, TrainingBackend};

/// Human-readable names of the ten Fashion-MNIST classes, indexed by label.
pub const CLASS_NAMES: [&str; NUM_CLASSES] = [
    "T-shirt/top",
    "Trouser",
    "Pullover",
    "Dress",
    "Coat",
    "Sandal",
    "Shirt",
    "Sneaker",
    "Bag",
    "Ankle boot",
];

#[derive(Config, Debug)]
pub struct TrainingConfig {
    #[config(default = 10)]
    pub num_epochs: usize,
    #[config(default = 32)]
    pub batch_size: usize,
    /// Adam step size
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    /// Seed for shuffling the training set each epoch
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = "FashionNetConfig::new()")]
    pub model: FashionNetConfig,
}

/// A 10-class Fashion-MNIST classifier with entry points for training and testing.
///
/// Built without weights, construction loads the dataset and runs a full training
/// cycle before returning. Built with a weights file, the weights are loaded as-is
/// onto a freshly built network and no data is touched.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use atelier::FashionClassifier;
///
/// let mut classifier = FashionClassifier::new(None)?;
/// let image = classifier.get_test_image(2)?;
/// let prediction = classifier.test(image.view())?;
/// println!("{} -> {}", prediction.class_index, prediction.class_name);
/// classifier.save_weights("weights.bin")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FashionClassifier {
    model: FashionNet<TrainingBackend>,
    class_names: Vec<String>,
    provider: Arc<dyn DatasetProvider>,
    training_config: TrainingConfig,
    runtime_config: RuntimeConfig,
    train_data: Option<Arc<NormalizedImages>>,
    test_data: Option<Arc<NormalizedImages>>,
    state: LifecycleState,
}

impl FashionClassifier {
    /// Creates a new ClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::ClassifierBuilder {
        super::builder::ClassifierBuilder::new()
    }

    /// Builds a classifier with the default dataset and configuration, training it
    /// from scratch unless `weights` names a previously saved weights file.
    pub fn new(weights: Option<&Path>) -> Result<Self, ClassifierError> {
        let builder = Self::builder();
        match weights {
            Some(path) => builder.with_weights(path).build(),
            None => builder.build(),
        }
    }

    /// Assembles an untrained classifier; the builder drives the rest of construction.
    pub(crate) fn from_parts(
        provider: Arc<dyn DatasetProvider>,
        training_config: TrainingConfig,
        runtime_config: RuntimeConfig,
    ) -> Self {
        let model = training_config
            .model
            .init::<TrainingBackend>(&runtime_config.device);
        let classifier = Self {
            model,
            class_names: CLASS_NAMES.iter().map(|name| name.to_string()).collect(),
            provider,
            training_config,
            runtime_config,
            train_data: None,
            test_data: None,
            state: LifecycleState::Built,
        };
        classifier.log_summary();
        classifier
    }

    /// Returns a copy of the valid class names.
    pub fn get_class_names(&self) -> Vec<String> {
        self.class_names.clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_data_loaded(&self) -> bool {
        self.train_data.is_some() && self.test_data.is_some()
    }

    pub fn training_config(&self) -> &TrainingConfig {
        &self.training_config
    }

    pub fn train_data(&self) -> Option<&NormalizedImages> {
        self.train_data.as_deref()
    }

    pub fn test_data(&self) -> Option<&NormalizedImages> {
        self.test_data.as_deref()
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            state: self.state,
            data_loaded: self.is_data_loaded(),
            num_params: self.model.num_params(),
            class_names: self.get_class_names(),
            train_size: self.train_data.as_ref().map(|d| d.len()),
            test_size: self.test_data.as_ref().map(|d| d.len()),
        }
    }

    /// Fetches both splits from the provider and normalizes them to [0, 1].
    ///
    /// Every call fetches and normalizes again; use
    /// [`FashionClassifier::ensure_data_loaded`] to load at most once.
    pub fn load_data(&mut self) -> Result<(), ClassifierError> {
        let splits = self.provider.load()?;
        self.train_data = Some(Arc::new(Self::preprocess(&splits.train)));
        self.test_data = Some(Arc::new(Self::preprocess(&splits.test)));
        info!(
            "Data loaded: {} training images, {} test images",
            splits.train.len(),
            splits.test.len()
        );
        Ok(())
    }

    /// Loads the data unless it is already loaded.
    pub fn ensure_data_loaded(&mut self) -> Result<(), ClassifierError> {
        if !self.is_data_loaded() {
            self.load_data()?;
        }
        Ok(())
    }

    fn preprocess(set: &LabeledImages) -> NormalizedImages {
        NormalizedImages {
            images: normalize_images(set.images.view()),
            labels: set.labels.clone(),
        }
    }

    /// Rebuilds the network with fresh parameters, discarding any trained weights.
    pub fn build_model(&mut self) {
        self.model = self
            .training_config
            .model
            .init::<TrainingBackend>(&self.runtime_config.device);
        self.state = LifecycleState::Built;
        self.log_summary();
    }

    fn log_summary(&self) {
        let config = &self.training_config.model;
        info!(
            "Model: flatten {}x{} -> dense {} (relu) -> dense {} (softmax), {} parameters",
            config.image_size,
            config.image_size,
            config.hidden_size,
            config.num_classes,
            self.model.num_params()
        );
    }

    fn require_data(
        data: &Option<Arc<NormalizedImages>>,
        split: &str,
    ) -> Result<Arc<NormalizedImages>, ClassifierError> {
        data.clone().ok_or_else(|| {
            ClassifierError::Precondition(format!(
                "{} data is not loaded; call load_data() first",
                split
            ))
        })
    }

    /// Runs `num_epochs` passes of Adam over the training set, then evaluates once
    /// on the test set.
    pub fn train(&mut self) -> Result<Evaluation, ClassifierError> {
        let train_data = Self::require_data(&self.train_data, "training")?;
        Self::require_data(&self.test_data, "test")?;

        let config = &self.training_config;
        let device = self.runtime_config.device;

        let mut builder = DataLoaderBuilder::new(FashionBatcher::<TrainingBackend>::new(device))
            .batch_size(config.batch_size)
            .shuffle(config.seed);
        if self.runtime_config.num_workers > 0 {
            builder = builder.num_workers(self.runtime_config.num_workers);
        }
        let dataloader = builder.build(FashionDataset::new(train_data));

        info!(
            "Training for {} epochs (batch size {}, learning rate {})",
            config.num_epochs, config.batch_size, config.learning_rate
        );

        let mut model = self.model.clone();
        let mut optim = AdamConfig::new().init();

        for epoch in 1..=config.num_epochs {
            let mut totals = RunningTotals::default();

            for batch in dataloader.iter() {
                let output = model.forward_classification(batch.images, batch.targets);
                totals.add(output.loss.clone(), output.output.clone(), output.targets.clone());

                let grads = GradientsParams::from_grads(output.loss.backward(), &model);
                model = optim.step(config.learning_rate, model, grads);
            }

            let summary = totals.finish();
            info!(
                "Epoch {}/{} - loss: {:.4} - accuracy: {:.4}",
                epoch, config.num_epochs, summary.loss, summary.accuracy
            );
        }

        self.model = model;
        self.state = LifecycleState::Trained;

        let evaluation = self.evaluate()?;
        info!(
            "Test evaluation - loss: {:.4} - accuracy: {:.4}",
            evaluation.loss, evaluation.accuracy
        );
        Ok(evaluation)
    }

    /// Mean cross-entropy loss and accuracy over the test set.
    pub fn evaluate(&self) -> Result<Evaluation, ClassifierError> {
        let test_data = Self::require_data(&self.test_data, "test")?;
        if test_data.is_empty() {
            return Err(ClassifierError::Precondition("test split is empty".to_string()));
        }

        let dataloader =
            DataLoaderBuilder::new(FashionBatcher::<InferenceBackend>::new(self.runtime_config.device))
                .batch_size(self.training_config.batch_size)
                .build(FashionDataset::new(test_data));

        let model = self.model.valid();
        let mut totals = RunningTotals::default();
        for batch in dataloader.iter() {
            let output = model.forward_classification(batch.images, batch.targets);
            totals.add(output.loss, output.output, output.targets);
        }
        Ok(totals.finish())
    }

    /// Classifies a single 28×28 image with intensities in [0, 255].
    pub fn test(&self, image: ArrayView2<u8>) -> Result<Prediction, ClassifierError> {
        let probabilities = self.predict_probabilities(image)?;
        let class_index = argmax(&probabilities)
            .ok_or_else(|| ClassifierError::Backend("model produced no class scores".to_string()))?;
        let class_name = self
            .class_names
            .get(class_index)
            .cloned()
            .ok_or_else(|| ClassifierError::shape_mismatch(self.class_names.len(), class_index + 1))?;

        debug!("Classified image as {}:{}", class_index, class_name);
        Ok(Prediction {
            class_index,
            class_name,
        })
    }

    /// Softmax distribution over the classes for a single 28×28 image.
    pub fn predict_probabilities(&self, image: ArrayView2<u8>) -> Result<Vec<f32>, ClassifierError> {
        let size = self.training_config.model.image_size;
        if image.dim() != (size, size) {
            return Err(ClassifierError::shape_mismatch((size, size), image.dim()));
        }

        let pixels: Vec<f32> = normalize_image(image).iter().copied().collect();
        let batch = Tensor::<InferenceBackend, 1>::from_floats(pixels.as_slice(), &self.runtime_config.device)
            .reshape([1, size, size]);

        self.model
            .valid()
            .predict(batch)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| ClassifierError::Backend(format!("{:?}", e)))
    }

    /// Writes the current parameters to `path` in burn's binary record format.
    /// Only the weights are stored, not the architecture.
    pub fn save_weights<P: AsRef<Path>>(&self, path: P) -> Result<(), ClassifierError> {
        let path = path.as_ref();
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let bytes = recorder.record(self.model.clone().into_record(), ())?;
        fs::write(path, &bytes)?;
        info!("Saved {} bytes of weights to {:?}", bytes.len(), path);
        Ok(())
    }

    /// Loads weights saved by [`FashionClassifier::save_weights`] into the current
    /// network, which must have the same architecture.
    pub fn load_weights<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ClassifierError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let record = recorder.load(bytes, &self.runtime_config.device)?;
        validate_record(&record, &self.training_config.model)?;

        self.model = self.model.clone().load_record(record);
        self.state = LifecycleState::WeightsLoaded;
        info!("Loaded weights from {:?}", path);
        Ok(())
    }

    /// Returns test image `index` rescaled back to [0, 255], loading the data first
    /// if needed.
    pub fn get_test_image(&mut self, index: usize) -> Result<Array2<u8>, ClassifierError> {
        self.ensure_data_loaded()?;
        let test_data = Self::require_data(&self.test_data, "test")?;
        if index >= test_data.len() {
            return Err(ClassifierError::IndexOutOfRange {
                index,
                len: test_data.len(),
            });
        }
        Ok(denormalize_image(test_data.images.slice(s![index, .., ..])))
    }
}

/// Sample-weighted loss and accuracy accumulated over batches.
#[derive(Debug, Default)]
struct RunningTotals {
    loss_sum: f64,
    correct: usize,
    seen: usize,
}

impl RunningTotals {
    fn add<B: Backend>(&mut self, loss: Tensor<B, 1>, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) {
        let [batch_size] = targets.dims();
        let predicted = logits.argmax(1).reshape([batch_size]);
        let correct = predicted.equal(targets).int().sum().into_scalar().elem::<i64>();

        self.loss_sum += loss.into_scalar().elem::<f64>() * batch_size as f64;
        self.correct += correct as usize;
        self.seen += batch_size;
    }

    fn finish(self) -> Evaluation {
        if self.seen == 0 {
            return Evaluation { loss: 0.0, accuracy: 0.0 };
        }
        Evaluation {
            loss: self.loss_sum / self.seen as f64,
            accuracy: self.correct as f64 / self.seen as f64,
        }
    }
}
