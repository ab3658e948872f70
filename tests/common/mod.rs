#![allow(dead_code)]

use std::sync::Arc;

use atelier::{DatasetProvider, DatasetSplits, InMemoryProvider, LabeledImages, TrainingConfig};
use env_logger::{Builder, Env};
use ndarray::{Array1, Array3};

pub fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

/// Images whose brightest rows depend on the label, so a few epochs learn something.
pub fn synthetic_set(count: usize, offset: usize) -> LabeledImages {
    let labels = Array1::from_shape_fn(count, |i| ((i + offset) % 10) as u8);
    let images = Array3::from_shape_fn((count, 28, 28), |(i, r, c)| {
        let label = (i + offset) % 10;
        if r / 3 == label {
            200 + ((c + i) % 50) as u8
        } else {
            ((r * 5 + c * 3 + i) % 40) as u8
        }
    });
    LabeledImages::new(images, labels).expect("synthetic set is valid")
}

pub fn synthetic_provider(train: usize, test: usize) -> Arc<dyn DatasetProvider> {
    let splits = DatasetSplits {
        train: synthetic_set(train, 0),
        test: synthetic_set(test, 3),
    };
    Arc::new(InMemoryProvider::new(splits).expect("synthetic splits are valid"))
}

pub fn quick_config() -> TrainingConfig {
    TrainingConfig::new().with_num_epochs(2).with_batch_size(16)
}
