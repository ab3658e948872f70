use std::sync::Arc;

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    tensor::{backend::Backend, Int, Tensor},
};
use ndarray::{s, Array1, Array3};

use crate::dataset::IMAGE_SIZE;

/// Normalized images with their labels, as kept by the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImages {
    /// Intensities in [0, 1], shape `(n, 28, 28)`
    pub images: Array3<f32>,
    pub labels: Array1<u8>,
}

impl NormalizedImages {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct FashionItem {
    /// Row-major normalized pixels
    pub pixels: Vec<f32>,
    pub label: u8,
}

/// Exposes a shared [`NormalizedImages`] set to burn's data loaders.
#[derive(Clone, Debug)]
pub struct FashionDataset {
    data: Arc<NormalizedImages>,
}

impl FashionDataset {
    pub fn new(data: Arc<NormalizedImages>) -> Self {
        Self { data }
    }
}

impl Dataset<FashionItem> for FashionDataset {
    fn get(&self, index: usize) -> Option<FashionItem> {
        if index >= self.data.len() {
            return None;
        }
        let image = self.data.images.slice(s![index, .., ..]);
        Some(FashionItem {
            pixels: image.iter().copied().collect(),
            label: self.data.labels[index],
        })
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

#[derive(Clone)]
pub struct FashionBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> FashionBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

#[derive(Clone, Debug)]
pub struct FashionBatch<B: Backend> {
    pub images: Tensor<B, 3>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<B, FashionItem, FashionBatch<B>> for FashionBatcher<B> {
    fn batch(&self, items: Vec<FashionItem>, _device: &B::Device) -> FashionBatch<B> {
        let batch_size = items.len();
        let mut pixels = Vec::with_capacity(batch_size * IMAGE_SIZE * IMAGE_SIZE);
        let mut targets = Vec::with_capacity(batch_size);

        for item in items {
            pixels.extend_from_slice(&item.pixels);
            targets.push(item.label as i64);
        }

        let images = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([batch_size, IMAGE_SIZE, IMAGE_SIZE]);
        let targets = Tensor::<B, 1, Int>::from_ints(targets.as_slice(), &self.device);

        FashionBatch { images, targets }
    }
}
