use burn::{
    config::Config,
    module::Module,
    nn::{loss::CrossEntropyLossConfig, Linear, LinearConfig, Relu},
    tensor::{activation::softmax, backend::Backend, Int, Tensor},
    train::ClassificationOutput,
};

use super::error::ClassifierError;

#[derive(Config, Debug)]
pub struct FashionNetConfig {
    /// Side length of the square single-channel input
    #[config(default = 28)]
    pub image_size: usize,
    #[config(default = 128)]
    pub hidden_size: usize,
    #[config(default = 10)]
    pub num_classes: usize,
}

impl FashionNetConfig {
    pub fn input_size(&self) -> usize {
        self.image_size * self.image_size
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> FashionNet<B> {
        FashionNet {
            hidden: LinearConfig::new(self.input_size(), self.hidden_size).init(device),
            output: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }
}

/// Flatten → Dense(128, ReLU) → Dense(10).
///
/// `forward` returns logits; `predict` applies the softmax.
#[derive(Module, Debug)]
pub struct FashionNet<B: Backend> {
    hidden: Linear<B>,
    output: Linear<B>,
    activation: Relu,
}

impl<B: Backend> FashionNet<B> {
    /// Images `[batch, 28, 28]` in [0, 1] → logits `[batch, num_classes]`.
    pub fn forward(&self, images: Tensor<B, 3>) -> Tensor<B, 2> {
        let x = images.flatten::<2>(1, 2);
        let x = self.hidden.forward(x);
        let x = self.activation.forward(x);
        self.output.forward(x)
    }

    /// Per-class probabilities for each image in the batch.
    pub fn predict(&self, images: Tensor<B, 3>) -> Tensor<B, 2> {
        softmax(self.forward(images), 1)
    }

    pub fn forward_classification(
        &self,
        images: Tensor<B, 3>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}

/// Checks a weight record against the architecture `config` describes, so an
/// incompatible file is rejected before it is loaded into a live model.
pub fn validate_record<B: Backend>(
    record: &FashionNetRecord<B>,
    config: &FashionNetConfig,
) -> Result<(), ClassifierError> {
    let expected = [
        ("hidden.weight", vec![config.input_size(), config.hidden_size]),
        ("hidden.bias", vec![config.hidden_size]),
        ("output.weight", vec![config.hidden_size, config.num_classes]),
        ("output.bias", vec![config.num_classes]),
    ];
    let actual = [
        record.hidden.weight.val().dims().to_vec(),
        record.hidden.bias.as_ref().map(|b| b.val().dims().to_vec()).unwrap_or_default(),
        record.output.weight.val().dims().to_vec(),
        record.output.bias.as_ref().map(|b| b.val().dims().to_vec()).unwrap_or_default(),
    ];

    for ((name, expected), actual) in expected.iter().zip(actual.iter()) {
        if expected != actual {
            return Err(ClassifierError::ShapeMismatch {
                expected: format!("{} {:?}", name, expected),
                actual: format!("{} {:?}", name, actual),
            });
        }
    }
    Ok(())
}
