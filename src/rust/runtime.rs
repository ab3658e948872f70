use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};

/// Backend used for inference and evaluation.
pub type InferenceBackend = NdArray<f32>;

/// Backend used while fitting; wraps [`InferenceBackend`] with automatic differentiation.
pub type TrainingBackend = Autodiff<InferenceBackend>;

pub type Device = NdArrayDevice;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub device: Device,
    pub num_workers: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            device: NdArrayDevice::Cpu,
            num_workers: 0, // Batches are assembled on the calling thread
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_runtime_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.device, NdArrayDevice::Cpu);
        assert_eq!(config.num_workers, 0);
    }
}
