//! Labeled image sets and the providers that supply them.
//!
//! The default [`FashionMnistProvider`] reads the gzip IDX files kept by a
//! [`DatasetManager`], downloading them on first use, and memoizes the parsed splits
//! for the rest of the process.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use flate2::read::GzDecoder;
use lazy_static::lazy_static;
use log::{debug, info};
use ndarray::{Array1, Array3};

use crate::dataset_manager::{DatasetError, DatasetFile, DatasetManager};

/// Width and height of every image in the dataset.
pub const IMAGE_SIZE: usize = 28;

/// Number of label classes.
pub const NUM_CLASSES: usize = 10;

const IMAGES_MAGIC: u32 = 0x0000_0803;
const LABELS_MAGIC: u32 = 0x0000_0801;

/// A batch of single-channel 28×28 images with one class label each.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledImages {
    /// Raw intensities, shape `(n, 28, 28)`
    pub images: Array3<u8>,
    /// Class indices in `[0, 10)`, shape `(n,)`
    pub labels: Array1<u8>,
}

impl LabeledImages {
    pub fn new(images: Array3<u8>, labels: Array1<u8>) -> Result<Self, DatasetError> {
        let set = Self { images, labels };
        set.validate()?;
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn validate(&self) -> Result<(), DatasetError> {
        let (count, rows, cols) = self.images.dim();
        if rows != IMAGE_SIZE || cols != IMAGE_SIZE {
            return Err(DatasetError::InvalidData(format!(
                "images must be {}x{}, found {}x{}",
                IMAGE_SIZE, IMAGE_SIZE, rows, cols
            )));
        }
        if count != self.labels.len() {
            return Err(DatasetError::InvalidData(format!(
                "{} images but {} labels",
                count,
                self.labels.len()
            )));
        }
        if let Some(label) = self.labels.iter().find(|&&l| l as usize >= NUM_CLASSES) {
            return Err(DatasetError::InvalidData(format!(
                "label {} is outside [0, {})",
                label, NUM_CLASSES
            )));
        }
        Ok(())
    }
}

/// The training and test partitions of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplits {
    pub train: LabeledImages,
    pub test: LabeledImages,
}

impl DatasetSplits {
    pub fn validate(&self) -> Result<(), DatasetError> {
        self.train.validate()?;
        self.test.validate()
    }
}

/// Supplies the labeled training and test sets.
///
/// Implementations are expected to cache: repeated calls should be cheap.
pub trait DatasetProvider: Send + Sync + std::fmt::Debug {
    fn load(&self) -> Result<Arc<DatasetSplits>, DatasetError>;
}

lazy_static! {
    static ref DATASET_CACHE: Mutex<HashMap<PathBuf, Arc<DatasetSplits>>> =
        Mutex::new(HashMap::new());
}

/// Fashion-MNIST: 60,000 training and 10,000 test images of clothing.
///
/// The cache directory is only created on first use, so a provider can be built
/// even where the cache location is unusable, as long as nothing is loaded.
#[derive(Debug, Clone)]
pub struct FashionMnistProvider {
    cache_dir: PathBuf,
    manager: OnceLock<DatasetManager>,
}

impl FashionMnistProvider {
    pub fn new(manager: DatasetManager) -> Self {
        Self {
            cache_dir: manager.cache_dir().to_path_buf(),
            manager: OnceLock::from(manager),
        }
    }

    /// Uses [`DatasetManager::get_default_cache_dir`] without touching the filesystem.
    pub fn new_default() -> Self {
        Self {
            cache_dir: DatasetManager::get_default_cache_dir(),
            manager: OnceLock::new(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// The manager for this provider's cache directory, creating the directory
    /// the first time it is needed.
    pub fn manager(&self) -> Result<&DatasetManager, DatasetError> {
        if let Some(manager) = self.manager.get() {
            return Ok(manager);
        }
        let manager = DatasetManager::new(&self.cache_dir)?;
        Ok(self.manager.get_or_init(|| manager))
    }

    /// Parses the cached files without touching the network or the in-process cache.
    pub fn read_cached(&self) -> Result<DatasetSplits, DatasetError> {
        let manager = self.manager()?;
        let train = LabeledImages::new(
            read_images(&manager.file_path(DatasetFile::TrainImages))?,
            read_labels(&manager.file_path(DatasetFile::TrainLabels))?,
        )?;
        let test = LabeledImages::new(
            read_images(&manager.file_path(DatasetFile::TestImages))?,
            read_labels(&manager.file_path(DatasetFile::TestLabels))?,
        )?;
        Ok(DatasetSplits { train, test })
    }

    /// Drops this provider's entry from the in-process cache.
    pub fn evict(&self) {
        let mut cache = DATASET_CACHE.lock().unwrap_or_else(|e| e.into_inner());
        cache.remove(&self.cache_dir);
    }
}

impl DatasetProvider for FashionMnistProvider {
    fn load(&self) -> Result<Arc<DatasetSplits>, DatasetError> {
        let key = self.cache_dir.clone();
        {
            let cache = DATASET_CACHE.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(splits) = cache.get(&key) {
                debug!("Using in-process copy of {:?}", key);
                return Ok(Arc::clone(splits));
            }
        }

        self.manager()?.ensure_dataset_downloaded_blocking()?;
        let splits = Arc::new(self.read_cached()?);
        info!(
            "Loaded Fashion-MNIST: {} training and {} test images",
            splits.train.len(),
            splits.test.len()
        );

        let mut cache = DATASET_CACHE.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(key, Arc::clone(&splits));
        Ok(splits)
    }
}

/// Serves caller-supplied splits.
#[derive(Debug, Clone)]
pub struct InMemoryProvider {
    splits: Arc<DatasetSplits>,
}

impl InMemoryProvider {
    pub fn new(splits: DatasetSplits) -> Result<Self, DatasetError> {
        splits.validate()?;
        Ok(Self {
            splits: Arc::new(splits),
        })
    }
}

impl DatasetProvider for InMemoryProvider {
    fn load(&self) -> Result<Arc<DatasetSplits>, DatasetError> {
        Ok(Arc::clone(&self.splits))
    }
}

fn decompress(path: &Path) -> Result<Vec<u8>, DatasetError> {
    let file = File::open(path)?;
    let mut decoder = GzDecoder::new(BufReader::new(file));
    let mut bytes = Vec::new();
    decoder.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_images(path: &Path) -> Result<Array3<u8>, DatasetError> {
    parse_idx_images(&decompress(path)?, &file_label(path))
}

fn read_labels(path: &Path) -> Result<Array1<u8>, DatasetError> {
    parse_idx_labels(&decompress(path)?, &file_label(path))
}

fn read_header(bytes: &[u8], words: usize, file: &str) -> Result<Vec<u32>, DatasetError> {
    if bytes.len() < words * 4 {
        return Err(DatasetError::FormatError {
            file: file.to_string(),
            reason: format!("header needs {} bytes, file has {}", words * 4, bytes.len()),
        });
    }
    Ok(bytes[..words * 4]
        .chunks_exact(4)
        .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Decodes an uncompressed IDX image file: magic, count, rows, cols, then pixels.
pub fn parse_idx_images(bytes: &[u8], file: &str) -> Result<Array3<u8>, DatasetError> {
    let header = read_header(bytes, 4, file)?;
    let format_error = |reason: String| DatasetError::FormatError {
        file: file.to_string(),
        reason,
    };

    if header[0] != IMAGES_MAGIC {
        return Err(format_error(format!("bad magic number {:#010x}", header[0])));
    }
    let (count, rows, cols) = (header[1] as usize, header[2] as usize, header[3] as usize);
    if rows != IMAGE_SIZE || cols != IMAGE_SIZE {
        return Err(format_error(format!("expected {0}x{0} images, found {1}x{2}", IMAGE_SIZE, rows, cols)));
    }

    let pixels = &bytes[16..];
    let expected = count * rows * cols;
    if pixels.len() < expected {
        return Err(format_error(format!("expected {} pixel bytes, found {}", expected, pixels.len())));
    }

    Array3::from_shape_vec((count, rows, cols), pixels[..expected].to_vec())
        .map_err(|e| format_error(e.to_string()))
}

/// Decodes an uncompressed IDX label file: magic, count, then one byte per label.
pub fn parse_idx_labels(bytes: &[u8], file: &str) -> Result<Array1<u8>, DatasetError> {
    let header = read_header(bytes, 2, file)?;
    let format_error = |reason: String| DatasetError::FormatError {
        file: file.to_string(),
        reason,
    };

    if header[0] != LABELS_MAGIC {
        return Err(format_error(format!("bad magic number {:#010x}", header[0])));
    }
    let count = header[1] as usize;
    let labels = &bytes[8..];
    if labels.len() < count {
        return Err(format_error(format!("expected {} labels, found {}", count, labels.len())));
    }

    Ok(Array1::from(labels[..count].to_vec()))
}
