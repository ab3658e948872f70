use std::path::{Path, PathBuf};
use std::fs;
use std::io;
use std::sync::Arc;
use std::env;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::Mutex;
use reqwest;
use sha2::{Sha256, Digest};
use dirs;
use log;

/// Keras mirror of the Fashion-MNIST distribution files.
pub const DATASET_BASE_URL: &str = "https://storage.googleapis.com/tensorflow/tf-keras-datasets/";

const DATASET_NAME: &str = "fashion-mnist";
const DIGEST_EXTENSION: &str = "sha256";

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Dataset not downloaded: {0}")]
    NotDownloaded(String),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Dataset verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual} for {file} file")]
    HashMismatch {
        file: String,
        expected: String,
        actual: String,
    },
    #[error("Malformed dataset file {file}: {reason}")]
    FormatError { file: String, reason: String },
    #[error("Invalid dataset: {0}")]
    InvalidData(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// One of the four files making up the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetFile {
    TrainImages,
    TrainLabels,
    TestImages,
    TestLabels,
}

impl DatasetFile {
    pub const ALL: [DatasetFile; 4] = [
        DatasetFile::TrainImages,
        DatasetFile::TrainLabels,
        DatasetFile::TestImages,
        DatasetFile::TestLabels,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            DatasetFile::TrainImages => "train-images-idx3-ubyte.gz",
            DatasetFile::TrainLabels => "train-labels-idx1-ubyte.gz",
            DatasetFile::TestImages => "t10k-images-idx3-ubyte.gz",
            DatasetFile::TestLabels => "t10k-labels-idx1-ubyte.gz",
        }
    }

    pub fn url(&self) -> String {
        self.url_in(DATASET_BASE_URL)
    }

    /// Location of this file under another mirror of the distribution.
    pub fn url_in(&self, base_url: &str) -> String {
        format!("{}{}", base_url, self.file_name())
    }
}

/// Owns the on-disk cache of the Fashion-MNIST files.
///
/// Each file is stored next to a `.sha256` sidecar holding the digest computed when
/// it was downloaded; [`DatasetManager::verify_dataset`] checks the files against it.
#[derive(Clone, Debug)]
pub struct DatasetManager {
    cache_dir: PathBuf,
    base_url: String,
    download_lock: Arc<Mutex<()>>,
}

impl DatasetManager {
    /// Creates a new DatasetManager with the default cache directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_cache_dir())
    }

    /// Returns the default cache directory path
    pub fn get_default_cache_dir() -> PathBuf {
        Self::resolve_cache_dir(env::var_os("ATELIER_CACHE").map(PathBuf::from))
    }

    fn resolve_cache_dir(override_root: Option<PathBuf>) -> PathBuf {
        // 1. Explicit root, from ATELIER_CACHE
        if let Some(path) = override_root {
            return path.join("datasets");
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("atelier").join("datasets");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("atelier").join("datasets");
        }

        // 4. If all else fails, use system temp directory (platform agnostic)
        env::temp_dir().join("atelier").join("datasets")
    }

    pub fn new<P: AsRef<Path>>(cache_dir: P) -> io::Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            cache_dir,
            base_url: DATASET_BASE_URL.to_string(),
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Downloads from `base_url` instead of the Keras mirror. The URL of each file
    /// is `base_url` followed by its file name.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn dataset_dir(&self) -> PathBuf {
        self.cache_dir.join(DATASET_NAME)
    }

    pub fn file_path(&self, file: DatasetFile) -> PathBuf {
        self.dataset_dir().join(file.file_name())
    }

    pub fn digest_path(&self, file: DatasetFile) -> PathBuf {
        let mut name = file.file_name().to_string();
        name.push('.');
        name.push_str(DIGEST_EXTENSION);
        self.dataset_dir().join(name)
    }

    pub fn is_dataset_downloaded(&self) -> bool {
        log::debug!("Checking if dataset is downloaded in {:?}", self.dataset_dir());
        DatasetFile::ALL.iter().all(|&file| {
            let path = self.file_path(file);
            let exists = path.exists() && self.digest_path(file).exists();
            log::debug!("  {:?} (exists: {})", path, exists);
            exists
        })
    }

    pub async fn download_dataset(&self) -> Result<(), DatasetError> {
        let _lock = self.download_lock.lock().await;

        let dataset_dir = self.dataset_dir();
        log::info!("Creating dataset directory at {:?}", dataset_dir);
        fs::create_dir_all(&dataset_dir)?;

        for file in DatasetFile::ALL {
            let path = self.file_path(file);
            let result = if path.exists() && self.verify_file(file)? {
                log::info!("Existing {} verified successfully", file.file_name());
                Ok(())
            } else {
                log::info!("Downloading {}...", file.file_name());
                self.download_and_record_file(file).await
            };

            if let Err(e) = result {
                log::error!("Failed to set up {}: {}", file.file_name(), e);
                // Cleanup on failure
                let _ = self.remove_download();
                return Err(e);
            }
        }

        log::info!("Dataset ready to use");
        Ok(())
    }

    fn compute_digest(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }

    /// Checks one cached file against its recorded digest. A file without a
    /// recorded digest never verifies.
    pub fn verify_file(&self, file: DatasetFile) -> Result<bool, DatasetError> {
        let path = self.file_path(file);
        let digest_path = self.digest_path(file);
        if !path.exists() || !digest_path.exists() {
            return Ok(false);
        }

        let expected = fs::read_to_string(&digest_path)?;
        let bytes = fs::read(&path)?;
        let actual = Self::compute_digest(&bytes);
        log::debug!("Verifying {:?}: {} bytes, hash {}", path, bytes.len(), actual);
        Ok(actual == expected.trim())
    }

    pub fn verify_dataset(&self) -> Result<bool, DatasetError> {
        for file in DatasetFile::ALL {
            if !self.verify_file(file)? {
                log::info!("Verification failed for {}", file.file_name());
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Writes `bytes` as the cached copy of `file` and records its digest.
    pub fn store_file(&self, file: DatasetFile, bytes: &[u8]) -> Result<(), DatasetError> {
        let path = self.file_path(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let hash = Self::compute_digest(bytes);
        log::info!("Writing {} bytes to {:?}", bytes.len(), path);
        fs::write(&path, bytes)?;
        fs::write(self.digest_path(file), &hash)?;

        // Verify after writing
        if !self.verify_file(file)? {
            return Err(DatasetError::VerificationFailed);
        }
        Ok(())
    }

    async fn download_and_record_file(&self, file: DatasetFile) -> Result<(), DatasetError> {
        let url = file.url_in(&self.base_url);
        let path = self.file_path(file);
        log::info!("Downloading {} from {} to {:?}", file.file_name(), url, path);
        let response = reqwest::get(&url).await?.error_for_status()?;
        log::info!("Download response status: {}", response.status());
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        self.store_file(file, &bytes)?;
        log::info!("{} downloaded and verified successfully", file.file_name());
        Ok(())
    }

    pub fn remove_download(&self) -> Result<(), DatasetError> {
        for file in DatasetFile::ALL {
            for path in [self.file_path(file), self.digest_path(file)] {
                if path.exists() {
                    fs::remove_file(&path)?;
                }
            }
        }
        Ok(())
    }

    /// Ensures that the dataset is downloaded and verified.
    /// If the files don't exist, they will be downloaded.
    /// If verification fails, they will be re-downloaded.
    pub async fn ensure_dataset_downloaded(&self) -> Result<(), DatasetError> {
        log::info!("Checking if {} is downloaded...", DATASET_NAME);
        if !self.is_dataset_downloaded() {
            log::info!("Dataset not found, downloading...");
            self.download_dataset().await?;
        } else if !self.verify_dataset()? {
            log::info!("Dataset verification failed, re-downloading...");
            self.remove_download()?;
            self.download_dataset().await?;
        } else {
            log::info!("Dataset verification successful");
        }
        Ok(())
    }

    /// Blocking variant of [`DatasetManager::ensure_dataset_downloaded`] for
    /// synchronous callers, safe to call from inside a tokio runtime.
    ///
    /// On a multi-thread runtime the download runs on the ambient runtime via
    /// `block_in_place`. A current-thread runtime cannot be re-entered, so the
    /// download gets a thread and runtime of its own; the same happens when no
    /// runtime is running.
    pub fn ensure_dataset_downloaded_blocking(&self) -> Result<(), DatasetError> {
        if self.is_dataset_downloaded() && self.verify_dataset()? {
            return Ok(());
        }

        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() != RuntimeFlavor::CurrentThread => {
                tokio::task::block_in_place(|| handle.block_on(self.ensure_dataset_downloaded()))
            }
            Ok(_) => std::thread::scope(|scope| {
                scope
                    .spawn(|| self.ensure_on_private_runtime())
                    .join()
                    .map_err(|_| DatasetError::Runtime("dataset download thread panicked".to_string()))?
            }),
            Err(_) => self.ensure_on_private_runtime(),
        }
    }

    fn ensure_on_private_runtime(&self) -> Result<(), DatasetError> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(self.ensure_dataset_downloaded())
    }
}
