use std::io::Write;

use atelier::dataset::parse_idx_images;
use atelier::{DatasetError, DatasetFile, DatasetManager, DatasetProvider, FashionMnistProvider};
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::tempdir;

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

fn idx_images(count: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    for word in [0x0000_0803u32, count, 28, 28] {
        bytes.extend_from_slice(&word.to_be_bytes());
    }
    bytes.extend((0..count * 28 * 28).map(|i| (i % 256) as u8));
    bytes
}

fn idx_labels(count: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    for word in [0x0000_0801u32, count] {
        bytes.extend_from_slice(&word.to_be_bytes());
    }
    bytes.extend((0..count).map(|i| (i % 10) as u8));
    bytes
}

/// Fills the cache with a small dataset so nothing has to be downloaded.
fn seed_cache(manager: &DatasetManager) -> Result<(), DatasetError> {
    manager.store_file(DatasetFile::TrainImages, &gzip(&idx_images(12)))?;
    manager.store_file(DatasetFile::TrainLabels, &gzip(&idx_labels(12)))?;
    manager.store_file(DatasetFile::TestImages, &gzip(&idx_images(5)))?;
    manager.store_file(DatasetFile::TestLabels, &gzip(&idx_labels(5)))?;
    Ok(())
}

#[test]
fn test_stored_files_verify() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let manager = DatasetManager::new(dir.path())?;
    assert!(!manager.is_dataset_downloaded());
    assert!(!manager.verify_dataset()?);

    seed_cache(&manager)?;
    assert!(manager.is_dataset_downloaded());
    assert!(manager.verify_dataset()?);
    for file in DatasetFile::ALL {
        assert!(manager.file_path(file).starts_with(dir.path().join("fashion-mnist")));
        assert!(manager.digest_path(file).exists());
    }
    Ok(())
}

#[test]
fn test_corrupted_file_fails_verification() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let manager = DatasetManager::new(dir.path())?;
    seed_cache(&manager)?;

    std::fs::write(manager.file_path(DatasetFile::TestLabels), b"tampered")?;
    assert!(!manager.verify_file(DatasetFile::TestLabels)?);
    assert!(manager.verify_file(DatasetFile::TrainLabels)?);
    assert!(!manager.verify_dataset()?);
    Ok(())
}

#[test]
fn test_remove_download() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let manager = DatasetManager::new(dir.path())?;
    seed_cache(&manager)?;

    manager.remove_download()?;
    assert!(!manager.is_dataset_downloaded());
    for file in DatasetFile::ALL {
        assert!(!manager.file_path(file).exists());
        assert!(!manager.digest_path(file).exists());
    }
    Ok(())
}

#[test]
fn test_ensure_downloaded_uses_verified_cache() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let manager = DatasetManager::new(dir.path())?;
    seed_cache(&manager)?;
    let before = std::fs::read(manager.file_path(DatasetFile::TrainImages))?;

    tokio_test::block_on(manager.ensure_dataset_downloaded())?;
    manager.ensure_dataset_downloaded_blocking()?;

    assert_eq!(std::fs::read(manager.file_path(DatasetFile::TrainImages))?, before);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_ensure_calls() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let manager = DatasetManager::new(dir.path())?;
    seed_cache(&manager)?;

    let other = manager.clone();
    let (a, b) = tokio::join!(
        manager.ensure_dataset_downloaded(),
        other.ensure_dataset_downloaded()
    );
    a?;
    b?;
    assert!(manager.verify_dataset()?);
    Ok(())
}

#[test]
fn test_provider_reads_cached_files() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let manager = DatasetManager::new(dir.path())?;
    seed_cache(&manager)?;

    let provider = FashionMnistProvider::new(manager);
    let splits = provider.load()?;
    assert_eq!(splits.train.images.dim(), (12, 28, 28));
    assert_eq!(splits.test.len(), 5);
    assert_eq!(splits.train.labels[11], 1);
    assert_eq!(splits.test.images[[0, 0, 5]], 5);

    // A second load is served from the in-process cache
    let again = provider.load()?;
    assert!(std::sync::Arc::ptr_eq(&splits, &again));

    provider.evict();
    let reread = provider.load()?;
    assert!(!std::sync::Arc::ptr_eq(&splits, &reread));
    assert_eq!(*splits, *reread);
    Ok(())
}

#[test]
fn test_provider_rejects_malformed_files() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let manager = DatasetManager::new(dir.path())?;
    seed_cache(&manager)?;
    manager.store_file(DatasetFile::TestLabels, &gzip(&idx_labels(4)))?;

    let provider = FashionMnistProvider::new(manager);
    assert!(matches!(provider.read_cached(), Err(DatasetError::InvalidData(_))));

    let mut header = idx_images(1);
    header[2] = 0x09;
    assert!(matches!(
        parse_idx_images(&header, "bad"),
        Err(DatasetError::FormatError { .. })
    ));
    Ok(())
}

#[test]
#[ignore = "downloads Fashion-MNIST from the network"]
fn test_download_fashion_mnist() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let manager = DatasetManager::new(dir.path())?;
    tokio_test::block_on(manager.download_dataset())?;
    assert!(manager.verify_dataset()?);

    let splits = FashionMnistProvider::new(manager).read_cached()?;
    assert_eq!(splits.train.len(), 60_000);
    assert_eq!(splits.test.len(), 10_000);
    Ok(())
}

/// A mirror nothing listens on, so downloads fail fast without leaving the machine.
const UNREACHABLE_MIRROR: &str = "http://127.0.0.1:9/";

#[tokio::test]
async fn test_blocking_load_inside_current_thread_runtime() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let manager = DatasetManager::new(dir.path())?.with_base_url(UNREACHABLE_MIRROR);

    let provider = FashionMnistProvider::new(manager);
    let result = provider.load();
    assert!(matches!(result, Err(DatasetError::DownloadError(_))));
    assert!(!provider.manager()?.is_dataset_downloaded());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_load_inside_multi_thread_runtime() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let manager = DatasetManager::new(dir.path())?.with_base_url(UNREACHABLE_MIRROR);

    let result = manager.ensure_dataset_downloaded_blocking();
    assert!(matches!(result, Err(DatasetError::DownloadError(_))));

    // Also from a task running on a worker thread
    let worker_result = tokio::spawn(async move {
        FashionMnistProvider::new(manager).load().map(|_| ())
    })
    .await?;
    assert!(matches!(worker_result, Err(DatasetError::DownloadError(_))));
    Ok(())
}

#[tokio::test]
async fn test_blocking_load_inside_runtime_uses_verified_cache() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let manager = DatasetManager::new(dir.path())?.with_base_url(UNREACHABLE_MIRROR);
    seed_cache(&manager)?;

    let splits = FashionMnistProvider::new(manager).load()?;
    assert_eq!(splits.train.len(), 12);
    Ok(())
}

#[test]
fn test_mirror_urls() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let manager = DatasetManager::new(dir.path())?;
    assert_eq!(manager.base_url(), atelier::dataset_manager::DATASET_BASE_URL);

    let manager = manager.with_base_url("https://mirror.example/fashion/");
    assert_eq!(
        DatasetFile::TestLabels.url_in(manager.base_url()),
        "https://mirror.example/fashion/t10k-labels-idx1-ubyte.gz"
    );
    Ok(())
}
