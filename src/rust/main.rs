use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use atelier::{
    run_classifier_model, save_grayscale_image, DatasetManager, FashionClassifier, LogSink,
};
use clap::Parser;
use log::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Train, save, load and run a Fashion-MNIST classifier", long_about = None)]
struct Args {
    /// Load weights from this file instead of training from scratch
    #[arg(long)]
    load: Option<PathBuf>,

    /// Classify this image file (converted to grayscale, must be 28x28)
    #[arg(long)]
    image: Option<PathBuf>,

    /// Save the weights to this file
    #[arg(long)]
    save: Option<PathBuf>,

    /// Force a fresh download of the dataset files
    #[arg(short, long)]
    fresh: bool,

    /// Index of a test image to export as a grayscale image
    #[arg(long, requires = "export_path")]
    export_index: Option<usize>,

    /// Where to write the exported test image
    #[arg(long, requires = "export_index")]
    export_path: Option<PathBuf>,
}

impl Args {
    /// Whether anything beyond exporting a test image was asked for.
    fn requests_classifier_run(&self) -> bool {
        self.load.is_some() || self.image.is_some() || self.save.is_some()
    }
}

async fn ensure_dataset_downloaded(fresh: bool) -> anyhow::Result<()> {
    let manager = DatasetManager::new_default().context("failed to create the dataset cache")?;

    if fresh {
        info!("Fresh download requested - removing any existing dataset files...");
        manager.remove_download()?;
    }

    manager
        .ensure_dataset_downloaded()
        .await
        .context("failed to download Fashion-MNIST")?;
    Ok(())
}

fn export_test_image(index: usize, path: PathBuf) -> anyhow::Result<()> {
    let mut classifier = FashionClassifier::builder().build_untrained()?;
    let image = classifier
        .get_test_image(index)
        .with_context(|| format!("failed to read test image {}", index))?;
    save_grayscale_image(image.view(), &path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("Exported test image {} to {}", index, path.display());
    Ok(())
}

fn run(args: Args) -> anyhow::Result<()> {
    if let (Some(index), Some(path)) = (args.export_index, args.export_path.clone()) {
        export_test_image(index, path)?;
        if !args.requests_classifier_run() {
            return Ok(());
        }
    }

    let start = Instant::now();
    let prediction = run_classifier_model(
        args.load.as_deref(),
        args.image.as_deref(),
        args.save.as_deref(),
        &LogSink,
    )
    .context("classifier run failed")?;

    if let Some(prediction) = prediction {
        println!("{} {}", prediction.class_index, prediction.class_name);
    }
    info!("Done in {:.2?}", start.elapsed());
    Ok(())
}

async fn try_main(args: Args) -> anyhow::Result<()> {
    if args.load.is_none() || args.export_index.is_some() || args.fresh {
        ensure_dataset_downloaded(args.fresh).await?;
    }

    // Training and inference block, so keep them off the async workers
    tokio::task::spawn_blocking(move || run(args))
        .await
        .context("classifier task panicked")?
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    info!("=== Fashion-MNIST classifier ===");

    if let Err(e) = try_main(args).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_alone_skips_the_classifier_run() {
        let args = Args::parse_from(["atelier_bin", "--export-index", "3", "--export-path", "t.png"]);
        assert_eq!(args.export_index, Some(3));
        assert!(!args.requests_classifier_run());

        let args = Args::parse_from([
            "atelier_bin", "--export-index", "3", "--export-path", "t.png", "--save", "w.bin",
        ]);
        assert!(args.requests_classifier_run());
    }

    #[test]
    fn test_export_flags_require_each_other() {
        assert!(Args::try_parse_from(["atelier_bin", "--export-index", "3"]).is_err());
        assert!(Args::try_parse_from(["atelier_bin", "--export-path", "t.png"]).is_err());
    }
}
