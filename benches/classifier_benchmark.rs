use std::sync::Arc;

use atelier::{
    DatasetProvider, DatasetSplits, FashionClassifier, InMemoryProvider, LabeledImages,
    TrainingConfig,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2, Array3};

fn synthetic_provider(train: usize, test: usize) -> Arc<dyn DatasetProvider> {
    let set = |n: usize| {
        LabeledImages::new(
            Array3::from_shape_fn((n, 28, 28), |(i, r, c)| ((i * 13 + r * 7 + c) % 256) as u8),
            Array1::from_shape_fn(n, |i| (i % 10) as u8),
        )
        .unwrap()
    };
    Arc::new(InMemoryProvider::new(DatasetSplits { train: set(train), test: set(test) }).unwrap())
}

fn setup_benchmark_classifier(test: usize) -> FashionClassifier {
    FashionClassifier::builder()
        .with_dataset_provider(synthetic_provider(64, test))
        .with_training_config(TrainingConfig::new().with_num_epochs(1))
        .build()
        .unwrap()
}

fn bench_prediction(c: &mut Criterion) {
    let classifier = setup_benchmark_classifier(16);
    let mut group = c.benchmark_group("Prediction");

    // Configure sampling
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    let blank = Array2::<u8>::zeros((28, 28));
    let pattern = Array2::from_shape_fn((28, 28), |(r, c)| ((r * 28 + c) % 256) as u8);

    group.bench_function("blank_image", |b| b.iter(|| {
        classifier.test(black_box(blank.view())).unwrap()
    }));

    group.bench_function("patterned_image", |b| b.iter(|| {
        classifier.test(black_box(pattern.view())).unwrap()
    }));

    group.bench_function("probabilities", |b| b.iter(|| {
        classifier.predict_probabilities(black_box(pattern.view())).unwrap()
    }));

    group.finish();
}

fn bench_preprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Preprocessing");
    group.sample_size(20);
    group.warm_up_time(std::time::Duration::from_secs(1));

    // Normalizing both splits scales with the number of images
    for &count in &[100usize, 1_000, 5_000] {
        let mut classifier = FashionClassifier::builder()
            .with_dataset_provider(synthetic_provider(count, count / 10))
            .build_untrained()
            .unwrap();

        group.bench_with_input(BenchmarkId::new("load_data", count), &count, |b, _| b.iter(|| {
            classifier.load_data().unwrap()
        }));
    }

    group.finish();
}

fn bench_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Evaluation");
    group.sample_size(10);

    for &count in &[100usize, 1_000] {
        let classifier = setup_benchmark_classifier(count);
        group.bench_with_input(BenchmarkId::new("test_split", count), &count, |b, _| b.iter(|| {
            classifier.evaluate().unwrap()
        }));
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_prediction,
    bench_preprocessing,
    bench_evaluation
);
criterion_main!(benches);
