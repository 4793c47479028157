
use affect_core::acquisition::{to_channel_matrix, SampleBuffer};
use affect_core::config::PipelineConfig;
use affect_core::processing::{FeatureExtractor, SignalConditioner};
use affect_core::simulation::{SyntheticConfig, SyntheticEeg};
use affect_core::utils::time::SystemTimeProvider;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

const BUFFER_SIZES: &[usize] = &[256, 1024, 2560];
const WINDOW_LENGTHS: &[usize] = &[128, 512];

fn benchmark_buffer_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_buffer");

    for &capacity in BUFFER_SIZES {
        group.throughput(Throughput::Elements(1000));

        group.bench_with_input(BenchmarkId::new("ingest", capacity), &capacity, |b, &size| {
            let buffer = SampleBuffer::new(size, 4, Arc::new(SystemTimeProvider)).unwrap();
            let values = [1.0f32, 2.0, 3.0, 4.0];

            b.iter(|| {
                for i in 0..1000u64 {
                    let _ = buffer.ingest_values(black_box(&values), i);
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("snapshot", capacity), &capacity, |b, &size| {
            let buffer = SampleBuffer::new(size, 4, Arc::new(SystemTimeProvider)).unwrap();
            for sample in SyntheticEeg::new(SyntheticConfig::default()).take_samples(size) {
                let _ = buffer.ingest(sample);
            }

            b.iter(|| black_box(buffer.snapshot()));
        });
    }

    group.finish();
}

fn benchmark_conditioning(c: &mut Criterion) {
    let mut group = c.benchmark_group("conditioning");
    let config = PipelineConfig::default();
    let conditioner = SignalConditioner::new(&config.signal, &config.filter).unwrap();

    for &samples in BUFFER_SIZES {
        let raw = SyntheticEeg::new(SyntheticConfig::default()).take_samples(samples);
        let matrix = to_channel_matrix(&raw, 4);
        group.throughput(Throughput::Elements(samples as u64));

        group.bench_with_input(BenchmarkId::new("condition", samples), &matrix, |b, data| {
            b.iter(|| conditioner.condition(black_box(data.view())))
        });
    }

    group.finish();
}

fn benchmark_feature_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("features");
    let config = PipelineConfig::default();

    for &len in WINDOW_LENGTHS {
        let extractor = FeatureExtractor::new(256.0, 4, config.features.bands.clone(), len);
        let window = SyntheticEeg::new(SyntheticConfig::default()).recording(len);

        group.bench_with_input(BenchmarkId::new("extract", len), &window, |b, data| {
            b.iter(|| extractor.extract(black_box(data.view())))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_buffer_operations,
    benchmark_conditioning,
    benchmark_feature_extraction
);
criterion_main!(benches);
