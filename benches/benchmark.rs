// Benchmarks for distance matrix construction and k-NN classification
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ncdx_core::{
    AggregationKind, CompressionDistance, DeflateCompressor, DistanceEngine, KnnClassifier,
    LengthMode,
};
use rand::prelude::*;

const WORDS: &[&str] = &[
    "market", "goal", "rates", "match", "bank", "player", "shares", "season", "inflation",
    "coach", "bond", "league", "profit", "striker", "currency", "team",
];

fn generate_text(rng: &mut StdRng, words: usize) -> String {
    (0..words)
        .map(|_| *WORDS.choose(rng).unwrap())
        .collect::<Vec<_>>()
        .join(" ")
}

fn generate_corpus(n: usize, seed: u64) -> (Vec<String>, Vec<String>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let texts = (0..n).map(|_| generate_text(&mut rng, 40)).collect();
    let labels = (0..n).map(|i| format!("class{}", i % 4)).collect();
    (texts, labels)
}

fn engine() -> DistanceEngine<DeflateCompressor, AggregationKind, CompressionDistance> {
    DistanceEngine::new(
        DeflateCompressor::gzip(),
        AggregationKind::SpaceConcat,
        CompressionDistance::Ncd,
    )
}

fn benchmark_distance_matrix(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance_matrix");
    group.sample_size(10);
    let engine = engine();

    for size in [25, 50, 100].iter() {
        let (texts, _) = generate_corpus(*size, 1);

        group.bench_with_input(BenchmarkId::new("standard", size), size, |b, _| {
            b.iter(|| {
                let matrix = engine
                    .distance_matrix(black_box(texts.as_slice()), None, LengthMode::Standard)
                    .unwrap();
                black_box(matrix);
            });
        });

        group.bench_with_input(BenchmarkId::new("fast", size), size, |b, _| {
            b.iter(|| {
                let matrix = engine
                    .distance_matrix(black_box(texts.as_slice()), None, LengthMode::Fast)
                    .unwrap();
                black_box(matrix);
            });
        });

        group.bench_with_input(BenchmarkId::new("parallel", size), size, |b, _| {
            b.iter(|| {
                let matrix = engine
                    .distance_matrix_par(black_box(texts.as_slice()), None, LengthMode::Standard)
                    .unwrap();
                black_box(matrix);
            });
        });
    }

    group.finish();
}

fn benchmark_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    let engine = engine();
    let (texts, labels) = generate_corpus(200, 2);
    let matrix = engine
        .distance_matrix_par(texts.as_slice(), None, LengthMode::Standard)
        .unwrap();

    for k in [1, 5, 25].iter() {
        let knn = KnnClassifier::new(*k).unwrap();
        group.bench_with_input(BenchmarkId::new("lenient", k), k, |b, _| {
            b.iter(|| {
                let evaluation = knn.classify(black_box(&matrix), labels.as_slice(), None).unwrap();
                black_box(evaluation);
            });
        });
    }

    group.finish();
}

fn benchmark_single_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_query");
    let engine = engine();
    let (train, train_labels) = generate_corpus(200, 3);
    let (test, test_labels) = generate_corpus(1, 4);
    let knn = KnnClassifier::new(3).unwrap();

    group.bench_function("row_and_vote", |b| {
        b.iter(|| {
            let prediction = knn
                .classify_single(
                    &engine,
                    train.as_slice(),
                    train_labels.as_slice(),
                    black_box(&test[0]),
                    &test_labels[0],
                    LengthMode::Standard,
                )
                .unwrap();
            black_box(prediction);
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_distance_matrix, benchmark_classify, benchmark_single_query);
criterion_main!(benches);
