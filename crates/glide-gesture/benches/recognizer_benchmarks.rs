//! Benchmarks for the gesture hot paths.
//!
//! Candidate ranking runs on the UI thread when the finger lifts, so it has
//! to stay well inside a frame. Corpus preparation and dictionary fan-in run
//! in the background but bound how quickly a new layout becomes usable.

use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glide_core::config::KeyboardConfig;
use glide_core::types::{DictionaryId, WordBatch, WordCorpus};
use glide_gesture::aggregator::{DictionaryAggregator, DictionaryLoadListener};
use glide_gesture::layout::{qwerty, swipe_path};
use glide_gesture::recognizer::Recognizer;
use glide_gesture::shape::{ShapeRecognizer, ShapeSettings};

const SYLLABLES: [&str; 12] = [
    "ca", "to", "re", "mi", "lu", "se", "po", "an", "di", "ke", "ro", "ty",
];

/// Deterministic pseudo-words built from common syllables.
fn generate_corpus(size: usize) -> WordCorpus {
    let words: Vec<String> = (0..size)
        .map(|i| {
            let a = SYLLABLES[i % SYLLABLES.len()];
            let b = SYLLABLES[(i / SYLLABLES.len()) % SYLLABLES.len()];
            let c = SYLLABLES[(i / 144) % SYLLABLES.len()];
            format!("{}{}{}", a, b, c)
        })
        .collect();
    let frequencies = (0..size as u32).map(|i| 1 + i % 255).collect();
    vec![WordBatch::new(words, frequencies)]
}

fn bench_candidate_ranking(c: &mut Criterion) {
    let keyboard = qwerty(&KeyboardConfig::default());
    let path = swipe_path(&keyboard, "catore", 12).unwrap();

    let mut group = c.benchmark_group("candidate_ranking");
    group.measurement_time(Duration::from_secs(5));

    for size in [1_000usize, 10_000] {
        let mut recognizer = ShapeRecognizer::new(&keyboard, ShapeSettings::default(), None);
        recognizer.set_words(generate_corpus(size));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                recognizer.clear_gesture();
                for &(x, y) in &path {
                    recognizer.add_point(x, y);
                }
                recognizer.candidates()
            });
        });
    }

    group.finish();
}

fn bench_corpus_preparation(c: &mut Criterion) {
    let keyboard = qwerty(&KeyboardConfig::default());
    let corpus = generate_corpus(10_000);

    let mut group = c.benchmark_group("corpus_preparation");
    group.sample_size(20);

    group.bench_function("inline_10k_words", |b| {
        b.iter(|| {
            let mut recognizer = ShapeRecognizer::new(&keyboard, ShapeSettings::default(), None);
            recognizer.set_words(corpus.clone());
            recognizer
        });
    });

    group.finish();
}

fn bench_dictionary_fan_in(c: &mut Criterion) {
    let batches: Vec<WordBatch> = (0..8).map(|_| generate_corpus(500).remove(0)).collect();
    let ids: Vec<DictionaryId> = (0..8).map(|i| DictionaryId::new(format!("dict_{}", i))).collect();
    let layout = qwerty(&KeyboardConfig::default()).layout_key();

    c.bench_function("aggregator_8_dictionaries", |b| {
        b.iter(|| {
            let aggregator = Arc::new(DictionaryAggregator::new(layout.clone(), Box::new(|_, _| {})));
            for id in &ids {
                aggregator.on_load_started(id).unwrap();
            }
            for (id, batch) in ids.iter().zip(&batches) {
                aggregator.on_load_done(id, batch.clone()).unwrap();
            }
            aggregator.completions()
        });
    });
}

criterion_group!(
    benches,
    bench_candidate_ranking,
    bench_corpus_preparation,
    bench_dictionary_fan_in
);
criterion_main!(benches);
