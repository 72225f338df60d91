//! Performance benchmarks for the analysis pipeline

use beatsync::audio::synth::ClickTrack;
use beatsync::{AudioAnalyzer, Config};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_analyze(c: &mut Criterion) {
    // 30 seconds of clicks over a light noise floor
    let waveform = ClickTrack::new(128.0, 30.0, 22050)
        .with_noise(0.02, 7)
        .render()
        .unwrap();

    let sequential = AudioAnalyzer::new();
    c.bench_function("analyze_30s", |b| {
        b.iter(|| sequential.try_analyze(black_box(&waveform)).unwrap());
    });

    let mut config = Config::default();
    config.analysis.parallel_stages = true;
    let parallel = AudioAnalyzer::with_config(config);
    c.bench_function("analyze_30s_parallel", |b| {
        b.iter(|| parallel.try_analyze(black_box(&waveform)).unwrap());
    });
}

criterion_group!(benches, bench_analyze);
criterion_main!(benches);
