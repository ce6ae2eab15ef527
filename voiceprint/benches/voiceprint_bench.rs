use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vaultvoice_voiceprint::{
    AudioSample, FeatureExtractor, FeatureNormalizer, GmmConfig, MfccConfig, VoiceModel,
};

fn make_sine(freq_hz: f64, n_samples: usize, sample_rate: u32) -> AudioSample {
    let samples = (0..n_samples)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (0.5 * (freq_hz * 2.0 * std::f64::consts::PI * t).sin()) as f32
        })
        .collect();
    AudioSample::new(samples, sample_rate)
}

fn bench_mfcc_3s(c: &mut Criterion) {
    let extractor = FeatureExtractor::new(MfccConfig::default()).unwrap();
    let audio = make_sine(440.0, 48000, 16000); // 3s

    c.bench_function("voiceprint_mfcc_3s", |b| {
        b.iter(|| {
            let _ = black_box(extractor.extract(black_box(&audio)));
        });
    });
}

fn bench_gmm_score(c: &mut Criterion) {
    let extractor = FeatureExtractor::new(MfccConfig::default()).unwrap();
    let takes: Vec<_> = [220.0, 330.0, 440.0]
        .iter()
        .map(|&f| extractor.extract(&make_sine(f, 48000, 16000)).unwrap())
        .collect();
    let mut normalizer = FeatureNormalizer::new();
    normalizer.fit(&takes).unwrap();
    let pooled = vaultvoice_voiceprint::FeatureMatrix::concat(&takes).unwrap();
    let normalized = normalizer.transform(&pooled).unwrap();
    let model = VoiceModel::train(&normalized, &GmmConfig::default()).unwrap();
    let probe = normalizer.transform(&takes[0]).unwrap();

    c.bench_function("voiceprint_gmm_score_3s", |b| {
        b.iter(|| {
            let _ = black_box(model.score(black_box(&probe)));
        });
    });
}

fn bench_gmm_train(c: &mut Criterion) {
    let extractor = FeatureExtractor::new(MfccConfig::default()).unwrap();
    let takes: Vec<_> = [220.0, 330.0, 440.0]
        .iter()
        .map(|&f| extractor.extract(&make_sine(f, 48000, 16000)).unwrap())
        .collect();
    let mut normalizer = FeatureNormalizer::new();
    normalizer.fit(&takes).unwrap();
    let pooled = vaultvoice_voiceprint::FeatureMatrix::concat(&takes).unwrap();
    let normalized = normalizer.transform(&pooled).unwrap();

    c.bench_function("voiceprint_gmm_train_9s", |b| {
        b.iter(|| {
            let _ = black_box(VoiceModel::train(black_box(&normalized), &GmmConfig::default()));
        });
    });
}

criterion_group!(benches, bench_mfcc_3s, bench_gmm_score, bench_gmm_train);
criterion_main!(benches);
