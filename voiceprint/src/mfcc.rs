use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::audio::AudioSample;
use crate::features::FeatureMatrix;
use crate::VoiceprintError;

/// Analysis window applied to each frame before the FFT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    #[default]
    Hann,
    Hamming,
    /// Kaldi's Povey window (hamming^0.85).
    Povey,
}

/// Configures MFCC feature extraction.
///
/// The defaults produce 13 cepstral coefficients from 2048-sample windows
/// with a 512-sample hop at 16 kHz, extended with delta and delta-delta
/// coefficients to 39 values per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MfccConfig {
    /// Input sample rate in Hz (default: 16000).
    pub sample_rate: u32,
    /// Number of cepstral coefficients kept per frame (default: 13).
    pub coefficient_count: usize,
    /// Frame length in samples (default: 2048).
    pub window_size: usize,
    /// Frame shift in samples (default: 512).
    pub hop_length: usize,
    /// Number of mel filterbank channels (default: 40).
    pub num_mels: usize,
    /// Pre-emphasis coefficient, 0 disables it (default: 0.97).
    pub pre_emphasis: f64,
    /// Remove DC offset per frame (default: true).
    pub remove_dc: bool,
    /// Analysis window (default: hann).
    pub window: WindowKind,
    /// Low cutoff frequency for mel bins in Hz (default: 0).
    pub low_freq: f64,
    /// High cutoff frequency; 0 = Nyquist, negative = offset from Nyquist (default: 0).
    pub high_freq: f64,
    /// Floor for mel energies before the log (default: 1e-10).
    pub energy_floor: f64,
    /// Neighbouring frames on each side used for deltas (default: 2).
    pub delta_width: usize,
}

impl Default for MfccConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            coefficient_count: 13,
            window_size: 2048,
            hop_length: 512,
            num_mels: 40,
            pre_emphasis: 0.97,
            remove_dc: true,
            window: WindowKind::Hann,
            low_freq: 0.0,
            high_freq: 0.0,
            energy_floor: 1e-10,
            delta_width: 2,
        }
    }
}

impl MfccConfig {
    /// Width of one output frame: base, delta and delta-delta coefficients.
    pub fn feature_width(&self) -> usize {
        3 * self.coefficient_count
    }

    /// Number of frames produced for `n_samples` of audio, or `None` if the
    /// audio is shorter than one window.
    pub fn frame_count(&self, n_samples: usize) -> Option<usize> {
        if self.hop_length == 0 || n_samples < self.window_size {
            return None;
        }
        Some((n_samples - self.window_size) / self.hop_length + 1)
    }

    fn resolved_high_freq(&self) -> f64 {
        let nyquist = self.sample_rate as f64 / 2.0;
        if self.high_freq <= 0.0 {
            nyquist + self.high_freq
        } else {
            self.high_freq.min(nyquist)
        }
    }

    fn validate(&self) -> Result<(), VoiceprintError> {
        let invalid = |msg: &str| Err(VoiceprintError::InvalidConfig(msg.to_string()));
        if self.sample_rate == 0 {
            return invalid("sample_rate must be positive");
        }
        if self.window_size < 2 {
            return invalid("window_size must be at least 2");
        }
        if self.hop_length == 0 {
            return invalid("hop_length must be positive");
        }
        if self.num_mels == 0 {
            return invalid("num_mels must be positive");
        }
        if self.coefficient_count == 0 || self.coefficient_count > self.num_mels {
            return invalid("coefficient_count must be in 1..=num_mels");
        }
        if self.delta_width == 0 {
            return invalid("delta_width must be positive");
        }
        if self.low_freq < 0.0 || self.low_freq >= self.resolved_high_freq() {
            return invalid("low_freq must be below high_freq");
        }
        Ok(())
    }
}

/// Converts audio into MFCC + delta + delta-delta feature frames.
///
/// The window, mel filterbank and DCT basis are computed once at
/// construction. Extraction is deterministic: the same audio and
/// configuration always yield the same matrix.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    cfg: MfccConfig,
    fft_size: usize,
    window: Vec<f64>,
    filterbank: Vec<Vec<f64>>,
    dct: Vec<Vec<f64>>,
}

impl FeatureExtractor {
    pub fn new(cfg: MfccConfig) -> Result<Self, VoiceprintError> {
        cfg.validate()?;

        let fft_size = next_pow2(cfg.window_size);
        let window = match cfg.window {
            WindowKind::Hann => hann_window(cfg.window_size),
            WindowKind::Hamming => hamming_window(cfg.window_size),
            WindowKind::Povey => povey_window(cfg.window_size),
        };
        let filterbank = mel_filterbank(
            cfg.num_mels,
            fft_size,
            cfg.sample_rate as usize,
            cfg.low_freq,
            cfg.resolved_high_freq(),
        );
        let dct = dct_matrix(cfg.coefficient_count, cfg.num_mels);

        Ok(Self {
            cfg,
            fft_size,
            window,
            filterbank,
            dct,
        })
    }

    pub fn config(&self) -> &MfccConfig {
        &self.cfg
    }

    /// Extracts the feature matrix for one sample.
    ///
    /// Fails with [`VoiceprintError::InsufficientAudio`] when the sample is
    /// shorter than one window.
    pub fn extract(&self, sample: &AudioSample) -> Result<FeatureMatrix, VoiceprintError> {
        if sample.sample_rate() != self.cfg.sample_rate {
            return Err(VoiceprintError::SampleRateMismatch {
                expected: self.cfg.sample_rate,
                got: sample.sample_rate(),
            });
        }
        let got = sample.len();
        let num_frames = self
            .cfg
            .frame_count(got)
            .ok_or(VoiceprintError::InsufficientAudio {
                window: self.cfg.window_size,
                got,
            })?;

        let base = self.cepstra(sample.samples(), num_frames);
        let delta = deltas(&base, self.cfg.delta_width);
        let delta2 = deltas(&delta, self.cfg.delta_width);

        let frames = base
            .into_iter()
            .zip(delta)
            .zip(delta2)
            .map(|((mut b, d), dd)| {
                b.extend(d);
                b.extend(dd);
                b
            })
            .collect();

        tracing::debug!(
            samples = got,
            frames = num_frames,
            width = self.cfg.feature_width(),
            "voiceprint: extracted features"
        );
        FeatureMatrix::new(self.cfg.feature_width(), frames)
    }

    /// Computes the base cepstral coefficients for every frame.
    fn cepstra(&self, samples: &[f32], num_frames: usize) -> Vec<Vec<f64>> {
        let cfg = &self.cfg;
        let frame_length = cfg.window_size;
        let half_fft = self.fft_size / 2 + 1;

        let mut result = Vec::with_capacity(num_frames);
        let mut frame_buf = vec![0.0f64; frame_length];
        let mut fft_buf = vec![(0.0f64, 0.0f64); self.fft_size];
        let mut power_spec = vec![0.0f64; half_fft];
        let mut log_mel = vec![0.0f64; cfg.num_mels];

        for f in 0..num_frames {
            let offset = f * cfg.hop_length;
            for (dst, &src) in frame_buf
                .iter_mut()
                .zip(&samples[offset..offset + frame_length])
            {
                *dst = src as f64;
            }

            if cfg.remove_dc {
                let mean = frame_buf.iter().sum::<f64>() / frame_length as f64;
                for v in &mut frame_buf {
                    *v -= mean;
                }
            }

            if cfg.pre_emphasis > 0.0 {
                for i in (1..frame_length).rev() {
                    frame_buf[i] -= cfg.pre_emphasis * frame_buf[i - 1];
                }
                frame_buf[0] *= 1.0 - cfg.pre_emphasis;
            }

            // Window and zero-pad to the FFT size.
            for v in &mut fft_buf {
                *v = (0.0, 0.0);
            }
            for i in 0..frame_length {
                fft_buf[i] = (frame_buf[i] * self.window[i], 0.0);
            }
            fft(&mut fft_buf);

            for (k, p) in power_spec.iter_mut().enumerate() {
                let (re, im) = fft_buf[k];
                *p = re * re + im * im;
            }

            for (m, filter) in self.filterbank.iter().enumerate() {
                let energy: f64 = filter
                    .iter()
                    .zip(&power_spec)
                    .map(|(w, p)| w * p)
                    .sum();
                log_mel[m] = energy.max(cfg.energy_floor).ln();
            }

            let coeffs = self
                .dct
                .iter()
                .map(|basis| basis.iter().zip(&log_mel).map(|(b, x)| b * x).sum())
                .collect();
            result.push(coeffs);
        }

        result
    }
}

/// Regression deltas over `width` neighbouring frames on each side.
///
/// `d[t] = sum_n n * (c[t+n] - c[t-n]) / (2 * sum_n n^2)`, with frames
/// beyond either edge replaced by the edge frame.
pub fn deltas(frames: &[Vec<f64>], width: usize) -> Vec<Vec<f64>> {
    if frames.is_empty() || width == 0 {
        return frames.iter().map(|f| vec![0.0; f.len()]).collect();
    }
    let last = frames.len() - 1;
    let dim = frames[0].len();
    let denom = 2.0 * (1..=width).map(|n| (n * n) as f64).sum::<f64>();

    (0..frames.len())
        .map(|t| {
            let mut out = vec![0.0f64; dim];
            for n in 1..=width {
                let next = &frames[(t + n).min(last)];
                let prev = &frames[t.saturating_sub(n)];
                for d in 0..dim {
                    out[d] += n as f64 * (next[d] - prev[d]);
                }
            }
            for v in &mut out {
                *v /= denom;
            }
            out
        })
        .collect()
}

fn next_pow2(n: usize) -> usize {
    let mut p = 1;
    while p < n {
        p <<= 1;
    }
    p
}

fn hann_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

fn hamming_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

fn povey_window(n: usize) -> Vec<f64> {
    hamming_window(n).into_iter().map(|w| w.powf(0.85)).collect()
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank weights, `[num_mels][fft_size / 2 + 1]`.
fn mel_filterbank(
    num_mels: usize,
    fft_size: usize,
    sample_rate: usize,
    low_freq: f64,
    high_freq: f64,
) -> Vec<Vec<f64>> {
    let half_fft = fft_size / 2 + 1;
    let mel_low = hz_to_mel(low_freq);
    let mel_high = hz_to_mel(high_freq);

    let bins: Vec<usize> = (0..num_mels + 2)
        .map(|i| {
            let mel = mel_low + i as f64 * (mel_high - mel_low) / (num_mels + 1) as f64;
            let bin = (mel_to_hz(mel) * fft_size as f64 / sample_rate as f64).floor() as isize;
            bin.clamp(0, half_fft as isize - 1) as usize
        })
        .collect();

    (0..num_mels)
        .map(|m| {
            let mut filter = vec![0.0f64; half_fft];
            let (left, center, right) = (bins[m], bins[m + 1], bins[m + 2]);
            if center > left {
                for k in left..=center {
                    filter[k] = (k - left) as f64 / (center - left) as f64;
                }
            }
            if right > center {
                for k in center..=right {
                    filter[k] = (right - k) as f64 / (right - center) as f64;
                }
            }
            filter
        })
        .collect()
}

/// Orthonormal DCT-II basis, `[num_coeffs][num_inputs]`.
fn dct_matrix(num_coeffs: usize, num_inputs: usize) -> Vec<Vec<f64>> {
    let n = num_inputs as f64;
    (0..num_coeffs)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..num_inputs)
                .map(|m| scale * (PI * k as f64 * (2.0 * m as f64 + 1.0) / (2.0 * n)).cos())
                .collect()
        })
        .collect()
}

/// In-place radix-2 FFT over `(re, im)` pairs. Length must be a power of two.
fn fft(x: &mut [(f64, f64)]) {
    let n = x.len();
    if n <= 1 {
        return;
    }

    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            x.swap(i, j);
        }
    }

    let mut size = 2;
    while size <= n {
        let half = size / 2;
        let angle = -2.0 * PI / size as f64;
        let wn = (angle.cos(), angle.sin());
        for start in (0..n).step_by(size) {
            let mut w = (1.0, 0.0);
            for k in 0..half {
                let u = x[start + k];
                let v = x[start + k + half];
                let t = (w.0 * v.0 - w.1 * v.1, w.0 * v.1 + w.1 * v.0);
                x[start + k] = (u.0 + t.0, u.1 + t.1);
                x[start + k + half] = (u.0 - t.0, u.1 - t.1);
                w = (w.0 * wn.0 - w.1 * wn.1, w.0 * wn.1 + w.1 * wn.0);
            }
        }
        size <<= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq_hz: f64, n_samples: usize, sample_rate: u32) -> AudioSample {
        let samples = (0..n_samples)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                (0.5 * (2.0 * PI * freq_hz * t).sin()) as f32
            })
            .collect();
        AudioSample::new(samples, sample_rate)
    }

    #[test]
    fn mfcc_config_default() {
        let cfg = MfccConfig::default();
        assert_eq!(cfg.sample_rate, 16000);
        assert_eq!(cfg.coefficient_count, 13);
        assert_eq!(cfg.window_size, 2048);
        assert_eq!(cfg.hop_length, 512);
        assert_eq!(cfg.feature_width(), 39);
    }

    #[test]
    fn frame_count_formula() {
        let ext = FeatureExtractor::new(MfccConfig::default()).unwrap();
        for &len in &[2048usize, 2049, 2559, 2560, 3000, 16000, 48000] {
            let features = ext.extract(&tone(440.0, len, 16000)).unwrap();
            assert_eq!(features.len(), (len - 2048) / 512 + 1, "len={len}");
            assert_eq!(features.width(), 39);
        }
    }

    #[test]
    fn too_short_is_insufficient_audio() {
        let ext = FeatureExtractor::new(MfccConfig::default()).unwrap();
        let err = ext.extract(&tone(440.0, 2047, 16000)).unwrap_err();
        assert!(matches!(
            err,
            VoiceprintError::InsufficientAudio {
                window: 2048,
                got: 2047
            }
        ));
        let err = ext.extract(&AudioSample::new(Vec::new(), 16000)).unwrap_err();
        assert!(matches!(err, VoiceprintError::InsufficientAudio { .. }));
    }

    #[test]
    fn sample_rate_must_match() {
        let ext = FeatureExtractor::new(MfccConfig::default()).unwrap();
        let err = ext.extract(&tone(440.0, 8000, 8000)).unwrap_err();
        assert!(matches!(
            err,
            VoiceprintError::SampleRateMismatch {
                expected: 16000,
                got: 8000
            }
        ));
    }

    #[test]
    fn extraction_is_deterministic() {
        let ext = FeatureExtractor::new(MfccConfig::default()).unwrap();
        let audio = tone(220.0, 16000, 16000);
        assert_eq!(ext.extract(&audio).unwrap(), ext.extract(&audio).unwrap());
    }

    #[test]
    fn different_tones_give_different_cepstra() {
        let ext = FeatureExtractor::new(MfccConfig::default()).unwrap();
        let a = ext.extract(&tone(300.0, 4096, 16000)).unwrap();
        let b = ext.extract(&tone(2500.0, 4096, 16000)).unwrap();
        let diff: f64 = a.frames()[0][..13]
            .iter()
            .zip(&b.frames()[0][..13])
            .map(|(x, y)| (x - y).abs())
            .sum();
        assert!(diff > 1.0, "cepstra should differ, diff={diff}");
    }

    #[test]
    fn stationary_tone_has_small_deltas() {
        let ext = FeatureExtractor::new(MfccConfig::default()).unwrap();
        // 500 Hz completes exactly 16 cycles per 512-sample hop, so every
        // frame sees the same waveform.
        let f = ext.extract(&tone(500.0, 16000, 16000)).unwrap();
        for frame in f.iter() {
            for v in &frame[13..] {
                assert!(v.abs() < 1e-6, "delta should vanish, got {v}");
            }
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let bad = [
            MfccConfig {
                hop_length: 0,
                ..Default::default()
            },
            MfccConfig {
                window_size: 1,
                ..Default::default()
            },
            MfccConfig {
                coefficient_count: 41,
                ..Default::default()
            },
            MfccConfig {
                low_freq: 9000.0,
                ..Default::default()
            },
        ];
        for cfg in bad {
            assert!(matches!(
                FeatureExtractor::new(cfg),
                Err(VoiceprintError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn deltas_of_linear_ramp() {
        // c[t] = t, so interior deltas are exactly 1.
        let frames: Vec<Vec<f64>> = (0..10).map(|t| vec![t as f64]).collect();
        let d = deltas(&frames, 2);
        for t in 2..8 {
            assert!((d[t][0] - 1.0).abs() < 1e-12);
        }
        // Edge replication: d[0] = (1*(1-0) + 2*(2-0)) / 10 = 0.5.
        assert!((d[0][0] - 0.5).abs() < 1e-12);
        assert!((d[9][0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn deltas_of_single_frame_are_zero() {
        let d = deltas(&[vec![3.0, -1.0]], 2);
        assert_eq!(d, vec![vec![0.0, 0.0]]);
    }

    #[test]
    fn dct_is_orthonormal() {
        let m = dct_matrix(8, 8);
        for i in 0..8 {
            for j in 0..8 {
                let dot: f64 = m[i].iter().zip(&m[j]).map(|(a, b)| a * b).sum();
                let want = if i == j { 1.0 } else { 0.0 };
                assert!((dot - want).abs() < 1e-10, "({i},{j}) = {dot}");
            }
        }
    }

    #[test]
    fn fft_impulse() {
        let mut buf = vec![(1.0, 0.0), (0.0, 0.0), (0.0, 0.0), (0.0, 0.0)];
        fft(&mut buf);
        for (re, im) in &buf {
            assert!((re - 1.0).abs() < 1e-10);
            assert!(im.abs() < 1e-10);
        }
    }

    #[test]
    fn fft_parseval() {
        let n = 16;
        let mut buf: Vec<(f64, f64)> = (0..n)
            .map(|i| ((2.0 * PI * 3.0 * i as f64 / n as f64).cos(), 0.0))
            .collect();
        let time_energy: f64 = buf.iter().map(|(r, i)| r * r + i * i).sum();
        fft(&mut buf);
        let freq_energy: f64 = buf.iter().map(|(r, i)| r * r + i * i).sum();
        assert!((time_energy * n as f64 - freq_energy).abs() < 1e-8);
    }

    #[test]
    fn mel_hz_roundtrip() {
        for &hz in &[0.0, 100.0, 440.0, 1000.0, 8000.0] {
            assert!((hz - mel_to_hz(hz_to_mel(hz))).abs() < 1e-6);
        }
    }
}
