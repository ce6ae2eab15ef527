use std::f64::consts::PI;

use vaultvoice::AudioSample;

const RATE: u32 = 16000;
const SYLLABLE: usize = 4000;
const CONTOUR: [f64; 6] = [1.0, 1.18, 0.92, 1.3, 1.05, 0.85];

/// Deterministic voice-like signal: harmonics over a stepped pitch contour
/// plus fixed-seed noise. `take` varies the noise and jitters the pitch.
pub fn voice(f0: f64, brightness: f64, take: u32) -> AudioSample {
    let n = 3 * RATE as usize;
    let jitter = 1.0 + 0.004 * take as f64;
    let mut seed = 0x9e37_79b9u32.wrapping_add(take.wrapping_mul(7919));
    let mut phase = 0.0f64;
    let samples = (0..n)
        .map(|i| {
            let pitch = f0 * jitter * CONTOUR[(i / SYLLABLE) % CONTOUR.len()];
            phase += 2.0 * PI * pitch / RATE as f64;
            let mut s = 0.0;
            let mut amp = 1.0;
            for h in 1..=10 {
                s += amp / h as f64 * (h as f64 * phase).sin();
                amp *= brightness;
            }
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let noise = (seed >> 8) as f64 / (1u32 << 24) as f64 - 0.5;
            (0.1 * s + 0.02 * noise) as f32
        })
        .collect();
    AudioSample::new(samples, RATE)
}

/// Three enrollment takes of the same speaker.
pub fn takes(f0: f64, brightness: f64) -> Vec<AudioSample> {
    (0..3).map(|t| voice(f0, brightness, t)).collect()
}

pub fn alice() -> Vec<AudioSample> {
    takes(120.0, 1.0)
}

pub fn impostor() -> AudioSample {
    voice(210.0, 0.4, 9)
}
