use std::time::Duration;

/// A mono waveform captured at a fixed sample rate.
///
/// Samples are normalized to `[-1, 1]`. The buffer is ephemeral: it is
/// handed to the feature extractor and never persisted by this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSample {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioSample {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Builds a sample from PCM16 signed little-endian bytes.
    /// A trailing odd byte is ignored.
    pub fn from_pcm16(audio: &[u8], sample_rate: u32) -> Self {
        let samples = audio
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect();
        Self::new(samples, sample_rate)
    }

    /// Builds a sample from interleaved frames, averaging channels to mono.
    pub fn from_interleaved(interleaved: &[f32], channels: u16, sample_rate: u32) -> Self {
        let channels = channels.max(1) as usize;
        if channels == 1 {
            return Self::new(interleaved.to_vec(), sample_rate);
        }
        let samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();
        Self::new(samples, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Keeps at most `max_samples` leading samples.
    pub fn truncate(&mut self, max_samples: usize) {
        self.samples.truncate(max_samples);
    }
}
