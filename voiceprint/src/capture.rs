//! Audio capture collaborator.
//!
//! The core never talks to a device directly. It asks an [`AudioSource`]
//! for a fixed-duration buffer and treats any failure as a [`CaptureError`]
//! that is surfaced to the caller without retry.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::AudioSample;

/// Errors produced by an [`AudioSource`].
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture: device unavailable: {0}")]
    Unavailable(String),

    #[error("capture: sample rate mismatch: want {want} Hz, got {got} Hz")]
    SampleRate { want: u32, got: u32 },

    #[error("capture: unsupported format: {0}")]
    Format(String),

    #[error("capture: io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Recording parameters handed to an [`AudioSource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Length of one take in seconds (default: 3.0).
    pub duration_secs: f64,
    /// Requested sample rate in Hz (default: 16000).
    pub sample_rate: u32,
    /// Requested channel count (default: 1).
    pub channels: u16,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            duration_secs: 3.0,
            sample_rate: 16000,
            channels: 1,
        }
    }
}

impl CaptureConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs.max(0.0))
    }
}

/// Yields one blocking recording per call.
///
/// Implementations return a mono [`AudioSample`] at `sample_rate` no longer
/// than `duration`.
pub trait AudioSource: Send + Sync {
    fn record(
        &self,
        duration: Duration,
        sample_rate: u32,
        channels: u16,
    ) -> Result<AudioSample, CaptureError>;
}

/// An [`AudioSource`] that replays WAV files in order, one per `record` call.
///
/// Used by the command line tool in place of a microphone. Once every file
/// has been consumed further calls fail with [`CaptureError::Unavailable`].
pub struct WavFileSource {
    files: parking_lot::Mutex<std::collections::VecDeque<PathBuf>>,
}

impl WavFileSource {
    pub fn new<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            files: parking_lot::Mutex::new(files.into_iter().map(Into::into).collect()),
        }
    }

    /// Number of files not yet consumed.
    pub fn remaining(&self) -> usize {
        self.files.lock().len()
    }
}

impl AudioSource for WavFileSource {
    fn record(
        &self,
        duration: Duration,
        sample_rate: u32,
        _channels: u16,
    ) -> Result<AudioSample, CaptureError> {
        let path = self
            .files
            .lock()
            .pop_front()
            .ok_or_else(|| CaptureError::Unavailable("no recordings left".into()))?;

        let mut sample = read_wav(&path)?;
        if sample.sample_rate() != sample_rate {
            return Err(CaptureError::SampleRate {
                want: sample_rate,
                got: sample.sample_rate(),
            });
        }
        let max_samples = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
        sample.truncate(max_samples);
        tracing::debug!(
            path = %path.display(),
            samples = sample.len(),
            "capture: loaded recording"
        );
        Ok(sample)
    }
}

/// Reads a WAV file and mixes it down to a mono [`AudioSample`].
pub fn read_wav(path: &Path) -> Result<AudioSample, CaptureError> {
    let reader = WavReader::open(path).map_err(wav_error)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(wav_error)?,
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(CaptureError::Format(format!(
                    "{} bits per sample",
                    spec.bits_per_sample
                )));
            }
            let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(wav_error)?
        }
    };

    Ok(AudioSample::from_interleaved(
        &interleaved,
        spec.channels,
        spec.sample_rate,
    ))
}

/// Writes a sample as 16-bit mono PCM WAV.
pub fn write_wav(sample: &AudioSample, path: &Path) -> Result<(), CaptureError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: sample.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).map_err(wav_error)?;
    for &s in sample.samples() {
        let v = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
        writer.write_sample(v).map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)?;
    Ok(())
}

fn wav_error(e: hound::Error) -> CaptureError {
    match e {
        hound::Error::IoError(io) => CaptureError::Io(io),
        other => CaptureError::Format(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ramp(n: usize, rate: u32) -> AudioSample {
        AudioSample::new((0..n).map(|i| (i % 100) as f32 / 200.0).collect(), rate)
    }

    #[test]
    fn wav_source_replays_files_in_order() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        write_wav(&ramp(16000, 16000), &a).unwrap();
        write_wav(&ramp(8000, 16000), &b).unwrap();

        let src = WavFileSource::new([&a, &b]);
        let first = src.record(Duration::from_secs(3), 16000, 1).unwrap();
        let second = src.record(Duration::from_secs(3), 16000, 1).unwrap();
        assert_eq!(first.len(), 16000);
        assert_eq!(second.len(), 8000);
        assert_eq!(src.remaining(), 0);

        let err = src.record(Duration::from_secs(3), 16000, 1).unwrap_err();
        assert!(matches!(err, CaptureError::Unavailable(_)));
    }

    #[test]
    fn wav_source_truncates_to_duration() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("long.wav");
        write_wav(&ramp(32000, 16000), &a).unwrap();

        let src = WavFileSource::new([&a]);
        let s = src.record(Duration::from_millis(500), 16000, 1).unwrap();
        assert_eq!(s.len(), 8000);
    }

    #[test]
    fn wav_source_rejects_rate_mismatch() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("8k.wav");
        write_wav(&ramp(8000, 8000), &a).unwrap();

        let src = WavFileSource::new([&a]);
        let err = src.record(Duration::from_secs(1), 16000, 1).unwrap_err();
        assert!(matches!(err, CaptureError::SampleRate { want: 16000, got: 8000 }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let src = WavFileSource::new(["/nonexistent/vaultvoice.wav"]);
        let err = src.record(Duration::from_secs(1), 16000, 1).unwrap_err();
        assert!(matches!(err, CaptureError::Io(_)));
    }

    #[test]
    fn wav_roundtrip_is_close() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("r.wav");
        let orig = ramp(1000, 16000);
        write_wav(&orig, &p).unwrap();
        let back = read_wav(&p).unwrap();
        assert_eq!(back.len(), orig.len());
        for (a, b) in orig.samples().iter().zip(back.samples()) {
            assert!((a - b).abs() < 1e-3);
        }
    }
}
