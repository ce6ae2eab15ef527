use serde::{Deserialize, Serialize};

use crate::VoiceprintError;

/// A time-ordered sequence of fixed-width feature frames.
///
/// Every frame has the same width. For MFCC features the layout is
/// `[base | delta | delta-delta]`, so `width == 3 * coefficient_count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    width: usize,
    frames: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Creates a matrix from frames, checking that every frame has `width` values.
    pub fn new(width: usize, frames: Vec<Vec<f64>>) -> Result<Self, VoiceprintError> {
        if let Some(bad) = frames.iter().find(|f| f.len() != width) {
            return Err(VoiceprintError::DimensionMismatch {
                expected: width,
                got: bad.len(),
            });
        }
        Ok(Self { width, frames })
    }

    /// Concatenates matrices in order. All inputs must share one width.
    pub fn concat(parts: &[FeatureMatrix]) -> Result<Self, VoiceprintError> {
        let Some(first) = parts.first() else {
            return Ok(Self {
                width: 0,
                frames: Vec::new(),
            });
        };
        let width = first.width;
        let mut frames = Vec::with_capacity(parts.iter().map(|p| p.len()).sum());
        for p in parts {
            if p.width != width {
                return Err(VoiceprintError::DimensionMismatch {
                    expected: width,
                    got: p.width,
                });
            }
            frames.extend(p.frames.iter().cloned());
        }
        Ok(Self { width, frames })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Vec<f64>] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&[f64]> {
        self.frames.get(index).map(|f| f.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.frames.iter().map(|f| f.as_slice())
    }

    pub fn into_frames(self) -> Vec<Vec<f64>> {
        self.frames
    }
}
