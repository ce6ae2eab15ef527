use serde::{Deserialize, Serialize};

use crate::features::FeatureMatrix;
use crate::VoiceprintError;

const MIN_STD: f64 = 1e-10;

/// Per-dimension mean and variance of an enrollment session's frames.
///
/// Frozen once computed: verification reuses exactly the stats stored in
/// the user's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
    /// Number of frames the stats were computed from.
    pub frame_count: usize,
}

impl NormalizationStats {
    pub fn width(&self) -> usize {
        self.mean.len()
    }

    /// Standard deviation per dimension; constant dimensions scale by 1.
    fn scale(&self) -> Vec<f64> {
        self.variance
            .iter()
            .map(|&v| {
                let std = v.sqrt();
                if std < MIN_STD { 1.0 } else { std }
            })
            .collect()
    }
}

/// Standardizes feature frames to zero mean and unit variance.
///
/// A normalizer is fitted once, on every enrollment sample pooled
/// together, and then only transforms.
#[derive(Debug, Clone, Default)]
pub struct FeatureNormalizer {
    stats: Option<NormalizationStats>,
}

impl FeatureNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps previously computed stats, e.g. from a stored profile.
    pub fn from_stats(stats: NormalizationStats) -> Self {
        Self { stats: Some(stats) }
    }

    pub fn stats(&self) -> Option<&NormalizationStats> {
        self.stats.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.stats.is_some()
    }

    /// Computes mean and variance across the concatenation of all inputs.
    pub fn fit(&mut self, parts: &[FeatureMatrix]) -> Result<&NormalizationStats, VoiceprintError> {
        if self.stats.is_some() {
            return Err(VoiceprintError::AlreadyFitted);
        }
        let pooled = FeatureMatrix::concat(parts)?;
        if pooled.is_empty() {
            return Err(VoiceprintError::Training(
                "no frames to fit normalization on".into(),
            ));
        }

        let width = pooled.width();
        let n = pooled.len() as f64;

        let mut mean = vec![0.0f64; width];
        for frame in pooled.iter() {
            for (m, &x) in mean.iter_mut().zip(frame) {
                *m += x;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut variance = vec![0.0f64; width];
        for frame in pooled.iter() {
            for ((v, &x), &m) in variance.iter_mut().zip(frame).zip(&mean) {
                let d = x - m;
                *v += d * d;
            }
        }
        for v in &mut variance {
            *v /= n;
        }

        Ok(self.stats.insert(NormalizationStats {
            mean,
            variance,
            frame_count: pooled.len(),
        }))
    }

    /// Applies `(x - mean) / std` per dimension using the fitted stats.
    pub fn transform(&self, features: &FeatureMatrix) -> Result<FeatureMatrix, VoiceprintError> {
        let stats = self.stats.as_ref().ok_or(VoiceprintError::NotFitted)?;
        if features.width() != stats.width() {
            return Err(VoiceprintError::DimensionMismatch {
                expected: stats.width(),
                got: features.width(),
            });
        }

        let scale = stats.scale();
        let frames = features
            .iter()
            .map(|frame| {
                frame
                    .iter()
                    .zip(&stats.mean)
                    .zip(&scale)
                    .map(|((x, m), s)| (x - m) / s)
                    .collect()
            })
            .collect();
        FeatureMatrix::new(stats.width(), frames)
    }
}
