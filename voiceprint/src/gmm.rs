//! Diagonal-covariance Gaussian mixture model over feature frames.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::features::FeatureMatrix;
use crate::VoiceprintError;

/// Added to every component's soft count so no component divides by zero.
const RESP_FLOOR: f64 = 10.0 * f64::EPSILON;

/// Configures mixture training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GmmConfig {
    /// Number of mixture components (default: 16).
    pub component_count: usize,
    /// Maximum EM iterations (default: 200).
    pub max_iter: usize,
    /// Stop when the average log-likelihood gain drops below this (default: 1e-3).
    pub tol: f64,
    /// Added to every variance to keep the fit non-singular (default: 1e-6).
    pub reg_covar: f64,
    /// Lloyd iterations used to initialize the means (default: 10).
    pub kmeans_iter: usize,
}

impl Default for GmmConfig {
    fn default() -> Self {
        Self {
            component_count: 16,
            max_iter: 200,
            tol: 1e-3,
            reg_covar: 1e-6,
            kmeans_iter: 10,
        }
    }
}

/// A per-user finite mixture of diagonal Gaussians.
///
/// Trained once per enrollment with [`VoiceModel::train`] and scored with
/// [`VoiceModel::score`], the average per-frame log-likelihood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceModel {
    weights: Vec<f64>,
    means: Vec<Vec<f64>>,
    variances: Vec<Vec<f64>>,
    /// EM iterations run during training.
    pub iterations: usize,
    /// Whether EM stopped on `tol` rather than `max_iter`.
    pub converged: bool,
}

impl VoiceModel {
    /// Fits a mixture to the frame population.
    ///
    /// Initialization is deterministic (farthest-point seeded k-means), so
    /// the same frames and config always produce the same model. Fails with
    /// [`VoiceprintError::Training`] when there are fewer frames than
    /// components or the fit becomes numerically invalid.
    pub fn train(features: &FeatureMatrix, cfg: &GmmConfig) -> Result<Self, VoiceprintError> {
        let k = cfg.component_count;
        let n = features.len();
        let d = features.width();

        if k == 0 {
            return Err(VoiceprintError::Training(
                "component_count must be positive".into(),
            ));
        }
        if d == 0 {
            return Err(VoiceprintError::Training("frames have no dimensions".into()));
        }
        if n < k {
            return Err(VoiceprintError::Training(format!(
                "{n} frames is too few for {k} components"
            )));
        }
        if features.iter().flatten().any(|v| !v.is_finite()) {
            return Err(VoiceprintError::Training("non-finite feature value".into()));
        }

        let frames = features.frames();
        let labels = kmeans(frames, k, cfg.kmeans_iter);
        let mut resp = vec![vec![0.0f64; k]; n];
        for (r, &label) in resp.iter_mut().zip(&labels) {
            r[label] = 1.0;
        }
        let mut model = m_step(frames, &resp, cfg.reg_covar);

        let mut lower_bound = f64::NEG_INFINITY;
        for iter in 1..=cfg.max_iter {
            let prev = lower_bound;
            lower_bound = model.e_step(frames, &mut resp);
            if !lower_bound.is_finite() {
                return Err(VoiceprintError::Training(format!(
                    "log-likelihood became {lower_bound} at iteration {iter}"
                )));
            }
            let iterations = iter;
            model = m_step(frames, &resp, cfg.reg_covar);
            model.iterations = iterations;
            if (lower_bound - prev).abs() < cfg.tol {
                model.converged = true;
                break;
            }
        }

        model.check_finite()?;
        tracing::debug!(
            frames = n,
            components = k,
            iterations = model.iterations,
            converged = model.converged,
            avg_log_likelihood = lower_bound,
            "voiceprint: trained mixture"
        );
        Ok(model)
    }

    /// Builds a model from explicit parameters. Weights are renormalized.
    pub fn from_parts(
        weights: Vec<f64>,
        means: Vec<Vec<f64>>,
        variances: Vec<Vec<f64>>,
    ) -> Result<Self, VoiceprintError> {
        let k = weights.len();
        if k == 0 || means.len() != k || variances.len() != k {
            return Err(VoiceprintError::Training(
                "weights, means and variances must have one entry per component".into(),
            ));
        }
        let d = means[0].len();
        for (m, v) in means.iter().zip(&variances) {
            if m.len() != d || v.len() != d {
                return Err(VoiceprintError::DimensionMismatch {
                    expected: d,
                    got: if m.len() != d { m.len() } else { v.len() },
                });
            }
        }
        if variances.iter().flatten().any(|&v| v <= 0.0) {
            return Err(VoiceprintError::Training("variances must be positive".into()));
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(VoiceprintError::Training("weights must sum to a positive value".into()));
        }
        let model = Self {
            weights: weights.into_iter().map(|w| w / total).collect(),
            means,
            variances,
            iterations: 0,
            converged: false,
        };
        model.check_finite()?;
        Ok(model)
    }

    pub fn component_count(&self) -> usize {
        self.weights.len()
    }

    pub fn dimension(&self) -> usize {
        self.means.first().map_or(0, |m| m.len())
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn means(&self) -> &[Vec<f64>] {
        &self.means
    }

    pub fn variances(&self) -> &[Vec<f64>] {
        &self.variances
    }

    /// Average per-frame log-likelihood of `features` under the model.
    ///
    /// An empty matrix scores negative infinity.
    pub fn score(&self, features: &FeatureMatrix) -> Result<f64, VoiceprintError> {
        let per_frame = self.score_frames(features)?;
        if per_frame.is_empty() {
            return Ok(f64::NEG_INFINITY);
        }
        Ok(per_frame.iter().sum::<f64>() / per_frame.len() as f64)
    }

    /// Log-likelihood of each frame.
    pub fn score_frames(&self, features: &FeatureMatrix) -> Result<Vec<f64>, VoiceprintError> {
        if features.width() != self.dimension() {
            return Err(VoiceprintError::DimensionMismatch {
                expected: self.dimension(),
                got: features.width(),
            });
        }
        let terms = self.terms();
        let mut buf = vec![0.0f64; self.component_count()];
        Ok(features
            .iter()
            .map(|x| {
                self.component_log_probs(&terms, x, &mut buf);
                log_sum_exp(&buf)
            })
            .collect())
    }

    /// E-step: fills `resp` with responsibilities and returns the average
    /// log-likelihood under the current parameters.
    fn e_step(&self, frames: &[Vec<f64>], resp: &mut [Vec<f64>]) -> f64 {
        let terms = self.terms();
        let mut total = 0.0;
        for (x, r) in frames.iter().zip(resp.iter_mut()) {
            self.component_log_probs(&terms, x, r);
            let norm = log_sum_exp(r);
            total += norm;
            for v in r.iter_mut() {
                *v = (*v - norm).exp();
            }
        }
        total / frames.len() as f64
    }

    /// Per-component constants: `ln w_k - 0.5 * (d ln 2pi + sum ln var)`.
    fn terms(&self) -> Vec<f64> {
        let d = self.dimension() as f64;
        self.weights
            .iter()
            .zip(&self.variances)
            .map(|(w, var)| {
                let log_det: f64 = var.iter().map(|v| v.ln()).sum();
                w.ln() - 0.5 * (d * (2.0 * PI).ln() + log_det)
            })
            .collect()
    }

    fn component_log_probs(&self, terms: &[f64], x: &[f64], out: &mut [f64]) {
        for (k, o) in out.iter_mut().enumerate() {
            let maha: f64 = x
                .iter()
                .zip(&self.means[k])
                .zip(&self.variances[k])
                .map(|((xi, m), v)| (xi - m) * (xi - m) / v)
                .sum();
            *o = terms[k] - 0.5 * maha;
        }
    }

    fn check_finite(&self) -> Result<(), VoiceprintError> {
        let finite = self.weights.iter().all(|w| w.is_finite() && *w > 0.0)
            && self.means.iter().flatten().all(|v| v.is_finite())
            && self.variances.iter().flatten().all(|v| v.is_finite() && *v > 0.0);
        if finite {
            Ok(())
        } else {
            Err(VoiceprintError::Training("non-finite model parameters".into()))
        }
    }
}

/// M-step: weighted means and variances from responsibilities.
fn m_step(frames: &[Vec<f64>], resp: &[Vec<f64>], reg_covar: f64) -> VoiceModel {
    let n = frames.len();
    let k = resp.first().map_or(0, |r| r.len());
    let d = frames.first().map_or(0, |f| f.len());

    let mut nk = vec![RESP_FLOOR; k];
    let mut means = vec![vec![0.0f64; d]; k];
    for (x, r) in frames.iter().zip(resp) {
        for c in 0..k {
            nk[c] += r[c];
            for (m, xi) in means[c].iter_mut().zip(x) {
                *m += r[c] * xi;
            }
        }
    }
    for (m, &count) in means.iter_mut().zip(&nk) {
        for v in m.iter_mut() {
            *v /= count;
        }
    }

    let mut variances = vec![vec![0.0f64; d]; k];
    for (x, r) in frames.iter().zip(resp) {
        for c in 0..k {
            for ((v, xi), m) in variances[c].iter_mut().zip(x).zip(&means[c]) {
                let diff = xi - m;
                *v += r[c] * diff * diff;
            }
        }
    }
    for (var, &count) in variances.iter_mut().zip(&nk) {
        for v in var.iter_mut() {
            *v = *v / count + reg_covar;
        }
    }

    let total: f64 = nk.iter().sum();
    let weights = nk.iter().map(|c| c / total).collect();
    debug_assert!(total > 0.0 || n == 0);

    VoiceModel {
        weights,
        means,
        variances,
        iterations: 0,
        converged: false,
    }
}

/// Deterministic k-means returning one label per frame.
///
/// Seeds with the frame closest to the global mean, then repeatedly adds
/// the frame farthest from every chosen center.
fn kmeans(frames: &[Vec<f64>], k: usize, iterations: usize) -> Vec<usize> {
    let n = frames.len();
    let d = frames[0].len();

    let mut global = vec![0.0f64; d];
    for f in frames {
        for (g, x) in global.iter_mut().zip(f) {
            *g += x;
        }
    }
    for g in &mut global {
        *g /= n as f64;
    }

    let first = argmin(frames.iter().map(|f| sq_dist(f, &global)));
    let mut centers = vec![frames[first].clone()];
    let mut min_dist: Vec<f64> = frames.iter().map(|f| sq_dist(f, &centers[0])).collect();
    while centers.len() < k {
        let next = argmax(min_dist.iter().copied());
        centers.push(frames[next].clone());
        let newest = &centers[centers.len() - 1];
        for (md, f) in min_dist.iter_mut().zip(frames) {
            *md = md.min(sq_dist(f, newest));
        }
    }

    let mut labels = assign(frames, &centers);
    for _ in 0..iterations {
        let mut sums = vec![vec![0.0f64; d]; k];
        let mut counts = vec![0usize; k];
        for (f, &l) in frames.iter().zip(&labels) {
            counts[l] += 1;
            for (s, x) in sums[l].iter_mut().zip(f) {
                *s += x;
            }
        }
        for c in 0..k {
            // Empty clusters keep their previous center.
            if counts[c] > 0 {
                for (center, s) in centers[c].iter_mut().zip(&sums[c]) {
                    *center = s / counts[c] as f64;
                }
            }
        }
        let next = assign(frames, &centers);
        if next == labels {
            break;
        }
        labels = next;
    }
    labels
}

fn assign(frames: &[Vec<f64>], centers: &[Vec<f64>]) -> Vec<usize> {
    frames
        .iter()
        .map(|f| argmin(centers.iter().map(|c| sq_dist(f, c))))
        .collect()
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of the smallest value; the first one wins ties.
fn argmin(values: impl Iterator<Item = f64>) -> usize {
    let mut best = (0, f64::INFINITY);
    for (i, v) in values.enumerate() {
        if v < best.1 {
            best = (i, v);
        }
    }
    best.0
}

/// Index of the largest value; the first one wins ties.
fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, v) in values.enumerate() {
        if v > best.1 {
            best = (i, v);
        }
    }
    best.0
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}
