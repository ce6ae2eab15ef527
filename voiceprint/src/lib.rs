//! Speaker verification via MFCC features and per-user Gaussian mixtures.
//!
//! # Pipeline
//!
//! ```text
//! AudioSample -> FeatureExtractor -> FeatureMatrix
//!   enroll: FeatureNormalizer::fit + VoiceModel::train -> ModelStore::save
//!   verify: FeatureNormalizer::transform + VoiceModel::score -> threshold
//! ```
//!
//! 1. [`FeatureExtractor::extract`]: mono audio -> frames of 13 MFCCs plus
//!    delta and delta-delta coefficients (39 values per frame by default).
//! 2. [`FeatureNormalizer`]: per-dimension standardization. The stats are
//!    fitted once per enrollment, over every sample pooled together, and
//!    stored in the user's [`VoiceProfile`].
//! 3. [`VoiceModel`]: a diagonal-covariance Gaussian mixture trained on the
//!    normalized frames. [`VoiceModel::score`] is the average per-frame
//!    log-likelihood.
//! 4. [`SpeakerVerifier`]: ties the stages together and accepts a claim when
//!    the score is above the configured threshold.
//!
//! # Feature Extraction
//!
//! The [`mfcc`] module follows the usual recipe:
//! - DC removal and pre-emphasis 0.97
//! - Hann window (Hamming and Povey selectable)
//! - Cooley-Tukey FFT and power spectrum
//! - Mel triangular filterbank and log
//! - Orthonormal DCT-II, then regression deltas with replicated edges

mod audio;
pub mod capture;
mod error;
mod features;
mod gmm;
pub mod mfcc;
mod normalizer;
mod profile;
mod store;
mod verifier;

pub use audio::AudioSample;
pub use capture::{AudioSource, CaptureConfig, CaptureError, WavFileSource, read_wav, write_wav};
pub use error::VoiceprintError;
pub use features::FeatureMatrix;
pub use gmm::{GmmConfig, VoiceModel};
pub use mfcc::{FeatureExtractor, MfccConfig, WindowKind};
pub use normalizer::{FeatureNormalizer, NormalizationStats};
pub use profile::{ProfileInfo, VoiceProfile};
pub use store::{KvModelStore, ModelStore, PROFILE_PREFIX, profile_key};
pub use verifier::{SpeakerVerifier, Verification, VerifierConfig};
