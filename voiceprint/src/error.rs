use thiserror::Error;

use vaultvoice_kv::KVError;

use crate::capture::CaptureError;

/// Errors returned by voiceprint operations.
///
/// An unenrolled user is not an error: [`crate::SpeakerVerifier::verify`]
/// reports it as a rejected [`crate::Verification`] with a score of
/// negative infinity.
#[derive(Debug, Error)]
pub enum VoiceprintError {
    #[error("voiceprint: audio too short: need at least {window} samples, got {got}")]
    InsufficientAudio { window: usize, got: usize },

    #[error("voiceprint: sample rate mismatch: extractor expects {expected} Hz, got {got} Hz")]
    SampleRateMismatch { expected: u32, got: u32 },

    #[error("voiceprint: normalizer used before fit")]
    NotFitted,

    #[error("voiceprint: normalizer already fitted")]
    AlreadyFitted,

    #[error("voiceprint: training failed: {0}")]
    Training(String),

    #[error("voiceprint: dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("voiceprint: enrollment needs exactly {expected} samples, got {got}")]
    EnrollmentSamples { expected: usize, got: usize },

    #[error("voiceprint: invalid config: {0}")]
    InvalidConfig(String),

    #[error("voiceprint: {0}")]
    Capture(#[from] CaptureError),

    #[error("voiceprint: store error: {0}")]
    Store(#[from] KVError),
}
