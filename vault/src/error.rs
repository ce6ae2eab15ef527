use thiserror::Error;

use vaultvoice_auth::AuthError;
use vaultvoice_kv::KVError;
use vaultvoice_voiceprint::{CaptureError, VoiceprintError};

/// Errors returned by [`crate::Vault`] operations.
///
/// Rejections and lockouts are not errors; they come back as
/// [`crate::AuthResult`]s.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault: invalid user id {0:?}")]
    InvalidUserId(String),

    #[error("vault: invalid config: {0}")]
    Config(String),

    #[error("vault: config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("vault: io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("vault: capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Voiceprint(#[from] VoiceprintError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("vault: store error: {0}")]
    Store(#[from] KVError),

    #[error("vault: background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
