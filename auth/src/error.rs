use thiserror::Error;

use vaultvoice_kv::KVError;

/// Errors returned by authentication operations.
///
/// A wrong password, an unknown user and an active lockout are outcomes,
/// not errors: they come back as [`crate::AttemptResult`]s.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth: invalid config: {0}")]
    InvalidConfig(String),

    #[error("auth: password rejected: {0}")]
    WeakPassword(String),

    #[error("auth: user already registered: {0}")]
    UserExists(String),

    #[error("auth: random source failed: {0}")]
    Random(String),

    #[error("auth: corrupt credential for {0}")]
    CorruptCredential(String),

    #[error("auth: store error: {0}")]
    Store(#[from] KVError),
}
