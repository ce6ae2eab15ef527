//! Voice-authenticated vault.
//!
//! [`Vault`] is what a presentation layer talks to. It enrolls voice
//! profiles, runs voice and password logins through one shared attempt
//! governor per user, deletes users and reports status. Everything it
//! returns is structured data: wrong voices, unknown users and active
//! lockouts are [`AuthResult`]s, not errors.
//!
//! ```text
//! login_voice ----+                       +--> SpeakerVerifier (voiceprint)
//!                 +--> AuthSession -------+
//! login_password -+    (governor, timer)  +--> CredentialStore (auth)
//! ```

pub mod config;
mod error;
mod vault;

pub use config::VaultConfig;
pub use error::VaultError;
pub use vault::{AuthResult, UserStatus, Vault, validate_user_id};

pub use vaultvoice_auth::{AttemptResult, AuthDecision, AuthMethod, AuthStatus, GovernorState};
pub use vaultvoice_voiceprint::{
    AudioSample, AudioSource, CaptureError, ProfileInfo, WavFileSource, read_wav, write_wav,
};
