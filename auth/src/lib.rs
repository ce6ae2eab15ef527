//! Authentication attempt governance for vaultvoice.
//!
//! Every user gets one [`AuthSession`] that both the voice and the password
//! path go through, so switching methods never bypasses a lockout.
//!
//! - [`Governor`]: the Ready/Locked state machine with a shared attempt
//!   pool and an escalating lockout schedule (30s, 60s, 300s, then 600s).
//! - [`LockoutTimer`]: one cancellable expiry callback per session.
//! - [`CredentialStore`]: salted password digests and the signup policy.

mod error;
mod governor;
mod password;
mod session;
mod timer;

pub use error::AuthError;
pub use governor::{Admission, AuthStatus, Governor, GovernorConfig, GovernorState, Lockout};
pub use password::{
    CREDENTIAL_PREFIX, Credential, CredentialStore, PasswordPolicy, SYMBOLS, credential_key,
};
pub use session::{AttemptResult, AuthDecision, AuthMethod, AuthSession};
pub use timer::LockoutTimer;
