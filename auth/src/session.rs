use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::governor::{Admission, AuthStatus, Governor, GovernorConfig, GovernorState, ceil_secs};
use crate::timer::LockoutTimer;
use crate::AuthError;

/// How the user tried to authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Voice,
    Password,
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::Voice => f.write_str("voice"),
            AuthMethod::Password => f.write_str("password"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthDecision {
    Granted,
    Denied,
    /// Refused without checking the credential.
    LockedOut,
}

/// Outcome of one attempt as seen by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptResult {
    pub method: AuthMethod,
    pub decision: AuthDecision,
    pub state: GovernorState,
    pub attempts_remaining: u32,
    pub lockout_tier: u32,
    pub lockout_seconds_remaining: u64,
}

impl AttemptResult {
    pub fn granted(&self) -> bool {
        self.decision == AuthDecision::Granted
    }
}

/// Per-user authentication context shared by every method.
///
/// Attempts run one at a time in submission order: the check of a later
/// attempt never starts before the governor has recorded the earlier one.
/// Lockout expiry is driven by a [`LockoutTimer`]; the governor also
/// expires lazily, so a late timer never blocks a legitimate attempt.
#[derive(Debug)]
pub struct AuthSession {
    user_id: String,
    governor: Arc<Mutex<Governor>>,
    gate: tokio::sync::Mutex<()>,
    timer: LockoutTimer,
}

impl AuthSession {
    pub fn new(user_id: impl Into<String>, cfg: GovernorConfig) -> Result<Self, AuthError> {
        Ok(Self {
            user_id: user_id.into(),
            governor: Arc::new(Mutex::new(Governor::new(cfg)?)),
            gate: tokio::sync::Mutex::new(()),
            timer: LockoutTimer::new(),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Runs one authentication attempt through the governor.
    ///
    /// While locked, `check` is not called and the result is
    /// [`AuthDecision::LockedOut`]. Otherwise `check` decides the outcome;
    /// if it returns an error the attempt is abandoned without consuming
    /// the pool.
    pub async fn attempt<F, Fut, E>(&self, method: AuthMethod, check: F) -> Result<AttemptResult, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
    {
        let _gate = self.gate.lock().await;

        let admission = self.governor.lock().admit(Instant::now());
        if let Admission::Locked { remaining } = admission {
            tracing::warn!(
                user = %self.user_id,
                %method,
                remaining_secs = ceil_secs(remaining),
                "auth: attempt refused, locked out"
            );
            return Ok(self.result(method, AuthDecision::LockedOut));
        }

        let ok = check().await?;

        let lockout = {
            let mut g = self.governor.lock();
            let now = Instant::now();
            if ok {
                g.record_success(now);
                None
            } else {
                g.record_failure(now)
            }
        };

        if ok {
            tracing::info!(user = %self.user_id, %method, "auth: granted");
            return Ok(self.result(method, AuthDecision::Granted));
        }

        match lockout {
            Some(lockout) => {
                tracing::warn!(
                    user = %self.user_id,
                    %method,
                    tier = lockout.tier,
                    duration_secs = lockout.duration.as_secs(),
                    "auth: attempts exhausted, locked out"
                );
                self.schedule_expiry(lockout.duration);
            }
            None => {
                tracing::info!(
                    user = %self.user_id,
                    %method,
                    attempts_remaining = self.governor.lock().attempts_remaining(),
                    "auth: denied"
                );
            }
        }
        Ok(self.result(method, AuthDecision::Denied))
    }

    pub fn status(&self) -> AuthStatus {
        self.governor.lock().status(Instant::now())
    }

    /// Returns true while an expiry callback is scheduled.
    pub fn expiry_pending(&self) -> bool {
        self.timer.is_pending()
    }

    fn schedule_expiry(&self, delay: std::time::Duration) {
        let governor = Arc::clone(&self.governor);
        let user = self.user_id.clone();
        self.timer.schedule(delay, move || {
            if governor.lock().expire(Instant::now()) {
                tracing::info!(user = %user, "auth: lockout expired");
            }
        });
    }

    fn result(&self, method: AuthMethod, decision: AuthDecision) -> AttemptResult {
        let s = self.status();
        AttemptResult {
            method,
            decision,
            state: s.state,
            attempts_remaining: s.attempts_remaining,
            lockout_tier: s.lockout_tier,
            lockout_seconds_remaining: s.lockout_seconds_remaining,
        }
    }
}
