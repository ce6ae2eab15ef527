use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::AuthError;

/// Configuration for [`Governor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Failed attempts allowed before a lockout (default: 3).
    pub max_attempts: u32,
    /// Lockout length in seconds per tier; the last entry repeats
    /// (default: 30, 60, 300, 600).
    pub lockout_schedule: Vec<u64>,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            lockout_schedule: vec![30, 60, 300, 600],
        }
    }
}

impl GovernorConfig {
    /// Lockout length for the given 0-indexed tier.
    pub fn lockout_duration(&self, tier: u32) -> Duration {
        let idx = (tier as usize).min(self.lockout_schedule.len().saturating_sub(1));
        Duration::from_secs(self.lockout_schedule.get(idx).copied().unwrap_or(0))
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if self.max_attempts == 0 {
            return Err(AuthError::InvalidConfig("max_attempts must be positive".into()));
        }
        if self.lockout_schedule.is_empty() {
            return Err(AuthError::InvalidConfig("lockout_schedule is empty".into()));
        }
        if self.lockout_schedule.windows(2).any(|w| w[1] < w[0]) {
            return Err(AuthError::InvalidConfig(
                "lockout_schedule must be non-decreasing".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GovernorState {
    Ready,
    Locked,
}

/// Whether an attempt may proceed right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Locked { remaining: Duration },
}

/// A lockout started by [`Governor::record_failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lockout {
    /// Tier the duration was taken from, before the increment.
    pub tier: u32,
    pub duration: Duration,
    pub deadline: Instant,
}

/// Snapshot of a governor for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthStatus {
    pub state: GovernorState,
    pub attempts_remaining: u32,
    pub lockout_tier: u32,
    pub lockout_seconds_remaining: u64,
}

/// Attempt counter and progressive lockout for one user.
///
/// # States
///
/// ```text
/// Ready --(last attempt fails)--> Locked --(deadline passes)--> Ready
///   ^                                                            |
///   +---------------- attempts reset, tier kept -----------------+
/// ```
///
/// Every failed attempt draws from one pool regardless of method. When the
/// pool runs dry the governor locks for the duration of the current tier
/// and bumps the tier. Expiry restores the pool but keeps the tier, so
/// repeat offenses escalate. Only a success resets the tier.
///
/// All methods take the current time explicitly; the governor never reads
/// the clock itself.
#[derive(Debug, Clone)]
pub struct Governor {
    cfg: GovernorConfig,
    attempts_remaining: u32,
    tier: u32,
    deadline: Option<Instant>,
}

impl Governor {
    pub fn new(cfg: GovernorConfig) -> Result<Self, AuthError> {
        cfg.validate()?;
        Ok(Self {
            attempts_remaining: cfg.max_attempts,
            tier: 0,
            deadline: None,
            cfg,
        })
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.cfg
    }

    pub fn state(&self, now: Instant) -> GovernorState {
        match self.deadline {
            Some(deadline) if now < deadline => GovernorState::Locked,
            _ => GovernorState::Ready,
        }
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.attempts_remaining
    }

    pub fn lockout_tier(&self) -> u32 {
        self.tier
    }

    /// Time left on the active lockout, zero when ready.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline
            .map(|d| d.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Checks whether an attempt may proceed. A lockout whose deadline has
    /// passed is expired here even if no timer has fired yet.
    pub fn admit(&mut self, now: Instant) -> Admission {
        self.expire(now);
        match self.state(now) {
            GovernorState::Ready => Admission::Allowed,
            GovernorState::Locked => Admission::Locked {
                remaining: self.remaining(now),
            },
        }
    }

    /// Records a failed attempt. Returns the lockout it started, if any.
    ///
    /// Ignored while locked: refused attempts never consume the pool.
    pub fn record_failure(&mut self, now: Instant) -> Option<Lockout> {
        self.expire(now);
        if self.state(now) == GovernorState::Locked {
            return None;
        }
        self.attempts_remaining = self.attempts_remaining.saturating_sub(1);
        if self.attempts_remaining > 0 {
            return None;
        }

        let tier = self.tier;
        let duration = self.cfg.lockout_duration(tier);
        let deadline = now + duration;
        self.tier = self.tier.saturating_add(1);
        self.deadline = Some(deadline);
        Some(Lockout {
            tier,
            duration,
            deadline,
        })
    }

    /// Records a successful attempt: the pool refills and the tier resets.
    /// Ignored while locked.
    pub fn record_success(&mut self, now: Instant) {
        self.expire(now);
        if self.state(now) == GovernorState::Locked {
            return;
        }
        self.attempts_remaining = self.cfg.max_attempts;
        self.tier = 0;
    }

    /// Ends the lockout if its deadline has passed. Returns true when a
    /// lockout ended.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.attempts_remaining = self.cfg.max_attempts;
                true
            }
            _ => false,
        }
    }

    pub fn status(&self, now: Instant) -> AuthStatus {
        let state = self.state(now);
        AuthStatus {
            state,
            attempts_remaining: match state {
                GovernorState::Ready if self.deadline.is_some() => self.cfg.max_attempts,
                GovernorState::Ready => self.attempts_remaining,
                GovernorState::Locked => 0,
            },
            lockout_tier: self.tier,
            lockout_seconds_remaining: ceil_secs(self.remaining(now)),
        }
    }
}

/// Whole seconds, rounded up, so a countdown never shows 0 while locked.
pub(crate) fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}
