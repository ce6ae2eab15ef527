use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use vaultvoice_auth::{
    AttemptResult, AuthMethod, AuthSession, AuthStatus, CredentialStore, credential_key,
};
use vaultvoice_kv::{KVStore, MemoryStore, RedbStore, WriteOp};
use vaultvoice_voiceprint::{
    AudioSample, AudioSource, KvModelStore, ProfileInfo, SpeakerVerifier, Verification,
    VoiceprintError, WavFileSource, profile_key,
};

use crate::{VaultConfig, VaultError};

const MAX_USER_ID_LEN: usize = 64;

/// Outcome of a login attempt, voice or password.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthResult {
    pub user_id: String,
    #[serde(flatten)]
    pub attempt: AttemptResult,
    /// Voice score; absent for password attempts and refused attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl AuthResult {
    pub fn granted(&self) -> bool {
        self.attempt.granted()
    }
}

/// What the vault knows about one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStatus {
    pub user_id: String,
    pub registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileInfo>,
    #[serde(flatten)]
    pub auth: AuthStatus,
}

/// The voice-authenticated vault.
///
/// One [`KVStore`] holds both voice profiles and password credentials.
/// Each user gets one [`AuthSession`], created on first use and shared by
/// the voice and password paths, so lockouts apply across methods.
/// Feature extraction, training and password hashing run on the blocking
/// pool.
pub struct Vault {
    cfg: VaultConfig,
    kv: Arc<dyn KVStore>,
    verifier: Arc<SpeakerVerifier>,
    credentials: CredentialStore,
    sessions: Mutex<HashMap<String, Arc<AuthSession>>>,
}

impl Vault {
    pub fn new(cfg: VaultConfig, kv: Arc<dyn KVStore>) -> Result<Self, VaultError> {
        cfg.validate()?;
        let models = Arc::new(KvModelStore::new(Arc::clone(&kv)));
        let verifier = Arc::new(SpeakerVerifier::new(cfg.verifier.clone(), models)?);
        let credentials = CredentialStore::new(Arc::clone(&kv), cfg.password.clone());
        Ok(Self {
            cfg,
            kv,
            verifier,
            credentials,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Opens the redb database named by the config.
    pub fn open(cfg: VaultConfig) -> Result<Self, VaultError> {
        let path = cfg.store_path()?;
        let kv = Arc::new(RedbStore::open(&path)?);
        tracing::debug!(path = %path.display(), "vault: store opened");
        Self::new(cfg, kv)
    }

    /// A vault whose state lives only as long as the process.
    pub fn in_memory(cfg: VaultConfig) -> Result<Self, VaultError> {
        Self::new(cfg, Arc::new(MemoryStore::new()))
    }

    pub fn config(&self) -> &VaultConfig {
        &self.cfg
    }

    pub fn passphrase(&self) -> &str {
        &self.cfg.passphrase
    }

    /// Creates a password credential for a new user.
    pub async fn register(&self, user_id: &str, password: &str) -> Result<(), VaultError> {
        validate_user_id(user_id)?;
        let credentials = self.credentials.clone();
        let user = user_id.to_string();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || credentials.register(&user, &password)).await??;
        Ok(())
    }

    /// Enrolls a voice profile from exactly `enrollment_samples` recordings,
    /// replacing any previous profile.
    pub async fn enroll(
        &self,
        user_id: &str,
        samples: Vec<AudioSample>,
    ) -> Result<ProfileInfo, VaultError> {
        validate_user_id(user_id)?;
        let verifier = Arc::clone(&self.verifier);
        let user = user_id.to_string();
        let info = tokio::task::spawn_blocking(move || verifier.enroll(&user, &samples)).await??;
        Ok(info)
    }

    /// Records the enrollment takes from `source`, then enrolls. A capture
    /// failure aborts before any training.
    pub async fn enroll_from_source(
        &self,
        user_id: &str,
        source: Arc<dyn AudioSource>,
    ) -> Result<ProfileInfo, VaultError> {
        validate_user_id(user_id)?;
        let takes = self.cfg.verifier.enrollment_samples;
        let samples = self.capture(source, takes).await?;
        self.enroll(user_id, samples).await
    }

    /// Enrolls from WAV recordings, one file per enrollment sample.
    ///
    /// The file count is checked before any file is read.
    pub async fn enroll_from_files(
        &self,
        user_id: &str,
        files: Vec<PathBuf>,
    ) -> Result<ProfileInfo, VaultError> {
        validate_user_id(user_id)?;
        let expected = self.cfg.verifier.enrollment_samples;
        if files.len() != expected {
            return Err(VoiceprintError::EnrollmentSamples {
                expected,
                got: files.len(),
            }
            .into());
        }
        self.enroll_from_source(user_id, Arc::new(WavFileSource::new(files)))
            .await
    }

    /// Attempts a voice login with an already recorded sample.
    pub async fn login_voice(
        &self,
        user_id: &str,
        sample: AudioSample,
    ) -> Result<AuthResult, VaultError> {
        validate_user_id(user_id)?;
        let session = self.session(user_id)?;
        let mut scored: Option<Verification> = None;
        let slot = &mut scored;
        let attempt = session
            .attempt(AuthMethod::Voice, || async move {
                let v = self.verify(user_id, sample).await?;
                let ok = v.verified;
                *slot = Some(v);
                Ok::<_, VaultError>(ok)
            })
            .await?;
        Ok(voice_result(user_id, attempt, scored))
    }

    /// Attempts a voice login, recording from `source` only if the user is
    /// not locked out.
    pub async fn login_voice_from_source(
        &self,
        user_id: &str,
        source: Arc<dyn AudioSource>,
    ) -> Result<AuthResult, VaultError> {
        validate_user_id(user_id)?;
        let session = self.session(user_id)?;
        let mut scored: Option<Verification> = None;
        let slot = &mut scored;
        let attempt = session
            .attempt(AuthMethod::Voice, || async move {
                let mut takes = self.capture(source, 1).await?;
                let sample = takes.pop().ok_or_else(|| {
                    VaultError::Config("capture returned no recording".into())
                })?;
                let v = self.verify(user_id, sample).await?;
                let ok = v.verified;
                *slot = Some(v);
                Ok::<_, VaultError>(ok)
            })
            .await?;
        Ok(voice_result(user_id, attempt, scored))
    }

    /// Attempts a password login. An unknown user is a failed attempt.
    pub async fn login_password(
        &self,
        user_id: &str,
        password: &str,
    ) -> Result<AuthResult, VaultError> {
        validate_user_id(user_id)?;
        let session = self.session(user_id)?;
        let attempt = session
            .attempt(AuthMethod::Password, || async move {
                let credentials = self.credentials.clone();
                let user = user_id.to_string();
                let password = password.to_string();
                let ok =
                    tokio::task::spawn_blocking(move || credentials.verify(&user, &password))
                        .await??;
                Ok::<_, VaultError>(ok)
            })
            .await?;
        Ok(AuthResult {
            user_id: user_id.to_string(),
            attempt,
            score: None,
            threshold: None,
        })
    }

    /// Removes the user's voice profile and credential in one atomic write
    /// and forgets their session. Deleting an unknown user is a no-op.
    pub fn delete_user(&self, user_id: &str) -> Result<(), VaultError> {
        validate_user_id(user_id)?;
        self.verifier.remove_with(user_id, || {
            self.kv.apply(&[
                WriteOp::delete(profile_key(user_id)),
                WriteOp::delete(credential_key(user_id)),
            ])
        })?;
        self.sessions.lock().remove(user_id);
        tracing::info!(user = %user_id, "vault: user deleted");
        Ok(())
    }

    /// Users with a stored voice profile.
    pub fn list_enrolled(&self) -> Result<BTreeSet<String>, VaultError> {
        Ok(self.verifier.list_enrolled()?)
    }

    /// Users with a voice profile, a password, or both.
    pub fn list_users(&self) -> Result<BTreeSet<String>, VaultError> {
        let mut users = self.list_enrolled()?;
        users.extend(self.credentials.list()?);
        Ok(users)
    }

    pub fn status(&self, user_id: &str) -> Result<UserStatus, VaultError> {
        validate_user_id(user_id)?;
        Ok(UserStatus {
            user_id: user_id.to_string(),
            registered: self.credentials.exists(user_id)?,
            profile: self.verifier.profile_info(user_id)?,
            auth: self.session(user_id)?.status(),
        })
    }

    fn session(&self, user_id: &str) -> Result<Arc<AuthSession>, VaultError> {
        let mut sessions = self.sessions.lock();
        if let Some(s) = sessions.get(user_id) {
            return Ok(Arc::clone(s));
        }
        let session = Arc::new(AuthSession::new(user_id, self.cfg.governor.clone())?);
        sessions.insert(user_id.to_string(), Arc::clone(&session));
        Ok(session)
    }

    async fn verify(&self, user_id: &str, sample: AudioSample) -> Result<Verification, VaultError> {
        let verifier = Arc::clone(&self.verifier);
        let user = user_id.to_string();
        let v = tokio::task::spawn_blocking(move || verifier.verify(&user, &sample)).await??;
        Ok(v)
    }

    async fn capture(
        &self,
        source: Arc<dyn AudioSource>,
        takes: usize,
    ) -> Result<Vec<AudioSample>, VaultError> {
        let cap = self.cfg.capture.clone();
        let samples = tokio::task::spawn_blocking(move || {
            (0..takes)
                .map(|_| source.record(cap.duration(), cap.sample_rate, cap.channels))
                .collect::<Result<Vec<_>, _>>()
        })
        .await??;
        Ok(samples)
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("verifier", &self.verifier)
            .field("sessions", &self.sessions.lock().len())
            .finish_non_exhaustive()
    }
}

fn voice_result(user_id: &str, attempt: AttemptResult, scored: Option<Verification>) -> AuthResult {
    AuthResult {
        user_id: user_id.to_string(),
        attempt,
        score: scored.as_ref().map(|v| v.score),
        threshold: scored.as_ref().map(|v| v.threshold),
    }
}

/// User ids are 1 to 64 characters from `[A-Za-z0-9_.@-]`.
pub fn validate_user_id(user_id: &str) -> Result<(), VaultError> {
    let valid = !user_id.is_empty()
        && user_id.len() <= MAX_USER_ID_LEN
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'));
    if valid {
        Ok(())
    } else {
        Err(VaultError::InvalidUserId(user_id.to_string()))
    }
}
