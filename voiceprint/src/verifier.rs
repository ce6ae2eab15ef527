use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::audio::AudioSample;
use crate::features::FeatureMatrix;
use crate::gmm::{GmmConfig, VoiceModel};
use crate::mfcc::{FeatureExtractor, MfccConfig};
use crate::normalizer::FeatureNormalizer;
use crate::profile::{ProfileInfo, VoiceProfile};
use crate::store::ModelStore;
use crate::VoiceprintError;

/// Configures enrollment and verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Accept when the average log-likelihood is strictly above this (default: -50).
    pub threshold: f64,
    /// Recordings required per enrollment (default: 3).
    pub enrollment_samples: usize,
    pub mfcc: MfccConfig,
    pub gmm: GmmConfig,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            threshold: -50.0,
            enrollment_samples: 3,
            mfcc: MfccConfig::default(),
            gmm: GmmConfig::default(),
        }
    }
}

/// Result of a verification.
///
/// An unenrolled user yields `verified == false` with a score of negative
/// infinity, distinguishing "no enrollment" from "enrollment mismatch".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verification {
    pub user_id: String,
    pub verified: bool,
    pub score: f64,
    pub threshold: f64,
}

impl Verification {
    /// Returns false when the user had no profile to score against.
    pub fn enrolled(&self) -> bool {
        self.score != f64::NEG_INFINITY
    }
}

/// Enrolls and verifies speakers against per-user voice profiles.
///
/// Profiles are cached in memory after the first load. Enrollment for a
/// given user is serialized: at most one training and write per user is in
/// flight, while verifications proceed concurrently and only ever see a
/// complete profile.
pub struct SpeakerVerifier {
    cfg: VerifierConfig,
    extractor: FeatureExtractor,
    store: Arc<dyn ModelStore>,
    cache: RwLock<HashMap<String, Arc<VoiceProfile>>>,
    writers: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SpeakerVerifier {
    pub fn new(cfg: VerifierConfig, store: Arc<dyn ModelStore>) -> Result<Self, VoiceprintError> {
        if cfg.enrollment_samples == 0 {
            return Err(VoiceprintError::InvalidConfig(
                "enrollment_samples must be positive".into(),
            ));
        }
        if cfg.threshold.is_nan() {
            return Err(VoiceprintError::InvalidConfig("threshold is NaN".into()));
        }
        let extractor = FeatureExtractor::new(cfg.mfcc.clone())?;
        Ok(Self {
            cfg,
            extractor,
            store,
            cache: RwLock::new(HashMap::new()),
            writers: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.cfg
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Builds and stores a profile from exactly `enrollment_samples`
    /// recordings, replacing any previous profile.
    ///
    /// Nothing is written unless extraction, normalization and training all
    /// succeed; on failure the previous profile stays in place.
    pub fn enroll(
        &self,
        user_id: &str,
        samples: &[AudioSample],
    ) -> Result<ProfileInfo, VoiceprintError> {
        if samples.len() != self.cfg.enrollment_samples {
            return Err(VoiceprintError::EnrollmentSamples {
                expected: self.cfg.enrollment_samples,
                got: samples.len(),
            });
        }

        let lock = self.writer(user_id);
        let _guard = lock.lock();

        let features = samples
            .iter()
            .map(|s| self.extractor.extract(s))
            .collect::<Result<Vec<_>, _>>()?;

        let mut normalizer = FeatureNormalizer::new();
        let stats = normalizer.fit(&features)?.clone();
        let normalized = normalizer.transform(&FeatureMatrix::concat(&features)?)?;
        let model = VoiceModel::train(&normalized, &self.cfg.gmm)?;

        let profile = VoiceProfile {
            user_id: user_id.to_string(),
            stats,
            model,
            sample_count: samples.len(),
            created_at: Utc::now(),
        };
        self.store.save(user_id, &profile)?;

        let info = profile.info();
        self.cache
            .write()
            .insert(user_id.to_string(), Arc::new(profile));
        tracing::info!(
            user = %user_id,
            frames = info.frame_count,
            components = info.component_count,
            "voiceprint: enrolled"
        );
        Ok(info)
    }

    /// Scores `sample` against the user's profile and applies the threshold.
    pub fn verify(
        &self,
        user_id: &str,
        sample: &AudioSample,
    ) -> Result<Verification, VoiceprintError> {
        let Some(profile) = self.profile(user_id)? else {
            tracing::warn!(user = %user_id, "voiceprint: verify for unenrolled user");
            return Ok(Verification {
                user_id: user_id.to_string(),
                verified: false,
                score: f64::NEG_INFINITY,
                threshold: self.cfg.threshold,
            });
        };

        let features = self.extractor.extract(sample)?;
        let normalized = FeatureNormalizer::from_stats(profile.stats.clone()).transform(&features)?;
        let score = profile.model.score(&normalized)?;
        let verified = score > self.cfg.threshold;

        tracing::info!(
            user = %user_id,
            score,
            threshold = self.cfg.threshold,
            result = if verified { "PASS" } else { "FAIL" },
            "voiceprint: verification"
        );
        Ok(Verification {
            user_id: user_id.to_string(),
            verified,
            score,
            threshold: self.cfg.threshold,
        })
    }

    /// Removes the user's profile from the store and the cache.
    /// Deleting an unknown user is a no-op.
    pub fn delete(&self, user_id: &str) -> Result<(), VoiceprintError> {
        self.remove_with(user_id, || self.store.delete(user_id))
    }

    /// Runs `remove`, which must delete the user's stored profile, under the
    /// user's write lock, then drops the cached copy.
    ///
    /// Lets callers delete the profile in the same atomic batch as other
    /// per-user records. If `remove` fails the cache is left alone.
    pub fn remove_with<E>(
        &self,
        user_id: &str,
        remove: impl FnOnce() -> Result<(), E>,
    ) -> Result<(), E> {
        let lock = self.writer(user_id);
        let _guard = lock.lock();
        remove()?;
        self.cache.write().remove(user_id);
        tracing::info!(user = %user_id, "voiceprint: profile deleted");
        Ok(())
    }

    pub fn list_enrolled(&self) -> Result<BTreeSet<String>, VoiceprintError> {
        self.store.list()
    }

    pub fn is_enrolled(&self, user_id: &str) -> Result<bool, VoiceprintError> {
        Ok(self.profile(user_id)?.is_some())
    }

    pub fn profile_info(&self, user_id: &str) -> Result<Option<ProfileInfo>, VoiceprintError> {
        Ok(self.profile(user_id)?.map(|p| p.info()))
    }

    fn profile(&self, user_id: &str) -> Result<Option<Arc<VoiceProfile>>, VoiceprintError> {
        if let Some(p) = self.cache.read().get(user_id) {
            return Ok(Some(Arc::clone(p)));
        }
        // A miss is filled under the writer lock so a concurrent delete
        // cannot be undone by a stale load.
        let lock = self.writer(user_id);
        let _guard = lock.lock();
        if let Some(p) = self.cache.read().get(user_id) {
            return Ok(Some(Arc::clone(p)));
        }
        let Some(profile) = self.store.load(user_id)? else {
            return Ok(None);
        };
        let profile = Arc::new(profile);
        self.cache
            .write()
            .insert(user_id.to_string(), Arc::clone(&profile));
        Ok(Some(profile))
    }

    fn writer(&self, user_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.writers
                .lock()
                .entry(user_id.to_string())
                .or_default(),
        )
    }
}

impl std::fmt::Debug for SpeakerVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeakerVerifier")
            .field("cfg", &self.cfg)
            .field("cached", &self.cache.read().len())
            .finish_non_exhaustive()
    }
}
