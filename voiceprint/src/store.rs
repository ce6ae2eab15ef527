use std::collections::BTreeSet;
use std::sync::Arc;

use vaultvoice_kv::{KVStore, encode_record, get_record};

use crate::VoiceprintError;
use crate::profile::VoiceProfile;

/// Key prefix under which voice profiles are stored.
pub const PROFILE_PREFIX: &str = "voice:profile:";

/// Returns the KV key holding `user_id`'s profile.
pub fn profile_key(user_id: &str) -> String {
    format!("{PROFILE_PREFIX}{user_id}")
}

/// Persists one [`VoiceProfile`] per user.
///
/// `save` is all-or-nothing: a concurrent `load` sees either the previous
/// profile or the new one.
pub trait ModelStore: Send + Sync {
    fn save(&self, user_id: &str, profile: &VoiceProfile) -> Result<(), VoiceprintError>;

    fn load(&self, user_id: &str) -> Result<Option<VoiceProfile>, VoiceprintError>;

    /// Removes the profile. Removing a missing profile is a no-op.
    fn delete(&self, user_id: &str) -> Result<(), VoiceprintError>;

    fn list(&self) -> Result<BTreeSet<String>, VoiceprintError>;
}

/// [`ModelStore`] backed by any [`KVStore`].
#[derive(Debug, Clone)]
pub struct KvModelStore {
    kv: Arc<dyn KVStore>,
}

impl KvModelStore {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self { kv }
    }
}

impl ModelStore for KvModelStore {
    fn save(&self, user_id: &str, profile: &VoiceProfile) -> Result<(), VoiceprintError> {
        let data = encode_record(profile)?;
        self.kv.set(&profile_key(user_id), &data)?;
        Ok(())
    }

    fn load(&self, user_id: &str) -> Result<Option<VoiceProfile>, VoiceprintError> {
        Ok(get_record(self.kv.as_ref(), &profile_key(user_id))?)
    }

    fn delete(&self, user_id: &str) -> Result<(), VoiceprintError> {
        self.kv.delete(&profile_key(user_id))?;
        Ok(())
    }

    fn list(&self) -> Result<BTreeSet<String>, VoiceprintError> {
        Ok(self
            .kv
            .keys(PROFILE_PREFIX)?
            .into_iter()
            .filter_map(|k| k.strip_prefix(PROFILE_PREFIX).map(str::to_owned))
            .collect())
    }
}
