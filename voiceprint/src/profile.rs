use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gmm::VoiceModel;
use crate::normalizer::NormalizationStats;

/// The persisted unit of enrollment for one user.
///
/// Replaced wholesale on re-enrollment, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub user_id: String,
    pub stats: NormalizationStats,
    pub model: VoiceModel,
    /// Number of recordings the profile was enrolled from.
    pub sample_count: usize,
    pub created_at: DateTime<Utc>,
}

impl VoiceProfile {
    pub fn info(&self) -> ProfileInfo {
        ProfileInfo {
            user_id: self.user_id.clone(),
            sample_count: self.sample_count,
            frame_count: self.stats.frame_count,
            component_count: self.model.component_count(),
            created_at: self.created_at,
        }
    }
}

/// Summary of a stored profile, safe to show to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileInfo {
    pub user_id: String,
    pub sample_count: usize,
    pub frame_count: usize,
    pub component_count: usize,
    pub created_at: DateTime<Utc>,
}
