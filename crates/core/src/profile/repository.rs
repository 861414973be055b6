//! Versioned profile storage.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::error::ProfileError;
use super::types::EncodingProfile;

/// Storage for encoding profiles.
///
/// Saving never mutates a stored profile: it appends a new version, so jobs
/// holding an earlier snapshot are unaffected.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Stores `profile` as the next version of its name.
    async fn save(&self, profile: EncodingProfile) -> Result<Arc<EncodingProfile>, ProfileError>;

    /// Latest version of a profile.
    async fn get(&self, name: &str) -> Result<Arc<EncodingProfile>, ProfileError>;

    async fn get_version(&self, name: &str, version: u32) -> Result<Arc<EncodingProfile>, ProfileError>;

    /// Latest version of every profile, sorted by name.
    async fn list(&self) -> Vec<Arc<EncodingProfile>>;

    /// Removes all versions. Returns whether the profile existed.
    async fn delete(&self, name: &str) -> bool;
}

/// In-memory [`ProfileRepository`].
#[derive(Default)]
pub struct InMemoryProfileRepository {
    profiles: RwLock<HashMap<String, Vec<Arc<EncodingProfile>>>>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository seeded with the built-in `default` profile.
    pub async fn with_builtin() -> Self {
        let repo = Self::new();
        // A fresh map cannot reject the first version.
        let _ = repo.save(EncodingProfile::new("default")).await;
        repo
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn save(&self, mut profile: EncodingProfile) -> Result<Arc<EncodingProfile>, ProfileError> {
        let mut profiles = self.profiles.write().await;
        let versions = profiles.entry(profile.name.clone()).or_default();
        profile.version = versions.last().map(|p| p.version + 1).unwrap_or(1);
        profile.created_at = Utc::now();
        let snapshot = Arc::new(profile);
        versions.push(snapshot.clone());
        Ok(snapshot)
    }

    async fn get(&self, name: &str) -> Result<Arc<EncodingProfile>, ProfileError> {
        self.profiles
            .read()
            .await
            .get(name)
            .and_then(|versions| versions.last().cloned())
            .ok_or_else(|| ProfileError::not_found(name))
    }

    async fn get_version(&self, name: &str, version: u32) -> Result<Arc<EncodingProfile>, ProfileError> {
        let profiles = self.profiles.read().await;
        let versions = profiles.get(name).ok_or_else(|| ProfileError::not_found(name))?;
        versions
            .iter()
            .find(|p| p.version == version)
            .cloned()
            .ok_or_else(|| ProfileError::VersionNotFound {
                name: name.to_string(),
                version,
            })
    }

    async fn list(&self) -> Vec<Arc<EncodingProfile>> {
        let profiles = self.profiles.read().await;
        let mut latest: Vec<Arc<EncodingProfile>> =
            profiles.values().filter_map(|v| v.last().cloned()).collect();
        latest.sort_by(|a, b| a.name.cmp(&b.name));
        latest
    }

    async fn delete(&self, name: &str) -> bool {
        self.profiles.write().await.remove(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_creates_versions() {
        let repo = InMemoryProfileRepository::new();
        let v1 = repo.save(EncodingProfile::new("web")).await.unwrap();
        assert_eq!(v1.version, 1);

        let mut edited = (*v1).clone();
        edited.video.bitrate_kbps = 8000;
        let v2 = repo.save(edited).await.unwrap();
        assert_eq!(v2.version, 2);

        // the earlier snapshot is untouched
        assert_eq!(v1.video.bitrate_kbps, 5000);
        assert_eq!(repo.get("web").await.unwrap().version, 2);
        assert_eq!(repo.get_version("web", 1).await.unwrap().video.bitrate_kbps, 5000);
    }

    #[tokio::test]
    async fn test_missing_profiles() {
        let repo = InMemoryProfileRepository::with_builtin().await;
        assert!(matches!(repo.get("nope").await, Err(ProfileError::NotFound { .. })));
        assert!(matches!(
            repo.get_version("default", 7).await,
            Err(ProfileError::VersionNotFound { version: 7, .. })
        ));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let repo = InMemoryProfileRepository::with_builtin().await;
        repo.save(EncodingProfile::new("archive")).await.unwrap();
        let names: Vec<String> = repo.list().await.iter().map(|p| p.name.clone()).collect();
        assert_eq!(names, vec!["archive", "default"]);

        assert!(repo.delete("archive").await);
        assert!(!repo.delete("archive").await);
        assert_eq!(repo.list().await.len(), 1);
    }
}
