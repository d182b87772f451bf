use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{ParticipantPreference, Recommendation, UserProfile, Venue};

/// Errors that can occur when reading or writing stored data
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Venue lookup criteria. Empty criteria match every venue.
#[derive(Debug, Clone, Default)]
pub struct VenueQuery {
    /// Case-insensitive city match
    pub city: Option<String>,
    pub ids: Option<Vec<String>>,
}

impl VenueQuery {
    pub fn in_city(city: Option<&str>) -> Self {
        Self {
            city: city.map(str::trim).filter(|c| !c.is_empty()).map(str::to_string),
            ids: None,
        }
    }

    pub fn matches(&self, venue: &Venue) -> bool {
        let city_ok = match &self.city {
            Some(city) => venue
                .city
                .as_deref()
                .is_some_and(|c| c.trim().eq_ignore_ascii_case(city.trim())),
            None => true,
        };
        let id_ok = match &self.ids {
            Some(ids) => ids.iter().any(|id| id == &venue.id),
            None => true,
        };
        city_ok && id_ok
    }
}

#[async_trait]
pub trait VenueStore: Send + Sync {
    async fn find_venues(&self, query: &VenueQuery) -> Result<Vec<Venue>, StoreError>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Every participant preference of a group, ordered by session id
    async fn list_group(&self, group_id: &str) -> Result<Vec<ParticipantPreference>, StoreError>;

    async fn get_preference(
        &self,
        group_id: &str,
        session_id: &str,
    ) -> Result<Option<ParticipantPreference>, StoreError>;

    /// Insert or replace the preference for its (group, session) pair
    async fn save_preference(&self, preference: &ParticipantPreference) -> Result<(), StoreError>;

    async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError>;
}

/// Append-only recommendation log
#[async_trait]
pub trait RecommendationStore: Send + Sync {
    async fn append(&self, record: &Recommendation) -> Result<(), StoreError> {
        self.append_many(std::slice::from_ref(record)).await
    }

    /// Append a batch: either every record is stored or none is
    async fn append_many(&self, records: &[Recommendation]) -> Result<(), StoreError>;

    /// Records of a group, oldest first
    async fn list_for_group(&self, group_id: &str) -> Result<Vec<Recommendation>, StoreError>;
}

/// The three store seams, usually backed by one implementation
#[derive(Clone)]
pub struct Stores {
    pub venues: Arc<dyn VenueStore>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub recommendations: Arc<dyn RecommendationStore>,
}

impl Stores {
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: VenueStore + PreferenceStore + RecommendationStore + 'static,
    {
        Self {
            venues: store.clone(),
            preferences: store.clone(),
            recommendations: store,
        }
    }
}

/// Seed file layout for `MemoryStore`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedData {
    #[serde(default)]
    pub venues: Vec<Venue>,
    #[serde(default)]
    pub preferences: Vec<ParticipantPreference>,
    #[serde(default)]
    pub profiles: Vec<UserProfile>,
}

/// In-process store implementing every store trait
///
/// Used when no database is configured, and in tests.
#[derive(Default)]
pub struct MemoryStore {
    venues: RwLock<Vec<Venue>>,
    preferences: RwLock<HashMap<(String, String), ParticipantPreference>>,
    profiles: RwLock<HashMap<String, UserProfile>>,
    recommendations: RwLock<Vec<Recommendation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: SeedData) -> Self {
        let preferences = seed
            .preferences
            .into_iter()
            .map(|p| ((p.group_id.clone(), p.session_id.clone()), p))
            .collect();
        let profiles = seed
            .profiles
            .into_iter()
            .map(|p| (p.user_id.clone(), p))
            .collect();

        Self {
            venues: RwLock::new(seed.venues),
            preferences: RwLock::new(preferences),
            profiles: RwLock::new(profiles),
            recommendations: RwLock::new(Vec::new()),
        }
    }

    /// Load a JSON seed file
    pub async fn from_seed_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::InvalidData(format!("{}: {}", path.display(), e)))?;
        let seed: SeedData = serde_json::from_str(&raw)
            .map_err(|e| StoreError::InvalidData(format!("{}: {}", path.display(), e)))?;

        tracing::info!(
            "Loaded seed data: {} venues, {} preferences, {} profiles",
            seed.venues.len(),
            seed.preferences.len(),
            seed.profiles.len()
        );

        Ok(Self::from_seed(seed))
    }

    pub async fn insert_venue(&self, venue: Venue) {
        let mut venues = self.venues.write().await;
        venues.retain(|v| v.id != venue.id);
        venues.push(venue);
    }

    pub async fn insert_profile(&self, profile: UserProfile) {
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
    }
}

#[async_trait]
impl VenueStore for MemoryStore {
    async fn find_venues(&self, query: &VenueQuery) -> Result<Vec<Venue>, StoreError> {
        let venues = self.venues.read().await;
        Ok(venues.iter().filter(|v| query.matches(v)).cloned().collect())
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn list_group(&self, group_id: &str) -> Result<Vec<ParticipantPreference>, StoreError> {
        let preferences = self.preferences.read().await;
        let mut group: Vec<ParticipantPreference> = preferences
            .values()
            .filter(|p| p.group_id == group_id)
            .cloned()
            .collect();
        group.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(group)
    }

    async fn get_preference(
        &self,
        group_id: &str,
        session_id: &str,
    ) -> Result<Option<ParticipantPreference>, StoreError> {
        let preferences = self.preferences.read().await;
        Ok(preferences
            .get(&(group_id.to_string(), session_id.to_string()))
            .cloned())
    }

    async fn save_preference(&self, preference: &ParticipantPreference) -> Result<(), StoreError> {
        self.preferences.write().await.insert(
            (preference.group_id.clone(), preference.session_id.clone()),
            preference.clone(),
        );
        Ok(())
    }

    async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }
}

#[async_trait]
impl RecommendationStore for MemoryStore {
    async fn append_many(&self, records: &[Recommendation]) -> Result<(), StoreError> {
        self.recommendations
            .write()
            .await
            .extend(records.iter().cloned());
        Ok(())
    }

    async fn list_for_group(&self, group_id: &str) -> Result<Vec<Recommendation>, StoreError> {
        let records = self.recommendations.read().await;
        Ok(records
            .iter()
            .filter(|r| r.group_id == group_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GenerationSource;
    use serde_json::json;

    fn seed() -> SeedData {
        serde_json::from_value(json!({
            "venues": [
                { "id": "v1", "slug": "v1", "name": "Sauna Bar", "type": "bar", "city": "Helsinki" },
                { "id": "v2", "slug": "v2", "name": "Park Cafe", "type": "cafe", "city": " helsinki " },
                { "id": "v3", "slug": "v3", "name": "Bowl", "type": "bowling", "city": "Espoo" }
            ],
            "preferences": [
                { "groupId": "g1", "sessionId": "s2", "moodResponses": { "hunger": 4, "bad": [1, 2] } },
                { "groupId": "g1", "sessionId": "s1", "moneyPreference": "budget" },
                { "groupId": "g2", "sessionId": "s1" }
            ],
            "profiles": [{ "userId": "u1", "activityTypes": ["bowling"] }]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_find_venues_by_city_and_ids() {
        let store = MemoryStore::from_seed(seed());

        let all = store.find_venues(&VenueQuery::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let helsinki = store.find_venues(&VenueQuery::in_city(Some("HELSINKI"))).await.unwrap();
        assert_eq!(helsinki.len(), 2);

        let query = VenueQuery {
            city: None,
            ids: Some(vec!["v3".to_string()]),
        };
        let by_id = store.find_venues(&query).await.unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].id, "v3");
    }

    #[tokio::test]
    async fn test_preferences_roundtrip() {
        let store = MemoryStore::from_seed(seed());

        let group = store.list_group("g1").await.unwrap();
        let sessions: Vec<&str> = group.iter().map(|p| p.session_id.as_str()).collect();
        assert_eq!(sessions, vec!["s1", "s2"]);
        // Non-scalar mood values are dropped on load
        assert_eq!(group[1].mood_responses.len(), 1);

        let mut pref = store.get_preference("g1", "s1").await.unwrap().unwrap();
        pref.activity_level = 5;
        store.save_preference(&pref).await.unwrap();

        let reloaded = store.get_preference("g1", "s1").await.unwrap().unwrap();
        assert_eq!(reloaded.activity_level, 5);
        assert!(store.get_preference("g1", "missing").await.unwrap().is_none());
        assert!(store.list_group("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_profiles_lookup() {
        let store = MemoryStore::from_seed(seed());
        let profile = store.get_user_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.activity_types, vec!["bowling"]);
        assert!(store.get_user_profile("u2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_seed_file_is_invalid_data() {
        let result = MemoryStore::from_seed_file("/nonexistent/seed.json").await;
        assert!(matches!(result, Err(StoreError::InvalidData(_))));
    }

    fn record(group_id: &str, venue_id: &str) -> Recommendation {
        Recommendation {
            id: uuid::Uuid::new_v4(),
            group_id: group_id.to_string(),
            venue_id: venue_id.to_string(),
            match_score: 0.5,
            title: venue_id.to_string(),
            description: String::new(),
            reasoning: String::new(),
            highlights: vec![],
            source: GenerationSource::Fallback,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_many_keeps_batch_order() {
        let store = MemoryStore::new();
        store.append(&record("g1", "v0")).await.unwrap();
        store
            .append_many(&[record("g1", "v1"), record("g2", "v9"), record("g1", "v2")])
            .await
            .unwrap();
        store.append_many(&[]).await.unwrap();

        let history = store.list_for_group("g1").await.unwrap();
        let venues: Vec<&str> = history.iter().map(|r| r.venue_id.as_str()).collect();
        assert_eq!(venues, vec!["v0", "v1", "v2"]);
        assert_eq!(store.list_for_group("g2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_inserts_replace_by_id() {
        let store = MemoryStore::new();
        let venue: Venue = serde_json::from_value(json!({
            "id": "v1", "slug": "v1", "name": "Old", "type": "bar"
        }))
        .unwrap();
        store.insert_venue(venue.clone()).await;
        store
            .insert_venue(Venue {
                name: "New".to_string(),
                ..venue
            })
            .await;
        store
            .insert_profile(UserProfile {
                user_id: "u1".to_string(),
                ..Default::default()
            })
            .await;

        let venues = store.find_venues(&VenueQuery::default()).await.unwrap();
        assert_eq!(venues.len(), 1);
        assert_eq!(venues[0].name, "New");
        assert!(store.get_user_profile("u1").await.unwrap().is_some());
    }
}
