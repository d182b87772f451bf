use chrono::{Local, Timelike, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::config::FilterSettings;
use crate::core::filters::VenueFilter;
use crate::error::EngineError;
use crate::models::{
    MoodSignals, ParticipantPreference, QuestionSet, Recommendation, SignalKey, TimeOfDay,
    UserProfile, Venue,
};
use crate::pipeline::questions::{QuestionContext, QuestionSelector};
use crate::pipeline::recommendations::{RecommendationContext, RecommendationGenerator};
use crate::pipeline::stats::{aggregate_mood, group_stats, merged_profile, preference_summary};
use crate::services::store::{PreferenceStore, RecommendationStore, Stores, VenueQuery, VenueStore};

/// Map a local hour (0-23) to a time-of-day bucket
pub fn time_bucket(hour: u32) -> TimeOfDay {
    TimeOfDay::from_hour(hour)
}

/// Result of a recommendation run
#[derive(Debug, Clone)]
pub struct RecommendationRun {
    pub recommendations: Vec<Recommendation>,
    /// Venues that survived filtering
    pub candidate_count: usize,
}

/// Wires the stores, the venue filter, the question selector and the
/// recommendation generator into the three pipeline operations
pub struct Engine {
    venues: Arc<dyn VenueStore>,
    preferences: Arc<dyn PreferenceStore>,
    recommendations: Arc<dyn RecommendationStore>,
    filter: VenueFilter,
    max_distance_m: f64,
    selector: QuestionSelector,
    generator: RecommendationGenerator,
}

impl Engine {
    pub fn new(
        stores: Stores,
        filter_settings: &FilterSettings,
        selector: QuestionSelector,
        generator: RecommendationGenerator,
    ) -> Self {
        Self {
            venues: stores.venues,
            preferences: stores.preferences,
            recommendations: stores.recommendations,
            filter: VenueFilter::from_settings(filter_settings),
            max_distance_m: filter_settings.max_distance_m,
            selector,
            generator,
        }
    }

    pub fn selector(&self) -> &QuestionSelector {
        &self.selector
    }

    /// Pick the next clarifying questions for one participant
    ///
    /// The chosen set is written back as the participant's `lastQuestions`.
    pub async fn next_questions(
        &self,
        group_id: &str,
        session_id: &str,
        time_of_day: Option<TimeOfDay>,
        city: Option<&str>,
    ) -> Result<QuestionSet, EngineError> {
        let preferences = self.load_group(group_id).await?;
        let mut current = preferences
            .iter()
            .find(|p| p.session_id == session_id)
            .cloned()
            .ok_or_else(|| {
                EngineError::NotFound(format!("session {} in group {}", session_id, group_id))
            })?;

        let query = VenueQuery::in_city(city);
        let (profile, venues) = tokio::join!(
            self.load_profile(current.user_id.as_deref()),
            self.venues.find_venues(&query)
        );
        let venues = venues?;

        let filtered = self
            .filter
            .filter(&preferences, profile.as_ref(), venues, self.max_distance_m);

        let stats = group_stats(&preferences);
        let profiles: Vec<UserProfile> = profile.into_iter().collect();
        let summary = preference_summary(&preferences, &profiles, city);
        let answered: BTreeSet<SignalKey> = current.mood_responses.keys().cloned().collect();
        let time_of_day = time_of_day.unwrap_or_else(|| time_bucket(Local::now().hour()));

        let set = self
            .selector
            .select(&QuestionContext {
                stats: &stats,
                summary: &summary,
                answered: &answered,
                time_of_day: Some(time_of_day),
                venues: &filtered.venues,
            })
            .await;

        current.last_questions = set.questions.clone();
        current.updated_at = Some(Utc::now());
        if let Err(e) = self.preferences.save_preference(&current).await {
            tracing::warn!(
                "Failed to record last questions for {}/{}: {}",
                group_id,
                session_id,
                e
            );
        }

        tracing::info!(
            "Selected {} {} questions for {}/{} ({} of {} venues in range)",
            set.questions.len(),
            set.source.as_str(),
            group_id,
            session_id,
            filtered.venues.len(),
            filtered.total_candidates
        );

        Ok(set)
    }

    /// Merge answers into a participant's mood responses
    ///
    /// Values that are not scalars are ignored and the activity level is
    /// clamped to 1-5. Returns every answered signal key.
    pub async fn submit_answers(
        &self,
        group_id: &str,
        session_id: &str,
        answers: &BTreeMap<String, Value>,
        activity_level: Option<u8>,
    ) -> Result<Vec<SignalKey>, EngineError> {
        let mut preference = self
            .preferences
            .get_preference(group_id, session_id)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("session {} in group {}", session_id, group_id))
            })?;

        let submitted = MoodSignals::from(answers.clone());
        if submitted.len() < answers.len() {
            tracing::debug!(
                "Ignored {} non-scalar answers from {}/{}",
                answers.len() - submitted.len(),
                group_id,
                session_id
            );
        }

        preference.mood_responses.merge(submitted);
        if let Some(level) = activity_level {
            preference.activity_level = level.clamp(1, 5);
        }
        preference.updated_at = Some(Utc::now());

        self.preferences.save_preference(&preference).await?;

        Ok(preference.mood_responses.keys().cloned().collect())
    }

    /// Generate and store recommendations for a whole group
    pub async fn recommend(
        &self,
        group_id: &str,
        city: Option<&str>,
    ) -> Result<RecommendationRun, EngineError> {
        let preferences = self.load_group(group_id).await?;

        let query = VenueQuery::in_city(city);
        let (profiles, venues) = tokio::join!(
            self.load_profiles(&preferences),
            self.venues.find_venues(&query)
        );
        let venues: Vec<Venue> = venues?;

        let summary = preference_summary(&preferences, &profiles, city);
        let group_profile = merged_profile(&summary);
        let filtered = self.filter.filter(
            &preferences,
            group_profile.as_ref(),
            venues,
            self.max_distance_m,
        );

        let stats = group_stats(&preferences);
        let mood = aggregate_mood(&preferences);

        let recommendations = self
            .generator
            .generate(&RecommendationContext {
                group_id,
                stats: &stats,
                summary: &summary,
                mood: &mood,
                venues: &filtered.venues,
            })
            .await;

        if !recommendations.is_empty() {
            self.recommendations.append_many(&recommendations).await?;
        }

        tracing::info!(
            "Stored {} recommendations for group {} from {} candidates",
            recommendations.len(),
            group_id,
            filtered.venues.len()
        );

        Ok(RecommendationRun {
            recommendations,
            candidate_count: filtered.venues.len(),
        })
    }

    /// Previously stored recommendations of a group
    pub async fn history(&self, group_id: &str) -> Result<Vec<Recommendation>, EngineError> {
        Ok(self.recommendations.list_for_group(group_id).await?)
    }

    async fn load_group(&self, group_id: &str) -> Result<Vec<ParticipantPreference>, EngineError> {
        let preferences = self.preferences.list_group(group_id).await?;
        if preferences.is_empty() {
            return Err(EngineError::NotFound(format!("group {}", group_id)));
        }
        tracing::debug!("Loaded {} participants for group {}", preferences.len(), group_id);
        Ok(preferences)
    }

    /// Profiles are optional context: lookup failures are logged, not raised
    async fn load_profile(&self, user_id: Option<&str>) -> Option<UserProfile> {
        let user_id = user_id?;
        match self.preferences.get_user_profile(user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!("Failed to load profile for {}: {}", user_id, e);
                None
            }
        }
    }

    async fn load_profiles(&self, preferences: &[ParticipantPreference]) -> Vec<UserProfile> {
        let user_ids: BTreeSet<&str> = preferences
            .iter()
            .filter_map(|p| p.user_id.as_deref())
            .collect();

        let mut profiles = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            if let Some(profile) = self.load_profile(Some(user_id)).await {
                profiles.push(profile);
            }
        }
        profiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_bucket() {
        assert_eq!(time_bucket(6), TimeOfDay::Morning);
        assert_eq!(time_bucket(12), TimeOfDay::Afternoon);
        assert_eq!(time_bucket(21), TimeOfDay::Evening);
        assert_eq!(time_bucket(22), TimeOfDay::Night);
        assert_eq!(time_bucket(4), TimeOfDay::Night);
    }
}
