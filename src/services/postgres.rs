use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;

use crate::models::{
    GenerationSource, GeoPoint, MoneyPreference, MoodQuestion, MoodSignals, ParticipantLocation,
    ParticipantPreference, Recommendation, UserProfile, Venue,
};
use crate::services::store::{
    PreferenceStore, RecommendationStore, StoreError, VenueQuery, VenueStore,
};

/// PostgreSQL-backed store
///
/// Works against pre-existing `venues`, `participant_preferences`,
/// `user_profiles` and `recommendations` tables; this crate never creates
/// or migrates them.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new store from a connection string
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        tracing::info!("Connected to PostgreSQL (max: {} connections)", max_connections);

        Ok(Self { pool })
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

fn venue_from_row(row: &PgRow) -> Result<Venue, StoreError> {
    let latitude: Option<f64> = row.try_get("latitude")?;
    let longitude: Option<f64> = row.try_get("longitude")?;
    let location = match (latitude, longitude) {
        (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
        _ => None,
    };

    Ok(Venue {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        name: row.try_get("name")?,
        venue_type: row.try_get("type")?,
        address: row.try_get::<Option<String>, _>("address")?.unwrap_or_default(),
        city: row.try_get("city")?,
        location,
        description: row.try_get("description")?,
        partner_tier: row.try_get("partner_tier")?,
        tags: row.try_get::<Option<Vec<String>>, _>("tags")?.unwrap_or_default(),
    })
}

/// Malformed JSON columns degrade to empty values
fn preference_from_row(row: &PgRow) -> Result<ParticipantPreference, StoreError> {
    let latitude: Option<f64> = row.try_get("latitude")?;
    let longitude: Option<f64> = row.try_get("longitude")?;
    let label: Option<String> = row.try_get("location_label")?;
    let location = (latitude.is_some() || longitude.is_some() || label.is_some()).then(|| {
        ParticipantLocation {
            latitude,
            longitude,
            label,
        }
    });

    let money: Option<String> = row.try_get("money_preference")?;
    let activity_level: Option<i32> = row.try_get("activity_level")?;
    let mood: Option<Value> = row.try_get("mood_responses")?;
    let last_questions: Option<Value> = row.try_get("last_questions")?;

    let last_questions = last_questions
        .and_then(|v| serde_json::from_value::<Vec<MoodQuestion>>(v).ok())
        .unwrap_or_default();

    Ok(ParticipantPreference {
        group_id: row.try_get("group_id")?,
        session_id: row.try_get("session_id")?,
        user_id: row.try_get("user_id")?,
        location,
        money_preference: money
            .as_deref()
            .and_then(MoneyPreference::parse)
            .unwrap_or_default(),
        activity_level: activity_level.unwrap_or(3).clamp(1, 5) as u8,
        mood_responses: mood.as_ref().map(MoodSignals::from_json).unwrap_or_default(),
        last_questions,
        updated_at: row.try_get::<Option<DateTime<Utc>>, _>("updated_at")?,
    })
}

fn recommendation_from_row(row: &PgRow) -> Result<Recommendation, StoreError> {
    let source: String = row.try_get("source")?;

    Ok(Recommendation {
        id: row.try_get("id")?,
        group_id: row.try_get("group_id")?,
        venue_id: row.try_get("venue_id")?,
        match_score: row.try_get("match_score")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        reasoning: row.try_get("reasoning")?,
        highlights: row.try_get::<Option<Vec<String>>, _>("highlights")?.unwrap_or_default(),
        source: if source == "llm" {
            GenerationSource::Llm
        } else {
            GenerationSource::Fallback
        },
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl VenueStore for PostgresStore {
    async fn find_venues(&self, query: &VenueQuery) -> Result<Vec<Venue>, StoreError> {
        let sql = r#"
            SELECT id, slug, name, type, address, city, latitude, longitude,
                   description, partner_tier, tags
            FROM venues
            WHERE ($1::text IS NULL OR LOWER(TRIM(city)) = LOWER(TRIM($1)))
              AND ($2::text[] IS NULL OR id = ANY($2))
        "#;

        let rows = sqlx::query(sql)
            .bind(query.city.as_deref())
            .bind(query.ids.as_deref())
            .fetch_all(&self.pool)
            .await?;

        let venues = rows.iter().map(venue_from_row).collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("Loaded {} venues (city: {:?})", venues.len(), query.city);

        Ok(venues)
    }
}

#[async_trait]
impl PreferenceStore for PostgresStore {
    async fn list_group(&self, group_id: &str) -> Result<Vec<ParticipantPreference>, StoreError> {
        let sql = r#"
            SELECT group_id, session_id, user_id, latitude, longitude, location_label,
                   money_preference, activity_level, mood_responses, last_questions, updated_at
            FROM participant_preferences
            WHERE group_id = $1
            ORDER BY session_id
        "#;

        let rows = sqlx::query(sql).bind(group_id).fetch_all(&self.pool).await?;

        rows.iter().map(preference_from_row).collect()
    }

    async fn get_preference(
        &self,
        group_id: &str,
        session_id: &str,
    ) -> Result<Option<ParticipantPreference>, StoreError> {
        let sql = r#"
            SELECT group_id, session_id, user_id, latitude, longitude, location_label,
                   money_preference, activity_level, mood_responses, last_questions, updated_at
            FROM participant_preferences
            WHERE group_id = $1 AND session_id = $2
        "#;

        let row = sqlx::query(sql)
            .bind(group_id)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(preference_from_row).transpose()
    }

    /// Uses INSERT ... ON CONFLICT so a participant keeps a single row
    async fn save_preference(&self, preference: &ParticipantPreference) -> Result<(), StoreError> {
        let sql = r#"
            INSERT INTO participant_preferences (
                group_id, session_id, user_id, latitude, longitude, location_label,
                money_preference, activity_level, mood_responses, last_questions, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
            ON CONFLICT (group_id, session_id)
            DO UPDATE SET
                user_id = EXCLUDED.user_id,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                location_label = EXCLUDED.location_label,
                money_preference = EXCLUDED.money_preference,
                activity_level = EXCLUDED.activity_level,
                mood_responses = EXCLUDED.mood_responses,
                last_questions = EXCLUDED.last_questions,
                updated_at = EXCLUDED.updated_at
        "#;

        let location = preference.location.clone().unwrap_or_default();
        let last_questions = serde_json::to_value(&preference.last_questions)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;

        sqlx::query(sql)
            .bind(&preference.group_id)
            .bind(&preference.session_id)
            .bind(&preference.user_id)
            .bind(location.latitude)
            .bind(location.longitude)
            .bind(&location.label)
            .bind(preference.money_preference.as_str())
            .bind(preference.activity_level as i32)
            .bind(preference.mood_responses.to_json())
            .bind(last_questions)
            .execute(&self.pool)
            .await?;

        tracing::debug!(
            "Saved preference for {}/{}",
            preference.group_id,
            preference.session_id
        );

        Ok(())
    }

    async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let sql = r#"
            SELECT user_id, activity_types, cuisine_preferences, preferred_locations
            FROM user_profiles
            WHERE user_id = $1
        "#;

        let row = sqlx::query(sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(UserProfile {
            user_id: row.try_get("user_id")?,
            activity_types: row.try_get::<Option<Vec<String>>, _>("activity_types")?.unwrap_or_default(),
            cuisine_preferences: row
                .try_get::<Option<Vec<String>>, _>("cuisine_preferences")?
                .unwrap_or_default(),
            preferred_locations: row
                .try_get::<Option<Vec<String>>, _>("preferred_locations")?
                .unwrap_or_default(),
        }))
    }
}

#[async_trait]
impl RecommendationStore for PostgresStore {
    async fn append_many(&self, records: &[Recommendation]) -> Result<(), StoreError> {
        let sql = r#"
            INSERT INTO recommendations (
                id, group_id, venue_id, match_score, title, description,
                reasoning, highlights, source, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#;

        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(sql)
                .bind(record.id)
                .bind(&record.group_id)
                .bind(&record.venue_id)
                .bind(record.match_score)
                .bind(&record.title)
                .bind(&record.description)
                .bind(&record.reasoning)
                .bind(&record.highlights)
                .bind(record.source.as_str())
                .bind(record.created_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn list_for_group(&self, group_id: &str) -> Result<Vec<Recommendation>, StoreError> {
        let sql = r#"
            SELECT id, group_id, venue_id, match_score, title, description,
                   reasoning, highlights, source, created_at
            FROM recommendations
            WHERE group_id = $1
            ORDER BY created_at
        "#;

        let rows = sqlx::query(sql).bind(group_id).fetch_all(&self.pool).await?;

        rows.iter().map(recommendation_from_row).collect()
    }
}
