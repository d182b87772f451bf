use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::signals::{MoodSignals, SignalKey};

/// A WGS84 coordinate pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Location as submitted by a participant. Either coordinate may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticipantLocation {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub label: Option<String>,
}

impl ParticipantLocation {
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            label: None,
        }
    }

    /// Both coordinates, if present and finite
    pub fn point(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                Some(GeoPoint::new(lat, lon))
            }
            _ => None,
        }
    }
}

/// Budget tier a participant is comfortable with
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MoneyPreference {
    Budget,
    #[default]
    Moderate,
    Premium,
}

impl MoneyPreference {
    pub const ALL: [MoneyPreference; 3] = [Self::Budget, Self::Moderate, Self::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::Moderate => "moderate",
            Self::Premium => "premium",
        }
    }

    /// Lenient parse used at the store boundary; unknown tiers become `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "budget" => Some(Self::Budget),
            "moderate" => Some(Self::Moderate),
            "premium" => Some(Self::Premium),
            _ => None,
        }
    }
}

fn default_activity_level() -> u8 {
    3
}

/// One group member's submitted profile and in-session signals
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantPreference {
    pub group_id: String,
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub location: Option<ParticipantLocation>,
    #[serde(default)]
    pub money_preference: MoneyPreference,
    #[serde(default = "default_activity_level")]
    pub activity_level: u8,
    #[serde(default)]
    pub mood_responses: MoodSignals,
    #[serde(default)]
    pub last_questions: Vec<MoodQuestion>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ParticipantPreference {
    pub fn new(group_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            session_id: session_id.into(),
            user_id: None,
            location: None,
            money_preference: MoneyPreference::default(),
            activity_level: default_activity_level(),
            mood_responses: MoodSignals::default(),
            last_questions: Vec::new(),
            updated_at: None,
        }
    }

    pub fn point(&self) -> Option<GeoPoint> {
        self.location.as_ref().and_then(ParticipantLocation::point)
    }
}

/// Stored per-user profile consulted when scoring venues
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub activity_types: Vec<String>,
    #[serde(default)]
    pub cuisine_preferences: Vec<String>,
    #[serde(default)]
    pub preferred_locations: Vec<String>,
}

/// A candidate place, owned by the venue store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(rename = "type")]
    pub venue_type: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub partner_tier: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Venue {
    pub fn is_partner(&self) -> bool {
        self.partner_tier
            .as_deref()
            .map(|tier| !tier.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Venue annotated with its distance to the group and a [0, 1] match score
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredVenue {
    #[serde(flatten)]
    pub venue: Venue,
    pub distance_meters: Option<f64>,
    pub match_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeCategory {
    Preference,
    Factual,
    Constraint,
}

impl ThemeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preference => "preference",
            Self::Factual => "factual",
            Self::Constraint => "constraint",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "morning" => Some(Self::Morning),
            "afternoon" | "midday" | "lunch" => Some(Self::Afternoon),
            "evening" => Some(Self::Evening),
            "night" | "late" | "late night" => Some(Self::Night),
            _ => None,
        }
    }

    /// Bucket a local hour (0-23)
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=21 => Self::Evening,
            _ => Self::Night,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

/// A predefined question topic, independent of concrete phrasing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTheme {
    pub id: &'static str,
    pub category: ThemeCategory,
    pub prompt: &'static str,
    pub signal_key: SignalKey,
    #[serde(skip)]
    pub time_relevance: &'static [TimeOfDay],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Scale,
    Choice,
}

/// A concrete clarifying question shown to a participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodQuestion {
    pub id: String,
    pub prompt: String,
    #[serde(rename = "type")]
    pub question_type: QuestionKind,
    pub signal_key: SignalKey,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationSource {
    Llm,
    Fallback,
}

impl GenerationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Fallback => "fallback",
        }
    }
}

/// The unit the question selector returns and caches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSet {
    pub questions: Vec<MoodQuestion>,
    pub follow_up: Option<String>,
    pub source: GenerationSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyLabel {
    Low,
    Medium,
    High,
}

impl EnergyLabel {
    pub fn from_activity_level(avg: f64) -> Self {
        if avg < 2.5 {
            Self::Low
        } else if avg < 3.5 {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Aggregate view of a group, derived per request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub participant_count: usize,
    pub avg_activity_level: f64,
    pub popular_money_preference: MoneyPreference,
    pub money_preference_counts: BTreeMap<MoneyPreference, usize>,
    pub energy_label: EnergyLabel,
}

/// Lightweight preference digest handed to the LLM and templating code
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceSummary {
    pub activity_types: Vec<String>,
    pub cuisine_preferences: Vec<String>,
    pub preferred_locations: Vec<String>,
    pub located_participants: usize,
    pub city: Option<String>,
}

/// An accepted recommendation. Records are append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: Uuid,
    pub group_id: String,
    pub venue_id: String,
    pub match_score: f64,
    pub title: String,
    pub description: String,
    pub reasoning: String,
    pub highlights: Vec<String>,
    pub source: GenerationSource,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_location_has_no_point() {
        let location = ParticipantLocation {
            latitude: Some(60.17),
            longitude: None,
            label: None,
        };
        assert!(location.point().is_none());
        assert!(ParticipantLocation::at(f64::NAN, 24.8).point().is_none());
        assert_eq!(
            ParticipantLocation::at(60.17, 24.82).point(),
            Some(GeoPoint::new(60.17, 24.82))
        );
    }

    #[test]
    fn test_energy_label_thresholds() {
        assert_eq!(EnergyLabel::from_activity_level(1.0), EnergyLabel::Low);
        assert_eq!(EnergyLabel::from_activity_level(2.5), EnergyLabel::Medium);
        assert_eq!(EnergyLabel::from_activity_level(4.2), EnergyLabel::High);
    }

    #[test]
    fn test_time_of_day_buckets() {
        assert_eq!(TimeOfDay::from_hour(8), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(13), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(19), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(2), TimeOfDay::Night);
        assert_eq!(TimeOfDay::parse(" Evening "), Some(TimeOfDay::Evening));
        assert_eq!(TimeOfDay::parse("whenever"), None);
    }

    #[test]
    fn test_venue_partner_flag() {
        let mut venue: Venue = serde_json::from_value(serde_json::json!({
            "id": "v1",
            "slug": "v1",
            "name": "Venue",
            "type": "bar"
        }))
        .unwrap();
        assert!(!venue.is_partner());
        venue.partner_tier = Some("gold".to_string());
        assert!(venue.is_partner());
        venue.partner_tier = Some("  ".to_string());
        assert!(!venue.is_partner());
    }
}
