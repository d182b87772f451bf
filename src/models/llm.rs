use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::domain::QuestionKind;

/// Question set as returned by the LLM service
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestionSet {
    pub questions: Vec<GeneratedQuestion>,
    /// One short line nudging the group towards the next step
    pub follow_up: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
    pub id: String,
    pub prompt: String,
    #[serde(rename = "type")]
    pub question_type: QuestionKind,
    /// Must be one of the signal keys of the supplied themes
    pub signal_key: String,
    /// Exactly three short answer options
    pub options: Vec<String>,
}

/// Recommendation picks as returned by the LLM service
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedRecommendationSet {
    pub recommendations: Vec<GeneratedRecommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedRecommendation {
    /// Id of one of the supplied venues
    pub venue_id: String,
    pub title: String,
    pub description: String,
    pub reasoning: String,
    pub highlights: Vec<String>,
    /// Fit for the group between 0 and 1
    pub match_score: f64,
}
