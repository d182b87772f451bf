use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use validator::Validate;

/// Request the next clarifying questions for a participant
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NextQuestionsRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "session_id")]
    pub session_id: String,
    #[serde(default, alias = "time_of_day")]
    pub time_of_day: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// Submit answers to previously generated questions
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswersRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "session_id")]
    pub session_id: String,
    #[serde(default)]
    pub answers: BTreeMap<String, Value>,
    #[validate(range(min = 1, max = 5))]
    #[serde(default, alias = "activity_level")]
    pub activity_level: Option<u8>,
}

/// Generate recommendations for a whole group
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecommendRequest {
    #[serde(default)]
    pub city: Option<String>,
}
