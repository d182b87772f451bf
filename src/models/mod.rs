// Model exports
pub mod domain;
pub mod llm;
pub mod requests;
pub mod responses;
pub mod signals;

pub use domain::{
    EnergyLabel, FilteredVenue, GenerationSource, GeoPoint, GroupStats, MoneyPreference,
    MoodQuestion, ParticipantLocation, ParticipantPreference, PreferenceSummary, QuestionKind,
    QuestionSet, QuestionTheme, Recommendation, ThemeCategory, TimeOfDay, UserProfile, Venue,
};
pub use llm::{GeneratedQuestion, GeneratedQuestionSet, GeneratedRecommendation, GeneratedRecommendationSet};
pub use requests::{NextQuestionsRequest, RecommendRequest, SubmitAnswersRequest};
pub use responses::{AnswersResponse, ErrorResponse, HealthResponse, QuestionsResponse, RecommendationsResponse};
pub use signals::{MoodSignals, SignalKey, SignalValue};
