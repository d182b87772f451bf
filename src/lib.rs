//! Outing Engine - group venue matching and adaptive questions
//!
//! Filters venues for a group of participants, asks a few well-chosen
//! clarifying questions and turns everything into ranked recommendations,
//! with a deterministic fallback wherever the LLM service is involved.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{
    distance::{calculate_bounding_box, haversine_distance},
    VenueFilter,
};
pub use error::EngineError;
pub use models::{FilteredVenue, MoodQuestion, ParticipantPreference, QuestionSet, Recommendation, Venue};
pub use pipeline::Engine;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let bbox = calculate_bounding_box(60.17, 24.82, 10_000.0);
        assert!(bbox.min_lat < 60.17 && bbox.max_lat > 60.17);
        assert_eq!(haversine_distance(60.17, 24.82, 60.17, 24.82), 0.0);
    }
}
