// Pipeline stages built on the core algorithms and services
pub mod engine;
pub mod questions;
pub mod recommendations;
pub mod stats;

pub use engine::{time_bucket, Engine, RecommendationRun};
pub use questions::{QuestionContext, QuestionSelector};
pub use recommendations::{RecommendationContext, RecommendationGenerator};
pub use stats::{aggregate_mood, group_stats, preference_summary};
