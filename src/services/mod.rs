// Service exports
pub mod cache;
pub mod llm;
pub mod postgres;
pub mod store;

pub use cache::{CacheService, QuestionCacheKey, TtlCache};
pub use llm::{generate_structured, LlmClient, LlmError, OpenAiClient, StructuredRequest};
pub use postgres::PostgresStore;
pub use store::{
    MemoryStore, PreferenceStore, RecommendationStore, SeedData, StoreError, Stores, VenueQuery,
    VenueStore,
};
