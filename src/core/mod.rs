// Core algorithm exports
pub mod distance;
pub mod filters;
pub mod schema;
pub mod scoring;
pub mod themes;

pub use distance::{
    calculate_bounding_box, group_centroid, haversine_distance, is_within_bounding_box,
    BoundingBox,
};
pub use filters::{rank_with_tie_band, FilterResult, VenueFilter};
pub use schema::{sanitize_schema, schema_for};
pub use scoring::{calculate_match_score, FilterWeights};
pub use themes::{DifferentiatingFactor, VenueSignals, THEME_CATALOG};
