// Unit tests for the outing engine core

use outing_engine::core::{
    distance::{calculate_bounding_box, haversine_distance, is_within_bounding_box},
    filters::VenueFilter,
    schema::sanitize_schema,
    themes::normalize_options,
};
use outing_engine::models::{
    GeoPoint, MoodSignals, ParticipantLocation, ParticipantPreference, QuestionKind, SignalKey,
    SignalValue, TimeOfDay, UserProfile, Venue,
};
use outing_engine::pipeline::group_stats;
use serde_json::json;

fn create_venue(id: &str, venue_type: &str, lat: f64, lon: f64) -> Venue {
    Venue {
        id: id.to_string(),
        slug: id.to_string(),
        name: format!("Venue {}", id),
        venue_type: venue_type.to_string(),
        address: "Mannerheimintie 1".to_string(),
        city: Some("Helsinki".to_string()),
        location: Some(GeoPoint::new(lat, lon)),
        description: None,
        partner_tier: None,
        tags: vec![],
    }
}

fn create_participant(session: &str, lat: f64, lon: f64) -> ParticipantPreference {
    let mut pref = ParticipantPreference::new("group", session);
    pref.location = Some(ParticipantLocation::at(lat, lon));
    pref
}

#[test]
fn test_haversine_distance_zero() {
    let distance = haversine_distance(60.1699, 24.9384, 60.1699, 24.9384);
    assert!(distance < 0.01);
}

#[test]
fn test_haversine_distance_is_symmetric() {
    let there = haversine_distance(60.1699, 24.9384, 59.4370, 24.7536);
    let back = haversine_distance(59.4370, 24.7536, 60.1699, 24.9384);

    // Helsinki to Tallinn is roughly 82 km
    assert!((there - back).abs() < 1e-6);
    assert!(there > 75_000.0 && there < 90_000.0, "got {}", there);
}

#[test]
fn test_bounding_box_contains_center() {
    let bbox = calculate_bounding_box(60.1699, 24.9384, 10_000.0);

    assert!(is_within_bounding_box(60.1699, 24.9384, &bbox));
    assert!(!is_within_bounding_box(61.0, 24.9384, &bbox));

    // 10 km is roughly 0.09 degrees of latitude each way
    let lat_span = bbox.max_lat - bbox.min_lat;
    assert!((lat_span - 0.18).abs() < 0.02);
}

#[test]
fn test_filter_keeps_near_and_drops_far() {
    let filter = VenueFilter::with_default_weights();
    let participants = vec![
        create_participant("a", 60.17, 24.94),
        create_participant("b", 60.17, 24.94),
    ];
    // ~500 m and ~15 km north of the group
    let venues = vec![
        create_venue("near", "bar", 60.1745, 24.94),
        create_venue("far", "bar", 60.305, 24.94),
    ];

    let result = filter.filter(&participants, None, venues, 10_000.0);

    assert_eq!(result.total_candidates, 2);
    assert_eq!(result.venues.len(), 1);
    assert_eq!(result.venues[0].venue.id, "near");
}

#[test]
fn test_profile_interests_raise_score() {
    let filter = VenueFilter::with_default_weights();
    let participants = vec![create_participant("a", 60.17, 24.94)];
    let profile = UserProfile {
        user_id: "u1".to_string(),
        activity_types: vec!["Bowling".to_string()],
        ..Default::default()
    };
    let venues = vec![
        create_venue("bowl", "bowling", 60.171, 24.94),
        create_venue("cafe", "cafe", 60.171, 24.94),
    ];

    let result = filter.filter(&participants, Some(&profile), venues, 10_000.0);

    assert_eq!(result.venues.len(), 2);
    assert_eq!(result.venues[0].venue.id, "bowl");
    assert!(result.venues[0].match_score > result.venues[1].match_score);
    for venue in &result.venues {
        assert!(venue.match_score >= 0.0 && venue.match_score <= 1.0);
    }
}

#[test]
fn test_sanitizer_inlines_pure_ref_root() {
    let schema = json!({
        "$ref": "#/definitions/Pick",
        "definitions": {
            "Pick": {
                "type": "object",
                "properties": {
                    "venueId": { "type": "string" },
                    "link": { "type": "string", "format": "uri" }
                }
            }
        }
    });

    let sanitized = sanitize_schema(&schema);

    assert_eq!(sanitized["type"], "object");
    assert_eq!(sanitized["additionalProperties"], false);
    assert!(sanitized.get("definitions").is_none());
    assert!(sanitized.get("$ref").is_none());
    assert!(sanitized["properties"]["link"].get("format").is_none());

    let required = sanitized["required"].as_array().unwrap();
    assert_eq!(required.len(), 2);
}

#[test]
fn test_normalize_options_pads_and_dedupes() {
    let options = vec![
        " \"Chill\" ".to_string(),
        "chill".to_string(),
        String::new(),
    ];

    let normalized = normalize_options(QuestionKind::Scale, &options);

    assert_eq!(normalized, vec!["Chill", "Low", "Medium"]);
}

#[test]
fn test_normalize_options_truncates_to_three() {
    let options: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
    assert_eq!(normalize_options(QuestionKind::Choice, &options), vec!["A", "B", "C"]);
}

#[test]
fn test_mood_signals_drop_non_scalars() {
    let signals = MoodSignals::from_json(&json!({
        "energyLevel": 4,
        "atmosphere": " outdoor ",
        "dietary": null,
        "novelty": { "nested": true },
        "hunger": [1, 2]
    }));

    assert_eq!(signals.len(), 2);
    assert_eq!(signals.get(&SignalKey::EnergyLevel), Some(&SignalValue::Number(4.0)));
    assert_eq!(
        signals.get(&SignalKey::Atmosphere),
        Some(&SignalValue::Text("outdoor".to_string()))
    );
}

#[test]
fn test_time_of_day_labels() {
    assert_eq!(TimeOfDay::parse("Late Night"), Some(TimeOfDay::Night));
    assert_eq!(TimeOfDay::parse("brunch"), None);
    assert_eq!(TimeOfDay::from_hour(18), TimeOfDay::Evening);
}

#[test]
fn test_group_stats_empty_group() {
    let stats = group_stats(&[]);
    assert_eq!(stats.participant_count, 0);
    assert_eq!(stats.avg_activity_level, 3.0);
}

#[test]
fn test_memory_store_city_lookup() {
    use outing_engine::services::{MemoryStore, SeedData, VenueQuery, VenueStore};

    let store = MemoryStore::from_seed(SeedData {
        venues: vec![
            create_venue("a", "bar", 60.17, 24.94),
            create_venue("b", "cafe", 60.18, 24.95),
        ],
        ..Default::default()
    });

    let found = tokio_test::block_on(store.find_venues(&VenueQuery::in_city(Some(" helsinki ")))).unwrap();
    assert_eq!(found.len(), 2);

    let none = tokio_test::block_on(store.find_venues(&VenueQuery::in_city(Some("Turku")))).unwrap();
    assert!(none.is_empty());
}
