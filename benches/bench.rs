// Criterion benchmarks for the outing engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use outing_engine::core::{
    distance::{calculate_bounding_box, haversine_distance},
    filters::VenueFilter,
    schema::{sanitize_schema, schema_for},
};
use outing_engine::models::{
    GeneratedRecommendationSet, GeoPoint, ParticipantLocation, ParticipantPreference,
    UserProfile, Venue,
};
use serde_json::json;

fn create_venue(id: usize, lat: f64, lon: f64) -> Venue {
    Venue {
        id: id.to_string(),
        slug: format!("venue-{}", id),
        name: format!("Venue {}", id),
        venue_type: ["bar", "restaurant", "bowling", "park"][id % 4].to_string(),
        address: "Helsinki".to_string(),
        city: Some("Helsinki".to_string()),
        location: Some(GeoPoint::new(lat, lon)),
        description: Some("Thai food and board games".to_string()),
        partner_tier: (id % 5 == 0).then(|| "standard".to_string()),
        tags: vec![],
    }
}

fn create_group() -> Vec<ParticipantPreference> {
    (0..4)
        .map(|i| {
            let mut pref = ParticipantPreference::new("group", format!("s{}", i));
            pref.location = Some(ParticipantLocation::at(
                60.1699 + i as f64 * 0.002,
                24.9384,
            ));
            pref
        })
        .collect()
}

fn create_profile() -> UserProfile {
    UserProfile {
        user_id: "u1".to_string(),
        activity_types: vec!["bowling".to_string()],
        cuisine_preferences: vec!["thai".to_string()],
        preferred_locations: vec!["helsinki".to_string()],
    }
}

fn bench_haversine_distance(c: &mut Criterion) {
    c.bench_function("haversine_distance", |b| {
        b.iter(|| {
            haversine_distance(
                black_box(60.1699),
                black_box(24.9384),
                black_box(60.2055),
                black_box(24.6559),
            )
        });
    });
}

fn bench_bounding_box(c: &mut Criterion) {
    c.bench_function("bounding_box_calculation", |b| {
        b.iter(|| {
            calculate_bounding_box(
                black_box(60.1699),
                black_box(24.9384),
                black_box(10_000.0),
            )
        });
    });
}

fn bench_venue_filter(c: &mut Criterion) {
    let filter = VenueFilter::with_default_weights();
    let group = create_group();
    let profile = create_profile();

    let mut bench_group = c.benchmark_group("venue_filter");

    for venue_count in [10, 100, 500, 1000].iter() {
        let venues: Vec<Venue> = (0..*venue_count)
            .map(|i| {
                let offset = (i as f64 * 0.0007) % 0.2;
                create_venue(i, 60.1699 + offset, 24.9384 - offset)
            })
            .collect();

        bench_group.bench_with_input(
            BenchmarkId::new("filter", venue_count),
            venue_count,
            |b, _| {
                b.iter(|| {
                    filter.filter(
                        black_box(&group),
                        black_box(Some(&profile)),
                        black_box(venues.clone()),
                        black_box(10_000.0),
                    )
                });
            },
        );
    }

    bench_group.finish();
}

fn bench_schema_sanitizer(c: &mut Criterion) {
    let handwritten = json!({
        "$ref": "#/definitions/Root",
        "definitions": {
            "Root": {
                "type": "object",
                "properties": {
                    "items": { "type": "array", "items": { "$ref": "#/definitions/Item" } },
                    "link": { "type": "string", "format": "uri" }
                }
            },
            "Item": {
                "properties": {
                    "name": { "type": "string" },
                    "child": { "$ref": "#/definitions/Item" }
                }
            }
        }
    });

    c.bench_function("sanitize_handwritten_schema", |b| {
        b.iter(|| sanitize_schema(black_box(&handwritten)))
    });

    c.bench_function("schema_for_recommendations", |b| {
        b.iter(schema_for::<GeneratedRecommendationSet>)
    });
}

criterion_group!(
    benches,
    bench_haversine_distance,
    bench_bounding_box,
    bench_venue_filter,
    bench_schema_sanitizer
);

criterion_main!(benches);
