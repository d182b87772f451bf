use std::cmp::Ordering;

use crate::config::{DistanceReference, FilterSettings};
use crate::core::{
    distance::{
        calculate_bounding_box, distance_between, group_centroid, is_within_bounding_box,
        nearest_distance,
    },
    scoring::{calculate_match_score, FilterWeights},
};
use crate::models::{FilteredVenue, GeoPoint, ParticipantPreference, UserProfile, Venue};

/// Result of the filtering process
#[derive(Debug)]
pub struct FilterResult {
    pub venues: Vec<FilteredVenue>,
    pub total_candidates: usize,
}

/// Where venue distances are measured from
#[derive(Debug, Clone, PartialEq)]
enum Reference {
    Centroid(GeoPoint),
    Nearest(Vec<GeoPoint>),
    Unknown,
}

impl Reference {
    fn distance_to(&self, target: &GeoPoint) -> Option<f64> {
        match self {
            Self::Centroid(center) => Some(distance_between(center, target)),
            Self::Nearest(points) => nearest_distance(points, target),
            Self::Unknown => None,
        }
    }
}

/// Geo + preference filter over a venue pool
///
/// # Pipeline Stages
/// 1. Reference point from located participants
/// 2. Coordinate and distance cap filtering
/// 3. Preference scoring
/// 4. Ranking with a tie band, then truncation
#[derive(Debug, Clone)]
pub struct VenueFilter {
    weights: FilterWeights,
    tie_band: f64,
    max_results: usize,
    reference: DistanceReference,
}

impl VenueFilter {
    pub fn new(weights: FilterWeights, tie_band: f64, max_results: usize) -> Self {
        Self {
            weights,
            tie_band,
            max_results,
            reference: DistanceReference::Centroid,
        }
    }

    pub fn from_settings(settings: &FilterSettings) -> Self {
        Self {
            weights: FilterWeights::from(&settings.weights),
            tie_band: settings.tie_band,
            max_results: settings.max_results,
            reference: settings.reference,
        }
    }

    pub fn with_default_weights() -> Self {
        Self::new(FilterWeights::default(), 0.05, 50)
    }

    pub fn with_reference(mut self, reference: DistanceReference) -> Self {
        self.reference = reference;
        self
    }

    pub fn weights(&self) -> &FilterWeights {
        &self.weights
    }

    /// Filter and rank venues for a group
    ///
    /// # Arguments
    /// * `preferences` - Current preferences of every participant
    /// * `profile` - Stored profile of the requesting user, if any
    /// * `venues` - Candidate venues from the venue store
    /// * `max_distance_m` - Distance cap in meters
    ///
    /// # Returns
    /// FilterResult with at most `max_results` venues, best first
    pub fn filter(
        &self,
        preferences: &[ParticipantPreference],
        profile: Option<&UserProfile>,
        venues: Vec<Venue>,
        max_distance_m: f64,
    ) -> FilterResult {
        let total_candidates = venues.len();
        let reference = self.reference_for(preferences);

        let bbox = match &reference {
            Reference::Centroid(center) => Some(calculate_bounding_box(
                center.latitude,
                center.longitude,
                max_distance_m,
            )),
            _ => None,
        };

        let mut filtered: Vec<FilteredVenue> = venues
            .into_iter()
            .filter_map(|venue| {
                let point = venue.location?;
                if !point.latitude.is_finite() || !point.longitude.is_finite() {
                    return None;
                }

                // Cheap rejection before haversine
                if let Some(bbox) = &bbox {
                    if !is_within_bounding_box(point.latitude, point.longitude, bbox) {
                        return None;
                    }
                }

                let distance_meters = reference.distance_to(&point);
                if distance_meters.is_some_and(|d| !d.is_finite() || d > max_distance_m) {
                    return None;
                }

                let match_score = calculate_match_score(
                    &venue,
                    profile,
                    distance_meters,
                    max_distance_m,
                    &self.weights,
                );

                Some(FilteredVenue {
                    venue,
                    distance_meters,
                    match_score,
                })
            })
            .collect();

        rank_with_tie_band(&mut filtered, self.tie_band);
        filtered.truncate(self.max_results);

        tracing::debug!(
            "Filtered {} of {} venues (reference: {:?})",
            filtered.len(),
            total_candidates,
            self.reference
        );

        FilterResult {
            venues: filtered,
            total_candidates,
        }
    }

    fn reference_for(&self, preferences: &[ParticipantPreference]) -> Reference {
        let located: Vec<GeoPoint> = preferences
            .iter()
            .filter_map(ParticipantPreference::point)
            .collect();

        if located.is_empty() {
            return Reference::Unknown;
        }

        match self.reference {
            DistanceReference::Centroid => group_centroid(&located)
                .map(Reference::Centroid)
                .unwrap_or(Reference::Nearest(located)),
            DistanceReference::Nearest => Reference::Nearest(located),
        }
    }
}

impl Default for VenueFilter {
    fn default() -> Self {
        Self::with_default_weights()
    }
}

/// Compare two venues: higher score first, but scores within `band` count as
/// a tie broken by ascending distance, unknown distance last
fn compare_with_tie_band(a: &FilteredVenue, b: &FilteredVenue, band: f64) -> Ordering {
    if (a.match_score - b.match_score).abs() <= band {
        return match (a.distance_meters, b.distance_meters) {
            (Some(da), Some(db)) => da.total_cmp(&db),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
    }
    b.match_score.total_cmp(&a.match_score)
}

/// Rank venues best first
///
/// The tie band makes the comparator non-transitive, which `sort_by` does not
/// allow, so a score-ordered list is refined with a stable insertion pass.
pub fn rank_with_tie_band(venues: &mut [FilteredVenue], band: f64) {
    venues.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));

    for i in 1..venues.len() {
        let mut j = i;
        while j > 0 && compare_with_tie_band(&venues[j - 1], &venues[j], band) == Ordering::Greater {
            venues.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParticipantLocation;

    fn create_venue(id: &str, lat: f64, lon: f64, partner: bool) -> Venue {
        Venue {
            id: id.to_string(),
            slug: id.to_string(),
            name: format!("Venue {}", id),
            venue_type: "restaurant".to_string(),
            address: "Otaniementie 1".to_string(),
            city: Some("Espoo".to_string()),
            location: Some(GeoPoint::new(lat, lon)),
            description: Some("Cozy place".to_string()),
            partner_tier: partner.then(|| "standard".to_string()),
            tags: vec![],
        }
    }

    fn create_participant(session: &str, lat: f64, lon: f64) -> ParticipantPreference {
        let mut pref = ParticipantPreference::new("group", session);
        pref.location = Some(ParticipantLocation::at(lat, lon));
        pref
    }

    fn scored(id: &str, score: f64, distance: Option<f64>) -> FilteredVenue {
        FilteredVenue {
            venue: create_venue(id, 0.0, 0.0, false),
            distance_meters: distance,
            match_score: score,
        }
    }

    #[test]
    fn test_near_partner_kept_far_excluded() {
        let filter = VenueFilter::with_default_weights();
        let participants = vec![
            create_participant("a", 60.17, 24.82),
            create_participant("b", 60.18, 24.83),
        ];
        // Centroid is (60.175, 24.825); 0.0045° latitude ≈ 500 m, 0.135° ≈ 15 km
        let venues = vec![
            create_venue("near", 60.1795, 24.825, true),
            create_venue("far", 60.31, 24.825, false),
        ];

        let result = filter.filter(&participants, None, venues, 10_000.0);

        assert_eq!(result.total_candidates, 2);
        assert_eq!(result.venues.len(), 1);
        assert_eq!(result.venues[0].venue.id, "near");
        let distance = result.venues[0].distance_meters.unwrap();
        assert!((distance - 500.0).abs() < 25.0, "got {}", distance);
    }

    #[test]
    fn test_venues_without_coordinates_skipped() {
        let filter = VenueFilter::with_default_weights();
        let mut venue = create_venue("nowhere", 0.0, 0.0, false);
        venue.location = None;

        let result = filter.filter(&[], None, vec![venue], 10_000.0);
        assert!(result.venues.is_empty());
    }

    #[test]
    fn test_no_located_participants_skips_distance() {
        let filter = VenueFilter::with_default_weights();
        let participants = vec![ParticipantPreference::new("group", "a")];
        let venues = vec![create_venue("v", 10.0, 10.0, false)];

        let result = filter.filter(&participants, None, venues, 1.0);
        assert_eq!(result.venues.len(), 1);
        assert!(result.venues[0].distance_meters.is_none());
        assert_eq!(result.venues[0].match_score, 0.5);
    }

    #[test]
    fn test_nearest_reference() {
        let filter = VenueFilter::with_default_weights().with_reference(DistanceReference::Nearest);
        // Participants 100 km apart: the centroid is ~50 km from both
        let participants = vec![
            create_participant("a", 60.0, 24.0),
            create_participant("b", 60.9, 24.0),
        ];
        let venues = vec![create_venue("v", 60.001, 24.0, false)];

        let result = filter.filter(&participants, None, venues.clone(), 5_000.0);
        assert_eq!(result.venues.len(), 1);

        let centroid = VenueFilter::with_default_weights().filter(&participants, None, venues, 5_000.0);
        assert!(centroid.venues.is_empty());
    }

    #[test]
    fn test_tie_band_prefers_closer() {
        let mut venues = vec![
            scored("high_far", 0.80, Some(5_000.0)),
            scored("low_near", 0.77, Some(100.0)),
            scored("clear_loser", 0.60, Some(10.0)),
        ];

        rank_with_tie_band(&mut venues, 0.05);

        let ids: Vec<&str> = venues.iter().map(|v| v.venue.id.as_str()).collect();
        assert_eq!(ids, vec!["low_near", "high_far", "clear_loser"]);
    }

    #[test]
    fn test_tie_band_unknown_distance_last() {
        let mut venues = vec![
            scored("unknown", 0.70, None),
            scored("known", 0.68, Some(9_000.0)),
        ];

        rank_with_tie_band(&mut venues, 0.05);
        assert_eq!(venues[0].venue.id, "known");
    }

    #[test]
    fn test_truncates_to_max_results() {
        let filter = VenueFilter::new(FilterWeights::default(), 0.05, 50);
        let participants = vec![create_participant("a", 60.17, 24.82)];
        let venues: Vec<Venue> = (0..80)
            .map(|i| create_venue(&i.to_string(), 60.17 + i as f64 * 0.0001, 24.82, i % 2 == 0))
            .collect();

        let result = filter.filter(&participants, None, venues, 10_000.0);

        assert_eq!(result.venues.len(), 50);
        for v in &result.venues {
            assert!(v.match_score >= 0.0 && v.match_score <= 1.0);
            assert!(v.distance_meters.unwrap() <= 10_000.0);
        }
    }

    #[test]
    fn test_antipodal_venue_rejected_with_nearest_reference() {
        let filter = VenueFilter::with_default_weights().with_reference(DistanceReference::Nearest);
        let participants = vec![create_participant("a", -87.4, 10.0)];
        let venues = vec![create_venue("anti", 87.4, -170.0, false)];

        let result = filter.filter(&participants, None, venues, 10_000.0);
        assert!(result.venues.is_empty());
    }

    #[test]
    fn test_venue_across_antimeridian_kept() {
        let participants = vec![create_participant("a", -17.0, 179.99)];
        let venues = vec![create_venue("fiji", -17.0, -179.99, false)];

        for reference in [DistanceReference::Centroid, DistanceReference::Nearest] {
            let filter = VenueFilter::with_default_weights().with_reference(reference);
            let result = filter.filter(&participants, None, venues.clone(), 10_000.0);

            assert_eq!(result.venues.len(), 1, "{:?}", reference);
            let distance = result.venues[0].distance_meters.unwrap();
            assert!((distance - 2_127.0).abs() < 50.0, "got {}", distance);
        }
    }

    #[test]
    fn test_distance_cap_holds_everywhere() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(11);
        let max_distance = 10_000.0;

        for _ in 0..300 {
            let lat: f64 = rng.random_range(-89.9..89.9);
            let lon: f64 = rng.random_range(-180.0..180.0);
            let participants = vec![create_participant("a", lat, lon)];

            let venues: Vec<Venue> = (0..20)
                .map(|i| {
                    let v_lat = (lat + rng.random_range(-0.2..0.2)).clamp(-90.0, 90.0);
                    let mut v_lon = lon + rng.random_range(-0.5..0.5);
                    if v_lon > 180.0 {
                        v_lon -= 360.0;
                    } else if v_lon < -180.0 {
                        v_lon += 360.0;
                    }
                    create_venue(&i.to_string(), v_lat, v_lon, false)
                })
                .collect();
            // Plus one on the far side of the planet
            let mut venues = venues;
            venues.push(create_venue("anti", -lat, lon - 180.0, false));

            for reference in [DistanceReference::Centroid, DistanceReference::Nearest] {
                let filter = VenueFilter::with_default_weights().with_reference(reference);
                let result = filter.filter(&participants, None, venues.clone(), max_distance);

                for kept in &result.venues {
                    let d = kept.distance_meters.unwrap();
                    assert!(d.is_finite() && d <= max_distance, "kept {} at {}", kept.venue.id, d);
                }

                // Nothing within the cap is lost to the bounding box pre-check
                let origin = GeoPoint::new(lat, lon);
                let expected = venues
                    .iter()
                    .filter(|v| distance_between(&origin, &v.location.unwrap()) <= max_distance)
                    .count();
                assert_eq!(result.venues.len(), expected, "at ({}, {})", lat, lon);
            }
        }
    }
}
