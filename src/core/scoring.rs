use crate::config::WeightsConfig;
use crate::models::{UserProfile, Venue};

/// Additive bonuses applied on top of the base venue score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterWeights {
    pub base: f64,
    pub activity_type: f64,
    pub cuisine: f64,
    pub location: f64,
    pub partner: f64,
    pub proximity: f64,
}

impl Default for FilterWeights {
    fn default() -> Self {
        Self {
            base: 0.5,
            activity_type: 0.20,
            cuisine: 0.15,
            location: 0.10,
            partner: 0.10,
            proximity: 0.10,
        }
    }
}

impl From<&WeightsConfig> for FilterWeights {
    fn from(config: &WeightsConfig) -> Self {
        Self {
            base: config.base,
            activity_type: config.activity_type,
            cuisine: config.cuisine,
            location: config.location,
            partner: config.partner,
            proximity: config.proximity,
        }
    }
}

/// Calculate a match score (0-1) for a venue
///
/// Scoring formula:
/// score = base                                   # 0.5
///     + activity_type  if a tag matches the type  # 0.20
///     + cuisine        if a cuisine is described  # 0.15
///     + location       if the address matches     # 0.10
///     + partner        for partner venues         # 0.10
///     + proximity * max(0, 1 - d / max_d)         # up to 0.10
pub fn calculate_match_score(
    venue: &Venue,
    profile: Option<&UserProfile>,
    distance_m: Option<f64>,
    max_distance_m: f64,
    weights: &FilterWeights,
) -> f64 {
    let mut score = weights.base;

    if let Some(profile) = profile {
        if any_substring_match(&profile.activity_types, &venue.venue_type) {
            score += weights.activity_type;
        }

        if let Some(description) = venue.description.as_deref() {
            if any_substring_match(&profile.cuisine_preferences, description) {
                score += weights.cuisine;
            }
        }

        if any_substring_match(&profile.preferred_locations, &venue.address) {
            score += weights.location;
        }
    }

    if venue.is_partner() {
        score += weights.partner;
    }

    if let Some(distance) = distance_m {
        score += weights.proximity * proximity_factor(distance, max_distance_m);
    }

    score.clamp(0.0, 1.0)
}

/// 1.0 at the reference point, falling linearly to 0.0 at `max_distance_m`
#[inline]
pub fn proximity_factor(distance_m: f64, max_distance_m: f64) -> f64 {
    if max_distance_m <= 0.0 {
        return 0.0;
    }
    (1.0 - distance_m / max_distance_m).max(0.0)
}

/// Case-insensitive check whether any non-empty needle occurs in `haystack`
#[inline]
fn any_substring_match(needles: &[String], haystack: &str) -> bool {
    let haystack = haystack.to_lowercase();
    needles.iter().any(|needle| {
        let needle = needle.trim().to_lowercase();
        !needle.is_empty() && haystack.contains(&needle)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_venue(venue_type: &str, description: &str, address: &str, partner: bool) -> Venue {
        Venue {
            id: "v1".to_string(),
            slug: "v1".to_string(),
            name: "Test Venue".to_string(),
            venue_type: venue_type.to_string(),
            address: address.to_string(),
            city: Some("Espoo".to_string()),
            location: None,
            description: Some(description.to_string()),
            partner_tier: partner.then(|| "gold".to_string()),
            tags: vec![],
        }
    }

    fn create_test_profile() -> UserProfile {
        UserProfile {
            user_id: "user".to_string(),
            activity_types: vec!["Bowling".to_string()],
            cuisine_preferences: vec!["thai".to_string()],
            preferred_locations: vec!["Tapiola".to_string()],
        }
    }

    #[test]
    fn test_base_score_without_profile() {
        let venue = create_test_venue("cafe", "coffee", "Main St 1", false);
        let score = calculate_match_score(&venue, None, None, 10_000.0, &FilterWeights::default());
        assert_eq!(score, 0.5);
    }

    #[test]
    fn test_all_bonuses_clamped() {
        let venue = create_test_venue("bowling alley", "Thai street food", "Tapiontori 3, Tapiola", true);
        let profile = create_test_profile();

        let score = calculate_match_score(
            &venue,
            Some(&profile),
            Some(0.0),
            10_000.0,
            &FilterWeights::default(),
        );
        // 0.5 + 0.2 + 0.15 + 0.1 + 0.1 + 0.1 = 1.15 before clamping
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_individual_bonuses() {
        let profile = create_test_profile();
        let weights = FilterWeights::default();

        let typed = create_test_venue("Bowling", "", "", false);
        let score = calculate_match_score(&typed, Some(&profile), None, 10_000.0, &weights);
        assert!((score - 0.70).abs() < 1e-9);

        let cuisine = create_test_venue("restaurant", "Best THAI curry", "", false);
        let score = calculate_match_score(&cuisine, Some(&profile), None, 10_000.0, &weights);
        assert!((score - 0.65).abs() < 1e-9);

        let partner = create_test_venue("restaurant", "", "", true);
        let score = calculate_match_score(&partner, None, None, 10_000.0, &weights);
        assert!((score - 0.60).abs() < 1e-9);
    }

    #[test]
    fn test_proximity_factor() {
        assert_eq!(proximity_factor(0.0, 10_000.0), 1.0);
        assert!((proximity_factor(5_000.0, 10_000.0) - 0.5).abs() < 1e-9);
        assert_eq!(proximity_factor(20_000.0, 10_000.0), 0.0);
        assert_eq!(proximity_factor(100.0, 0.0), 0.0);
    }

    #[test]
    fn test_blank_preferences_do_not_match_everything() {
        let profile = UserProfile {
            user_id: "user".to_string(),
            activity_types: vec!["  ".to_string()],
            cuisine_preferences: vec![String::new()],
            preferred_locations: vec![],
        };
        let venue = create_test_venue("bar", "drinks", "Street", false);
        let score = calculate_match_score(&venue, Some(&profile), None, 10_000.0, &FilterWeights::default());
        assert_eq!(score, 0.5);
    }
}
