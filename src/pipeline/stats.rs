use std::collections::{BTreeMap, BTreeSet};

use crate::models::{
    EnergyLabel, GroupStats, MoneyPreference, MoodSignals, ParticipantPreference,
    PreferenceSummary, SignalKey, SignalValue, UserProfile,
};

const NEUTRAL_ACTIVITY_LEVEL: f64 = 3.0;

/// Aggregate participant count, energy and budget for a group
///
/// The most common budget tier wins; ties go to the cheaper tier.
pub fn group_stats(preferences: &[ParticipantPreference]) -> GroupStats {
    let participant_count = preferences.len();

    let avg_activity_level = if participant_count == 0 {
        NEUTRAL_ACTIVITY_LEVEL
    } else {
        let total: f64 = preferences
            .iter()
            .map(|p| p.activity_level.clamp(1, 5) as f64)
            .sum();
        total / participant_count as f64
    };

    let mut money_preference_counts: BTreeMap<MoneyPreference, usize> =
        MoneyPreference::ALL.iter().map(|tier| (*tier, 0)).collect();
    for preference in preferences {
        *money_preference_counts
            .entry(preference.money_preference)
            .or_insert(0) += 1;
    }

    let popular_money_preference = if participant_count == 0 {
        MoneyPreference::default()
    } else {
        // max_by_key keeps the last maximum, so iterate most expensive first
        money_preference_counts
            .iter()
            .rev()
            .max_by_key(|(_, count)| **count)
            .map(|(tier, _)| *tier)
            .unwrap_or_default()
    };

    GroupStats {
        participant_count,
        avg_activity_level,
        popular_money_preference,
        money_preference_counts,
        energy_label: EnergyLabel::from_activity_level(avg_activity_level),
    }
}

/// Merge stored profiles into one digest
///
/// List entries are de-duplicated case-insensitively, first spelling wins.
pub fn preference_summary(
    preferences: &[ParticipantPreference],
    profiles: &[UserProfile],
    city: Option<&str>,
) -> PreferenceSummary {
    let collect = |pick: fn(&UserProfile) -> &Vec<String>| {
        let mut seen = BTreeSet::new();
        profiles
            .iter()
            .flat_map(|p| pick(p).iter())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
            .map(str::to_string)
            .collect::<Vec<_>>()
    };

    PreferenceSummary {
        activity_types: collect(|p| &p.activity_types),
        cuisine_preferences: collect(|p| &p.cuisine_preferences),
        preferred_locations: collect(|p| &p.preferred_locations),
        located_participants: preferences.iter().filter(|p| p.point().is_some()).count(),
        city: city
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string),
    }
}

/// A single profile standing for the whole group when scoring venues
pub fn merged_profile(summary: &PreferenceSummary) -> Option<UserProfile> {
    if summary.activity_types.is_empty()
        && summary.cuisine_preferences.is_empty()
        && summary.preferred_locations.is_empty()
    {
        return None;
    }

    Some(UserProfile {
        user_id: "group".to_string(),
        activity_types: summary.activity_types.clone(),
        cuisine_preferences: summary.cuisine_preferences.clone(),
        preferred_locations: summary.preferred_locations.clone(),
    })
}

/// Combine every participant's mood answers into one signal per key
///
/// Numbers are averaged, flags go by majority and anything else takes the
/// most frequent answer (alphabetically first on ties).
pub fn aggregate_mood(preferences: &[ParticipantPreference]) -> MoodSignals {
    let mut by_key: BTreeMap<&SignalKey, Vec<&SignalValue>> = BTreeMap::new();
    for preference in preferences {
        for (key, value) in preference.mood_responses.iter() {
            by_key.entry(key).or_default().push(value);
        }
    }

    by_key
        .into_iter()
        .filter_map(|(key, values)| combine(&values).map(|value| (key.clone(), value)))
        .collect()
}

fn combine(values: &[&SignalValue]) -> Option<SignalValue> {
    if values.is_empty() {
        return None;
    }

    let numbers: Vec<f64> = values
        .iter()
        .filter_map(|v| match v {
            SignalValue::Number(n) => Some(*n),
            _ => None,
        })
        .collect();
    if numbers.len() == values.len() {
        let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
        return Some(SignalValue::Number((mean * 100.0).round() / 100.0));
    }

    let flags: Vec<bool> = values
        .iter()
        .filter_map(|v| match v {
            SignalValue::Flag(b) => Some(*b),
            _ => None,
        })
        .collect();
    if flags.len() == values.len() {
        let yes = flags.iter().filter(|b| **b).count();
        return Some(SignalValue::Flag(yes * 2 >= flags.len()));
    }

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .rev()
        .max_by_key(|(_, count)| *count)
        .map(|(text, _)| SignalValue::Text(text))
}
