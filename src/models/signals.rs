use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Known in-session signal keys. Anything else lands in `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SignalKey {
    EnergyLevel,
    Atmosphere,
    SocialVibe,
    Novelty,
    ActivityVsFood,
    Hunger,
    Dietary,
    TravelDistance,
    TimeCommitment,
    BudgetFlex,
    Unknown(String),
}

impl SignalKey {
    pub fn as_str(&self) -> &str {
        match self {
            Self::EnergyLevel => "energy_level",
            Self::Atmosphere => "atmosphere",
            Self::SocialVibe => "social_vibe",
            Self::Novelty => "novelty",
            Self::ActivityVsFood => "activity_vs_food",
            Self::Hunger => "hunger",
            Self::Dietary => "dietary",
            Self::TravelDistance => "travel_distance",
            Self::TimeCommitment => "time_commitment",
            Self::BudgetFlex => "budget_flex",
            Self::Unknown(key) => key,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<&str> for SignalKey {
    fn from(value: &str) -> Self {
        // Accept camelCase keys from older clients as well
        let normalized: String = value
            .trim()
            .chars()
            .flat_map(|c| {
                if c.is_ascii_uppercase() {
                    vec!['_', c.to_ascii_lowercase()]
                } else {
                    vec![c]
                }
            })
            .collect();

        match normalized.trim_start_matches('_') {
            "energy_level" | "energy" => Self::EnergyLevel,
            "atmosphere" => Self::Atmosphere,
            "social_vibe" => Self::SocialVibe,
            "novelty" => Self::Novelty,
            "activity_vs_food" => Self::ActivityVsFood,
            "hunger" => Self::Hunger,
            "dietary" => Self::Dietary,
            "travel_distance" => Self::TravelDistance,
            "time_commitment" => Self::TimeCommitment,
            "budget_flex" => Self::BudgetFlex,
            _ => Self::Unknown(value.trim().to_string()),
        }
    }
}

impl From<String> for SignalKey {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<SignalKey> for String {
    fn from(value: SignalKey) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar answer value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl SignalValue {
    /// Converts a raw JSON value, rejecting nulls, arrays, objects and non-finite numbers
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Flag(*b)),
            Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).map(Self::Number),
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| Self::Text(trimmed.to_string()))
            }
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.parse().ok(),
            Self::Flag(_) => None,
        }
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Mood responses for one participant, keyed by signal
///
/// Deserialization never fails on shape: entries whose value is not a scalar
/// are dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Value>",
    into = "BTreeMap<String, SignalValue>"
)]
pub struct MoodSignals(BTreeMap<SignalKey, SignalValue>);

impl MoodSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a stored JSON blob; anything but an object yields an empty set
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(map) => map
                .iter()
                .filter_map(|(k, v)| SignalValue::from_json(v).map(|sv| (SignalKey::from(k.as_str()), sv)))
                .collect(),
            _ => Self::default(),
        }
    }

    pub fn insert(&mut self, key: SignalKey, value: SignalValue) -> Option<SignalValue> {
        self.0.insert(key, value)
    }

    pub fn get(&self, key: &SignalKey) -> Option<&SignalValue> {
        self.0.get(key)
    }

    pub fn is_answered(&self, key: &SignalKey) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SignalKey> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SignalKey, &SignalValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Later answers overwrite earlier ones for the same key
    pub fn merge(&mut self, other: MoodSignals) {
        self.0.extend(other.0);
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Object(Default::default()))
    }
}

impl FromIterator<(SignalKey, SignalValue)> for MoodSignals {
    fn from_iter<T: IntoIterator<Item = (SignalKey, SignalValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, Value>> for MoodSignals {
    fn from(raw: BTreeMap<String, Value>) -> Self {
        raw.iter()
            .filter_map(|(k, v)| SignalValue::from_json(v).map(|sv| (SignalKey::from(k.as_str()), sv)))
            .collect()
    }
}

impl From<MoodSignals> for BTreeMap<String, SignalValue> {
    fn from(signals: MoodSignals) -> Self {
        signals
            .0
            .into_iter()
            .map(|(k, v)| (String::from(k), v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signal_key_round_trip() {
        assert_eq!(SignalKey::from("energy_level"), SignalKey::EnergyLevel);
        assert_eq!(SignalKey::from("timeCommitment"), SignalKey::TimeCommitment);
        assert_eq!(
            SignalKey::from("favourite_colour"),
            SignalKey::Unknown("favourite_colour".to_string())
        );
        assert_eq!(String::from(SignalKey::ActivityVsFood), "activity_vs_food");
    }

    #[test]
    fn test_malformed_values_are_dropped() {
        let signals: MoodSignals = serde_json::from_value(json!({
            "energy_level": 4,
            "atmosphere": "outdoor",
            "hunger": null,
            "dietary": ["vegan"],
            "novelty": true,
            "mystery": "  "
        }))
        .unwrap();

        assert_eq!(signals.len(), 3);
        assert_eq!(
            signals.get(&SignalKey::EnergyLevel),
            Some(&SignalValue::Number(4.0))
        );
        assert!(!signals.is_answered(&SignalKey::Hunger));
        assert!(signals.is_answered(&SignalKey::Novelty));
    }

    #[test]
    fn test_non_object_blob_is_empty() {
        assert!(MoodSignals::from_json(&json!("garbage")).is_empty());
        assert!(MoodSignals::from_json(&json!([1, 2, 3])).is_empty());
    }

    #[test]
    fn test_merge_overwrites() {
        let mut current: MoodSignals = [(SignalKey::EnergyLevel, SignalValue::Number(2.0))]
            .into_iter()
            .collect();
        let update: MoodSignals = [
            (SignalKey::EnergyLevel, SignalValue::Number(5.0)),
            (SignalKey::Hunger, SignalValue::Text("starving".into())),
        ]
        .into_iter()
        .collect();

        current.merge(update);
        assert_eq!(current.len(), 2);
        assert_eq!(current.get(&SignalKey::EnergyLevel).and_then(SignalValue::as_number), Some(5.0));
    }

    #[test]
    fn test_serializes_with_string_keys() {
        let signals: MoodSignals = [(SignalKey::Atmosphere, SignalValue::Text("indoor".into()))]
            .into_iter()
            .collect();
        assert_eq!(signals.to_json(), json!({"atmosphere": "indoor"}));
    }
}
