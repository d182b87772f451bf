use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeSet, HashSet};

use crate::models::{
    MoodQuestion, QuestionKind, QuestionTheme, SignalKey, ThemeCategory, TimeOfDay, Venue,
};

/// Bonus for a theme that addresses a detected differentiating factor
const FACTOR_BONUS: f64 = 0.3;

/// Bonus for a theme relevant at the current time of day
const TIME_BONUS: f64 = 0.2;

/// Upper bound of the random jitter; must stay above both bonuses
const JITTER: f64 = 1.0;

const MAX_FACTORS: usize = 3;

/// Static catalog of question themes
pub static THEME_CATALOG: [QuestionTheme; 10] = [
    QuestionTheme {
        id: "energy",
        category: ThemeCategory::Preference,
        prompt: "How much energy does the group have right now?",
        signal_key: SignalKey::EnergyLevel,
        time_relevance: &[TimeOfDay::Evening, TimeOfDay::Night],
    },
    QuestionTheme {
        id: "atmosphere",
        category: ThemeCategory::Preference,
        prompt: "Indoors somewhere cozy or outside in the open air?",
        signal_key: SignalKey::Atmosphere,
        time_relevance: &[TimeOfDay::Morning, TimeOfDay::Afternoon],
    },
    QuestionTheme {
        id: "social",
        category: ThemeCategory::Preference,
        prompt: "Lively and social, or calm enough to talk?",
        signal_key: SignalKey::SocialVibe,
        time_relevance: &[TimeOfDay::Evening, TimeOfDay::Night],
    },
    QuestionTheme {
        id: "novelty",
        category: ThemeCategory::Preference,
        prompt: "A trusted favourite or something new?",
        signal_key: SignalKey::Novelty,
        time_relevance: &[],
    },
    QuestionTheme {
        id: "activity_food",
        category: ThemeCategory::Preference,
        prompt: "Is this outing about eating, doing something, or both?",
        signal_key: SignalKey::ActivityVsFood,
        time_relevance: &[TimeOfDay::Afternoon, TimeOfDay::Evening],
    },
    QuestionTheme {
        id: "hunger",
        category: ThemeCategory::Factual,
        prompt: "How hungry is everyone?",
        signal_key: SignalKey::Hunger,
        time_relevance: &[TimeOfDay::Morning, TimeOfDay::Afternoon, TimeOfDay::Evening],
    },
    QuestionTheme {
        id: "dietary",
        category: ThemeCategory::Factual,
        prompt: "Any dietary needs the group should plan around?",
        signal_key: SignalKey::Dietary,
        time_relevance: &[],
    },
    QuestionTheme {
        id: "travel",
        category: ThemeCategory::Factual,
        prompt: "How far is the group willing to travel?",
        signal_key: SignalKey::TravelDistance,
        time_relevance: &[TimeOfDay::Night],
    },
    QuestionTheme {
        id: "time",
        category: ThemeCategory::Constraint,
        prompt: "How much time does the group have?",
        signal_key: SignalKey::TimeCommitment,
        time_relevance: &[TimeOfDay::Afternoon, TimeOfDay::Evening],
    },
    QuestionTheme {
        id: "budget",
        category: ThemeCategory::Constraint,
        prompt: "How flexible is the budget today?",
        signal_key: SignalKey::BudgetFlex,
        time_relevance: &[],
    },
];

const INDOOR_WORDS: &[&str] = &["indoor", "cozy", "cosy", "bar", "cinema", "museum", "gallery", "lounge", "pub"];
const OUTDOOR_WORDS: &[&str] = &["outdoor", "park", "terrace", "garden", "beach", "hike", "trail", "open-air", "rooftop"];
const ACTIVE_WORDS: &[&str] = &["active", "sport", "climb", "bowling", "dance", "escape", "trampoline", "paddle", "axe"];
const RELAXED_WORDS: &[&str] = &["relax", "chill", "calm", "spa", "sauna", "lounge", "slow", "laid-back"];
const SOCIAL_WORDS: &[&str] = &["group", "social", "party", "games", "karaoke", "quiz", "lively", "crowd"];
const SOLO_WORDS: &[&str] = &["quiet", "intimate", "solo", "peaceful", "secluded", "small"];
const FOOD_WORDS: &[&str] = &["restaurant", "cafe", "café", "food", "dining", "bistro", "kitchen", "brunch", "bakery", "pizza", "sushi", "eatery"];
const ACTIVITY_WORDS: &[&str] = &["bowling", "climb", "escape", "museum", "karaoke", "games", "cinema", "park", "sport", "tour", "minigolf", "arcade", "gallery", "workshop"];

/// Keyword counts over a set of venues
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VenueSignals {
    pub sampled: usize,
    pub indoor: usize,
    pub outdoor: usize,
    pub active: usize,
    pub relaxed: usize,
    pub social: usize,
    pub solo: usize,
    pub food: usize,
    pub activity: usize,
    pub distinct_types: usize,
}

impl VenueSignals {
    pub fn detect<'a>(venues: impl IntoIterator<Item = &'a Venue>) -> Self {
        let mut signals = Self::default();
        let mut types = HashSet::new();

        for venue in venues {
            let text = format!(
                "{} {} {}",
                venue.venue_type,
                venue.description.as_deref().unwrap_or_default(),
                venue.tags.join(" ")
            )
            .to_lowercase();

            signals.sampled += 1;
            types.insert(venue.venue_type.trim().to_lowercase());

            let hit = |words: &[&str]| words.iter().any(|w| text.contains(w)) as usize;
            signals.indoor += hit(INDOOR_WORDS);
            signals.outdoor += hit(OUTDOOR_WORDS);
            signals.active += hit(ACTIVE_WORDS);
            signals.relaxed += hit(RELAXED_WORDS);
            signals.social += hit(SOCIAL_WORDS);
            signals.solo += hit(SOLO_WORDS);
            signals.food += hit(FOOD_WORDS);
            signals.activity += hit(ACTIVITY_WORDS);
        }

        signals.distinct_types = types.len();
        signals
    }

    /// Dimensions on which the venues disagree, most informative first
    pub fn differentiating_factors(&self) -> Vec<DifferentiatingFactor> {
        let mut factors = Vec::new();

        if self.indoor > 0 && self.outdoor > 0 {
            factors.push(DifferentiatingFactor::IndoorOutdoor);
        }
        if self.active > 0 && self.relaxed > 0 {
            factors.push(DifferentiatingFactor::ActiveRelaxed);
        }
        if self.social > 0 && self.solo > 0 {
            factors.push(DifferentiatingFactor::SocialSolo);
        }
        if self.food > 0 && self.food < self.sampled {
            factors.push(DifferentiatingFactor::FoodMix);
        }
        if self.distinct_types >= 3 {
            factors.push(DifferentiatingFactor::TypeDiversity);
        }

        factors.truncate(MAX_FACTORS);
        factors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifferentiatingFactor {
    IndoorOutdoor,
    ActiveRelaxed,
    SocialSolo,
    FoodMix,
    TypeDiversity,
}

impl DifferentiatingFactor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IndoorOutdoor => "indoor_vs_outdoor",
            Self::ActiveRelaxed => "active_vs_relaxed",
            Self::SocialSolo => "social_vs_quiet",
            Self::FoodMix => "food_vs_activity",
            Self::TypeDiversity => "venue_type_variety",
        }
    }

    pub fn covers(&self, key: &SignalKey) -> bool {
        match self {
            Self::IndoorOutdoor => matches!(key, SignalKey::Atmosphere),
            Self::ActiveRelaxed => matches!(key, SignalKey::EnergyLevel),
            Self::SocialSolo => matches!(key, SignalKey::SocialVibe),
            Self::FoodMix => matches!(
                key,
                SignalKey::ActivityVsFood | SignalKey::Hunger | SignalKey::Dietary
            ),
            Self::TypeDiversity => matches!(key, SignalKey::Novelty | SignalKey::ActivityVsFood),
        }
    }
}

/// Themes whose signal has not been answered yet
pub fn open_themes(answered: &BTreeSet<SignalKey>) -> Vec<&'static QuestionTheme> {
    THEME_CATALOG
        .iter()
        .filter(|theme| !answered.contains(&theme.signal_key))
        .collect()
}

/// Score and rank themes, best first
///
/// Themes are shuffled before the stable sort so equal scores land in random order.
pub fn rank_themes<R: Rng>(
    themes: &[&'static QuestionTheme],
    factors: &[DifferentiatingFactor],
    time_of_day: Option<TimeOfDay>,
    rng: &mut R,
) -> Vec<&'static QuestionTheme> {
    let mut scored: Vec<(&'static QuestionTheme, f64)> = themes
        .iter()
        .map(|theme| {
            let mut score = 0.0;
            if factors.iter().any(|f| f.covers(&theme.signal_key)) {
                score += FACTOR_BONUS;
            }
            if time_of_day.is_some_and(|t| theme.time_relevance.contains(&t)) {
                score += TIME_BONUS;
            }
            score += rng.random::<f64>() * JITTER;
            (*theme, score)
        })
        .collect();

    scored.shuffle(rng);
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.into_iter().map(|(theme, _)| theme).collect()
}

/// Greedy pick of up to `max` themes preferring distinct categories
pub fn select_diverse(ranked: &[&'static QuestionTheme], max: usize) -> Vec<&'static QuestionTheme> {
    let mut picked: Vec<&'static QuestionTheme> = Vec::with_capacity(max);

    while picked.len() < max {
        let is_free = |t: &&&'static QuestionTheme| !picked.iter().any(|p| p.id == t.id);
        let used: HashSet<ThemeCategory> = picked.iter().map(|p| p.category).collect();

        let preferred = match picked.len() {
            0 => ranked.iter().find(is_free),
            1 => ranked
                .iter()
                .filter(is_free)
                .find(|t| t.category != picked[0].category),
            _ => ranked
                .iter()
                .filter(is_free)
                .find(|t| !used.contains(&t.category)),
        };

        match preferred.or_else(|| ranked.iter().find(is_free)) {
            Some(theme) => picked.push(*theme),
            None => break,
        }
    }

    if picked.len() >= 3 && picked.iter().all(|p| p.category == picked[0].category) {
        let alternative = ranked
            .iter()
            .find(|t| t.category != picked[0].category && !picked.iter().any(|p| p.id == t.id));
        if let Some(alternative) = alternative {
            let last = picked.len() - 1;
            picked[last] = *alternative;
        }
    }

    picked
}

const SCALE_DEFAULTS: [&str; 3] = ["Low", "Medium", "High"];
const CHOICE_DEFAULTS: [&str; 3] = ["Yes", "No", "No preference"];
const QUOTES: &[char] = &['"', '\'', '`', '“', '”', '‘', '’'];

/// Clean LLM-provided options and force exactly three
pub fn normalize_options(kind: QuestionKind, options: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(3);

    for option in options {
        let option = option.trim().trim_matches(QUOTES).trim();
        if option.is_empty() {
            continue;
        }
        if cleaned.iter().any(|c| c.eq_ignore_ascii_case(option)) {
            continue;
        }
        cleaned.push(option.to_string());
    }

    let defaults = match kind {
        QuestionKind::Scale => SCALE_DEFAULTS,
        QuestionKind::Choice => CHOICE_DEFAULTS,
    };
    for default in defaults {
        if cleaned.len() >= 3 {
            break;
        }
        if !cleaned.iter().any(|c| c.eq_ignore_ascii_case(default)) {
            cleaned.push(default.to_string());
        }
    }

    cleaned.truncate(3);
    cleaned
}

fn fallback_question(key: SignalKey) -> MoodQuestion {
    let (kind, prompt, options): (QuestionKind, &str, [&str; 3]) = match key {
        SignalKey::Atmosphere => (
            QuestionKind::Choice,
            "Inside or outside today?",
            ["Cozy indoors", "Out in the fresh air", "Either works"],
        ),
        SignalKey::TimeCommitment => (
            QuestionKind::Scale,
            "How much time does the group have?",
            ["About an hour", "A couple of hours", "The whole evening"],
        ),
        SignalKey::ActivityVsFood => (
            QuestionKind::Choice,
            "Are we here to eat or to do something?",
            ["Food first", "Activity first", "A bit of both"],
        ),
        SignalKey::Hunger => (
            QuestionKind::Scale,
            "How hungry is everyone?",
            ["Just a snack", "Pretty hungry", "Starving"],
        ),
        _ => (
            QuestionKind::Scale,
            "How much energy does the group have?",
            ["Low-key", "Up for something", "Full power"],
        ),
    };

    MoodQuestion {
        id: format!("fallback_{}", key.as_str()),
        prompt: prompt.to_string(),
        question_type: kind,
        signal_key: key,
        options: options.iter().map(|o| o.to_string()).collect(),
    }
}

/// Deterministic question set built from venue keywords alone
pub fn fallback_questions(
    signals: &VenueSignals,
    answered: &BTreeSet<SignalKey>,
    max: usize,
) -> Vec<MoodQuestion> {
    let mut keys: Vec<SignalKey> = Vec::new();
    let open = |key: &SignalKey| !answered.contains(key);

    if signals.indoor > 0 && signals.outdoor > 0 && open(&SignalKey::Atmosphere) {
        keys.push(SignalKey::Atmosphere);
    }

    if open(&SignalKey::TimeCommitment) {
        keys.push(SignalKey::TimeCommitment);
    }

    if signals.food > 0 && signals.activity > 0 {
        if open(&SignalKey::ActivityVsFood) {
            keys.push(SignalKey::ActivityVsFood);
        }
    } else if signals.food > 0 && open(&SignalKey::Hunger) {
        keys.push(SignalKey::Hunger);
    }

    if keys.len() < 2 && open(&SignalKey::EnergyLevel) {
        keys.push(SignalKey::EnergyLevel);
    }

    if keys.is_empty() {
        // Ask the first still-open catalog theme; empty once everything is answered
        return THEME_CATALOG
            .iter()
            .find(|theme| open(&theme.signal_key))
            .map(theme_question)
            .into_iter()
            .collect();
    }

    keys.truncate(max.max(1));
    keys.into_iter().map(fallback_question).collect()
}

/// Catalog theme phrased as-is, with default scale options
fn theme_question(theme: &QuestionTheme) -> MoodQuestion {
    MoodQuestion {
        id: format!("fallback_{}", theme.signal_key.as_str()),
        prompt: theme.prompt.to_string(),
        question_type: QuestionKind::Scale,
        signal_key: theme.signal_key.clone(),
        options: SCALE_DEFAULTS.iter().map(|o| o.to_string()).collect(),
    }
}

/// Follow-up once a participant has nothing left to answer
pub fn completed_follow_up() -> String {
    "All set! Your answers are in, recommendations are ready when the group is.".to_string()
}

pub fn fallback_follow_up(venue_count: usize) -> String {
    match venue_count {
        0 => "Answer a couple of quick questions and we'll widen the search.".to_string(),
        1 => "Answer a couple of quick questions to confirm the one spot we found.".to_string(),
        n => format!("Answer a couple of quick questions so we can narrow down {} spots.", n),
    }
}
