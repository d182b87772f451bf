use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::models::{
    FilteredVenue, GeneratedRecommendation, GeneratedRecommendationSet, GenerationSource,
    GroupStats, MoneyPreference, MoodSignals, PreferenceSummary, Recommendation,
};
use crate::services::llm::{generate_structured, LlmClient, LlmError};

/// Most recommendations returned per request
pub const MAX_RECOMMENDATIONS: usize = 5;

/// LLM picks are topped up to this many from the heuristic ranking
pub const MIN_RECOMMENDATIONS: usize = 3;

const MAX_PROMPT_VENUES: usize = 30;
const MAX_DESCRIPTION_CHARS: usize = 160;
const MAX_HIGHLIGHTS: usize = 4;

const RECOMMENDATION_SYSTEM_PROMPT: &str = "You recommend venues to a group planning an outing. \
Pick three to five venues from the supplied list only, referring to them by venueId. For each, \
write a short title, a one-sentence description, reasoning that mentions the group's energy, \
budget and mood answers, up to four short highlights and a matchScore between 0 and 1.";

/// Inputs for one recommendation run
#[derive(Debug, Clone, Copy)]
pub struct RecommendationContext<'a> {
    pub group_id: &'a str,
    pub stats: &'a GroupStats,
    pub summary: &'a PreferenceSummary,
    pub mood: &'a MoodSignals,
    /// Filtered venues, best first
    pub venues: &'a [FilteredVenue],
}

/// Blends group context and filtered venues into ranked recommendations
///
/// Uses one structured LLM call; any failure falls back to the
/// deterministic heuristic ranking.
pub struct RecommendationGenerator {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl RecommendationGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Produce up to five recommendations; none only when there are no venues
    pub async fn generate(&self, ctx: &RecommendationContext<'_>) -> Vec<Recommendation> {
        if ctx.venues.is_empty() {
            tracing::info!("No candidate venues for group {}", ctx.group_id);
            return Vec::new();
        }

        match self.ask_llm(ctx).await {
            Ok(picks) if !picks.is_empty() => top_up(picks, ctx),
            Ok(_) => {
                tracing::warn!(
                    "LLM returned no usable recommendations for group {}, using heuristic ranking",
                    ctx.group_id
                );
                heuristic_recommendations(ctx)
            }
            Err(e) => {
                tracing::warn!(
                    "Recommendation generation failed for group {}, using heuristic ranking: {}",
                    ctx.group_id,
                    e
                );
                heuristic_recommendations(ctx)
            }
        }
    }

    async fn ask_llm(&self, ctx: &RecommendationContext<'_>) -> Result<Vec<Recommendation>, LlmError> {
        let venues: Vec<Value> = ctx
            .venues
            .iter()
            .take(MAX_PROMPT_VENUES)
            .map(prompt_venue)
            .collect();

        let payload = json!({
            "groupStats": ctx.stats,
            "preferences": ctx.summary,
            "moodSignals": ctx.mood,
            "venues": venues,
        });

        let generated: GeneratedRecommendationSet = generate_structured(
            self.llm.as_ref(),
            "venue_recommendations",
            RECOMMENDATION_SYSTEM_PROMPT,
            payload,
            self.timeout,
        )
        .await?;

        Ok(validate_picks(generated.recommendations, ctx))
    }
}

fn prompt_venue(venue: &FilteredVenue) -> Value {
    let description: Option<String> = venue
        .venue
        .description
        .as_deref()
        .map(|d| d.trim().chars().take(MAX_DESCRIPTION_CHARS).collect());

    json!({
        "venueId": venue.venue.id,
        "name": venue.venue.name,
        "type": venue.venue.venue_type,
        "distanceMeters": venue.distance_meters.map(|d| d.round()),
        "matchScore": (venue.match_score * 100.0).round() / 100.0,
        "partner": venue.venue.is_partner(),
        "description": description,
        "tags": venue.venue.tags,
    })
}

/// Keep picks that reference a known venue once, clamped and capped at five
pub fn validate_picks(
    picks: Vec<GeneratedRecommendation>,
    ctx: &RecommendationContext<'_>,
) -> Vec<Recommendation> {
    let known: HashMap<&str, &FilteredVenue> = ctx
        .venues
        .iter()
        .map(|v| (v.venue.id.as_str(), v))
        .collect();
    let mut used: HashSet<String> = HashSet::new();

    picks
        .into_iter()
        .filter_map(|pick| {
            let venue = *known.get(pick.venue_id.trim())?;
            if !used.insert(venue.venue.id.clone()) {
                return None;
            }

            let match_score = if pick.match_score.is_finite() {
                pick.match_score.clamp(0.0, 1.0)
            } else {
                venue.match_score
            };

            let highlights: Vec<String> = pick
                .highlights
                .iter()
                .map(|h| h.trim())
                .filter(|h| !h.is_empty())
                .take(MAX_HIGHLIGHTS)
                .map(str::to_string)
                .collect();

            Some(Recommendation {
                id: Uuid::new_v4(),
                group_id: ctx.group_id.to_string(),
                venue_id: venue.venue.id.clone(),
                match_score,
                title: non_blank(pick.title).unwrap_or_else(|| venue.venue.name.clone()),
                description: non_blank(pick.description)
                    .unwrap_or_else(|| template_description(venue)),
                reasoning: non_blank(pick.reasoning)
                    .unwrap_or_else(|| template_reasoning(venue, ctx.stats)),
                highlights: if highlights.is_empty() {
                    template_highlights(venue)
                } else {
                    highlights
                },
                source: GenerationSource::Llm,
                created_at: Utc::now(),
            })
        })
        .take(MAX_RECOMMENDATIONS)
        .collect()
}

fn top_up(mut picks: Vec<Recommendation>, ctx: &RecommendationContext<'_>) -> Vec<Recommendation> {
    if picks.len() >= MIN_RECOMMENDATIONS {
        return picks;
    }

    let used: HashSet<String> = picks.iter().map(|p| p.venue_id.clone()).collect();
    let missing = MIN_RECOMMENDATIONS - picks.len();
    picks.extend(
        heuristic_recommendations(ctx)
            .into_iter()
            .filter(|r| !used.contains(&r.venue_id))
            .take(missing),
    );
    picks
}

/// Deterministic ranking: best match score first, top five, templated text
pub fn heuristic_recommendations(ctx: &RecommendationContext<'_>) -> Vec<Recommendation> {
    let mut ranked: Vec<&FilteredVenue> = ctx.venues.iter().collect();
    ranked.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));

    ranked
        .into_iter()
        .take(MAX_RECOMMENDATIONS)
        .map(|venue| Recommendation {
            id: Uuid::new_v4(),
            group_id: ctx.group_id.to_string(),
            venue_id: venue.venue.id.clone(),
            match_score: venue.match_score.clamp(0.0, 1.0),
            title: venue.venue.name.clone(),
            description: template_description(venue),
            reasoning: template_reasoning(venue, ctx.stats),
            highlights: template_highlights(venue),
            source: GenerationSource::Fallback,
            created_at: Utc::now(),
        })
        .collect()
}

fn non_blank(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// "350 m away" below a kilometre, "2.4 km away" above
pub fn distance_label(distance_meters: Option<f64>) -> Option<String> {
    let d = distance_meters.filter(|d| d.is_finite() && *d >= 0.0)?;
    let rounded = (d / 10.0).round() * 10.0;
    if rounded < 1_000.0 {
        Some(format!("{} m away", rounded as i64))
    } else {
        Some(format!("{:.1} km away", d / 1_000.0))
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn budget_phrase(tier: MoneyPreference) -> &'static str {
    match tier {
        MoneyPreference::Budget => "tight",
        MoneyPreference::Moderate => "moderate",
        MoneyPreference::Premium => "generous",
    }
}

fn template_highlights(venue: &FilteredVenue) -> Vec<String> {
    let mut highlights = Vec::with_capacity(3);

    let venue_type = capitalize(&venue.venue.venue_type);
    if !venue_type.is_empty() {
        highlights.push(venue_type);
    }
    if let Some(label) = distance_label(venue.distance_meters) {
        highlights.push(label);
    }
    if venue.venue.is_partner() {
        highlights.push("Partner venue".to_string());
    }

    highlights
}

fn template_description(venue: &FilteredVenue) -> String {
    if let Some(description) = venue.venue.description.as_deref().map(str::trim) {
        if !description.is_empty() {
            return description.to_string();
        }
    }

    let place = venue
        .venue
        .city
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(venue.venue.address.trim());

    if place.is_empty() {
        capitalize(&venue.venue.venue_type)
    } else {
        format!("{} in {}", capitalize(&venue.venue.venue_type), place)
    }
}

fn template_reasoning(venue: &FilteredVenue, stats: &GroupStats) -> String {
    let distance = distance_label(venue.distance_meters)
        .map(|label| format!(", {}", label))
        .unwrap_or_default();

    format!(
        "Scores {:.0}% for a {}-energy group with a {} budget{}.",
        venue.match_score.clamp(0.0, 1.0) * 100.0,
        stats.energy_label.as_str(),
        budget_phrase(stats.popular_money_preference),
        distance
    )
}
