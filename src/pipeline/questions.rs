use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::json;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::config::QuestionSettings;
use crate::core::themes::{
    completed_follow_up, fallback_follow_up, fallback_questions, normalize_options, open_themes,
    rank_themes, select_diverse, DifferentiatingFactor, VenueSignals,
};
use crate::models::{
    FilteredVenue, GeneratedQuestion, GeneratedQuestionSet, GenerationSource, GroupStats,
    MoodQuestion, PreferenceSummary, QuestionSet, QuestionTheme, SignalKey, TimeOfDay, Venue,
};
use crate::services::cache::{QuestionCacheKey, TtlCache};
use crate::services::llm::{generate_structured, LlmClient, LlmError};

const QUESTION_SYSTEM_PROMPT: &str = "You write short clarifying questions for a group choosing \
where to go together. Write one question per supplied theme, in the theme's spirit, using its \
signalKey unchanged. Each question is either a 'scale' or a 'choice' question with exactly three \
short options. Never ask about the answered signals. Keep prompts under 80 characters and add one \
friendly follow-up line.";

/// Everything the selector looks at for one participant
#[derive(Debug, Clone, Copy)]
pub struct QuestionContext<'a> {
    pub stats: &'a GroupStats,
    pub summary: &'a PreferenceSummary,
    pub answered: &'a BTreeSet<SignalKey>,
    pub time_of_day: Option<TimeOfDay>,
    pub venues: &'a [FilteredVenue],
}

/// Themes picked for one generation, plus what drove the pick
struct QuestionPlan {
    themes: Vec<&'static QuestionTheme>,
    factors: Vec<DifferentiatingFactor>,
}

/// Adaptive question selector
///
/// # Flow
/// 1. Cache lookup on (venue ids, answered keys, time bucket)
/// 2. Theme ranking from a venue sample and the time of day
/// 3. One structured LLM call for the phrasing
/// 4. Deterministic keyword fallback on any failure
///
/// Fallback sets are cached like generated ones.
pub struct QuestionSelector {
    llm: Arc<dyn LlmClient>,
    cache: Arc<TtlCache<QuestionCacheKey, QuestionSet>>,
    rng: Mutex<StdRng>,
    timeout: Duration,
    sample_size: usize,
    max_questions: usize,
}

impl QuestionSelector {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        cache: Arc<TtlCache<QuestionCacheKey, QuestionSet>>,
        settings: &QuestionSettings,
        timeout: Duration,
    ) -> Self {
        Self {
            llm,
            cache,
            rng: Mutex::new(StdRng::from_os_rng()),
            timeout,
            sample_size: settings.venue_sample_size.max(1),
            max_questions: settings.max_questions.clamp(1, 3),
        }
    }

    /// Replace the random source, e.g. with a seeded one
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn cache(&self) -> &Arc<TtlCache<QuestionCacheKey, QuestionSet>> {
        &self.cache
    }

    /// Return up to three questions for the context, from cache when possible
    ///
    /// The set is empty only when every signal key is already answered.
    pub async fn select(&self, ctx: &QuestionContext<'_>) -> QuestionSet {
        let key = QuestionCacheKey::new(
            ctx.venues.iter().map(|v| v.venue.id.as_str()),
            ctx.answered,
            ctx.time_of_day,
        );

        let (set, hit) = self
            .cache
            .get_or_insert_with(key.clone(), None, self.generate(ctx))
            .await;

        if hit {
            tracing::debug!("Question cache hit: {}", key);
        } else {
            tracing::debug!("Question cache miss: {}", key);
        }

        set
    }

    async fn generate(&self, ctx: &QuestionContext<'_>) -> QuestionSet {
        let themes = open_themes(ctx.answered);
        if themes.is_empty() {
            tracing::debug!("Every theme answered, using fallback questions");
            return self.fallback(ctx);
        }

        let plan = self.plan(ctx, &themes);

        match self.ask_llm(ctx, &plan).await {
            Ok(set) => {
                tracing::info!(
                    "Generated {} questions for themes {:?}",
                    set.questions.len(),
                    plan.themes.iter().map(|t| t.id).collect::<Vec<_>>()
                );
                set
            }
            Err(e) => {
                tracing::warn!("Question generation failed, using fallback: {}", e);
                self.fallback(ctx)
            }
        }
    }

    fn plan(&self, ctx: &QuestionContext<'_>, themes: &[&'static QuestionTheme]) -> QuestionPlan {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        let mut sample: Vec<&Venue> = ctx.venues.iter().map(|v| &v.venue).collect();
        sample.shuffle(&mut *rng);
        sample.truncate(self.sample_size);

        let factors = VenueSignals::detect(sample).differentiating_factors();
        let ranked = rank_themes(themes, &factors, ctx.time_of_day, &mut *rng);
        let mut picked = select_diverse(&ranked, self.max_questions);
        picked.shuffle(&mut *rng);

        QuestionPlan {
            themes: picked,
            factors,
        }
    }

    async fn ask_llm(
        &self,
        ctx: &QuestionContext<'_>,
        plan: &QuestionPlan,
    ) -> Result<QuestionSet, LlmError> {
        let payload = json!({
            "themes": plan.themes,
            "timeOfDay": ctx.time_of_day.map(|t| t.as_str()),
            "answeredSignals": ctx.answered.iter().map(SignalKey::as_str).collect::<Vec<_>>(),
            "differentiatingFactors": plan.factors.iter().map(DifferentiatingFactor::as_str).collect::<Vec<_>>(),
            "groupStats": ctx.stats,
            "preferences": ctx.summary,
            "candidateVenueCount": ctx.venues.len(),
            "maxQuestions": self.max_questions,
        });

        let generated: GeneratedQuestionSet = generate_structured(
            self.llm.as_ref(),
            "mood_questions",
            QUESTION_SYSTEM_PROMPT,
            payload,
            self.timeout,
        )
        .await?;

        let planned: BTreeSet<SignalKey> = plan.themes.iter().map(|t| t.signal_key.clone()).collect();
        let questions = validate_questions(
            generated.questions,
            &planned,
            ctx.answered,
            self.max_questions,
        );
        if questions.is_empty() {
            return Err(LlmError::InvalidSchema("no usable questions".to_string()));
        }

        Ok(QuestionSet {
            questions,
            follow_up: generated
                .follow_up
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty()),
            source: GenerationSource::Llm,
        })
    }

    fn fallback(&self, ctx: &QuestionContext<'_>) -> QuestionSet {
        let signals = VenueSignals::detect(ctx.venues.iter().map(|v| &v.venue));
        let questions = fallback_questions(&signals, ctx.answered, self.max_questions);
        let follow_up = if questions.is_empty() {
            completed_follow_up()
        } else {
            fallback_follow_up(ctx.venues.len())
        };

        QuestionSet {
            questions,
            follow_up: Some(follow_up),
            source: GenerationSource::Fallback,
        }
    }
}

/// Keep generated questions that are usable as-is
///
/// Drops keys outside the planned themes, answered or repeated keys and
/// blank prompts, then forces every question to exactly three options.
pub fn validate_questions(
    generated: Vec<GeneratedQuestion>,
    planned: &BTreeSet<SignalKey>,
    answered: &BTreeSet<SignalKey>,
    max: usize,
) -> Vec<MoodQuestion> {
    let mut seen: HashSet<SignalKey> = HashSet::new();

    generated
        .into_iter()
        .filter_map(|question| {
            let key = SignalKey::from(question.signal_key.as_str());
            let prompt = question.prompt.trim();
            if !planned.contains(&key) || answered.contains(&key) || prompt.is_empty() {
                return None;
            }
            if !seen.insert(key.clone()) {
                return None;
            }

            let id = match question.id.trim() {
                "" => format!("q_{}", key.as_str()),
                id => id.to_string(),
            };

            Some(MoodQuestion {
                id,
                prompt: prompt.to_string(),
                question_type: question.question_type,
                options: normalize_options(question.question_type, &question.options),
                signal_key: key,
            })
        })
        .take(max)
        .collect()
}
