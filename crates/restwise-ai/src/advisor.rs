use anyhow::Result;
use async_trait::async_trait;
use restwise_storage::{ActivitySample, BreakType, FatigueLevel, FatigueMetrics};
use serde::{Deserialize, Serialize};

use crate::ai_provider::{create_provider, AiProviderTrait};
use crate::config::AdvisorConfig;
use crate::error::AdvisorError;
use crate::parse::{parse_response, Parsed, Validate};
use crate::recommendation::{Recommendation, RecommendationPayload, UserProfile};

/// How soon the advisor thinks a break is needed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakUrgency {
    #[serde(alias = "immediate", alias = "IMMEDIATE")]
    Immediate,
    #[serde(alias = "soon", alias = "SOON")]
    Soon,
    #[serde(alias = "optional", alias = "OPTIONAL")]
    Optional,
    #[serde(alias = "none", alias = "NONE")]
    None,
}

impl BreakUrgency {
    /// Fold the urgency into a baseline fatigue score
    #[must_use]
    pub fn adjust_score(self, score: f64) -> f64 {
        match self {
            Self::Immediate => 0.9,
            Self::Soon => score.max(0.75),
            Self::Optional => score.max(0.5),
            Self::None => score,
        }
    }
}

/// Structured fatigue analysis returned by the advisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Insight {
    pub fatigue_level: FatigueLevel,
    pub break_urgency: BreakUrgency,
    /// Suggested break length in minutes
    pub break_duration: u32,
    pub break_type: BreakType,
    #[serde(default)]
    pub primary_factors: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl Validate for Insight {
    fn validate(&self) -> Result<(), String> {
        if !(1..=60).contains(&self.break_duration) {
            return Err(format!(
                "BREAK_DURATION {} outside 1..=60 minutes",
                self.break_duration
            ));
        }
        Ok(())
    }
}

/// Optional collaborator that enriches fatigue estimates and suggests activities.
///
/// Implementations report three outcomes: `Ok(Parsed::WellFormed)`, a
/// degraded `Ok(Parsed::PartiallyParsed | Parsed::Unusable)`, or an error when
/// the backend could not be reached at all.
#[async_trait]
pub trait AiAdvisor: Send + Sync {
    /// # Errors
    ///
    /// Returns `AdvisorError::Unavailable` when the backend cannot be reached.
    async fn analyze_fatigue(
        &self,
        sample: &ActivitySample,
        metrics: &FatigueMetrics,
    ) -> Result<Parsed<Insight>, AdvisorError>;

    /// # Errors
    ///
    /// Returns `AdvisorError::Unavailable` when the backend cannot be reached.
    async fn recommend(
        &self,
        profile: &UserProfile,
        recent: &[String],
    ) -> Result<Parsed<Recommendation>, AdvisorError>;
}

/// Advisor backed by a chat-completion provider
pub struct LlmAdvisor {
    provider: Box<dyn AiProviderTrait>,
}

impl LlmAdvisor {
    #[must_use]
    pub fn new(provider: Box<dyn AiProviderTrait>) -> Self {
        Self { provider }
    }

    /// Build an advisor from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be created (e.g. missing API key).
    pub fn from_config(config: &AdvisorConfig) -> Result<Self> {
        Ok(Self::new(create_provider(config)?))
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub async fn is_available(&self) -> bool {
        self.provider.is_available().await
    }

    async fn ask(&self, prompt: &str) -> Result<String, AdvisorError> {
        self.provider
            .generate(prompt)
            .await
            .map_err(|e| AdvisorError::Unavailable(format!("{e:#}")))
    }
}

#[async_trait]
impl AiAdvisor for LlmAdvisor {
    async fn analyze_fatigue(
        &self,
        sample: &ActivitySample,
        metrics: &FatigueMetrics,
    ) -> Result<Parsed<Insight>, AdvisorError> {
        let reply = self.ask(&build_fatigue_prompt(sample, metrics)).await?;
        Ok(parse_response::<Insight>(&reply))
    }

    async fn recommend(
        &self,
        profile: &UserProfile,
        recent: &[String],
    ) -> Result<Parsed<Recommendation>, AdvisorError> {
        let reply = self
            .ask(&build_recommendation_prompt(profile, recent))
            .await?;
        Ok(parse_response::<RecommendationPayload>(&reply)
            .map(RecommendationPayload::into_recommendation))
    }
}

fn build_fatigue_prompt(sample: &ActivitySample, metrics: &FatigueMetrics) -> String {
    format!(
        "You are a wellness expert analysing a computer user's work pattern.\n\
         \n\
         CURRENT USER METRICS:\n\
         - Mouse clicks: {clicks}\n\
         - Key presses: {keys}\n\
         - Idle time: {idle:.0} seconds\n\
         - Activity level: {activity:.0}%\n\
         - Fatigue score: {score:.2} (0-1, baseline estimate)\n\
         - Eye strain: {eye:.0}/100\n\
         - Posture score: {posture:.2} (0-1)\n\
         - Blink rate: {blink:.1} per minute\n\
         - Trend: {trend:?}\n\
         \n\
         Return a JSON object with exactly these keys:\n\
         FATIGUE_LEVEL: one of Low, Moderate, High, Critical\n\
         BREAK_URGENCY: one of Immediate, Soon, Optional, None\n\
         BREAK_DURATION: integer minutes between 3 and 10\n\
         BREAK_TYPE: one of Micro, Regular, Long\n\
         PRIMARY_FACTORS: list of the top two factors causing fatigue\n\
         RECOMMENDATIONS: list of one or two actionable suggestions\n\
         Do not include markdown formatting.",
        clicks = sample.mouse_clicks,
        keys = sample.key_presses,
        idle = sample.idle_seconds,
        activity = sample.activity_level,
        score = metrics.fatigue_score,
        eye = metrics.eye_strain_level,
        posture = metrics.posture_score,
        blink = metrics.blink_rate,
        trend = metrics.trend,
    )
}

fn build_recommendation_prompt(profile: &UserProfile, recent: &[String]) -> String {
    let recent = if recent.is_empty() {
        "none yet".to_string()
    } else {
        recent.join(", ")
    };
    let preferences = if profile.preferred_categories.is_empty() {
        "general".to_string()
    } else {
        profile.preferred_categories.join(", ")
    };

    format!(
        "You are a wellness expert recommending one break activity.\n\
         \n\
         CURRENT STATE:\n\
         - Fatigue level: {level}\n\
         - Time available: {minutes} minutes\n\
         - Recent activities: {recent}\n\
         - Preferences: {preferences}\n\
         \n\
         Pick an activity that was not done recently, fits in the available time \
         and matches the fatigue level.\n\
         Return a JSON object with exactly these keys:\n\
         ACTIVITY, REASON, DURATION_MIN (integer minutes), DURATION_MAX (integer minutes), \
         BENEFITS, STEPS (list of 2-4 short steps), INTENSITY (Low, Medium or High), \
         EFFECTIVENESS_SCORE (integer 0-100).\n\
         Do not include markdown formatting.",
        level = profile.fatigue_level,
        minutes = profile.available_minutes,
    )
}
