//! Break-activity recommendations.
//!
//! The [`Recommender`] asks the advisor first and falls back to a curated
//! catalog, remembering what it suggested so consecutive breaks vary.

mod catalog;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use restwise_storage::FatigueLevel;
use serde::{Deserialize, Serialize};

use crate::advisor::AiAdvisor;
use crate::error::AdvisorError;
use crate::parse::{Parsed, Validate};

pub use catalog::fallback_recommendation;

/// Number of past suggestions kept
pub const HISTORY_CAPACITY: usize = 20;
/// Number of most recent suggestions a new one should differ from
pub const AVOID_RECENT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationSource {
    Advisor,
    #[default]
    Catalog,
}

/// Who the recommendation is for and how much time they have
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub fatigue_level: FatigueLevel,
    pub available_minutes: u32,
    /// Catalog categories to favour (e.g. "stretching", "breathing")
    pub preferred_categories: Vec<String>,
}

impl UserProfile {
    #[must_use]
    pub fn new(fatigue_level: FatigueLevel, available_minutes: u32) -> Self {
        Self {
            fatigue_level,
            available_minutes,
            preferred_categories: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub activity: String,
    pub category: String,
    pub reason: String,
    pub duration_min: u32,
    pub duration_max: u32,
    pub benefits: String,
    pub steps: Vec<String>,
    pub intensity: String,
    /// Expected effectiveness, 0-100
    pub effectiveness: u8,
    pub source: RecommendationSource,
}

/// Wire shape of an advisor recommendation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) struct RecommendationPayload {
    activity: String,
    #[serde(default)]
    reason: String,
    duration_min: u32,
    duration_max: u32,
    #[serde(default)]
    benefits: String,
    #[serde(default)]
    steps: Steps,
    #[serde(default = "default_intensity")]
    intensity: String,
    #[serde(default = "default_effectiveness")]
    effectiveness_score: u8,
}

/// Models return steps either as a list or as one numbered block of text
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Steps {
    List(Vec<String>),
    Text(String),
}

impl Default for Steps {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl Steps {
    fn into_lines(self) -> Vec<String> {
        let lines = match self {
            Self::List(items) => items,
            Self::Text(text) => text.lines().map(str::to_string).collect(),
        };
        lines
            .iter()
            .map(|line| {
                line.trim()
                    .trim_start_matches(|c: char| c.is_ascii_digit())
                    .trim_start_matches(['.', ')'])
                    .trim()
                    .to_string()
            })
            .filter(|line| !line.is_empty())
            .collect()
    }
}

fn default_intensity() -> String {
    "Low".to_string()
}

const fn default_effectiveness() -> u8 {
    75
}

impl Validate for RecommendationPayload {
    fn validate(&self) -> Result<(), String> {
        if self.activity.trim().is_empty() {
            return Err("ACTIVITY is empty".to_string());
        }
        if self.duration_min == 0 || self.duration_min > self.duration_max {
            return Err(format!(
                "invalid duration range {}..{}",
                self.duration_min, self.duration_max
            ));
        }
        if self.duration_max > 60 {
            return Err(format!("DURATION_MAX {} exceeds an hour", self.duration_max));
        }
        if self.effectiveness_score > 100 {
            return Err(format!(
                "EFFECTIVENESS_SCORE {} above 100",
                self.effectiveness_score
            ));
        }
        Ok(())
    }
}

impl RecommendationPayload {
    pub(crate) fn into_recommendation(self) -> Recommendation {
        Recommendation {
            activity: self.activity.trim().to_string(),
            category: "advisor".to_string(),
            reason: self.reason,
            duration_min: self.duration_min,
            duration_max: self.duration_max,
            benefits: self.benefits,
            steps: self.steps.into_lines(),
            intensity: self.intensity,
            effectiveness: self.effectiveness_score,
            source: RecommendationSource::Advisor,
        }
    }
}

/// Chooses break activities, preferring the advisor and varying suggestions
pub struct Recommender {
    advisor: Option<Arc<dyn AiAdvisor>>,
    timeout: Duration,
    history: Mutex<VecDeque<String>>,
}

impl Recommender {
    #[must_use]
    pub fn new(advisor: Option<Arc<dyn AiAdvisor>>, timeout: Duration) -> Self {
        Self {
            advisor,
            timeout,
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
        }
    }

    /// Suggest an activity. Never fails: any advisor problem falls back to the catalog.
    pub async fn recommend(&self, profile: &UserProfile) -> Recommendation {
        let recent = self.recent();

        if let Some(advisor) = &self.advisor {
            let outcome =
                match tokio::time::timeout(self.timeout, advisor.recommend(profile, &recent)).await
                {
                    Ok(result) => result.and_then(Parsed::into_result),
                    Err(_) => Err(AdvisorError::Timeout(self.timeout)),
                };
            match outcome {
                Ok(recommendation) => {
                    self.remember(&recommendation.activity);
                    return recommendation;
                }
                Err(e) => log::warn!("Advisor recommendation failed, using catalog: {e}"),
            }
        }

        let recommendation = fallback_recommendation(profile, &recent);
        self.remember(&recommendation.activity);
        recommendation
    }

    /// Past suggestions, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.history.lock().iter().cloned().collect()
    }

    fn recent(&self) -> Vec<String> {
        let history = self.history.lock();
        let skip = history.len().saturating_sub(AVOID_RECENT);
        history.iter().skip(skip).cloned().collect()
    }

    fn remember(&self, activity: &str) {
        let mut history = self.history.lock();
        if history.len() == HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(activity.to_string());
    }
}
