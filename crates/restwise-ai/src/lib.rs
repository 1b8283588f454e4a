pub mod advisor;
pub mod ai_provider;
pub mod config;
pub mod error;
pub mod parse;
pub mod providers;
pub mod recommendation;

pub use advisor::{AiAdvisor, BreakUrgency, Insight, LlmAdvisor};
pub use ai_provider::{create_provider, AiProviderTrait};
pub use config::{AdvisorConfig, ProviderKind};
pub use error::AdvisorError;
pub use parse::{parse_response, Parsed, PartialFields, Validate};
pub use recommendation::{
    fallback_recommendation, Recommendation, RecommendationSource, Recommender, UserProfile,
};
