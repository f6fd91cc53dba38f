use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use guide_core::category::Category;
use guide_core::completion::{CompletionClient, GenerationParams};
use guide_core::enrich::{EnrichedInput, ItemDataFetcher};
use guide_core::format::format_guide;
use guide_core::prompt::build_prompt;

use crate::error::GuideError;
use crate::rate_limit::RateLimiter;

/// Low temperature and a focused nucleus keep the step lists consistent.
pub const GENERATION_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.3,
    top_p: 0.9,
    max_tokens: 1024,
};

/// A validated guide request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideRequest {
    pub category: Category,
    pub raw_input: String,
}

#[derive(Debug, Serialize)]
pub struct GuideResult {
    #[serde(rename = "type")]
    pub category: Category,
    #[serde(rename = "input")]
    pub raw_input: String,
    #[serde(rename = "guide")]
    pub guide_text: String,
    pub steps: Vec<String>,
    pub metadata: GuideMetadata,
}

#[derive(Debug, Serialize)]
pub struct GuideMetadata {
    #[serde(rename = "itemData")]
    pub enrichment: EnrichedInput,
    pub timestamp: DateTime<Utc>,
    pub model: String,
}

#[derive(Clone)]
pub struct GuideService {
    completion: Arc<CompletionClient>,
    fetcher: ItemDataFetcher,
    language: String,
    limiter: Option<RateLimiter>,
}

impl GuideService {
    pub fn new(
        completion: Arc<CompletionClient>,
        fetcher: ItemDataFetcher,
        language: impl Into<String>,
        limiter: Option<RateLimiter>,
    ) -> Self {
        Self {
            completion,
            fetcher,
            language: language.into(),
            limiter,
        }
    }

    pub fn model(&self) -> &str {
        self.completion.model()
    }

    /// Check the raw request fields. Blank values count as missing.
    pub fn validate(category: Option<&str>, input: Option<&str>) -> Result<GuideRequest, GuideError> {
        let category = category.map(str::trim).filter(|s| !s.is_empty());
        let input = input.map(str::trim).filter(|s| !s.is_empty());
        let (Some(category), Some(input)) = (category, input) else {
            return Err(GuideError::MissingFields);
        };
        let category = category
            .parse::<Category>()
            .map_err(|e| GuideError::InvalidCategory(e.0))?;
        Ok(GuideRequest {
            category,
            raw_input: input.to_string(),
        })
    }

    pub async fn generate(&self, request: GuideRequest) -> Result<GuideResult, GuideError> {
        if let Some(limiter) = &self.limiter {
            limiter.check().await.map_err(|wait| {
                warn!(rps = limiter.rps(), "guide request rate limited");
                GuideError::RateLimited {
                    retry_after_ms: wait.as_millis(),
                }
            })?;
        }

        let enrichment = self
            .fetcher
            .fetch(&request.raw_input, request.category.as_str())
            .await;
        let prompt = build_prompt(&enrichment.prompt_subject(), request.category, &self.language);

        info!(
            category = %request.category,
            source_kind = ?enrichment.source_kind,
            item_id = enrichment.extracted_id,
            "requesting guide"
        );
        let guide_text = self.completion.complete(&prompt, GENERATION_PARAMS).await?;
        let steps = format_guide(&guide_text).steps;

        Ok(GuideResult {
            category: request.category,
            raw_input: request.raw_input,
            guide_text,
            steps,
            metadata: GuideMetadata {
                enrichment,
                timestamp: Utc::now(),
                model: self.completion.model().to_string(),
            },
        })
    }

    /// Enrichment without a model call. Unknown or missing types fall back
    /// to mount metadata.
    pub async fn preview(&self, input: &str, category: Option<&str>) -> EnrichedInput {
        let category = category
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(Category::Mount.as_str());
        self.fetcher.fetch(input.trim(), category).await
    }
}
