//! Enrichment of raw user input before prompt construction.
//!
//! The fetcher never fails: any error raised while enriching is folded into
//! the returned `EnrichedInput` with `fallback = true`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::category::{details_for, CategoryDetails};
use crate::error::CommonError;
use crate::identifier::{extract_id, ExtractedId, IdKind};

const WOWHEAD_MARKER: &str = "wowhead.com";
const WOWHEAD_BASE: &str = "https://www.wowhead.com";
const BATTLE_NET_REGIONS: [&str; 4] = ["us", "eu", "kr", "tw"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    WowheadUrl,
    FreeText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailLinks {
    pub main: String,
    pub comments: String,
    pub guides: String,
    pub item_id: u64,
}

impl DetailLinks {
    fn for_id(extracted: ExtractedId) -> Self {
        let main = format!("{WOWHEAD_BASE}/{}={}", extracted.kind.segment(), extracted.id);
        Self {
            comments: format!("{main}#comments"),
            guides: format!("{main}#guides"),
            main,
            item_id: extracted.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentSummary {
    pub has_item_id: bool,
    pub has_wowhead_data: bool,
    pub can_generate_guide: bool,
    pub recommended_action: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedInput {
    pub original_input: String,
    /// Category tag as supplied by the caller, recognized or not.
    pub category: String,
    pub extracted_id: Option<u64>,
    pub id_kind: Option<IdKind>,
    pub source_kind: SourceKind,
    pub data_available: bool,
    pub detail_links: Option<DetailLinks>,
    pub secondary: Option<serde_json::Value>,
    pub type_details: &'static CategoryDetails,
    pub summary: EnrichmentSummary,
    pub timestamp: DateTime<Utc>,
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EnrichedInput {
    fn new(raw_input: &str, category: &str) -> Self {
        Self {
            original_input: raw_input.to_string(),
            category: category.to_string(),
            extracted_id: None,
            id_kind: None,
            source_kind: SourceKind::FreeText,
            data_available: false,
            detail_links: None,
            secondary: None,
            type_details: details_for(category),
            summary: summarize(None),
            timestamp: Utc::now(),
            fallback: false,
            error: None,
        }
    }

    /// Text handed to the prompt builder: the user's input, annotated with
    /// the identifier and canonical link when one was extracted.
    pub fn prompt_subject(&self) -> String {
        let input = self.original_input.trim();
        match (&self.detail_links, self.id_kind) {
            (Some(links), Some(kind)) => format!(
                "{input} (Wowhead {} ID: {}, {})",
                kind.segment(),
                links.item_id,
                links.main
            ),
            _ => input.to_string(),
        }
    }
}

fn summarize(extracted: Option<ExtractedId>) -> EnrichmentSummary {
    EnrichmentSummary {
        has_item_id: extracted.is_some(),
        has_wowhead_data: extracted.is_some(),
        can_generate_guide: true,
        recommended_action: match extracted {
            Some(_) => "Can fetch detailed data from Wowhead".to_string(),
            None => "Will use AI search to find item".to_string(),
        },
    }
}

/// Credentials for the Battle.net game-data API.
#[derive(Clone)]
pub struct BattleNetCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub region: String,
}

impl BattleNetCredentials {
    /// Optional:
    /// - `BLIZZARD_CLIENT_ID` and `BLIZZARD_CLIENT_SECRET` (both required to enable)
    /// - `BLIZZARD_REGION` (default: "eu")
    pub fn from_env() -> Option<Self> {
        let client_id = non_empty_var("BLIZZARD_CLIENT_ID")?;
        let client_secret = non_empty_var("BLIZZARD_CLIENT_SECRET")?;
        let region = non_empty_var("BLIZZARD_REGION").unwrap_or_else(|| "eu".to_string());
        Some(Self {
            client_id,
            client_secret,
            region,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Secondary, credential-gated data source.
#[derive(Clone)]
pub struct BattleNetSource {
    credentials: BattleNetCredentials,
}

impl BattleNetSource {
    pub fn new(credentials: BattleNetCredentials) -> Self {
        Self { credentials }
    }

    /// Look up game data for an identifier. Currently always yields nothing.
    pub async fn lookup(
        &self,
        extracted: ExtractedId,
    ) -> Result<Option<serde_json::Value>, CommonError> {
        let region = self.credentials.region.to_ascii_lowercase();
        if !BATTLE_NET_REGIONS.contains(&region.as_str()) {
            return Err(CommonError::SecondarySource(format!(
                "unsupported Battle.net region: {}",
                self.credentials.region
            )));
        }
        // TODO: client-credentials token from https://oauth.battle.net/token, then
        // GET https://{region}.api.blizzard.com/data/wow/item/{id} with namespace static-{region}.
        debug!(
            region = %region,
            id = extracted.id,
            client_id_len = self.credentials.client_id.len(),
            "battle.net lookup not available, skipping"
        );
        Ok(None)
    }
}

/// Builds `EnrichedInput` from raw user input.
#[derive(Clone, Default)]
pub struct ItemDataFetcher {
    secondary: Option<BattleNetSource>,
}

impl ItemDataFetcher {
    pub fn new(secondary: Option<BattleNetSource>) -> Self {
        Self { secondary }
    }

    pub fn from_env() -> Self {
        Self::new(BattleNetCredentials::from_env().map(BattleNetSource::new))
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }

    pub async fn fetch(&self, raw_input: &str, category: &str) -> EnrichedInput {
        let mut result = EnrichedInput::new(raw_input, category);
        if let Err(e) = self.enrich(&mut result).await {
            warn!(error = %e, input = raw_input, "enrichment failed, returning fallback result");
            result.fallback = true;
            result.error = Some(e.to_string());
        }
        result
    }

    async fn enrich(&self, result: &mut EnrichedInput) -> Result<(), CommonError> {
        let extracted = if contains_marker(&result.original_input) {
            extract_id(&result.original_input)
        } else {
            None
        };

        match extracted {
            Some(id) => {
                result.extracted_id = Some(id.id);
                result.id_kind = Some(id.kind);
                result.source_kind = SourceKind::WowheadUrl;
                result.data_available = true;
                result.detail_links = Some(DetailLinks::for_id(id));
            }
            None => {
                result.source_kind = SourceKind::FreeText;
                result.data_available = false;
            }
        }
        result.summary = summarize(extracted);

        if let (Some(id), Some(source)) = (extracted, &self.secondary) {
            result.secondary = source.lookup(id).await?;
        }
        Ok(())
    }
}

fn contains_marker(input: &str) -> bool {
    input.to_ascii_lowercase().contains(WOWHEAD_MARKER)
}
