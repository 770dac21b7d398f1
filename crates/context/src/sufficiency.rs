//! Sufficiency Assessor - Decides whether primary evidence answers a query
//!
//! Two signals are produced here and combined by the orchestrator:
//! - the `INSUFFICIENT` sentinel a draft may carry
//! - a structured judgment from a separate generation call

use quro_common::errors::Result;
use quro_common::llm::{GenerationOptions, Generator};
use quro_common::metrics;
use quro_common::models::EvidenceChunk;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Prefix drafts use to flag incomplete coverage
pub const INSUFFICIENT_SENTINEL: &str = "INSUFFICIENT";

/// Chunks included in a corpus evidence preview
const PREVIEW_CHUNKS: usize = 3;

/// Characters kept per previewed chunk
const PREVIEW_CHARS: usize = 200;

/// Whether a draft flags itself as insufficient
pub fn is_self_flagged(draft: &str) -> bool {
    draft.contains(INSUFFICIENT_SENTINEL)
}

/// Evidence preview for corpus judgments: first chunks, truncated, one per line
pub fn corpus_preview(chunks: &[EvidenceChunk]) -> String {
    chunks
        .iter()
        .take(PREVIEW_CHUNKS)
        .map(|c| c.text.chars().take(PREVIEW_CHARS).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Judge confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    #[default]
    Low,
}

/// Read any casing; null, non-strings and unknown labels become `Low`
impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let label = value.as_str().map(|s| s.trim().to_ascii_lowercase());
        Ok(match label.as_deref() {
            Some("high") => Confidence::High,
            Some("medium") => Confidence::Medium,
            _ => Confidence::Low,
        })
    }
}

/// Null reasoning reads as empty
fn lenient_reasoning<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Structured sufficiency verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    #[serde(default = "default_sufficient")]
    pub is_sufficient: bool,

    #[serde(default, deserialize_with = "lenient_reasoning")]
    pub reasoning: String,

    #[serde(default)]
    pub confidence: Confidence,
}

fn default_sufficient() -> bool {
    true
}

impl Judgment {
    /// Permissive verdict used when the judge output is unusable
    pub fn fail_open() -> Self {
        Self {
            is_sufficient: true,
            reasoning: "Parse error".to_string(),
            confidence: Confidence::Low,
        }
    }
}

/// Why a judge reply could not be read
#[derive(Debug, Error)]
pub enum JudgmentParseError {
    #[error("judgment output contains no JSON object")]
    MissingObject,

    #[error("judgment JSON is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Result of reading a judge reply
#[derive(Debug)]
pub enum JudgmentOutcome {
    Parsed(Judgment),
    Defaulted {
        error: JudgmentParseError,
        judgment: Judgment,
    },
}

impl JudgmentOutcome {
    pub fn judgment(&self) -> &Judgment {
        match self {
            JudgmentOutcome::Parsed(judgment) => judgment,
            JudgmentOutcome::Defaulted { judgment, .. } => judgment,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, JudgmentOutcome::Defaulted { .. })
    }
}

/// Parse a judge reply, tolerating prose or code fences around the object
pub fn parse_judgment(raw: &str) -> JudgmentOutcome {
    let parsed = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end > start => {
            serde_json::from_str::<Judgment>(&raw[start..=end]).map_err(JudgmentParseError::from)
        }
        _ => Err(JudgmentParseError::MissingObject),
    };

    match parsed {
        Ok(judgment) => JudgmentOutcome::Parsed(judgment),
        Err(error) => {
            warn!(error = %error, "Failed to parse sufficiency judgment, assuming sufficient");
            metrics::record_judgment_parse_failure();
            JudgmentOutcome::Defaulted {
                error,
                judgment: Judgment::fail_open(),
            }
        }
    }
}

/// Reason an answer escalated to external search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationReason {
    /// The judge found the draft insufficient
    JudgedInsufficient,
    /// The corpus evidence scored below the trust threshold
    LowRelevance,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationReason::JudgedInsufficient => "judged_insufficient",
            EscalationReason::LowRelevance => "low_relevance",
        }
    }
}

/// Corpus rule: escalate when judged insufficient or the average score is
/// below `threshold`
pub fn corpus_escalation(judgment: &Judgment, avg_score: f32, threshold: f32) -> Option<EscalationReason> {
    if !judgment.is_sufficient {
        Some(EscalationReason::JudgedInsufficient)
    } else if avg_score < threshold {
        Some(EscalationReason::LowRelevance)
    } else {
        None
    }
}

/// Document rule: escalate only when judged insufficient
pub fn document_escalation(judgment: &Judgment) -> Option<EscalationReason> {
    (!judgment.is_sufficient).then_some(EscalationReason::JudgedInsufficient)
}

/// Runs the secondary judgment call
pub struct SufficiencyAssessor {
    generator: Arc<dyn Generator>,
}

impl SufficiencyAssessor {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Judge whether `draft` answers `query` given the evidence preview.
    ///
    /// Malformed judge output defaults to sufficient; only a generator
    /// transport failure is an error.
    pub async fn assess(&self, query: &str, evidence_preview: &str, draft: &str) -> Result<JudgmentOutcome> {
        let prompt = Self::build_prompt(query, evidence_preview, draft);
        let raw = self
            .generator
            .generate(&prompt, &GenerationOptions::json("judgment", 0.1))
            .await?;

        let outcome = parse_judgment(&raw);
        let judgment = outcome.judgment();
        info!(
            is_sufficient = judgment.is_sufficient,
            confidence = ?judgment.confidence,
            reasoning = %judgment.reasoning,
            self_flagged = is_self_flagged(draft),
            "Sufficiency assessed"
        );
        Ok(outcome)
    }

    fn build_prompt(query: &str, evidence_preview: &str, draft: &str) -> String {
        format!(
            r#"Analyze if the provided context provides SUFFICIENT information to fully answer the user's query.

User Query: {query}

Context Preview:
{preview}...

Generated Answer:
{draft}

Evaluation Criteria:
- If answer is comprehensive and directly addresses the query → SUFFICIENT
- If answer explicitly states "{sentinel}" or information is missing → INSUFFICIENT
- If context contains relevant information but answer is vague → SUFFICIENT

Respond in JSON:
{{
  "is_sufficient": true/false,
  "reasoning": "brief explanation",
  "confidence": "high|medium|low"
}}"#,
            query = query,
            preview = evidence_preview,
            draft = draft,
            sentinel = INSUFFICIENT_SENTINEL,
        )
    }
}
