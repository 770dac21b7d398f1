//! Query Rewriter - Expands context-dependent follow-up questions
//!
//! A query like "tell me more about it" cannot be retrieved against on its
//! own; when it contains an anaphora or continuation marker and there is
//! history to draw from, one generation call rewrites it into a standalone
//! question.

use crate::conversation::NO_PRIOR_CONVERSATION;
use quro_common::errors::Result;
use quro_common::llm::{GenerationOptions, Generator};
use std::sync::Arc;
use tracing::{debug, info};

/// Anaphora and continuation markers, lowercase, matched on word boundaries
const CONTEXT_MARKERS: &[&str] = &[
    "it",
    "this",
    "that",
    "tell me more",
    "what about",
    "how about",
    "explain",
    "elaborate",
    "continue",
    "go on",
    "more details",
    "what else",
    "anything else",
];

/// Lowercase alphanumeric tokens of `text`
fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether the query leans on prior conversation
pub fn is_context_dependent(query: &str) -> bool {
    let words = tokens(query);
    CONTEXT_MARKERS.iter().any(|marker| {
        let marker: Vec<&str> = marker.split_whitespace().collect();
        words
            .windows(marker.len())
            .any(|window| window.iter().zip(&marker).all(|(w, m)| w == m))
    })
}

/// Rewrites vague queries into standalone form
pub struct QueryRewriter {
    generator: Arc<dyn Generator>,
}

impl QueryRewriter {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Expand `query` using the rendered conversation context.
    ///
    /// Returns the query unchanged when it has no marker or there is no
    /// history. A generator transport failure is returned to the caller.
    pub async fn expand(&self, query: &str, conversation_context: &str) -> Result<String> {
        let context = conversation_context.trim();
        if context.is_empty() || context == NO_PRIOR_CONVERSATION || !is_context_dependent(query) {
            return Ok(query.to_string());
        }

        let prompt = Self::build_prompt(query, conversation_context);
        let options = GenerationOptions::text("rewrite", 0.2, 100);
        let output = self.generator.generate(&prompt, &options).await?;

        let expanded = output.trim();
        if expanded.is_empty() {
            debug!("Rewrite returned empty output, keeping original query");
            return Ok(query.to_string());
        }

        info!(original = %query, expanded = %expanded, "Query expanded with conversation context");
        Ok(expanded.to_string())
    }

    fn build_prompt(query: &str, conversation_context: &str) -> String {
        format!(
            r#"Given the conversation history, rewrite the user's current query to be a complete, standalone question that includes the necessary context.

{history}

Current Query: {query}

Instructions:
- If the query references "it", "this", "that", replace with the actual topic from conversation
- Make the query complete and searchable without needing conversation history
- Keep the query concise (1-2 sentences max)
- Preserve the user's intent and question type

Respond with ONLY the expanded query, no explanations.

Expanded Query:"#,
            history = conversation_context,
            query = query,
        )
    }
}
