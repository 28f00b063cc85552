use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tally_core::TransactionCandidate;

use crate::parsing::{parse_judgment, parse_selection};
use crate::types::{CategorizationJudgment, PatternSummary, StageOneSelection};
use crate::{AiError, JudgmentService};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
/// Low sampling temperature: we want the same transaction to categorize the
/// same way twice.
const TEMPERATURE: f32 = 0.1;

/// HTTP backend speaking an Ollama-style `/api/generate` API.
#[derive(Clone)]
pub struct GenerativeBackend {
    http_client: Client,
    base_url: String,
    model: String,
}

impl GenerativeBackend {
    pub fn new(base_url: &str, model: &str) -> Result<Self, AiError> {
        Self::with_timeout(base_url, model, DEFAULT_TIMEOUT)
    }

    /// Fails when the HTTP client cannot be built (TLS backend init); a
    /// client without its timeout bound is worse than no client.
    pub fn with_timeout(base_url: &str, model: &str, timeout: Duration) -> Result<Self, AiError> {
        Ok(Self {
            http_client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    /// Reads `TALLY_AI_HOST` and `TALLY_AI_MODEL`. Returns `None` when no
    /// host is configured or the client cannot be built — the engine then
    /// runs purely deterministically.
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("TALLY_AI_HOST").ok()?;
        let model = std::env::var("TALLY_AI_MODEL").unwrap_or_else(|_| "llama3.2".to_string());
        match Self::new(&host, &model) {
            Ok(backend) => Some(backend),
            Err(err) => {
                tracing::warn!(%err, "service client unavailable, categorizing deterministically");
                None
            }
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: String) -> Result<String, AiError> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt,
            stream: false,
            options: GenerateOptions { temperature: TEMPERATURE },
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AiError::Status(response.status().as_u16()));
        }

        let body: GenerateResponse = response.json().await?;
        if body.response.trim().is_empty() {
            return Err(AiError::Empty);
        }
        debug!(model = %self.model, "service response: {}", body.response);
        Ok(body.response)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

fn transaction_block(tx: &TransactionCandidate) -> String {
    let mut block = format!(
        "Transaction:\n  description: {}\n  vendor: {}\n  amount_cents: {}\n",
        tx.description, tx.vendor, tx.amount_cents
    );
    if let Some(pm) = &tx.ocr_payment_method {
        block.push_str(&format!("  ocr_payment_method: {pm}\n"));
    }
    for item in &tx.line_items {
        block.push_str(&format!(
            "  line_item: {} ({})\n",
            item.description,
            item.amount_cents
                .map(|c| c.to_string())
                .unwrap_or_else(|| "?".to_string())
        ));
    }
    block
}

fn summary_block(summary: &PatternSummary) -> String {
    // Summaries are plain serializable structs; failure here means a bug,
    // and an empty object degrades to "no learned context".
    serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string())
}

#[async_trait::async_trait]
impl JudgmentService for GenerativeBackend {
    async fn select_patterns(
        &self,
        tx: &TransactionCandidate,
        summary: &PatternSummary,
    ) -> Result<StageOneSelection, AiError> {
        let prompt = format!(
            "You are reviewing learned bookkeeping patterns for relevance to one transaction.\n\
             {}\nLearned patterns and detected indicators:\n{}\n\n\
             Decide: (a) should the vendor pattern be trusted for this transaction, \
             (b) which indicator tags are relevant, (c) which pattern identifiers apply.\n\
             Do not invent categories. Respond with JSON only:\n\
             {{\"trustVendorPattern\": bool, \"relevantIndicators\": [..], \
             \"applicablePatterns\": [..], \"reasoning\": \"..\"}}",
            transaction_block(tx),
            summary_block(summary),
        );
        let response = self.generate(prompt).await?;
        parse_selection(&response)
    }

    async fn categorize(
        &self,
        tx: &TransactionCandidate,
        summary: &PatternSummary,
        rules: &str,
    ) -> Result<CategorizationJudgment, AiError> {
        let prompt = format!(
            "Categorize this small-business transaction.\n{}\n\
             Learned patterns and detected indicators:\n{}\n\n\
             Apply these decision priorities, highest first:\n{}\n\n\
             Respond with JSON only:\n\
             {{\"type\": \"income\"|\"expense\", \"category\": \"..\", \"confidence\": 0.0-1.0, \
             \"paymentMethod\": \"..\"?, \"incomeSource\": \"..\"?, \
             \"appliedPatterns\": [..], \"reasoning\": \"..\"}}",
            transaction_block(tx),
            summary_block(summary),
            rules,
        );
        let response = self.generate(prompt).await?;
        parse_judgment(&response)
    }
}
