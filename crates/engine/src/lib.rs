//! Two-stage transaction categorization.
//!
//! Stage 1 ([`PatternMatcher`]) collects deterministic evidence: learned
//! patterns from the store plus text indicators. Stage 2 ([`DecisionEngine`])
//! turns that evidence into a [`CategorizationResult`], bypassing the
//! generative service entirely when the evidence is strong and falling back
//! to the deterministic priority tree whenever the service fails. The engine
//! never returns an error to the caller.

pub mod decision;
pub mod matcher;
pub mod signals;

use tally_ai::JudgmentService;
use tally_core::{CategorizationResult, TransactionCandidate};
use tally_patterns::PatternStore;
use tracing::debug;

pub use decision::{DecisionEngine, EngineConfig};
pub use matcher::{PatternMatchOutcome, PatternMatcher};
pub use signals::DetectedSignals;

/// Both stages behind one call.
pub struct Categorizer<'a> {
    store: &'a PatternStore,
    judge: Option<&'a dyn JudgmentService>,
    config: EngineConfig,
}

impl<'a> Categorizer<'a> {
    pub fn new(store: &'a PatternStore, judge: Option<&'a dyn JudgmentService>) -> Self {
        Self::with_config(store, judge, EngineConfig::default())
    }

    pub fn with_config(
        store: &'a PatternStore,
        judge: Option<&'a dyn JudgmentService>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            judge,
            config,
        }
    }

    pub async fn categorize(&self, tx: &TransactionCandidate) -> CategorizationResult {
        let matcher = PatternMatcher::new(self.store, self.judge, self.config.service_timeout);
        let outcome = matcher.run(tx).await;
        let result = DecisionEngine::new(self.config)
            .decide(tx, &outcome, self.judge)
            .await;
        debug!(
            vendor = %tx.vendor,
            category = %result.category,
            confidence = result.confidence,
            patterns = ?result.applied_patterns,
            "categorized transaction"
        );
        result
    }
}
