//! Stage 1: gather deterministic evidence, then optionally let the service
//! annotate it.
//!
//! The service's selection is advisory only. It may mark findings as
//! irrelevant or add reasoning, but the deterministic findings themselves are
//! carried forward untouched so Stage 2 always sees the full evidence.

use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use tally_ai::{
    CategoryPatternSummary, JudgmentService, PatternSummary, PaymentPatternSummary,
    StageOneSelection, VendorPatternSummary,
};
use tally_core::TransactionCandidate;
use tally_patterns::{CategoryPattern, PatternStore, PaymentPattern, VendorPattern};

use crate::signals::DetectedSignals;

/// Everything Stage 1 hands to the decision engine.
#[derive(Debug, Clone)]
pub struct PatternMatchOutcome {
    pub vendor: Option<VendorPattern>,
    /// Strongest first, per the store's ordering.
    pub category_patterns: Vec<CategoryPattern>,
    pub payment_pattern: Option<PaymentPattern>,
    pub signals: DetectedSignals,
    /// The service's advisory take, when it responded in time.
    pub advisory: Option<StageOneSelection>,
    pub reasoning: String,
}

impl PatternMatchOutcome {
    /// Learned conclusions and indicator tags only. Raw correction records
    /// never cross this boundary.
    pub fn summary(&self) -> PatternSummary {
        PatternSummary {
            vendor: self.vendor.as_ref().map(|v| VendorPatternSummary {
                vendor: v.display_name.clone(),
                category: v.category.clone(),
                transaction_type: v.transaction_type.map(|t| t.to_string()),
                payment_method: v.payment_method.as_ref().map(|m| m.to_string()),
                confidence: v.confidence,
                corrections: v.corrections,
            }),
            category_patterns: self
                .category_patterns
                .iter()
                .map(|p| CategoryPatternSummary {
                    from_category: p.from_category.clone(),
                    to_category: p.to_category.clone(),
                    occurrences: p.occurrences,
                    confidence: p.confidence,
                })
                .collect(),
            payment: self.payment_pattern.as_ref().map(|p| PaymentPatternSummary {
                vendor: p.vendor.clone(),
                payment_method: p.payment_method.to_string(),
                confidence: p.confidence,
            }),
            indicators: self.signals.indicator_tags(),
        }
    }
}

/// Runs the deterministic lookups and, when a service is configured, one
/// bounded advisory call.
pub struct PatternMatcher<'a> {
    store: &'a PatternStore,
    judge: Option<&'a dyn JudgmentService>,
    service_timeout: Duration,
}

impl<'a> PatternMatcher<'a> {
    pub fn new(
        store: &'a PatternStore,
        judge: Option<&'a dyn JudgmentService>,
        service_timeout: Duration,
    ) -> Self {
        Self {
            store,
            judge,
            service_timeout,
        }
    }

    pub async fn run(&self, tx: &TransactionCandidate) -> PatternMatchOutcome {
        let mut outcome = self.deterministic(tx);

        if let Some(judge) = self.judge {
            let summary = outcome.summary();
            match timeout(self.service_timeout, judge.select_patterns(tx, &summary)).await {
                Ok(Ok(selection)) => {
                    if let Some(r) = &selection.reasoning {
                        outcome.reasoning.push_str("; service: ");
                        outcome.reasoning.push_str(r);
                    }
                    outcome.advisory = Some(selection);
                }
                Ok(Err(err)) => {
                    warn!(%err, "pattern selection failed, keeping deterministic findings");
                }
                Err(_) => {
                    warn!("pattern selection timed out, keeping deterministic findings");
                }
            }
        }

        outcome
    }

    fn deterministic(&self, tx: &TransactionCandidate) -> PatternMatchOutcome {
        let signals = DetectedSignals::extract(tx);
        let vendor = self.store.vendor_pattern(&tx.vendor).cloned();
        let category_patterns: Vec<CategoryPattern> = self
            .store
            .category_patterns_for(&tx.description, &tx.vendor)
            .into_iter()
            .cloned()
            .collect();
        let payment_pattern = self.store.payment_pattern(&tx.vendor).cloned();

        let mut parts = Vec::new();
        if let Some(v) = &vendor {
            parts.push(format!(
                "vendor pattern {} (confidence {:.2})",
                v.vendor, v.confidence
            ));
        }
        if !category_patterns.is_empty() {
            parts.push(format!("{} category pattern(s)", category_patterns.len()));
        }
        if payment_pattern.is_some() {
            parts.push("payment pattern".to_string());
        }
        let tags = signals.indicator_tags();
        if !tags.is_empty() {
            parts.push(format!("indicators [{}]", tags.join(", ")));
        }
        let reasoning = if parts.is_empty() {
            "no learned patterns or indicators matched".to_string()
        } else {
            format!("matched: {}", parts.join(", "))
        };

        PatternMatchOutcome {
            vendor,
            category_patterns,
            payment_pattern,
            signals,
            advisory: None,
            reasoning,
        }
    }
}
