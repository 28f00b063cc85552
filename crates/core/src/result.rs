use serde::{Deserialize, Serialize};

use crate::payment::PaymentMethod;
use crate::transaction::TransactionType;

/// The final verdict for one transaction. Confidence is always populated so
/// the caller can route low-confidence results to manual review; the engine
/// never returns a hard failure in place of one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizationResult {
    pub transaction_type: TransactionType,
    pub category: String,
    /// 0.0 = pure guess, 1.0 = certain. The 0.4–0.6 band is the engine's
    /// built-in "uncertain" range.
    pub confidence: f32,
    pub payment_method: Option<PaymentMethod>,
    pub income_source: Option<String>,
    /// Identifiers of the rules and learned patterns that produced this
    /// result, e.g. `fuel_detected` or `vendor_pattern:shell`.
    pub applied_patterns: Vec<String>,
    /// Human-readable audit trail of the decision.
    pub reasoning: String,
}

impl CategorizationResult {
    pub fn new(
        transaction_type: TransactionType,
        category: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            transaction_type,
            category: category.into(),
            confidence: confidence.clamp(0.0, 1.0),
            payment_method: None,
            income_source: None,
            applied_patterns: Vec::new(),
            reasoning: String::new(),
        }
    }

    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    pub fn with_income_source(mut self, source: impl Into<String>) -> Self {
        self.income_source = Some(source.into());
        self
    }

    pub fn with_pattern(mut self, id: impl Into<String>) -> Self {
        self.applied_patterns.push(id.into());
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }
}
