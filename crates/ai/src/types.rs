use serde::{Deserialize, Serialize};

/// Compact summary of the Stage-1 findings sent to the service. Raw
/// correction records never leave the process — the service sees learned
/// conclusions and counts only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatternSummary {
    pub vendor: Option<VendorPatternSummary>,
    pub category_patterns: Vec<CategoryPatternSummary>,
    pub payment: Option<PaymentPatternSummary>,
    /// Deterministic indicator tags, e.g. `fuel:diesel` or `check`.
    pub indicators: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VendorPatternSummary {
    pub vendor: String,
    pub category: Option<String>,
    pub transaction_type: Option<String>,
    pub payment_method: Option<String>,
    pub confidence: f32,
    pub corrections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryPatternSummary {
    pub from_category: String,
    pub to_category: String,
    pub occurrences: u32,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentPatternSummary {
    pub vendor: String,
    pub payment_method: String,
    pub confidence: f32,
}

/// Stage-1 advisory response: which of the findings the service considers
/// applicable. Every field defaults so a sparse model response still parses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StageOneSelection {
    /// Whether the vendor pattern should be trusted for this transaction.
    #[serde(default = "default_true")]
    pub trust_vendor_pattern: bool,
    #[serde(default)]
    pub relevant_indicators: Vec<String>,
    /// Identifiers of the indexed patterns the service considers applicable.
    #[serde(default)]
    pub applicable_patterns: Vec<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Stage-2 verdict from the service, in its wire shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategorizationJudgment {
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub category: String,
    pub confidence: f32,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub income_source: Option<String>,
    #[serde(default)]
    pub applied_patterns: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn judgment_parses_wire_format() {
        let j: CategorizationJudgment = serde_json::from_str(
            r#"{
                "type": "expense",
                "category": "meals",
                "confidence": 0.72,
                "paymentMethod": "Card",
                "appliedPatterns": ["restaurant_detected"],
                "reasoning": "restaurant keywords"
            }"#,
        )
        .unwrap();
        assert_eq!(j.transaction_type, "expense");
        assert_eq!(j.payment_method.as_deref(), Some("Card"));
        assert_eq!(j.applied_patterns, vec!["restaurant_detected"]);
    }

    #[test]
    fn judgment_optional_fields_default() {
        let j: CategorizationJudgment = serde_json::from_str(
            r#"{"type": "income", "category": "gross receipts", "confidence": 0.6}"#,
        )
        .unwrap();
        assert!(j.payment_method.is_none());
        assert!(j.applied_patterns.is_empty());
        assert!(j.reasoning.is_empty());
    }

    #[test]
    fn selection_defaults_to_trusting_vendor() {
        let s: StageOneSelection = serde_json::from_str(r#"{}"#).unwrap();
        assert!(s.trust_vendor_pattern);
        assert!(s.applicable_patterns.is_empty());
    }
}
