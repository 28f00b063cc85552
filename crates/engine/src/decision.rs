//! Stage 2: turn the Stage-1 findings into a categorization.
//!
//! Two paths. The deterministic bypass fires whenever strong local evidence
//! exists (a confident vendor pattern or an unambiguous indicator) and never
//! touches the service. Otherwise the generative path asks the service for a
//! judgment, validates it, and falls back to the deterministic priority tree
//! on any failure. Both paths always return a result.

use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use tally_ai::{AiError, CategorizationJudgment, JudgmentService};
use tally_core::{
    category, is_income_category, CategorizationResult, PaymentMethod, TransactionCandidate,
    TransactionType, DEFAULT_EXPENSE_CATEGORY, DEFAULT_INCOME_CATEGORY,
};

use crate::matcher::PatternMatchOutcome;

/// Decision-rule priorities, highest first, as text for the service prompt.
/// The deterministic tree in [`DecisionEngine::deterministic`] is the same
/// list in code; keep the two in step.
const DECISION_RULES: &str = "\
1. Check indicators mean a check payment; direction follows the text.
2. Bank deposit indicators mean income, category gross receipts.
3. A confident learned vendor pattern supplies type and category.
4. Fuel indicators mean car and truck expenses.
5. Hardware-store indicators mean repairs and maintenance.
6. Restaurant indicators mean meals.
7. Grocery indicators mean supplies.
8. Office-supply indicators mean office expense.
9. Otherwise default to expense, other expenses.
Income results must use an income category (gross receipts, returns and \
allowances, other income, interest income).";

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Vendor patterns at or above this confidence trigger the bypass.
    pub vendor_bypass_confidence: f32,
    /// Upper bound on each service call, enforced locally.
    pub service_timeout: Duration,
    /// Subtracted from a judgment's confidence when the income-category
    /// invariant had to be repaired.
    pub invariant_confidence_penalty: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vendor_bypass_confidence: 0.6,
            service_timeout: Duration::from_secs(20),
            invariant_confidence_penalty: 0.05,
        }
    }
}

pub struct DecisionEngine {
    config: EngineConfig,
}

impl DecisionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub async fn decide(
        &self,
        tx: &TransactionCandidate,
        outcome: &PatternMatchOutcome,
        judge: Option<&dyn JudgmentService>,
    ) -> CategorizationResult {
        if self.bypass_applies(outcome) {
            return self.deterministic(tx, outcome);
        }

        let Some(judge) = judge else {
            return self.deterministic(tx, outcome);
        };

        let summary = outcome.summary();
        let verdict = match timeout(
            self.config.service_timeout,
            judge.categorize(tx, &summary, DECISION_RULES),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AiError::Timeout),
        };

        match verdict.and_then(|j| self.from_judgment(j)) {
            Ok(result) => result,
            Err(err) => {
                warn!(%err, vendor = %tx.vendor, "generative path failed, using deterministic fallback");
                self.deterministic(tx, outcome)
            }
        }
    }

    /// Strong local evidence means the service has nothing to add: a vendor
    /// the user has already taught us about, or an indicator whose meaning is
    /// fixed (fuel, check, deposit, explicit payment text).
    fn bypass_applies(&self, outcome: &PatternMatchOutcome) -> bool {
        let confident_vendor = outcome
            .vendor
            .as_ref()
            .is_some_and(|v| v.confidence >= self.config.vendor_bypass_confidence);
        confident_vendor
            || !outcome.signals.fuel.is_empty()
            || !outcome.signals.check.is_empty()
            || !outcome.signals.deposit.is_empty()
            || outcome.signals.payment_method_text.is_some()
    }

    /// The deterministic priority tree. Total: every branch returns.
    fn deterministic(
        &self,
        tx: &TransactionCandidate,
        outcome: &PatternMatchOutcome,
    ) -> CategorizationResult {
        let signals = &outcome.signals;

        // 1. Check. More specific than the deposit scan: "check deposited"
        //    is a check transaction, not a plain bank deposit. A scanned
        //    check is usually one the business received, so income unless
        //    the text says the check went out.
        if !signals.check.is_empty() {
            let combined = tx.combined_text();
            let outgoing =
                combined.contains("payment sent") || combined.contains("check written");
            let (transaction_type, cat) = if outgoing {
                (TransactionType::Expense, DEFAULT_EXPENSE_CATEGORY)
            } else {
                (TransactionType::Income, DEFAULT_INCOME_CATEGORY)
            };
            let mut result = CategorizationResult::new(transaction_type, cat, 0.8)
                .with_payment_method(PaymentMethod::Check)
                .with_pattern("check_detected")
                .with_reasoning(
                    "check indicators found; the named party on a received check is the \
                     payer, not the account holder",
                );
            if transaction_type == TransactionType::Income {
                result = result.with_income_source("check");
            }
            return result;
        }

        // 2. Bank deposit. Outranks a learned vendor pattern because the
        //    money direction is explicit.
        if !signals.deposit.is_empty() {
            return CategorizationResult::new(
                TransactionType::Income,
                DEFAULT_INCOME_CATEGORY,
                0.85,
            )
            .with_payment_method(PaymentMethod::Deposit)
            .with_income_source("deposit")
            .with_pattern("deposit_detected")
            .with_reasoning(format!(
                "deposit indicators [{}] in vendor or description",
                signals.deposit.join(", ")
            ));
        }

        // 3. Confident vendor pattern.
        if let Some(vendor) = outcome
            .vendor
            .as_ref()
            .filter(|v| v.confidence >= self.config.vendor_bypass_confidence)
        {
            if let Some(cat) = &vendor.category {
                let transaction_type = vendor.transaction_type.unwrap_or(if is_income_category(cat)
                {
                    TransactionType::Income
                } else {
                    TransactionType::Expense
                });
                let method = vendor
                    .payment_method
                    .clone()
                    .or_else(|| parse_payment_text(signals.payment_method_text.as_deref()))
                    .unwrap_or(PaymentMethod::Card);
                let mut result =
                    CategorizationResult::new(transaction_type, cat.clone(), vendor.confidence)
                        .with_payment_method(method)
                        .with_pattern(format!("vendor_pattern:{}", vendor.vendor))
                        .with_reasoning(format!(
                            "learned from {} correction(s) for this vendor",
                            vendor.corrections
                        ));
                if let Some(source) = &vendor.income_source {
                    result = result.with_income_source(source.clone());
                }
                return result;
            }
        }

        // 4-8. Indicator families, most specific first.
        let families: [(&[String], &str, f32, &str); 5] = [
            (&signals.fuel, category::CAR_AND_TRUCK, 0.9, "fuel_detected"),
            (
                &signals.hardware,
                category::REPAIRS_AND_MAINTENANCE,
                0.85,
                "hardware_detected",
            ),
            (
                &signals.restaurant,
                category::MEALS,
                0.85,
                "restaurant_detected",
            ),
            (&signals.grocery, category::SUPPLIES, 0.8, "grocery_detected"),
            (
                &signals.office,
                category::OFFICE_EXPENSE,
                0.85,
                "office_detected",
            ),
        ];
        for (terms, cat, confidence, pattern_id) in families {
            if !terms.is_empty() {
                let mut result = CategorizationResult::new(
                    TransactionType::Expense,
                    cat,
                    confidence,
                )
                .with_pattern(pattern_id)
                .with_reasoning(format!("matched terms [{}]", terms.join(", ")));
                if let Some(method) = parse_payment_text(signals.payment_method_text.as_deref()) {
                    result = result.with_payment_method(method);
                }
                return result;
            }
        }

        // 9. Weak textual hints, then the unconditional default.
        let combined = tx.combined_text();
        let mut result = if combined.contains("payment received") {
            CategorizationResult::new(TransactionType::Income, DEFAULT_INCOME_CATEGORY, 0.6)
                .with_pattern("income_keyword")
                .with_reasoning("income phrasing in description")
        } else {
            CategorizationResult::new(TransactionType::Expense, DEFAULT_EXPENSE_CATEGORY, 0.4)
                .with_pattern("default_fallback")
                .with_reasoning("no patterns or indicators matched")
        };
        if let Some(method) = parse_payment_text(signals.payment_method_text.as_deref()) {
            result = result.with_payment_method(method);
        }
        result
    }

    /// Validate and repair a service judgment. A type outside
    /// income/expense is malformed; an income verdict with a non-income
    /// category is repaired rather than rejected.
    fn from_judgment(&self, judgment: CategorizationJudgment) -> Result<CategorizationResult, AiError> {
        let transaction_type: TransactionType = judgment
            .transaction_type
            .parse()
            .map_err(|_| {
                AiError::Malformed(format!(
                    "unknown transaction type {:?}",
                    judgment.transaction_type
                ))
            })?;

        let mut category = judgment.category.trim().to_lowercase();
        let mut confidence = judgment.confidence.clamp(0.0, 1.0);
        let mut reasoning = judgment.reasoning;

        if transaction_type == TransactionType::Income && !is_income_category(&category) {
            warn!(
                category = %category,
                "income judgment with non-income category, repairing"
            );
            category = DEFAULT_INCOME_CATEGORY.to_string();
            confidence = (confidence - self.config.invariant_confidence_penalty).max(0.0);
            if !reasoning.is_empty() {
                reasoning.push_str("; ");
            }
            reasoning.push_str("category adjusted to an income category");
        }

        let mut result = CategorizationResult::new(transaction_type, category, confidence)
            .with_reasoning(reasoning);
        for p in judgment.applied_patterns {
            result = result.with_pattern(p);
        }
        if let Some(method) = judgment.payment_method {
            result = result.with_payment_method(
                method
                    .parse()
                    .unwrap_or(PaymentMethod::Other(method)),
            );
        }
        if let Some(source) = judgment.income_source {
            result = result.with_income_source(source);
        }
        Ok(result)
    }
}

/// Normalized explicit payment text ("Debit", "Card", ...) back to the enum.
fn parse_payment_text(text: Option<&str>) -> Option<PaymentMethod> {
    text.map(|t| t.parse().unwrap_or(PaymentMethod::Other(t.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::DetectedSignals;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    use tally_ai::MockJudge;
    use tally_patterns::correction::{fields, CategorizationCorrection, FieldChange};
    use tally_patterns::PatternStore;

    fn engine() -> DecisionEngine {
        DecisionEngine::new(EngineConfig::default())
    }

    fn outcome_for(tx: &TransactionCandidate, store: &PatternStore) -> PatternMatchOutcome {
        // Deterministic Stage 1 only; the advisory call needs no coverage here.
        let signals = DetectedSignals::extract(tx);
        PatternMatchOutcome {
            vendor: store.vendor_pattern(&tx.vendor).cloned(),
            category_patterns: store
                .category_patterns_for(&tx.description, &tx.vendor)
                .into_iter()
                .cloned()
                .collect(),
            payment_pattern: store.payment_pattern(&tx.vendor).cloned(),
            signals,
            advisory: None,
            reasoning: String::new(),
        }
    }

    fn teach_category(store: &mut PatternStore, vendor: &str, from: &str, to: &str, seq: u32) {
        let mut changes = BTreeMap::new();
        changes.insert(
            fields::CATEGORY.to_string(),
            FieldChange {
                from: Some(from.to_string()),
                to: Some(to.to_string()),
            },
        );
        store.apply_correction(&CategorizationCorrection {
            id: Uuid::new_v4(),
            transaction_id: seq as i64,
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, seq).unwrap(),
            vendor: vendor.to_string(),
            amount_cents: 8000,
            changes,
            notes: None,
            is_categorization_correction: true,
        });
    }

    // ── Deterministic tree ────────────────────────────────────────────────────

    #[tokio::test]
    async fn fuel_purchase_at_shell() {
        let store = PatternStore::default();
        let tx = TransactionCandidate::new("Fuel Purchase Pump #4", "Shell", 4500);
        let out = outcome_for(&tx, &store);

        let r = engine().decide(&tx, &out, None).await;
        assert_eq!(r.transaction_type, TransactionType::Expense);
        assert_eq!(r.category, category::CAR_AND_TRUCK);
        assert_eq!(r.confidence, 0.9);
        assert!(r.applied_patterns.contains(&"fuel_detected".to_string()));
    }

    #[tokio::test]
    async fn learned_vendor_outranks_fuel_keyword() {
        let mut store = PatternStore::default();
        for i in 0..6 {
            teach_category(&mut store, "Home Depot", "other expenses", "supplies", i);
        }
        let expected = store.vendor_pattern("home depot").unwrap().confidence;

        let tx = TransactionCandidate::new("diesel generator parts", "Home Depot", 12000);
        let out = outcome_for(&tx, &store);
        assert!(!out.signals.fuel.is_empty());

        let r = engine().decide(&tx, &out, None).await;
        assert_eq!(r.category, "supplies");
        assert!((r.confidence - expected).abs() < 1e-6);
        assert!(r
            .applied_patterns
            .contains(&"vendor_pattern:home depot".to_string()));
    }

    #[tokio::test]
    async fn check_deposited_is_income_paid_by_check() {
        let store = PatternStore::default();
        let tx = TransactionCandidate::new("Check #1042 deposited", "Jane Smith", 50000);
        let out = outcome_for(&tx, &store);

        let r = engine().decide(&tx, &out, None).await;
        // "deposited" also matches the deposit scan, but the check evidence
        // is more specific and must win.
        assert_eq!(r.transaction_type, TransactionType::Income);
        assert_eq!(r.category, DEFAULT_INCOME_CATEGORY);
        assert_eq!(r.payment_method, Some(PaymentMethod::Check));
        assert_eq!(r.confidence, 0.8);
    }

    #[tokio::test]
    async fn check_without_deposit_language() {
        let store = PatternStore::default();
        let tx = TransactionCandidate::new("Check #1042 pay to the order of", "Jane Smith", 50000);
        let out = outcome_for(&tx, &store);

        let r = engine().decide(&tx, &out, None).await;
        assert_eq!(r.transaction_type, TransactionType::Income);
        assert_eq!(r.payment_method, Some(PaymentMethod::Check));
        assert_eq!(r.confidence, 0.8);
        assert!(r.applied_patterns.contains(&"check_detected".to_string()));
    }

    #[tokio::test]
    async fn outgoing_check_is_expense() {
        let store = PatternStore::default();
        let tx =
            TransactionCandidate::new("check written memo: rent for June", "Oak Street LLC", 90000);
        let out = outcome_for(&tx, &store);

        let r = engine().decide(&tx, &out, None).await;
        assert_eq!(r.transaction_type, TransactionType::Expense);
        assert_eq!(r.payment_method, Some(PaymentMethod::Check));
    }

    #[tokio::test]
    async fn deposit_outranks_learned_vendor() {
        let mut store = PatternStore::default();
        for i in 0..6 {
            teach_category(&mut store, "First National Bank", "other expenses", "supplies", i);
        }
        let tx = TransactionCandidate::new("deposit", "First National Bank", 250000);
        let out = outcome_for(&tx, &store);

        let r = engine().decide(&tx, &out, None).await;
        assert_eq!(r.transaction_type, TransactionType::Income);
        assert_eq!(r.category, DEFAULT_INCOME_CATEGORY);
        assert_eq!(r.payment_method, Some(PaymentMethod::Deposit));
        assert_eq!(r.income_source.as_deref(), Some("deposit"));
        assert_eq!(r.confidence, 0.85);
    }

    #[tokio::test]
    async fn hardware_restaurant_grocery_office_branches() {
        let store = PatternStore::default();
        let cases = [
            ("lumber and drywall", "Menards", category::REPAIRS_AND_MAINTENANCE),
            ("team lunch", "Chipotle", category::MEALS),
            ("weekly shop", "Kroger", category::SUPPLIES),
            ("toner refill", "Office Depot", category::OFFICE_EXPENSE),
        ];
        for (desc, vendor, expected) in cases {
            let tx = TransactionCandidate::new(desc, vendor, 3000);
            let out = outcome_for(&tx, &store);
            let r = engine().decide(&tx, &out, None).await;
            assert_eq!(r.category, expected, "{vendor}");
            assert_eq!(r.transaction_type, TransactionType::Expense);
        }
    }

    #[tokio::test]
    async fn default_fallback_is_low_confidence_expense() {
        let store = PatternStore::default();
        let tx = TransactionCandidate::new("misc services", "Unknown Vendor", 7500);
        let out = outcome_for(&tx, &store);

        let r = engine().decide(&tx, &out, None).await;
        assert_eq!(r.transaction_type, TransactionType::Expense);
        assert_eq!(r.category, DEFAULT_EXPENSE_CATEGORY);
        assert_eq!(r.confidence, 0.4);
        assert!(r.applied_patterns.contains(&"default_fallback".to_string()));
    }

    #[tokio::test]
    async fn explicit_payment_text_survives_fallback() {
        let store = PatternStore::default();
        let mut tx = TransactionCandidate::new("misc services", "Unknown Vendor", 7500);
        tx.ocr_payment_method = Some("Cash".to_string());
        let out = outcome_for(&tx, &store);

        let r = engine().decide(&tx, &out, None).await;
        assert_eq!(r.payment_method, Some(PaymentMethod::Cash));
    }

    // ── Bypass and service interaction ────────────────────────────────────────

    #[tokio::test]
    async fn bypass_never_calls_service() {
        let store = PatternStore::default();
        let judge = MockJudge::failing();
        let tx = TransactionCandidate::new("Fuel Purchase", "Shell", 4500);
        let out = outcome_for(&tx, &store);

        let r = engine().decide(&tx, &out, Some(&judge)).await;
        assert_eq!(r.category, category::CAR_AND_TRUCK);
        assert_eq!(judge.categorize_calls(), 0);
    }

    #[tokio::test]
    async fn service_failure_falls_back_deterministically() {
        let store = PatternStore::default();
        let judge = MockJudge::failing();
        let tx = TransactionCandidate::new("misc services", "Unknown Vendor", 7500);
        let out = outcome_for(&tx, &store);

        let with_failure = engine().decide(&tx, &out, Some(&judge)).await;
        assert_eq!(judge.categorize_calls(), 1);
        let without_service = engine().decide(&tx, &out, None).await;

        assert_eq!(with_failure.transaction_type, without_service.transaction_type);
        assert_eq!(with_failure.category, without_service.category);
        assert_eq!(with_failure.confidence, without_service.confidence);
    }

    #[tokio::test]
    async fn service_judgment_accepted_when_valid() {
        let store = PatternStore::default();
        let judge = MockJudge::with_judgment(CategorizationJudgment {
            transaction_type: "expense".to_string(),
            category: "Meals".to_string(),
            confidence: 0.72,
            payment_method: Some("Card".to_string()),
            income_source: None,
            applied_patterns: vec!["restaurant_like".to_string()],
            reasoning: "looks like a meal".to_string(),
        });
        let tx = TransactionCandidate::new("misc", "Unknown Vendor", 2200);
        let out = outcome_for(&tx, &store);

        let r = engine().decide(&tx, &out, Some(&judge)).await;
        assert_eq!(r.category, "meals");
        assert_eq!(r.confidence, 0.72);
        assert_eq!(r.payment_method, Some(PaymentMethod::Card));
        assert_eq!(r.applied_patterns, vec!["restaurant_like"]);
    }

    #[tokio::test]
    async fn income_invariant_repaired_with_penalty() {
        let store = PatternStore::default();
        let judge = MockJudge::with_judgment(CategorizationJudgment {
            transaction_type: "income".to_string(),
            category: "supplies".to_string(),
            confidence: 0.7,
            payment_method: None,
            income_source: Some("client".to_string()),
            applied_patterns: vec![],
            reasoning: "client paid us".to_string(),
        });
        let tx = TransactionCandidate::new("misc", "Unknown Vendor", 2200);
        let out = outcome_for(&tx, &store);

        let r = engine().decide(&tx, &out, Some(&judge)).await;
        assert_eq!(r.transaction_type, TransactionType::Income);
        assert_eq!(r.category, DEFAULT_INCOME_CATEGORY);
        assert!((r.confidence - 0.65).abs() < 1e-6);
        assert!(r.reasoning.contains("adjusted"));
    }

    #[tokio::test]
    async fn malformed_type_falls_back() {
        let store = PatternStore::default();
        let judge = MockJudge::with_judgment(CategorizationJudgment {
            transaction_type: "transfer".to_string(),
            category: "other".to_string(),
            confidence: 0.9,
            payment_method: None,
            income_source: None,
            applied_patterns: vec![],
            reasoning: String::new(),
        });
        let tx = TransactionCandidate::new("misc", "Unknown Vendor", 2200);
        let out = outcome_for(&tx, &store);

        let r = engine().decide(&tx, &out, Some(&judge)).await;
        assert_eq!(r.category, DEFAULT_EXPENSE_CATEGORY);
        assert!(r.applied_patterns.contains(&"default_fallback".to_string()));
    }

    #[tokio::test]
    async fn vendor_pattern_without_category_does_not_bypass_decision() {
        // A vendor learned only a payment method: confident but categoryless,
        // so the tree falls through to the indicator branches.
        let mut store = PatternStore::default();
        let mut changes = BTreeMap::new();
        changes.insert(
            fields::TRANSACTION_TYPE.to_string(),
            FieldChange {
                from: Some("income".to_string()),
                to: Some("expense".to_string()),
            },
        );
        store.apply_correction(&CategorizationCorrection {
            id: Uuid::new_v4(),
            transaction_id: 1,
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
            vendor: "Starbucks".to_string(),
            amount_cents: 700,
            changes,
            notes: None,
            is_categorization_correction: true,
        });

        let tx = TransactionCandidate::new("coffee", "Starbucks", 700);
        let out = outcome_for(&tx, &store);
        let r = engine().decide(&tx, &out, None).await;
        assert_eq!(r.category, category::MEALS);
    }
}
