use std::collections::HashMap;

use tally_core::PaymentMethod;

use crate::card::{CardPaymentType, CardPaymentTypeMapping, ConfirmationContext};
use crate::category::{tokenize, CategoryPattern};
use crate::config::LearningConfig;
use crate::correction::{fields, CategorizationCorrection};
use crate::payment::PaymentPattern;
use crate::vendor::{normalize_vendor, VendorPattern};

/// The durable index of everything learned from user corrections.
///
/// The store is a derived projection: [`PatternStore::replay`] rebuilds it
/// from the append-only correction log, and the live path goes through the
/// same [`PatternStore::apply_correction`], so the two can never diverge.
/// One `apply_correction` call is the unit of atomicity — callers that share
/// a store across tasks wrap it in a lock and hold it across the call.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternStore {
    vendors: HashMap<String, VendorPattern>,
    categories: HashMap<(String, String), CategoryPattern>,
    payments: HashMap<String, PaymentPattern>,
    cards: HashMap<String, CardPaymentTypeMapping>,
    config: LearningConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub vendor_patterns: usize,
    pub category_patterns: usize,
    pub payment_patterns: usize,
    pub card_mappings: usize,
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new(LearningConfig::default())
    }
}

impl PatternStore {
    pub fn new(config: LearningConfig) -> Self {
        Self {
            vendors: HashMap::new(),
            categories: HashMap::new(),
            payments: HashMap::new(),
            cards: HashMap::new(),
            config,
        }
    }

    /// Rebuild a store from the correction log alone.
    pub fn replay<'a, I>(corrections: I, config: LearningConfig) -> Self
    where
        I: IntoIterator<Item = &'a CategorizationCorrection>,
    {
        let mut store = Self::new(config);
        for c in corrections {
            store.apply_correction(c);
        }
        store
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    // ── Lookups ──────────────────────────────────────────────────────────────

    /// Exact match after case-insensitive normalization. Fuzzy vendor
    /// matching is the import layer's job, not ours.
    pub fn vendor_pattern(&self, vendor: &str) -> Option<&VendorPattern> {
        self.vendors.get(&normalize_vendor(vendor))
    }

    /// Category patterns whose keywords intersect the transaction text or
    /// whose vendor matches, strongest first.
    pub fn category_patterns_for(&self, description: &str, vendor: &str) -> Vec<&CategoryPattern> {
        let tokens = tokenize(&format!("{description} {vendor}"));
        let key = normalize_vendor(vendor);
        let mut matched: Vec<&CategoryPattern> = self
            .categories
            .values()
            .filter(|p| p.matches(&tokens, &key))
            .collect();
        matched.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.occurrences.cmp(&a.occurrences))
                .then_with(|| a.to_category.cmp(&b.to_category))
        });
        matched
    }

    /// The single active payment pattern for a vendor, if any.
    pub fn payment_pattern(&self, vendor: &str) -> Option<&PaymentPattern> {
        self.payments.get(&normalize_vendor(vendor))
    }

    /// `None` means "no opinion", not "debit by default".
    pub fn card_mapping(&self, last_four: &str) -> Option<&CardPaymentTypeMapping> {
        self.cards.get(last_four)
    }

    // ── Learning ─────────────────────────────────────────────────────────────

    /// Fold one correction into the index. Incidental edits (flagged
    /// `is_categorization_correction = false`) are no-ops here; they live in
    /// the log only.
    pub fn apply_correction(&mut self, c: &CategorizationCorrection) {
        if !c.is_categorization_correction {
            return;
        }

        let category_to = c.new_value(fields::CATEGORY).map(str::to_lowercase);
        let type_to = c
            .new_value(fields::TRANSACTION_TYPE)
            .and_then(|s| s.parse().ok());
        let payment_to: Option<PaymentMethod> = c
            .new_value(fields::PAYMENT_METHOD)
            .map(|s| s.parse().unwrap_or(PaymentMethod::Other(s.to_string())));
        let source_to = c.new_value(fields::INCOME_SOURCE).map(str::to_string);

        if category_to.is_some() || type_to.is_some() {
            self.learn_vendor(c, category_to.as_deref(), type_to, payment_to.clone(), source_to);
        }

        if let Some(change) = c.change(fields::CATEGORY) {
            if let (Some(from), Some(to)) = (change.from.as_deref(), change.to.as_deref()) {
                self.learn_category_shift(c, from, to);
            }
        }

        if let Some(method) = payment_to {
            self.learn_payment(c, method);
        }
    }

    fn learn_vendor(
        &mut self,
        c: &CategorizationCorrection,
        category: Option<&str>,
        transaction_type: Option<tally_core::TransactionType>,
        payment_method: Option<PaymentMethod>,
        income_source: Option<String>,
    ) {
        let key = normalize_vendor(&c.vendor);
        if key.is_empty() {
            return;
        }
        match self.vendors.get_mut(&key) {
            Some(pattern) => {
                if pattern.agrees_with(category, transaction_type) {
                    pattern.reinforce(&self.config, c.timestamp);
                    if pattern.category.is_none() {
                        pattern.category = category.map(str::to_string);
                    }
                    if pattern.transaction_type.is_none() {
                        pattern.transaction_type = transaction_type;
                    }
                    pattern.absorb(payment_method, income_source);
                } else {
                    tracing::debug!(vendor = %key, "contradicting correction resets vendor pattern");
                    pattern.overwrite(
                        category.map(str::to_string),
                        transaction_type,
                        payment_method,
                        income_source,
                        &self.config,
                        c.timestamp,
                    );
                }
            }
            None => {
                self.vendors.insert(
                    key,
                    VendorPattern::learned(
                        &c.vendor,
                        category.map(str::to_string),
                        transaction_type,
                        payment_method,
                        income_source,
                        &self.config,
                        c.timestamp,
                    ),
                );
            }
        }
    }

    fn learn_category_shift(&mut self, c: &CategorizationCorrection, from: &str, to: &str) {
        let key = (from.to_lowercase(), to.to_lowercase());
        let keywords = tokenize(&c.vendor);
        match self.categories.get_mut(&key) {
            Some(pattern) => pattern.record_repeat(keywords, c.notes.clone()),
            None => {
                self.categories.insert(
                    key.clone(),
                    CategoryPattern::first(
                        from,
                        to,
                        Some(normalize_vendor(&c.vendor)),
                        keywords,
                        c.notes.clone(),
                    ),
                );
            }
        }
        self.recompute_category_confidence(&key.0);
    }

    /// Confidence = occurrences / total corrections sharing the source
    /// category. Recomputed for the whole trigger group so every sibling
    /// pattern stays consistent.
    fn recompute_category_confidence(&mut self, from: &str) {
        let total: u32 = self
            .categories
            .values()
            .filter(|p| p.from_category == from)
            .map(|p| p.occurrences)
            .sum();
        if total == 0 {
            return;
        }
        for pattern in self
            .categories
            .values_mut()
            .filter(|p| p.from_category == from)
        {
            pattern.confidence = pattern.occurrences as f32 / total as f32;
        }
    }

    fn learn_payment(&mut self, c: &CategorizationCorrection, method: PaymentMethod) {
        let key = normalize_vendor(&c.vendor);
        if key.is_empty() {
            return;
        }
        match self.payments.get_mut(&key) {
            Some(pattern) => pattern.learn(method, &self.config, c.timestamp),
            None => {
                self.payments.insert(
                    key,
                    PaymentPattern::learned(&c.vendor, method, &self.config, c.timestamp),
                );
            }
        }
    }

    /// Explicit user confirmation of a card's payment type.
    pub fn confirm_card(
        &mut self,
        last_four: &str,
        payment_type: CardPaymentType,
        context: ConfirmationContext,
    ) -> &CardPaymentTypeMapping {
        match self.cards.entry(last_four.to_string()) {
            std::collections::hash_map::Entry::Occupied(e) => {
                let mapping = e.into_mut();
                mapping.confirm(payment_type, context, &self.config);
                mapping
            }
            std::collections::hash_map::Entry::Vacant(e) => e.insert(
                CardPaymentTypeMapping::first_confirmation(
                    last_four,
                    payment_type,
                    context,
                    &self.config,
                ),
            ),
        }
    }

    // ── Bulk access (persistence hydration / write-back) ─────────────────────

    pub fn vendor_patterns(&self) -> impl Iterator<Item = &VendorPattern> {
        self.vendors.values()
    }

    pub fn category_patterns(&self) -> impl Iterator<Item = &CategoryPattern> {
        self.categories.values()
    }

    pub fn payment_patterns(&self) -> impl Iterator<Item = &PaymentPattern> {
        self.payments.values()
    }

    pub fn card_mappings(&self) -> impl Iterator<Item = &CardPaymentTypeMapping> {
        self.cards.values()
    }

    pub fn insert_vendor_pattern(&mut self, pattern: VendorPattern) {
        self.vendors.insert(pattern.vendor.clone(), pattern);
    }

    pub fn insert_category_pattern(&mut self, pattern: CategoryPattern) {
        self.categories.insert(
            (pattern.from_category.clone(), pattern.to_category.clone()),
            pattern,
        );
    }

    pub fn insert_payment_pattern(&mut self, pattern: PaymentPattern) {
        self.payments.insert(pattern.vendor.clone(), pattern);
    }

    pub fn insert_card_mapping(&mut self, mapping: CardPaymentTypeMapping) {
        self.cards.insert(mapping.last_four.clone(), mapping);
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            vendor_patterns: self.vendors.len(),
            category_patterns: self.categories.len(),
            payment_patterns: self.payments.len(),
            card_mappings: self.cards.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use tally_core::TransactionType;
    use uuid::Uuid;

    use crate::correction::FieldChange;

    fn correction(
        vendor: &str,
        changes: &[(&str, Option<&str>, Option<&str>)],
        seq: u32,
    ) -> CategorizationCorrection {
        let mut map = BTreeMap::new();
        for (field, from, to) in changes {
            map.insert(
                field.to_string(),
                FieldChange {
                    from: from.map(str::to_string),
                    to: to.map(str::to_string),
                },
            );
        }
        let is_cat = [
            fields::TRANSACTION_TYPE,
            fields::CATEGORY,
            fields::PAYMENT_METHOD,
            fields::INCOME_SOURCE,
        ]
        .iter()
        .any(|f| map.contains_key(*f));
        CategorizationCorrection {
            id: Uuid::new_v4(),
            transaction_id: seq as i64,
            timestamp: Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, seq).unwrap(),
            vendor: vendor.to_string(),
            amount_cents: 5000,
            changes: map,
            notes: None,
            is_categorization_correction: is_cat,
        }
    }

    fn category_fix(vendor: &str, from: &str, to: &str, seq: u32) -> CategorizationCorrection {
        correction(vendor, &[(fields::CATEGORY, Some(from), Some(to))], seq)
    }

    #[test]
    fn first_correction_creates_vendor_pattern() {
        let mut store = PatternStore::default();
        store.apply_correction(&category_fix("Home Depot", "other expenses", "supplies", 1));

        let p = store.vendor_pattern("HOME DEPOT").unwrap();
        assert_eq!(p.category.as_deref(), Some("supplies"));
        assert_eq!(p.corrections, 1);
        assert_eq!(p.confidence, store.config().vendor_initial_confidence);
    }

    #[test]
    fn repeated_agreement_reinforces_vendor() {
        let mut store = PatternStore::default();
        for i in 0..6 {
            store.apply_correction(&category_fix("Home Depot", "other expenses", "supplies", i));
        }
        let p = store.vendor_pattern("home depot").unwrap();
        assert_eq!(p.corrections, 6);
        assert!(p.confidence > store.config().vendor_initial_confidence);
        assert!(p.confidence <= 1.0);
    }

    #[test]
    fn contradiction_overwrites_and_resets() {
        let mut store = PatternStore::default();
        for i in 0..5 {
            store.apply_correction(&category_fix("Home Depot", "other expenses", "supplies", i));
        }
        let accumulated = store.vendor_pattern("home depot").unwrap().confidence;

        store.apply_correction(&category_fix("Home Depot", "supplies", "repairs and maintenance", 9));
        let p = store.vendor_pattern("home depot").unwrap();
        assert_eq!(p.category.as_deref(), Some("repairs and maintenance"));
        assert!(p.confidence < accumulated);
        assert!(p.confidence > 0.0);
    }

    #[test]
    fn incidental_edit_learns_nothing() {
        let mut store = PatternStore::default();
        store.apply_correction(&correction(
            "Home Depot",
            &[(fields::DATE, Some("2025-05-01"), Some("2025-05-02"))],
            1,
        ));
        assert!(store.vendor_pattern("home depot").is_none());
        assert_eq!(store.stats().category_patterns, 0);
    }

    #[test]
    fn category_pattern_confidence_splits_across_targets() {
        let mut store = PatternStore::default();
        // Three corrections away from "other expenses": two to supplies, one to meals.
        store.apply_correction(&category_fix("Costco", "other expenses", "supplies", 1));
        store.apply_correction(&category_fix("Costco", "other expenses", "supplies", 2));
        store.apply_correction(&category_fix("Chipotle", "other expenses", "meals", 3));

        let matched = store.category_patterns_for("warehouse run", "Costco");
        let supplies = matched
            .iter()
            .find(|p| p.to_category == "supplies")
            .unwrap();
        assert_eq!(supplies.occurrences, 2);
        assert!((supplies.confidence - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn category_lookup_matches_by_keyword_or_vendor() {
        let mut store = PatternStore::default();
        store.apply_correction(&category_fix("Costco Wholesale", "other expenses", "supplies", 1));

        // vendor match
        assert!(!store.category_patterns_for("anything", "costco wholesale").is_empty());
        // keyword match from tokenized vendor
        assert!(!store.category_patterns_for("COSTCO run", "someone else").is_empty());
        // no match
        assert!(store.category_patterns_for("coffee", "starbucks").is_empty());
    }

    #[test]
    fn payment_correction_updates_payment_pattern() {
        let mut store = PatternStore::default();
        store.apply_correction(&correction(
            "Shell",
            &[(fields::PAYMENT_METHOD, Some("Card"), Some("Debit"))],
            1,
        ));
        let p = store.payment_pattern("shell").unwrap();
        assert_eq!(p.payment_method, tally_core::PaymentMethod::Debit);

        // Replacement, not accumulation.
        store.apply_correction(&correction(
            "Shell",
            &[(fields::PAYMENT_METHOD, Some("Debit"), Some("Cash"))],
            2,
        ));
        let p = store.payment_pattern("shell").unwrap();
        assert_eq!(p.payment_method, tally_core::PaymentMethod::Cash);
        assert_eq!(p.corrections, 1);
    }

    #[test]
    fn type_change_learns_type_and_income_source() {
        let mut store = PatternStore::default();
        store.apply_correction(&correction(
            "Acme Consulting",
            &[
                (fields::TRANSACTION_TYPE, Some("expense"), Some("income")),
                (fields::CATEGORY, Some("other expenses"), Some("gross receipts")),
                (fields::INCOME_SOURCE, None, Some("invoice")),
            ],
            1,
        ));
        let p = store.vendor_pattern("acme consulting").unwrap();
        assert_eq!(p.transaction_type, Some(TransactionType::Income));
        assert_eq!(p.income_source.as_deref(), Some("invoice"));
    }

    #[test]
    fn replay_reconstructs_identical_store() {
        let log: Vec<CategorizationCorrection> = vec![
            category_fix("Home Depot", "other expenses", "supplies", 1),
            category_fix("Home Depot", "other expenses", "supplies", 2),
            correction(
                "Shell",
                &[(fields::PAYMENT_METHOD, Some("Card"), Some("Debit"))],
                3,
            ),
            category_fix("Home Depot", "supplies", "repairs and maintenance", 4),
            correction(
                "Chipotle",
                &[(fields::NOTES, None, Some("team lunch"))],
                5,
            ),
        ];

        let mut live = PatternStore::default();
        for c in &log {
            live.apply_correction(c);
        }
        let replayed = PatternStore::replay(&log, LearningConfig::default());

        assert_eq!(live, replayed);
    }

    #[test]
    fn card_confirm_and_lookup() {
        let mut store = PatternStore::default();
        assert!(store.card_mapping("1234").is_none());

        store.confirm_card("1234", CardPaymentType::Credit, ConfirmationContext::default());
        let first = store.card_mapping("1234").unwrap().confidence;
        store.confirm_card("1234", CardPaymentType::Credit, ConfirmationContext::default());
        let second = store.card_mapping("1234").unwrap().confidence;
        assert!(second > first);

        store.confirm_card("1234", CardPaymentType::Debit, ConfirmationContext::default());
        let m = store.card_mapping("1234").unwrap();
        assert_eq!(m.payment_type, CardPaymentType::Debit);
        assert_eq!(m.times_confirmed, 1);
    }

    #[test]
    fn stats_counts_all_kinds() {
        let mut store = PatternStore::default();
        store.apply_correction(&category_fix("Home Depot", "other expenses", "supplies", 1));
        store.confirm_card("9999", CardPaymentType::Debit, ConfirmationContext::default());
        let s = store.stats();
        assert_eq!(s.vendor_patterns, 1);
        assert_eq!(s.category_patterns, 1);
        assert_eq!(s.card_mappings, 1);
    }
}
