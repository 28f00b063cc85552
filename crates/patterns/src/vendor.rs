use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{PaymentMethod, TransactionType};

use crate::config::LearningConfig;

/// Case-insensitive, whitespace-collapsed vendor key. Exact match after
/// normalization is the contract here; fuzzy vendor matching belongs to the
/// import layer.
pub fn normalize_vendor(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// What the user has taught us about one vendor. Created on the first
/// correction naming the vendor, mutated by every subsequent one, never
/// deleted automatically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VendorPattern {
    /// Normalized key (see [`normalize_vendor`]).
    pub vendor: String,
    /// Vendor name as the user last wrote it, for display.
    pub display_name: String,
    pub category: Option<String>,
    pub transaction_type: Option<TransactionType>,
    pub payment_method: Option<PaymentMethod>,
    pub income_source: Option<String>,
    pub confidence: f32,
    pub corrections: u32,
    pub updated_at: DateTime<Utc>,
}

impl VendorPattern {
    pub fn learned(
        display_name: &str,
        category: Option<String>,
        transaction_type: Option<TransactionType>,
        payment_method: Option<PaymentMethod>,
        income_source: Option<String>,
        config: &LearningConfig,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            vendor: normalize_vendor(display_name),
            display_name: display_name.to_string(),
            category,
            transaction_type,
            payment_method,
            income_source,
            confidence: config.vendor_initial_confidence,
            corrections: 1,
            updated_at: at,
        }
    }

    /// Whether a new correction agrees with what is already learned. Fields
    /// the correction leaves untouched do not count as disagreement.
    pub fn agrees_with(
        &self,
        category: Option<&str>,
        transaction_type: Option<TransactionType>,
    ) -> bool {
        let category_ok = match (category, self.category.as_deref()) {
            (Some(new), Some(old)) => new.eq_ignore_ascii_case(old),
            (Some(_), None) => true, // learning a category where none existed
            (None, _) => true,
        };
        let type_ok = match (transaction_type, self.transaction_type) {
            (Some(new), Some(old)) => new == old,
            _ => true,
        };
        category_ok && type_ok
    }

    /// Repeated identical correction: count up, confidence toward 1.0.
    pub fn reinforce(&mut self, config: &LearningConfig, at: DateTime<Utc>) {
        self.corrections += 1;
        self.confidence = (self.confidence + config.vendor_reinforce_step).min(1.0);
        self.updated_at = at;
    }

    /// Contradicting correction: overwrite the learned fields and reset to a
    /// freshly-learned confidence. Contradictory evidence is not averaged.
    pub fn overwrite(
        &mut self,
        category: Option<String>,
        transaction_type: Option<TransactionType>,
        payment_method: Option<PaymentMethod>,
        income_source: Option<String>,
        config: &LearningConfig,
        at: DateTime<Utc>,
    ) {
        if category.is_some() {
            self.category = category;
        }
        if transaction_type.is_some() {
            self.transaction_type = transaction_type;
        }
        if payment_method.is_some() {
            self.payment_method = payment_method;
        }
        if income_source.is_some() {
            self.income_source = income_source;
        }
        self.corrections += 1;
        self.confidence = config.vendor_reset_confidence;
        self.updated_at = at;
    }

    /// Fill in fields the correction supplied that the pattern had not
    /// learned yet (e.g. a payment method arriving after the category).
    pub fn absorb(
        &mut self,
        payment_method: Option<PaymentMethod>,
        income_source: Option<String>,
    ) {
        if self.payment_method.is_none() {
            self.payment_method = payment_method;
        }
        if self.income_source.is_none() {
            self.income_source = income_source;
        }
    }
}
