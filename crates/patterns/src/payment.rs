use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::PaymentMethod;

use crate::config::LearningConfig;
use crate::vendor::normalize_vendor;

/// Vendor → payment method association. Kept separate from [`crate::VendorPattern`]
/// because users correct payment methods independently of categories. One
/// active pattern per vendor: learning a different method replaces the old
/// one, it does not accumulate alongside it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentPattern {
    /// Normalized vendor key.
    pub vendor: String,
    pub payment_method: PaymentMethod,
    pub confidence: f32,
    pub corrections: u32,
    pub updated_at: DateTime<Utc>,
}

impl PaymentPattern {
    pub fn learned(
        vendor: &str,
        payment_method: PaymentMethod,
        config: &LearningConfig,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            vendor: normalize_vendor(vendor),
            payment_method,
            confidence: config.payment_initial_confidence,
            corrections: 1,
            updated_at: at,
        }
    }

    /// Same method corrected again: reinforce. Different method: replace and
    /// reset, mirroring the vendor-pattern contradiction semantics.
    pub fn learn(&mut self, method: PaymentMethod, config: &LearningConfig, at: DateTime<Utc>) {
        if self.payment_method == method {
            self.corrections += 1;
            self.confidence = (self.confidence + config.payment_reinforce_step).min(1.0);
        } else {
            self.payment_method = method;
            self.corrections = 1;
            self.confidence = config.payment_reset_confidence;
        }
        self.updated_at = at;
    }
}
