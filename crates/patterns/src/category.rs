use serde::{Deserialize, Serialize};

/// Lowercase alphanumeric tokens of at least three characters, sorted and
/// deduplicated. Short tokens ("of", "to", card digits) carry no signal.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3 && !w.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect();
    tokens.sort();
    tokens.dedup();
    tokens
}

/// A learned "from category X, to category Y" correction, triggered by
/// keyword overlap or a vendor match. Confidence is derived, not stored
/// authority: occurrences over the total corrections sharing the same source
/// category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryPattern {
    pub from_category: String,
    pub to_category: String,
    pub vendor: Option<String>,
    pub keywords: Vec<String>,
    pub occurrences: u32,
    pub confidence: f32,
    /// Free-text notes users attached to the corrections behind this pattern.
    pub reasons: Vec<String>,
}

impl CategoryPattern {
    pub fn first(
        from_category: &str,
        to_category: &str,
        vendor: Option<String>,
        keywords: Vec<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            from_category: from_category.to_lowercase(),
            to_category: to_category.to_lowercase(),
            vendor,
            keywords,
            occurrences: 1,
            confidence: 1.0, // recomputed against the trigger total by the store
            reasons: reason.into_iter().collect(),
        }
    }

    pub fn record_repeat(&mut self, keywords: Vec<String>, reason: Option<String>) {
        self.occurrences += 1;
        for k in keywords {
            if !self.keywords.contains(&k) {
                self.keywords.push(k);
            }
        }
        self.keywords.sort();
        if let Some(r) = reason {
            self.reasons.push(r);
        }
    }

    /// Whether this pattern is relevant to a transaction, given the
    /// transaction's tokenized text and normalized vendor.
    pub fn matches(&self, tokens: &[String], vendor: &str) -> bool {
        if let Some(v) = &self.vendor {
            if v == vendor {
                return true;
            }
        }
        self.keywords.iter().any(|k| tokens.binary_search(k).is_ok())
    }
}
