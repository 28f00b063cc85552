//! Deterministic indicator scanners.
//!
//! Everything here is a pure function over the transaction's text. Absence of
//! a signal is an empty list, never an option of a list, so callers can test
//! truthiness uniformly; nothing in this module can panic on user input.

use std::sync::OnceLock;

use regex::Regex;

use tally_core::TransactionCandidate;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_debit, r"\bdebit\b");
re!(re_direct_debit, r"\bdirect\s+debit\b");
re!(re_cash, r"\bcash\b");
re!(re_check_number, r"check\s*#");
re!(re_deposit, r"\bdeposit");

// ── Indicator vocabularies ────────────────────────────────────────────────────
// Keyword lists plus recognized brand names, matched case-insensitively as
// substrings of description + vendor + line items.

const FUEL_KEYWORDS: &[&str] = &["fuel", "gasoline", "diesel", "unleaded", "gas station", "pump"];
const FUEL_BRANDS: &[&str] = &[
    "shell", "chevron", "exxon", "mobil", "sunoco", "valero", "marathon", "texaco", "conoco",
];

const HARDWARE_KEYWORDS: &[&str] = &["hardware", "lumber", "drywall", "plumbing", "tool rental"];
const HARDWARE_BRANDS: &[&str] = &[
    "home depot", "lowe's", "lowes", "ace hardware", "menards", "harbor freight",
    "tractor supply", "true value",
];

const RESTAURANT_KEYWORDS: &[&str] = &[
    "restaurant", "cafe", "coffee", "grill", "diner", "pizza", "burger", "taco", "bakery",
    "bistro",
];
const RESTAURANT_BRANDS: &[&str] = &[
    "mcdonald's", "starbucks", "subway", "chipotle", "wendy's", "chick-fil-a", "panera",
    "dunkin",
];

const GROCERY_KEYWORDS: &[&str] = &["grocery", "supermarket", "produce", "deli"];
const GROCERY_BRANDS: &[&str] = &[
    "kroger", "safeway", "albertsons", "aldi", "publix", "wegmans", "trader joe's",
    "whole foods", "food lion",
];

const OFFICE_KEYWORDS: &[&str] = &["office suppl", "paper", "toner", "ink cartridge", "printer"];
const OFFICE_BRANDS: &[&str] = &["staples", "office depot", "officemax", "quill"];

const CHECK_PHRASES: &[&str] = &["check #", "pay to the order of", "memo:"];
const DEPOSIT_KEYWORDS: &[&str] = &["deposit", "bank", "credit union", "checking", "savings"];

/// Everything the deterministic scanners found in one transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectedSignals {
    /// Normalized explicit payment method ("Debit", "Card", "Cash", ...),
    /// from the OCR field when present, else from literal text.
    pub payment_method_text: Option<String>,
    /// Matched terms per category family — the evidence, not just a flag.
    pub fuel: Vec<String>,
    pub hardware: Vec<String>,
    pub restaurant: Vec<String>,
    pub grocery: Vec<String>,
    pub office: Vec<String>,
    pub check: Vec<String>,
    pub deposit: Vec<String>,
}

impl DetectedSignals {
    pub fn extract(tx: &TransactionCandidate) -> Self {
        let combined = tx.combined_text();
        let header = tx.header_text();
        let ocr = tx.ocr_payment_method.as_deref();

        Self {
            payment_method_text: detect_explicit_payment(&combined, ocr),
            fuel: detect_family(&combined, FUEL_KEYWORDS, FUEL_BRANDS),
            hardware: detect_family(&combined, HARDWARE_KEYWORDS, HARDWARE_BRANDS),
            restaurant: detect_family(&combined, RESTAURANT_KEYWORDS, RESTAURANT_BRANDS),
            grocery: detect_family(&combined, GROCERY_KEYWORDS, GROCERY_BRANDS),
            office: detect_family(&combined, OFFICE_KEYWORDS, OFFICE_BRANDS),
            check: detect_check(&combined, ocr),
            deposit: detect_deposit(&header),
        }
    }

    /// Flat tag list for the service summary, e.g. `fuel:diesel`, `check`.
    pub fn indicator_tags(&self) -> Vec<String> {
        let mut tags = Vec::new();
        if let Some(pm) = &self.payment_method_text {
            tags.push(format!("payment_method:{pm}"));
        }
        for (family, terms) in [
            ("fuel", &self.fuel),
            ("hardware", &self.hardware),
            ("restaurant", &self.restaurant),
            ("grocery", &self.grocery),
            ("office", &self.office),
            ("check", &self.check),
            ("deposit", &self.deposit),
        ] {
            for term in terms {
                tags.push(format!("{family}:{term}"));
            }
        }
        tags
    }

    pub fn any_category_family(&self) -> bool {
        !(self.fuel.is_empty()
            && self.hardware.is_empty()
            && self.restaurant.is_empty()
            && self.grocery.is_empty()
            && self.office.is_empty())
    }
}

/// Explicit payment method. The OCR-reported field is authoritative when
/// present; combined "debit/credit" text normalizes to the generic "Card".
/// In free text a standalone "debit" (not part of "direct debit") is matched
/// before credit, and credit requires the full phrase "credit card" so that
/// "credit union" cannot false-positive.
fn detect_explicit_payment(combined: &str, ocr: Option<&str>) -> Option<String> {
    if let Some(raw) = ocr {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let lower = trimmed.to_lowercase();
            if lower.contains("debit") && lower.contains("credit") {
                return Some("Card".to_string());
            }
            return Some(trimmed.to_string());
        }
    }

    if re_debit().is_match(combined) && !re_direct_debit().is_match(combined) {
        return Some("Debit".to_string());
    }
    if combined.contains("credit card") {
        return Some("Credit".to_string());
    }
    if re_cash().is_match(combined) {
        return Some("Cash".to_string());
    }
    if re_check_number().is_match(combined) {
        return Some("Check".to_string());
    }
    if re_deposit().is_match(combined) {
        return Some("Deposit".to_string());
    }
    None
}

fn detect_family(text: &str, keywords: &[&str], brands: &[&str]) -> Vec<String> {
    keywords
        .iter()
        .chain(brands.iter())
        .filter(|term| text.contains(*term))
        .map(|term| term.to_string())
        .collect()
}

/// OCR payment method exactly "check" is authoritative; otherwise fall back
/// to literal check phrasing in the text.
fn detect_check(combined: &str, ocr: Option<&str>) -> Vec<String> {
    if let Some(raw) = ocr {
        let lower = raw.trim().to_lowercase();
        if lower == "check" || lower == "cheque" {
            return vec!["check".to_string()];
        }
    }
    CHECK_PHRASES
        .iter()
        .filter(|phrase| combined.contains(*phrase))
        .map(|phrase| phrase.to_string())
        .collect()
}

/// Scans vendor + description only — a line item mentioning a bottle deposit
/// must not reclassify the transaction.
fn detect_deposit(header: &str) -> Vec<String> {
    DEPOSIT_KEYWORDS
        .iter()
        .filter(|kw| header.contains(*kw))
        .map(|kw| kw.to_string())
        .collect()
}
