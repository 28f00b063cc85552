//! JSON extraction from model responses.
//!
//! Models routinely wrap their JSON payload in prose; the extraction takes
//! the span from the first `{` to the last `}` and parses that.

use crate::types::{CategorizationJudgment, StageOneSelection};
use crate::AiError;

fn extract_json(response: &str) -> Result<&str, AiError> {
    let response = response.trim();
    match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&response[start..=end]),
        _ => Err(AiError::Malformed(format!(
            "no JSON object in response: {}",
            truncate(response)
        ))),
    }
}

/// Cap error-message payloads at 200 characters. Counted in chars, not
/// bytes: model prose is full of multibyte text and a slice at a fixed byte
/// offset could land inside a character.
fn truncate(s: &str) -> String {
    match s.char_indices().nth(200) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

pub fn parse_judgment(response: &str) -> Result<CategorizationJudgment, AiError> {
    let json = extract_json(response)?;
    serde_json::from_str(json)
        .map_err(|e| AiError::Malformed(format!("invalid judgment JSON: {e} | raw: {}", truncate(json))))
}

pub fn parse_selection(response: &str) -> Result<StageOneSelection, AiError> {
    let json = extract_json(response)?;
    serde_json::from_str(json)
        .map_err(|e| AiError::Malformed(format!("invalid selection JSON: {e} | raw: {}", truncate(json))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_judgment_wrapped_in_prose() {
        let response = r#"Sure! Here is the categorization:
            {"type": "expense", "category": "meals", "confidence": 0.8}
            Let me know if you need anything else."#;
        let j = parse_judgment(response).unwrap();
        assert_eq!(j.category, "meals");
    }

    #[test]
    fn rejects_response_without_json() {
        let err = parse_judgment("I could not categorize this transaction.").unwrap_err();
        assert!(matches!(err, AiError::Malformed(_)));
    }

    #[test]
    fn rejects_truncated_json() {
        let err = parse_judgment(r#"{"type": "expense", "category":"#).unwrap_err();
        assert!(matches!(err, AiError::Malformed(_)));
    }

    #[test]
    fn parses_selection() {
        let s = parse_selection(
            r#"{"trustVendorPattern": false, "relevantIndicators": ["fuel:diesel"]}"#,
        )
        .unwrap();
        assert!(!s.trust_vendor_pattern);
        assert_eq!(s.relevant_indicators, vec!["fuel:diesel"]);
    }

    #[test]
    fn long_garbage_is_truncated_in_error() {
        let garbage = format!("{{{}", "x".repeat(500));
        let err = parse_judgment(&garbage).unwrap_err();
        let msg = err.to_string();
        assert!(msg.len() < 600, "error message not truncated: {} chars", msg.len());
    }

    #[test]
    fn multibyte_prose_never_panics_in_error_path() {
        // A character straddling the truncation offset must not split.
        let response = format!("{}é — “curly quotes” and rambling model prose", "x".repeat(199));
        let err = parse_judgment(&response).unwrap_err();
        assert!(matches!(err, AiError::Malformed(_)));

        let emoji = "🧾".repeat(120);
        let err = parse_selection(&emoji).unwrap_err();
        assert!(matches!(err, AiError::Malformed(_)));
    }
}
