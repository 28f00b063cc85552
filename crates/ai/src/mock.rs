use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tally_core::TransactionCandidate;

use crate::types::{CategorizationJudgment, PatternSummary, StageOneSelection};
use crate::{AiError, JudgmentService};

/// Canned-response service for tests, in the spirit of the usual mock
/// recognizer: no network, deterministic, and it counts calls so tests can
/// assert that the deterministic bypass really skipped the service.
#[derive(Default)]
pub struct MockJudge {
    selection: Mutex<Option<StageOneSelection>>,
    judgment: Mutex<Option<CategorizationJudgment>>,
    fail: bool,
    select_calls: AtomicUsize,
    categorize_calls: AtomicUsize,
}

impl MockJudge {
    /// A judge that errors on every call.
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn with_selection(selection: StageOneSelection) -> Self {
        Self {
            selection: Mutex::new(Some(selection)),
            ..Self::default()
        }
    }

    pub fn with_judgment(judgment: CategorizationJudgment) -> Self {
        Self {
            judgment: Mutex::new(Some(judgment)),
            ..Self::default()
        }
    }

    pub fn with_responses(selection: StageOneSelection, judgment: CategorizationJudgment) -> Self {
        Self {
            selection: Mutex::new(Some(selection)),
            judgment: Mutex::new(Some(judgment)),
            ..Self::default()
        }
    }

    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    pub fn categorize_calls(&self) -> usize {
        self.categorize_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl JudgmentService for MockJudge {
    async fn select_patterns(
        &self,
        _tx: &TransactionCandidate,
        _summary: &PatternSummary,
    ) -> Result<StageOneSelection, AiError> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AiError::Empty);
        }
        self.selection
            .lock()
            .map_err(|_| AiError::Malformed("mock lock poisoned".to_string()))?
            .clone()
            .ok_or(AiError::Empty)
    }

    async fn categorize(
        &self,
        _tx: &TransactionCandidate,
        _summary: &PatternSummary,
        _rules: &str,
    ) -> Result<CategorizationJudgment, AiError> {
        self.categorize_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AiError::Empty);
        }
        self.judgment
            .lock()
            .map_err(|_| AiError::Malformed("mock lock poisoned".to_string()))?
            .clone()
            .ok_or(AiError::Empty)
    }
}
