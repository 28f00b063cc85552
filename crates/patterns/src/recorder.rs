use tally_core::FinalizedTransaction;

use crate::correction::CategorizationCorrection;
use crate::store::PatternStore;

/// Turn a user edit into a correction record and fold it into the store.
///
/// Returns the record so the caller can append it to the durable log; the
/// store update and the returned record come from the same diff, keeping the
/// log and the projection in step. Returns `None` when the edit changed
/// nothing. A persistence failure on the caller's side must be surfaced to
/// the user (a lost correction is a regression) but must not block the
/// categorization result that prompted the edit.
pub fn record_edit(
    store: &mut PatternStore,
    before: &FinalizedTransaction,
    after: &FinalizedTransaction,
) -> Option<CategorizationCorrection> {
    let correction = CategorizationCorrection::from_edit(before, after)?;
    if correction.is_categorization_correction {
        tracing::info!(
            vendor = %correction.vendor,
            fields = correction.changes.len(),
            "learning from categorization correction"
        );
    }
    store.apply_correction(&correction);
    Some(correction)
}
