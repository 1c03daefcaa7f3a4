use anyhow::Result;

use crate::locate::Located;
use crate::matcher::splice;
use crate::store::{StringStore, TranslatableString};

pub struct ReplacementOutcome {
    pub record: TranslatableString,
    pub before: Option<String>,
    pub after: String,
}

/// Substitutes every span in the masked subject and restores the markup.
pub fn replaced_text(located: &Located) -> String {
    let edited = splice(located.masked.text(), &located.spans);
    located.masked.unmask(&edited)
}

/// Writes the replaced subject to `local` and persists the record. `master`
/// and `original` are never touched.
pub fn apply(
    record: &TranslatableString,
    located: &Located,
    store: &mut dyn StringStore,
) -> Result<ReplacementOutcome> {
    let after = replaced_text(located);
    let mut updated = record.clone();
    let before = updated.local.replace(after.clone());
    store.persist_local(&updated)?;
    Ok(ReplacementOutcome {
        record: updated,
        before,
        after,
    })
}
