use similar::{ChangeTag, TextDiff};

/// Word-level summary of an edit, e.g. `-1/+1 words`.
pub fn summarize_change(old: &str, new: &str) -> String {
    let diff = TextDiff::from_words(old, new);
    let mut removed = 0usize;
    let mut added = 0usize;
    for change in diff.iter_all_changes() {
        if change.value().trim().is_empty() {
            continue;
        }
        match change.tag() {
            ChangeTag::Delete => removed += 1,
            ChangeTag::Insert => added += 1,
            ChangeTag::Equal => {}
        }
    }
    format!("-{removed}/+{added} words")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_swapped_words() {
        assert_eq!(
            summarize_change("Course overview", "Subject overview"),
            "-1/+1 words"
        );
    }

    #[test]
    fn identical_text_has_no_changes() {
        assert_eq!(summarize_change("same text", "same text"), "-0/+0 words");
    }
}
