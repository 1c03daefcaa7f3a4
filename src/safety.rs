use std::ops::Range;

use crate::matcher::{LiteralMatcher, Matcher};

/// Neighbouring text that makes a hit inside a longer word acceptable,
/// e.g. suffix `s` lets "course" be replaced inside "courses".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordGuard {
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

impl WordGuard {
    pub fn new(prefix: Option<&str>, suffix: Option<&str>) -> Self {
        let clean = |value: Option<&str>| value.filter(|v| !v.is_empty()).map(str::to_string);
        Self {
            prefix: clean(prefix),
            suffix: clean(suffix),
        }
    }
}

/// A masked subject is safe when at least one occurrence of the term stands
/// on its own, or sits inside a longer word only next to the guard text.
pub fn is_safe(masked: &str, search: &LiteralMatcher, guard: &WordGuard) -> bool {
    search
        .find_spans(masked)
        .iter()
        .any(|span| occurrence_is_safe(masked, span.range.clone(), guard))
}

fn occurrence_is_safe(masked: &str, range: Range<usize>, guard: &WordGuard) -> bool {
    let found = &masked[range.clone()];
    let before = &masked[..range.start];
    let after = &masked[range.end..];

    let joins_before = found.chars().next().is_some_and(char::is_alphabetic)
        && before.chars().next_back().is_some_and(char::is_alphabetic);
    let joins_after = found.chars().next_back().is_some_and(char::is_alphabetic)
        && after.chars().next().is_some_and(char::is_alphabetic);
    if !joins_before && !joins_after {
        return true;
    }

    let prefixed = guard
        .prefix
        .as_deref()
        .is_some_and(|prefix| before.ends_with(prefix));
    let suffixed = guard
        .suffix
        .as_deref()
        .is_some_and(|suffix| after.starts_with(suffix));
    prefixed || suffixed
}
