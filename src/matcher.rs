use std::ops::Range;

use regex::{Captures, Regex};

use crate::error::{ReplaceError, ReplaceResult};
use crate::protect::contains_token_chars;

/// One occurrence of the search inside a masked subject, together with the
/// text it would be replaced by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpan {
    pub range: Range<usize>,
    pub replacement: String,
}

/// Matching strategy chosen once per session.
pub trait Matcher {
    fn is_regex(&self) -> bool;

    /// The pattern as the operator typed it.
    fn pattern(&self) -> &str;

    /// Raw test used to pre-filter store records.
    fn is_match(&self, text: &str) -> bool;

    /// Every occurrence in a masked string, in order, never overlapping a
    /// placeholder token.
    fn find_spans(&self, masked: &str) -> Vec<MatchSpan>;

    /// The literal term the word-join check runs against. Regex searches
    /// have none and are never classified as dangerous.
    fn safety_term(&self) -> Option<&LiteralMatcher> {
        None
    }
}

pub fn build_matcher(
    search: &str,
    replacement: &str,
    regex: bool,
) -> ReplaceResult<Box<dyn Matcher>> {
    if regex {
        Ok(Box::new(RegexMatcher::new(search, replacement)?))
    } else {
        Ok(Box::new(LiteralMatcher::new(search, replacement)?))
    }
}

/// Splices the replacement of every span into `masked`.
pub fn splice(masked: &str, spans: &[MatchSpan]) -> String {
    let mut out = String::with_capacity(masked.len());
    let mut cursor = 0usize;
    for span in spans {
        out.push_str(&masked[cursor..span.range.start]);
        out.push_str(&span.replacement);
        cursor = span.range.end;
    }
    out.push_str(&masked[cursor..]);
    out
}

#[derive(Debug, Clone)]
struct Variant {
    search: String,
    replacement: String,
}

/// Case-sensitive substring search. The term is also looked for with its
/// first character capitalised, and such hits take the capitalised
/// replacement.
#[derive(Debug, Clone)]
pub struct LiteralMatcher {
    variants: Vec<Variant>,
    regex: Regex,
}

impl LiteralMatcher {
    pub fn new(search: &str, replacement: &str) -> ReplaceResult<Self> {
        let mut variants = vec![Variant {
            search: search.to_string(),
            replacement: replacement.to_string(),
        }];
        let capitalised = capitalise(search);
        if capitalised != search {
            variants.push(Variant {
                search: capitalised,
                replacement: capitalise(replacement),
            });
        }
        let alternation = variants
            .iter()
            .map(|variant| regex::escape(&variant.search))
            .collect::<Vec<_>>()
            .join("|");
        let regex = Regex::new(&alternation)?;
        Ok(Self { variants, regex })
    }

    pub fn search(&self) -> &str {
        &self.variants[0].search
    }

    fn replacement_for(&self, found: &str) -> &str {
        self.variants
            .iter()
            .find(|variant| variant.search == found)
            .map_or(self.variants[0].replacement.as_str(), |variant| {
                variant.replacement.as_str()
            })
    }
}

impl Matcher for LiteralMatcher {
    fn is_regex(&self) -> bool {
        false
    }

    fn pattern(&self) -> &str {
        self.search()
    }

    fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    fn find_spans(&self, masked: &str) -> Vec<MatchSpan> {
        self.regex
            .find_iter(masked)
            .map(|found| MatchSpan {
                range: found.range(),
                replacement: self.replacement_for(found.as_str()).to_string(),
            })
            .collect()
    }

    fn safety_term(&self) -> Option<&LiteralMatcher> {
        Some(self)
    }
}

/// Operator-supplied pattern, unanchored; replacements may refer to capture
/// groups (`$1`, `${name}`).
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    source: String,
    regex: Regex,
    replacement: String,
}

impl RegexMatcher {
    pub fn new(pattern: &str, replacement: &str) -> ReplaceResult<Self> {
        let regex = Regex::new(pattern)?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
            replacement: replacement.to_string(),
        })
    }

    fn expand(&self, caps: &Captures<'_>) -> String {
        let mut output = String::new();
        caps.expand(&self.replacement, &mut output);
        output
    }
}

impl Matcher for RegexMatcher {
    fn is_regex(&self) -> bool {
        true
    }

    fn pattern(&self) -> &str {
        &self.source
    }

    fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    fn find_spans(&self, masked: &str) -> Vec<MatchSpan> {
        self.regex
            .captures_iter(masked)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                if contains_token_chars(whole.as_str()) {
                    return None;
                }
                Some(MatchSpan {
                    range: whole.range(),
                    replacement: self.expand(&caps),
                })
            })
            .collect()
    }
}

pub fn capitalise(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Rejects search/replace text that could be confused with placeholder tokens.
pub fn ensure_token_free(label: &str, text: &str) -> ReplaceResult<()> {
    if contains_token_chars(text) {
        return Err(ReplaceError::config(format!(
            "{label} contains private-use characters reserved for placeholders"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protect::mask;

    #[test]
    fn literal_matches_capitalised_form_with_capitalised_replacement() {
        let matcher = LiteralMatcher::new("course", "subject").unwrap();
        let spans = matcher.find_spans("Course and course");
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].replacement, "Subject");
        assert_eq!(spans[1].replacement, "subject");
        assert_eq!(splice("Course and course", &spans), "Subject and subject");
    }

    #[test]
    fn literal_is_otherwise_case_sensitive() {
        let matcher = LiteralMatcher::new("course", "subject").unwrap();
        assert!(!matcher.is_match("COURSE"));
        let upper = LiteralMatcher::new("Course", "Subject").unwrap();
        assert!(!upper.is_match("course"));
    }

    #[test]
    fn literal_escapes_metacharacters() {
        let matcher = LiteralMatcher::new("a.b", "x").unwrap();
        assert!(matcher.is_match("a.b"));
        assert!(!matcher.is_match("axb"));
    }

    #[test]
    fn regex_expands_capture_groups() {
        let matcher = RegexMatcher::new(r"(\w+) course", "$1 subject").unwrap();
        let spans = matcher.find_spans("my course list");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].range, 0..9);
        assert_eq!(spans[0].replacement, "my subject");
    }

    #[test]
    fn regex_ignores_matches_across_tokens() {
        let masked = mask("a %s b");
        let matcher = RegexMatcher::new(r"a.+b", "z").unwrap();
        assert!(matcher.find_spans(masked.text()).is_empty());
        let plain = RegexMatcher::new(r"b", "z").unwrap();
        assert_eq!(plain.find_spans(masked.text()).len(), 1);
    }

    #[test]
    fn only_literal_searches_expose_a_safety_term() {
        let literal = build_matcher("course", "subject", false).unwrap();
        assert_eq!(literal.safety_term().map(LiteralMatcher::search), Some("course"));
        let regex = build_matcher("cour.e", "subject", true).unwrap();
        assert!(regex.safety_term().is_none());
    }

    #[test]
    fn invalid_regex_is_reported() {
        let err = build_matcher("(", "x", true).err().expect("must fail");
        assert!(matches!(err, ReplaceError::InvalidPattern(_)));
    }

    #[test]
    fn capitalise_handles_empty_and_non_letters() {
        assert_eq!(capitalise(""), "");
        assert_eq!(capitalise("%s"), "%s");
        assert_eq!(capitalise("über"), "Über");
    }
}
