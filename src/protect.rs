use std::sync::LazyLock;

use regex::{Captures, Regex};

const TOKEN_OPEN: char = '\u{E000}';
const TOKEN_CLOSE: char = '\u{E001}';
const TOKEN_DIGIT_BASE: u32 = 0xE010;

/// Markup that must survive a replacement untouched. Any private-use
/// character already present in the input is masked as well so that the
/// token alphabet can never collide with real content.
static FRAGMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"[\x{E000}-\x{F8FF}]",
        r"|%%",
        r"|%(?:\d+\$)?[-+0#']*\d*(?:\.\d+)?[bcdeEfFgGosuxX]",
        r"|\{\$[A-Za-z_]\w*(?:->\w+)*\}",
        r"|\{\{[^{}]*\}\}",
        r"|\{\d+\}",
        r"|</?[A-Za-z][^<>]*>",
        r"|&(?:[A-Za-z]+|#\d+|#[xX][0-9A-Fa-f]+);",
        r#"|https?://[^\s<>"]+"#,
    ))
    .expect("fragment pattern is valid")
});

/// A string with its markup fragments swapped for opaque tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Masked {
    text: String,
    fragments: Vec<String>,
}

impl Masked {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Reverses the masking on any text derived from [`Masked::text`].
    /// Tokens are replaced by the fragment they stand for; everything else
    /// is copied through unchanged.
    pub fn unmask(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.char_indices().peekable();
        while let Some((start, ch)) = chars.next() {
            if ch != TOKEN_OPEN {
                out.push(ch);
                continue;
            }
            let mut index = 0usize;
            let mut digits = 0usize;
            let mut closed_at = None;
            while let Some(&(pos, next)) = chars.peek() {
                if next == TOKEN_CLOSE {
                    chars.next();
                    closed_at = Some(pos + next.len_utf8());
                    break;
                }
                let Some(digit) = token_digit(next) else {
                    break;
                };
                index = index.saturating_mul(10).saturating_add(digit);
                digits += 1;
                chars.next();
            }
            match (closed_at, self.fragments.get(index)) {
                (Some(_), Some(fragment)) if digits > 0 => out.push_str(fragment),
                (Some(end), _) => out.push_str(&text[start..end]),
                (None, _) => {
                    let end = chars.peek().map_or(text.len(), |&(pos, _)| pos);
                    out.push_str(&text[start..end]);
                }
            }
        }
        out
    }

    pub fn restore(&self) -> String {
        self.unmask(&self.text)
    }
}

pub fn mask(text: &str) -> Masked {
    let mut fragments = Vec::new();
    let masked = FRAGMENT_PATTERN.replace_all(text, |caps: &Captures<'_>| {
        let token = encode_token(fragments.len());
        fragments.push(caps[0].to_string());
        token
    });
    Masked {
        text: masked.into_owned(),
        fragments,
    }
}

/// True for every character the token alphabet may use.
pub fn is_token_char(ch: char) -> bool {
    ('\u{E000}'..='\u{F8FF}').contains(&ch)
}

pub fn contains_token_chars(text: &str) -> bool {
    text.chars().any(is_token_char)
}

fn encode_token(index: usize) -> String {
    let mut token = String::new();
    token.push(TOKEN_OPEN);
    for digit in index.to_string().bytes() {
        let code = TOKEN_DIGIT_BASE + u32::from(digit - b'0');
        token.extend(char::from_u32(code));
    }
    token.push(TOKEN_CLOSE);
    token
}

fn token_digit(ch: char) -> Option<usize> {
    let offset = u32::from(ch).checked_sub(TOKEN_DIGIT_BASE)?;
    (offset < 10).then_some(offset as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(input: &str) {
        let masked = mask(input);
        assert_eq!(masked.restore(), input, "round trip failed for {input:?}");
    }

    #[test]
    fn round_trip_plain_and_marked_up_text() {
        round_trip("");
        round_trip("Course overview");
        round_trip("You have %d new %s");
        round_trip("Hello {$a->firstname}, see {$a}");
        round_trip("<strong>Course</strong> &amp; more");
        round_trip("Visit https://example.org/course?id=1 now");
        round_trip("100%% done, {{name}} and {0}");
        round_trip("%1$s of %2$s");
    }

    #[test]
    fn fragments_leave_only_prose_visible() {
        let masked = mask("<b>course</b> has %s items");
        assert_eq!(masked.fragment_count(), 3);
        assert!(!masked.text().contains('<'));
        assert!(!masked.text().contains("%s"));
        assert!(masked.text().contains("course"));
        assert!(masked.text().contains(" has "));
    }

    #[test]
    fn tokens_are_invisible_to_ascii_searches() {
        let masked = mask("a %s b %d c %s d %s e %s f %s g %s h %s i %s j %s k %s");
        assert_eq!(masked.fragment_count(), 11);
        for needle in ["1", "0", "s", "%", "d"] {
            let visible = masked.text().matches(needle).count();
            let prose = masked.text().chars().filter(|c| !is_token_char(*c)).collect::<String>();
            assert_eq!(visible, prose.matches(needle).count());
        }
    }

    #[test]
    fn existing_private_use_characters_are_masked_too() {
        let input = "odd \u{E000}\u{E010}\u{E001} content";
        let masked = mask(input);
        assert_eq!(masked.fragment_count(), 3);
        assert_eq!(masked.restore(), input);
    }

    #[test]
    fn unmask_keeps_edits_around_tokens() {
        let masked = mask("course <b>title</b>");
        let edited = masked.text().replace("course", "subject");
        assert_eq!(masked.unmask(&edited), "subject <b>title</b>");
    }

    #[test]
    fn unmask_passes_through_unknown_tokens() {
        let masked = mask("plain");
        let stray = format!("x{}y", encode_token(7));
        assert_eq!(masked.unmask(&stray), stray);
    }
}
