use crate::locate::Located;
use crate::matcher::MatchSpan;

const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    /// The text the search found.
    Search,
    /// Replacement text of a safe match.
    Accept,
    /// Replacement text of a match that needs review.
    Danger,
}

impl Highlight {
    fn markers(self, colorize: bool) -> (&'static str, &'static str) {
        match (self, colorize) {
            (Highlight::Search, false) => (">>", "<<"),
            (Highlight::Accept, false) => ("{+", "+}"),
            (Highlight::Danger, false) => ("{!", "!}"),
            (Highlight::Search, true) => ("\x1b[1;33m", RESET),
            (Highlight::Accept, true) => ("\x1b[1;32m", RESET),
            (Highlight::Danger, true) => ("\x1b[1;31m", RESET),
        }
    }
}

/// Builds the before/after lines shown to the operator. Output is always
/// unmasked.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    colorize: bool,
}

impl Renderer {
    pub fn new(colorize: bool) -> Self {
        Self { colorize }
    }

    pub fn found(&self, located: &Located, regex: bool) -> String {
        let (open, close) = Highlight::Search.markers(self.colorize);
        let masked = located.masked.text();
        let rendered = wrap_spans(masked, visible_spans(&located.spans, regex), |span| {
            format!("{open}{}{close}", &masked[span.range.clone()])
        });
        located.masked.unmask(&rendered)
    }

    pub fn would_become(&self, located: &Located, regex: bool, style: Highlight) -> String {
        let (open, close) = style.markers(self.colorize);
        let masked = located.masked.text();
        let rendered = wrap_spans(masked, visible_spans(&located.spans, regex), |span| {
            format!("{open}{}{close}", span.replacement)
        });
        located.masked.unmask(&rendered)
    }
}

/// Matches that are replaced but left out of the preview.
pub fn hidden_matches(located: &Located, regex: bool) -> usize {
    located.spans.len() - visible_spans(&located.spans, regex).len()
}

/// Regex previews show the first match only; literal previews show all.
fn visible_spans(spans: &[MatchSpan], regex: bool) -> &[MatchSpan] {
    if regex { &spans[..spans.len().min(1)] } else { spans }
}

fn wrap_spans<F>(masked: &str, spans: &[MatchSpan], mut render: F) -> String
where
    F: FnMut(&MatchSpan) -> String,
{
    let mut out = String::with_capacity(masked.len() + spans.len() * 8);
    let mut cursor = 0usize;
    for span in spans {
        out.push_str(&masked[cursor..span.range.start]);
        out.push_str(&render(span));
        cursor = span.range.end;
    }
    out.push_str(&masked[cursor..]);
    out
}
