use std::fmt;

use serde::Serialize;

use crate::matcher::{MatchSpan, Matcher};
use crate::protect::{Masked, mask};
use crate::store::TranslatableString;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Local,
    Master,
    Original,
}

impl Field {
    /// Search order: the customised value wins over the deployed one, which
    /// wins over the upstream one.
    pub const PRIORITY: [Field; 3] = [Field::Local, Field::Master, Field::Original];

    pub fn value(self, record: &TranslatableString) -> Option<&str> {
        match self {
            Field::Local => record.local.as_deref(),
            Field::Master => record.master.as_deref(),
            Field::Original => Some(record.original.as_str()),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Field::Local => "local",
            Field::Master => "master",
            Field::Original => "original",
        };
        f.write_str(label)
    }
}

/// The field a record matched on, in masked form, with its match spans.
#[derive(Debug, Clone)]
pub struct Located {
    pub field: Field,
    pub subject: String,
    pub masked: Masked,
    pub spans: Vec<MatchSpan>,
}

pub fn locate(record: &TranslatableString, matcher: &dyn Matcher) -> Option<Located> {
    Field::PRIORITY.into_iter().find_map(|field| {
        let subject = field.value(record)?;
        let masked = mask(subject);
        let spans = matcher.find_spans(masked.text());
        if spans.is_empty() {
            return None;
        }
        Some(Located {
            field,
            subject: subject.to_string(),
            masked,
            spans,
        })
    })
}
