//! Presentation of generated guide text as an ordered list.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static NUMBERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*").expect("valid regex"));
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-•]\s*").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedGuide {
    /// Escaped list entries with their numbering or bullet markers removed.
    pub steps: Vec<String>,
}

impl FormattedGuide {
    pub fn to_html(&self) -> String {
        let mut html = String::from("<ol>");
        for step in &self.steps {
            html.push_str("<li>");
            html.push_str(step);
            html.push_str("</li>");
        }
        html.push_str("</ol>");
        html
    }
}

/// Split raw model output into list entries.
///
/// Markup-significant characters are escaped before any line handling, so
/// entries are always safe to embed in HTML.
pub fn format_guide(text: &str) -> FormattedGuide {
    let escaped = html_escape::encode_quoted_attribute(text);
    let steps = escaped
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(strip_marker)
        .collect();
    FormattedGuide { steps }
}

fn strip_marker(line: &str) -> String {
    if NUMBERED_RE.is_match(line) {
        NUMBERED_RE.replace(line, "").into_owned()
    } else {
        BULLET_RE.replace(line, "").into_owned()
    }
}
