//! Linked comments: `Linked to <url>/t/<slug> [do not edit this line]`.
//!
//! A script is linked to a remote task by a single comment line written in the
//! script's own comment syntax.

use regex::Regex;
use std::sync::LazyLock;

const LINK_SUFFIX: &str = "[do not edit this line]";

static LINKED_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"(?m)^[ \t]*(//|#|--)[ \t]*Linked to (\S+)/t/([A-Za-z0-9_-]+) \[do not edit this line\][ \t]*\r?$").unwrap()
});

/// Prefixes every line of `text` with `prefix` and a space.
#[must_use]
pub fn format_comment(prefix: &str, text: &str) -> String {
    text.split('\n')
        .map(|line| format!("{prefix} {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The link line for `task_url`, without comment syntax.
#[must_use]
pub fn link_text(task_url: &str) -> String {
    format!("Linked to {task_url} {LINK_SUFFIX}")
}

/// Extracts the task slug from the first linked comment written with `prefix`.
#[must_use]
pub fn slug(source: &str, prefix: &str) -> Option<String> {
    LINKED_RE
        .captures_iter(source)
        .find(|caps| &caps[1] == prefix)
        .map(|caps| caps[3].to_string())
}
