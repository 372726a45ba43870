//! Semantic validation of definition documents.
//!
//! Every check appends a `field: problem` message; nothing short-circuits, so a
//! user fixing a definition sees all problems at once.

use super::task::{KindDefinition, RawDefinition};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

pub(super) const NO_KIND_MESSAGE: &str =
    "(root): expected exactly one of image, node, python, shell, sql, rest";

const MAX_SLUG_LEN: usize = 50;

const REST_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[a-z0-9_]+$").unwrap()
});

pub(super) fn definition(raw: &RawDefinition, kinds: &[KindDefinition]) -> Vec<String> {
    let mut messages = Vec::new();

    if let Some(version) = &raw.version {
        let version = version.as_str().map_or_else(|| version.to_string(), str::to_string);
        if version != "0.3" {
            messages.push(format!("version: expected 0.3, got {version}"));
        }
    }
    check_slug("slug", &raw.slug, "a task slug", &mut messages);
    if raw.name.trim().is_empty() {
        messages.push("name: expected a task name".to_string());
    }

    match kinds {
        [] => messages.push(NO_KIND_MESSAGE.to_string()),
        [kind] => check_kind(kind, &mut messages),
        many => {
            let names: Vec<&str> = many.iter().map(|k| k.kind().as_str()).collect();
            messages.push(format!(
                "(root): too many task types defined: only one of ({}) expected",
                names.join(", ")
            ));
        }
    }

    let mut seen = HashSet::new();
    for (i, param) in raw.parameters.iter().enumerate() {
        check_slug(
            &format!("parameters[{i}].slug"),
            &param.slug,
            "a parameter slug",
            &mut messages,
        );
        if param.name.trim().is_empty() {
            messages.push(format!("parameters[{i}].name: expected a parameter name"));
        }
        if !param.slug.is_empty() && !seen.insert(param.slug.as_str()) {
            messages.push(format!(
                "parameters[{i}].slug: duplicate parameter slug '{}'",
                param.slug
            ));
        }
    }

    if raw.timeout == Some(0) {
        messages.push("timeout: must be greater than zero".to_string());
    }

    messages
}

fn check_slug(field: &str, slug: &str, what: &str, messages: &mut Vec<String>) {
    if slug.is_empty() {
        messages.push(format!("{field}: expected {what}"));
    } else if slug.len() > MAX_SLUG_LEN {
        messages.push(format!("{field}: must be at most {MAX_SLUG_LEN} characters"));
    } else if !SLUG_RE.is_match(slug) {
        messages.push(format!(
            "{field}: '{slug}' must contain only lowercase letters, digits and underscores"
        ));
    }
}

fn check_kind(kind: &KindDefinition, messages: &mut Vec<String>) {
    let name = kind.kind().as_str();
    let required: Vec<(&str, &str)> = match kind {
        KindDefinition::Image(d) => vec![("image", d.image.as_str())],
        KindDefinition::Node(d) => vec![("entrypoint", d.entrypoint.as_str())],
        KindDefinition::Python(d) => vec![("entrypoint", d.entrypoint.as_str())],
        KindDefinition::Shell(d) => vec![("entrypoint", d.entrypoint.as_str())],
        KindDefinition::Sql(d) => vec![
            ("resource", d.resource.as_str()),
            ("entrypoint", d.entrypoint.as_str()),
        ],
        KindDefinition::Rest(d) => vec![
            ("resource", d.resource.as_str()),
            ("method", d.method.as_str()),
            ("path", d.path.as_str()),
        ],
    };
    for (field, value) in required {
        if value.trim().is_empty() {
            messages.push(format!("{name}.{field}: expected a value"));
        }
    }

    if let KindDefinition::Rest(d) = kind
        && !d.method.is_empty()
        && !REST_METHODS.contains(&d.method.as_str())
    {
        messages.push(format!(
            "rest.method: '{}' is not one of {}",
            d.method,
            REST_METHODS.join(", ")
        ));
    }
}
