//! Parameter lines
//!
//! A parameter line is a whole line of the form `name = <number>`, with
//! optional surrounding whitespace. These are the only lines the guard
//! restores and the only lines parameter editing touches.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

// Literal pattern; compiling it cannot fail.
#[allow(clippy::unwrap_used)]
static ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\s*([A-Za-z_]\w*)\s*=\s*)([-+]?(?:\d+\.?\d*|\.\d+))(\s*)$").unwrap()
});

/// Split a parameter line into `(name, literal)`
#[must_use]
pub fn parse_assignment(line: &str) -> Option<(&str, &str)> {
    let caps = ASSIGNMENT.captures(line)?;
    Some((caps.get(2)?.as_str(), caps.get(3)?.as_str()))
}

/// Whether the line assigns a numeric literal to a single identifier
#[inline]
#[must_use]
pub fn is_parameter_line(line: &str) -> bool {
    ASSIGNMENT.is_match(line)
}

/// Whether the line assigns a numeric literal to `name`
#[must_use]
pub fn assigns(line: &str, name: &str) -> bool {
    parse_assignment(line).is_some_and(|(n, _)| n == name)
}

/// All parameter lines of a script, in first-seen order; later values win
#[must_use]
pub fn extract_parameters(code: &str) -> IndexMap<String, f64> {
    let mut params = IndexMap::new();
    for line in code.lines() {
        if let Some((name, literal)) = parse_assignment(line) {
            if let Ok(value) = literal.parse::<f64>() {
                params.insert(name.to_string(), value);
            }
        }
    }
    params
}

/// Rewrite every parameter line assigning `name`
///
/// Indentation and trailing whitespace are kept, as is a trailing newline.
#[must_use]
pub fn update_parameter(code: &str, name: &str, value: f64) -> String {
    let literal = format_value(value);
    let mut lines: Vec<String> = Vec::new();

    for line in code.lines() {
        let rewritten = ASSIGNMENT.captures(line).and_then(|caps| {
            (caps.get(2)?.as_str() == name).then(|| {
                let prefix = caps.get(1).map_or("", |m| m.as_str());
                let trailing = caps.get(4).map_or("", |m| m.as_str());
                format!("{prefix}{literal}{trailing}")
            })
        });
        lines.push(rewritten.unwrap_or_else(|| line.to_string()));
    }

    rejoin(lines, code)
}

/// Apply several parameter updates in map order
#[must_use]
pub fn update_parameters(code: &str, updates: &IndexMap<String, f64>) -> String {
    updates
        .iter()
        .fold(code.to_string(), |acc, (name, value)| update_parameter(&acc, name, *value))
}

/// Literal text for a parameter value; whole numbers keep a `.0`
#[must_use]
pub fn format_value(value: f64) -> String {
    format!("{value:?}")
}

pub(crate) fn rejoin(lines: Vec<String>, template: &str) -> String {
    let mut out = lines.join("\n");
    if template.ends_with('\n') {
        out.push('\n');
    }
    out
}
