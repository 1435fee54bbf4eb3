//! Small SQL text primitives shared by the attribution compiler.
//!
//! Everything here renders BigQuery-dialect fragments. The generated
//! text is embedded verbatim in a larger materialization job, so
//! rendering must be deterministic for a given input.

use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("static identifier pattern"));

/// Whether `name` is usable as an output column name.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Render a SQL string literal, escaping embedded quotes and backslashes.
pub fn literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// Render a parenthesized literal list: `('a','b','c')`.
pub fn literal_list(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| literal(v)).collect();
    format!("({})", items.join(","))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Include,
    Exclude,
}

/// Render an `in` / `not in` membership filter over `column`.
/// An empty list filters nothing and renders as `true` so the caller
/// can always `and` it into a where clause.
pub fn list_filter(kind: FilterKind, column: &str, values: &[String]) -> String {
    if values.is_empty() {
        return "true".to_string();
    }
    let op = match kind {
        FilterKind::Include => "in",
        FilterKind::Exclude => "not in",
    };
    format!("{column} {op} {}", literal_list(values))
}

/// Wrap a projection list in a STRUCT constructor.
pub fn struct_of(fields: &str) -> String {
    format!("struct({fields})")
}

/// Coalesce a list of expressions. A single expression passes through
/// unwrapped.
pub fn coalesce(exprs: &[String]) -> String {
    match exprs {
        [single] => single.clone(),
        many => format!("coalesce({})", many.join(", ")),
    }
}
