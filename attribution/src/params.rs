//! Declarative parameter specs and the type-directed value resolver.
//!
//! A [`ParameterSpec`] describes one key to pull out of a nested
//! key/value collection. Resolution has two faces with identical
//! semantics: [`ParameterSpec::expression`] renders the SQL that the
//! warehouse will run, [`ParameterSpec::resolve`] applies the same
//! coercion rules to an in-memory bag.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::value::{KeyValueCollection, ResolvedValue, TypedValue};

/// Which nested collection a spec extracts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    EventParams,
    UserProperties,
    ItemParams,
}

impl Collection {
    pub fn column(&self) -> &'static str {
        match self {
            Collection::EventParams => "event_params",
            Collection::UserProperties => "user_properties",
            Collection::ItemParams => "item_params",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum SemanticType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "double")]
    Double,
    #[serde(rename = "decimal")]
    Decimal,
}

/// Expression-to-expression rewrites applied after coercion, so they
/// compose with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum CleaningTransform {
    #[serde(rename = "lowercase")]
    Lowercase,
    #[serde(rename = "safe_cast_int")]
    SafeCastInt,
    #[serde(rename = "normalize_ampersands")]
    NormalizeAmpersands,
}

static AMP_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)&amp(;|=)").expect("static ampersand pattern"));

impl CleaningTransform {
    /// Rewrite a SQL expression.
    pub fn apply_sql(&self, expr: &str) -> String {
        match self {
            CleaningTransform::Lowercase => format!("lower({expr})"),
            CleaningTransform::SafeCastInt => format!("safe_cast({expr} as INT64)"),
            CleaningTransform::NormalizeAmpersands => {
                format!("regexp_replace({expr}, r'(?i)&amp(;|=)', '&')")
            }
        }
    }

    /// The same rewrite over an in-memory value. `safe_cast` semantics:
    /// an uncastable value degrades to None, never an error.
    pub fn apply_value(&self, value: ResolvedValue) -> Option<ResolvedValue> {
        match self {
            CleaningTransform::Lowercase => Some(match value {
                ResolvedValue::Text(s) => ResolvedValue::Text(s.to_lowercase()),
                other => other,
            }),
            CleaningTransform::SafeCastInt => match value {
                ResolvedValue::Integer(i) => Some(ResolvedValue::Integer(i)),
                ResolvedValue::Text(s) => s.trim().parse::<i64>().ok().map(ResolvedValue::Integer),
                ResolvedValue::Number(n) => Some(ResolvedValue::Integer(n.round() as i64)),
            },
            CleaningTransform::NormalizeAmpersands => Some(match value {
                ResolvedValue::Text(s) => {
                    ResolvedValue::Text(AMP_ENTITY.replace_all(&s, "&").into_owned())
                }
                other => other,
            }),
        }
    }
}

/// One declarative parameter spec. Constructed once from static
/// configuration at startup, immutable afterwards.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,
    #[serde(default, rename = "rename_to")]
    pub rename_to: Option<String>,
    #[serde(default)]
    pub cleaning: Option<CleaningTransform>,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        ParameterSpec {
            name: name.into(),
            semantic_type,
            rename_to: None,
            cleaning: None,
        }
    }

    pub fn renamed(mut self, to: impl Into<String>) -> Self {
        self.rename_to = Some(to.into());
        self
    }

    pub fn cleaned(mut self, cleaning: CleaningTransform) -> Self {
        self.cleaning = Some(cleaning);
        self
    }

    /// The output column this spec is aliased to.
    pub fn output_name(&self) -> &str {
        self.rename_to.as_deref().unwrap_or(&self.name)
    }

    /// SQL face of the resolver.
    pub fn expression(&self, collection: Collection) -> AliasedExpr {
        let column = collection.column();
        let key = sqlfmt::literal(&self.name);
        let value = match self.semantic_type {
            SemanticType::Decimal => format!(
                "coalesce(safe_cast((select value.int_value from unnest({column}) where key = {key}) as numeric), safe_cast((select value.double_value from unnest({column}) where key = {key}) as numeric), safe_cast((select value.float_value from unnest({column}) where key = {key}) as numeric))"
            ),
            SemanticType::String => format!(
                "(select coalesce(value.string_value, cast(value.int_value as string), cast(value.float_value as string), cast(value.double_value as string)) from unnest({column}) where key = {key})"
            ),
            SemanticType::Int => format!(
                "(select value.int_value from unnest({column}) where key = {key})"
            ),
            SemanticType::Float => format!(
                "(select value.float_value from unnest({column}) where key = {key})"
            ),
            SemanticType::Double => format!(
                "(select value.double_value from unnest({column}) where key = {key})"
            ),
        };
        let value = match self.cleaning {
            Some(cleaning) => cleaning.apply_sql(&value),
            None => value,
        };
        AliasedExpr::new(value, self.output_name())
    }

    /// In-memory face of the resolver. A missing key resolves to None,
    /// never a failure.
    pub fn resolve(&self, bag: &KeyValueCollection) -> Option<ResolvedValue> {
        let record = bag.get(&self.name)?;
        let resolved = self.coerce(record)?;
        match self.cleaning {
            Some(cleaning) => cleaning.apply_value(resolved),
            None => Some(resolved),
        }
    }

    fn coerce(&self, record: &TypedValue) -> Option<ResolvedValue> {
        match self.semantic_type {
            // int, double, float - in that priority order, first parse wins
            SemanticType::Decimal => record
                .int_value
                .map(|i| i as f64)
                .or(record.double_value)
                .or(record.float_value)
                .map(ResolvedValue::Number),
            // first present of string, stringified int / float / double
            SemanticType::String => record
                .string_value
                .clone()
                .or_else(|| record.int_value.map(|i| i.to_string()))
                .or_else(|| record.float_value.map(|f| f.to_string()))
                .or_else(|| record.double_value.map(|d| d.to_string()))
                .map(ResolvedValue::Text),
            SemanticType::Int => record.int_value.map(ResolvedValue::Integer),
            SemanticType::Float => record.float_value.map(ResolvedValue::Number),
            SemanticType::Double => record.double_value.map(ResolvedValue::Number),
        }
    }
}

/// A rendered expression plus its output alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasedExpr {
    pub sql: String,
    pub alias: String,
}

impl AliasedExpr {
    pub fn new(sql: impl Into<String>, alias: impl Into<String>) -> Self {
        AliasedExpr {
            sql: sql.into(),
            alias: alias.into(),
        }
    }
}

impl fmt::Display for AliasedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} as {}", self.sql, self.alias)
    }
}

/// Apply the resolver across a spec list, preserving input order.
/// An empty spec list yields an empty vec, not an error.
pub fn compile_params(specs: &[ParameterSpec], collection: Collection) -> Vec<AliasedExpr> {
    specs
        .iter()
        .map(|spec| spec.expression(collection))
        .collect()
}
