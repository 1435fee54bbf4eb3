//! URL query-string parameter extraction.
//!
//! Extraction is a pattern match against the query portion of a URL:
//! `name=value` where the value runs until the next `&`, `#`, or end of
//! string, with the fragment ignored. Percent-decoding reassembles
//! `%XX` hex byte pairs exactly; anything that fails to decode degrades
//! to NULL rather than raising.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::params::{AliasedExpr, CleaningTransform};
use crate::value::ResolvedValue;

/// A URL parameter to extract to its own column. Unlike event
/// parameters these are always strings, so there is no semantic type.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UrlParamSpec {
    pub name: String,
    #[serde(default, rename = "rename_to")]
    pub rename_to: Option<String>,
    #[serde(default)]
    pub cleaning: Option<CleaningTransform>,
}

impl UrlParamSpec {
    pub fn new(name: impl Into<String>) -> Self {
        UrlParamSpec {
            name: name.into(),
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

    pub fn output_name(&self) -> &str {
        self.rename_to.as_deref().unwrap_or(&self.name)
    }
}

/// Wrap `expr` in the percent-decoding expression: split the text into
/// `%XX` / literal runs, hex-decode the former, reassemble the bytes
/// and safe-convert back to a string (NULL on invalid sequences).
pub fn url_decode_sql(expr: &str) -> String {
    format!(
        "(select safe_convert_bytes_to_string(array_to_string(array_agg(if(starts_with(y, '%'), from_hex(substr(y, 2)), cast(y as bytes)) order by i), b'')) from unnest(regexp_extract_all({expr}, r\"%[0-9a-fA-F]{{2}}|[^%]+\")) as y with offset as i)"
    )
}

/// SQL face of the extractor. Decoding happens before the cleaning
/// transform so the transform sees the reassembled text.
pub fn url_param_expression(url_expr: &str, spec: &UrlParamSpec, decode: bool) -> AliasedExpr {
    // names are data, not pattern syntax
    let mut value = format!(
        "regexp_extract({url_expr}, r\"^[^#]+[?&]{}=([^&#]+)\")",
        regex::escape(&spec.name)
    );
    if decode {
        value = url_decode_sql(&value);
    }
    if let Some(cleaning) = spec.cleaning {
        value = cleaning.apply_sql(&value);
    }
    AliasedExpr::new(value, spec.output_name())
}

/// Apply the extractor across a spec list, preserving input order.
pub fn compile_url_params(
    url_expr: &str,
    specs: &[UrlParamSpec],
    decode: bool,
) -> Vec<AliasedExpr> {
    specs
        .iter()
        .map(|spec| url_param_expression(url_expr, spec, decode))
        .collect()
}

/// In-memory face of the extractor, byte-exact with the SQL.
pub fn extract_url_param(url: &str, spec: &UrlParamSpec, decode: bool) -> Option<String> {
    let pattern = format!("^[^#]+[?&]{}=([^&#]+)", regex::escape(&spec.name));
    let raw = Regex::new(&pattern)
        .ok()?
        .captures(url)?
        .get(1)?
        .as_str()
        .to_string();
    let value = if decode { percent_decode(&raw)? } else { raw };
    match spec.cleaning {
        Some(cleaning) => cleaning
            .apply_value(ResolvedValue::Text(value))
            .map(|v| v.as_text()),
        None => Some(value),
    }
}

/// Mirror of the SQL decoder: the text is tokenized into `%XX` runs and
/// non-percent runs; a `%` not followed by two hex digits matches
/// neither alternative and is dropped, and bytes that do not reassemble
/// into UTF-8 degrade to None.
pub fn percent_decode(input: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(input.len());
    let mut rest = input.as_bytes();
    while let Some((&first, _)) = rest.split_first() {
        if first == b'%' {
            if rest.len() >= 3 {
                if let Some(byte) = hex_pair(rest[1], rest[2]) {
                    bytes.push(byte);
                    rest = &rest[3..];
                    continue;
                }
            }
            // stray percent, skipped by the tokenizer
            rest = &rest[1..];
        } else {
            bytes.push(first);
            rest = &rest[1..];
        }
    }
    String::from_utf8(bytes).ok()
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}
