//! Configuration sanity checks, run before anything is compiled.
//!
//! Validation either passes and compilation proceeds deterministically,
//! or it fails fast: no expression is generated from a config with
//! duplicate or malformed output columns, and no click-id spec may have
//! an empty precedence list.

use std::collections::HashSet;

use crate::config::AttributionConfig;
use crate::error::ConfigError;

/// Check a category's output names for duplicates and invalid
/// identifiers.
fn check_columns<'a>(
    names: impl Iterator<Item = &'a str>,
    category: &str,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if !sqlfmt::is_valid_identifier(name) {
            return Err(ConfigError::InvalidColumnName {
                column: name.to_string(),
                category: category.to_string(),
            });
        }
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateColumn {
                column: name.to_string(),
                category: category.to_string(),
            });
        }
    }
    Ok(())
}

pub fn validate(config: &AttributionConfig) -> Result<(), ConfigError> {
    check_columns(
        config.core_event_params.iter().map(|p| p.output_name()),
        "core event params",
    )?;
    check_columns(
        config.custom_event_params.iter().map(|p| p.output_name()),
        "custom event params",
    )?;
    check_columns(
        config.user_properties.iter().map(|p| p.output_name()),
        "user properties",
    )?;
    check_columns(
        config.item_params.iter().map(|p| p.output_name()),
        "custom item parameters",
    )?;
    check_columns(
        config.url_params.iter().map(|p| p.output_name()),
        "core url parameters",
    )?;
    check_columns(
        config.custom_url_params.iter().map(|p| p.output_name()),
        "custom url parameters",
    )?;

    for click_id in &config.click_ids {
        if click_id.precedence.is_empty() {
            return Err(ConfigError::EmptyPrecedence {
                click_id: click_id.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clickid::ClickIdSpec;
    use crate::params::{ParameterSpec, SemanticType};

    #[test]
    fn core_defaults_validate() {
        assert!(validate(&AttributionConfig::core()).is_ok());
    }

    #[test]
    fn duplicate_output_name_fails() {
        let mut config = AttributionConfig::core();
        config.custom_event_params = vec![
            ParameterSpec::new("event_value", SemanticType::Decimal),
            ParameterSpec::new("event_value", SemanticType::String),
        ];
        match validate(&config) {
            Err(ConfigError::DuplicateColumn { column, category }) => {
                assert_eq!(column, "event_value");
                assert_eq!(category, "custom event params");
            }
            other => panic!("expected DuplicateColumn, got {other:?}"),
        }
    }

    #[test]
    fn rename_resolves_the_collision() {
        let mut config = AttributionConfig::core();
        config.custom_event_params = vec![
            ParameterSpec::new("event_value", SemanticType::Decimal),
            ParameterSpec::new("event_value", SemanticType::String).renamed("event_value_string"),
        ];
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn invalid_identifier_fails() {
        let mut config = AttributionConfig::core();
        config.user_properties =
            vec![ParameterSpec::new("ok", SemanticType::String).renamed("has space")];
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidColumnName { .. })
        ));
    }

    #[test]
    fn empty_click_id_precedence_fails() {
        let mut config = AttributionConfig::core();
        config.click_ids = vec![ClickIdSpec::new("gclid", "google", "cpc", "(not set)", vec![])];
        assert!(matches!(
            validate(&config),
            Err(ConfigError::EmptyPrecedence { .. })
        ));
    }

    #[test]
    fn same_name_in_different_categories_is_fine() {
        let mut config = AttributionConfig::core();
        config.custom_event_params = vec![ParameterSpec::new("q", SemanticType::String)];
        config.custom_url_params = vec![crate::url::UrlParamSpec::new("q")];
        assert!(validate(&config).is_ok());
    }
}
