//! Click-ID attribution resolution.
//!
//! A click identifier (a paid-click token such as `gclid`) can surface
//! in several collections of the same event. Each [`ClickIdSpec`] names
//! the collections that participate and, in order, which one wins; a
//! resolved click-id then supplies default source/medium/campaign
//! values for events whose explicit attribution is absent or a known
//! placeholder.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::params::AliasedExpr;
use crate::tuple::AttributionTuple;

/// Campaign values that mean "not yet attributed". Exactly these two
/// (plus NULL and empty) may be overwritten by click-id defaults;
/// anything else is an explicit value and is preserved.
pub const PLACEHOLDER_CAMPAIGNS: [&str; 2] = ["(organic)", "(referral)"];

/// The collections a click-id may be coalesced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum SourceCollection {
    #[serde(rename = "collected_traffic_source")]
    CollectedTrafficSource,
    #[serde(rename = "event_params")]
    EventParams,
    #[serde(rename = "url")]
    Url,
    #[serde(rename = "click_ids")]
    ClickIds,
}

impl SourceCollection {
    pub fn column_prefix(&self) -> &'static str {
        match self {
            SourceCollection::CollectedTrafficSource => "collected_traffic_source",
            SourceCollection::EventParams => "event_params",
            SourceCollection::Url => "url_params",
            SourceCollection::ClickIds => "click_ids",
        }
    }
}

/// One click identifier: where to find it and which attribution
/// defaults it implies when present.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClickIdSpec {
    pub name: String,
    pub source: String,
    pub medium: String,
    pub campaign: String,
    pub precedence: Vec<SourceCollection>,
}

impl ClickIdSpec {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        medium: impl Into<String>,
        campaign: impl Into<String>,
        precedence: Vec<SourceCollection>,
    ) -> Self {
        ClickIdSpec {
            name: name.into(),
            source: source.into(),
            medium: medium.into(),
            campaign: campaign.into(),
            precedence,
        }
    }

    /// SQL face: coalesce the listed collections in precedence order.
    /// Collections not listed are never consulted.
    pub fn resolve_expression(&self) -> AliasedExpr {
        let columns: Vec<String> = self
            .precedence
            .iter()
            .map(|s| format!("{}.{}", s.column_prefix(), self.name))
            .collect();
        AliasedExpr::new(sqlfmt::coalesce(&columns), &self.name)
    }

    /// In-memory face: first value present among the listed
    /// collections, in precedence order.
    pub fn resolve(&self, available: &HashMap<SourceCollection, String>) -> Option<String> {
        self.precedence
            .iter()
            .find_map(|s| available.get(s).cloned())
    }
}

/// Whether click-id defaults may overwrite the incumbent
/// medium/campaign.
fn campaign_is_overridable(campaign: Option<&str>) -> bool {
    match campaign {
        None => true,
        Some(c) => c.is_empty() || PLACEHOLDER_CAMPAIGNS.contains(&c),
    }
}

/// The attribution fields a click-id can supply a default for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultField {
    Source,
    Medium,
    Campaign,
}

impl DefaultField {
    fn spec_value<'a>(&self, spec: &'a ClickIdSpec) -> &'a str {
        match self {
            DefaultField::Source => &spec.source,
            DefaultField::Medium => &spec.medium,
            DefaultField::Campaign => &spec.campaign,
        }
    }

    fn column_name(&self) -> &'static str {
        match self {
            DefaultField::Source => "source",
            DefaultField::Medium => "medium",
            DefaultField::Campaign => "campaign",
        }
    }
}

/// SQL face of default derivation: one CASE per attribution field, one
/// WHEN per click-id spec in configuration order, so the first spec
/// that resolves non-null wins. `source` is overwritten whenever a
/// click-id resolves; `medium` and `campaign` only when the incumbent
/// campaign is NULL, empty, or a placeholder.
pub fn default_case_sql(
    specs: &[ClickIdSpec],
    field: DefaultField,
    incumbent: &str,
    campaign_column: &str,
) -> AliasedExpr {
    if specs.is_empty() {
        return AliasedExpr::new(incumbent, field.column_name());
    }
    let overridable: Vec<String> = std::iter::once(String::new())
        .chain(PLACEHOLDER_CAMPAIGNS.iter().map(|p| p.to_string()))
        .collect();
    let guard = match field {
        DefaultField::Source => String::new(),
        DefaultField::Medium | DefaultField::Campaign => format!(
            " and ({campaign_column} is null or {campaign_column} in {})",
            sqlfmt::literal_list(&overridable)
        ),
    };
    let whens: Vec<String> = specs
        .iter()
        .map(|spec| {
            format!(
                "when {} is not null{guard} then {}",
                spec.resolve_expression().sql,
                sqlfmt::literal(field.spec_value(spec)),
            )
        })
        .collect();
    AliasedExpr::new(
        format!("case {} else {incumbent} end", whens.join(" ")),
        field.column_name(),
    )
}

/// In-memory face of default derivation. `available` maps each
/// click-id name to the per-collection values seen on the row.
pub fn derive_defaults(
    specs: &[ClickIdSpec],
    available: &HashMap<String, HashMap<SourceCollection, String>>,
    current: &AttributionTuple,
) -> AttributionTuple {
    let mut tuple = current.clone();
    // first spec that resolves non-null determines the defaults
    let matched = specs.iter().find(|spec| {
        available
            .get(&spec.name)
            .is_some_and(|per_source| spec.resolve(per_source).is_some())
    });
    if let Some(spec) = matched {
        tuple.source = Some(spec.source.clone());
        if campaign_is_overridable(current.campaign.as_deref()) {
            tuple.medium = Some(spec.medium.clone());
            tuple.campaign = Some(spec.campaign.clone());
        }
    }
    tuple
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gclid() -> ClickIdSpec {
        ClickIdSpec::new(
            "gclid",
            "google",
            "cpc",
            "(not set)",
            vec![
                SourceCollection::CollectedTrafficSource,
                SourceCollection::EventParams,
                SourceCollection::Url,
            ],
        )
    }

    fn msclkid() -> ClickIdSpec {
        ClickIdSpec::new(
            "msclkid",
            "bing",
            "cpc",
            "(not set)",
            vec![SourceCollection::Url],
        )
    }

    fn seen(spec: &ClickIdSpec, collection: SourceCollection) -> HashMap<String, HashMap<SourceCollection, String>> {
        let mut per_source = HashMap::new();
        per_source.insert(collection, "tok-123".to_string());
        let mut available = HashMap::new();
        available.insert(spec.name.clone(), per_source);
        available
    }

    #[test]
    fn resolve_follows_precedence_order() {
        let spec = gclid();
        let mut available = HashMap::new();
        available.insert(SourceCollection::Url, "from-url".to_string());
        available.insert(
            SourceCollection::CollectedTrafficSource,
            "from-cts".to_string(),
        );
        assert_eq!(spec.resolve(&available), Some("from-cts".to_string()));
    }

    #[test]
    fn unlisted_collections_are_never_consulted() {
        let spec = msclkid();
        let mut available = HashMap::new();
        available.insert(SourceCollection::EventParams, "ignored".to_string());
        assert_eq!(spec.resolve(&available), None);
    }

    #[test]
    fn coalesce_expression_maps_collections_to_columns() {
        let expr = gclid().resolve_expression();
        assert_eq!(
            expr.sql,
            "coalesce(collected_traffic_source.gclid, event_params.gclid, url_params.gclid)"
        );
        assert_eq!(expr.alias, "gclid");
        // single-source specs render without the coalesce wrapper
        assert_eq!(msclkid().resolve_expression().sql, "url_params.msclkid");
    }

    #[test]
    fn placeholder_campaign_is_overwritten() {
        let spec = gclid();
        let current = AttributionTuple {
            campaign: Some("(organic)".to_string()),
            medium: Some("organic".to_string()),
            ..Default::default()
        };
        let derived = derive_defaults(
            &[spec.clone()],
            &seen(&spec, SourceCollection::CollectedTrafficSource),
            &current,
        );
        assert_eq!(derived.source.as_deref(), Some("google"));
        assert_eq!(derived.medium.as_deref(), Some("cpc"));
        assert_eq!(derived.campaign.as_deref(), Some("(not set)"));
    }

    #[test]
    fn explicit_campaign_is_preserved() {
        let spec = gclid();
        let current = AttributionTuple {
            campaign: Some("Black Friday".to_string()),
            medium: Some("organic".to_string()),
            ..Default::default()
        };
        let derived = derive_defaults(
            &[spec.clone()],
            &seen(&spec, SourceCollection::Url),
            &current,
        );
        // source has no preservation rule
        assert_eq!(derived.source.as_deref(), Some("google"));
        assert_eq!(derived.medium.as_deref(), Some("organic"));
        assert_eq!(derived.campaign.as_deref(), Some("Black Friday"));
    }

    #[test]
    fn no_resolved_click_id_leaves_tuple_untouched() {
        let current = AttributionTuple {
            campaign: Some("(referral)".to_string()),
            ..Default::default()
        };
        let derived = derive_defaults(&[gclid()], &HashMap::new(), &current);
        assert_eq!(derived, current);
    }

    #[test]
    fn first_resolving_spec_wins_across_specs() {
        let specs = vec![gclid(), msclkid()];
        // only the bing click-id is present
        let spec = msclkid();
        let derived = derive_defaults(
            &specs,
            &seen(&spec, SourceCollection::Url),
            &AttributionTuple::default(),
        );
        assert_eq!(derived.source.as_deref(), Some("bing"));

        // both present: configuration order decides
        let mut available = seen(&gclid(), SourceCollection::Url);
        available.extend(seen(&msclkid(), SourceCollection::Url));
        let derived = derive_defaults(&specs, &available, &AttributionTuple::default());
        assert_eq!(derived.source.as_deref(), Some("google"));
    }

    #[test]
    fn medium_case_sql_carries_the_placeholder_guard() {
        let expr = default_case_sql(
            &[gclid(), msclkid()],
            DefaultField::Medium,
            "medium",
            "campaign",
        );
        assert!(expr.sql.starts_with("case when "));
        assert!(expr
            .sql
            .contains("(campaign is null or campaign in ('','(organic)','(referral)'))"));
        // the guard list is the placeholder set plus the empty string
        for placeholder in PLACEHOLDER_CAMPAIGNS {
            assert!(expr.sql.contains(&format!("'{placeholder}'")));
        }
        assert!(expr.sql.ends_with("else medium end"));
        assert_eq!(expr.alias, "medium");
    }

    #[test]
    fn source_case_sql_has_no_guard() {
        let expr = default_case_sql(&[gclid()], DefaultField::Source, "source", "campaign");
        assert!(!expr.sql.contains("campaign is null"));
        assert!(expr.sql.contains("then 'google'"));
    }
}
