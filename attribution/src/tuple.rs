use serde::{Deserialize, Serialize};

/// The resolved attribution values for one event, produced after
/// click-id resolution and consumed by the channel classifier. The
/// classifier does no further coalescing: this tuple is final.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AttributionTuple {
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
    pub campaign_id: Option<String>,
    pub source_category: Option<String>,
    pub term: Option<String>,
    pub content: Option<String>,
}

impl AttributionTuple {
    /// Whether any identifying field carries a value. A tuple that is
    /// present as a container but all-null in substance is treated as
    /// null by the session rollup. The source category is a lookup
    /// artifact, not an identifying field.
    pub fn has_substance(&self) -> bool {
        self.campaign_id.is_some()
            || self.campaign.is_some()
            || self.source.is_some()
            || self.medium.is_some()
            || self.term.is_some()
            || self.content.is_some()
    }
}

/// Column names the generated SQL reads the tuple from.
#[derive(Debug, Clone)]
pub struct TupleColumns {
    pub source: String,
    pub medium: String,
    pub campaign: String,
    pub campaign_id: String,
    pub source_category: String,
    pub term: String,
    pub content: String,
}

impl TupleColumns {
    /// Top-level columns named after the tuple fields.
    pub fn flat() -> Self {
        TupleColumns {
            source: "source".to_string(),
            medium: "medium".to_string(),
            campaign: "campaign".to_string(),
            campaign_id: "campaign_id".to_string(),
            source_category: "source_category".to_string(),
            term: "term".to_string(),
            content: "content".to_string(),
        }
    }

    /// Columns of a named traffic-source struct, e.g.
    /// `last_non_direct_traffic_source.source`.
    pub fn for_struct(prefix: &str) -> Self {
        TupleColumns {
            source: format!("{prefix}.source"),
            medium: format!("{prefix}.medium"),
            campaign: format!("{prefix}.campaign"),
            campaign_id: format!("{prefix}.campaign_id"),
            source_category: format!("{prefix}.source_category"),
            term: format!("{prefix}.term"),
            content: format!("{prefix}.content"),
        }
    }
}
