//! Session-grain rollups: pick one representative value per session
//! under a temporal ordering.
//!
//! The SQL face renders `array_agg(... ignore nulls order by ... limit
//! 1)[safe_offset(0)]`; the in-memory face mirrors the same "first
//! non-null under a stable ordering" semantics, with ties broken by
//! input order.

use crate::tuple::AttributionTuple;

pub const DEFAULT_ORDER_COLUMN: &str = "time.event_timestamp_utc";

/// Select the value paired with the extreme non-null entry. Ascending
/// picks the earliest occurrence in the session, descending the latest.
/// Returns None when every value is null.
pub fn pick_representative<K, T>(items: Vec<(K, Option<T>)>, ascending: bool) -> Option<T>
where
    K: Ord,
{
    let mut items = items;
    if ascending {
        items.sort_by(|(a, _), (b, _)| a.cmp(b));
    } else {
        items.sort_by(|(a, _), (b, _)| b.cmp(a));
    }
    items.into_iter().find_map(|(_, value)| value)
}

/// Representative traffic-source struct for a session. A struct that is
/// present but whose identifying fields are all null carries no
/// information and is skipped, exactly as if it were null itself.
pub fn pick_attribution<K>(
    items: Vec<(K, Option<AttributionTuple>)>,
    ascending: bool,
) -> Option<AttributionTuple>
where
    K: Ord,
{
    let items = items
        .into_iter()
        .map(|(key, tuple)| (key, tuple.filter(AttributionTuple::has_substance)))
        .collect();
    pick_representative(items, ascending)
}

fn direction(ascending: bool) -> &'static str {
    if ascending {
        "asc"
    } else {
        "desc"
    }
}

fn alias_clause(alias: Option<&str>) -> String {
    match alias {
        Some(alias) => format!(" as {alias}"),
        None => String::new(),
    }
}

/// Plain first/last value rollup.
pub fn array_agg_sql(expr: &str, alias: Option<&str>, ascending: bool, order_by: &str) -> String {
    format!(
        "array_agg({expr} ignore nulls order by {order_by} {} limit 1)[safe_offset(0)]{}",
        direction(ascending),
        alias_clause(alias),
    )
}

/// Rollup over a struct column, nulling out structs whose identifying
/// fields are all null so `ignore nulls` skips them. With no
/// identifying fields there is nothing to test, the struct passes
/// through as-is.
fn substanceless_to_null_sql(struct_expr: &str, identifying: &[String]) -> String {
    if identifying.is_empty() {
        return struct_expr.to_string();
    }
    format!(
        "if(coalesce({}) is null, null, {struct_expr})",
        identifying.join(", ")
    )
}

/// Representative traffic-source struct, SQL face of
/// [`pick_attribution`].
pub fn traffic_source_rollup_sql(
    struct_expr: &str,
    alias: Option<&str>,
    ascending: bool,
    order_by: &str,
) -> String {
    let identifying: Vec<String> = ["campaign_id", "campaign", "source", "medium", "term", "content"]
        .iter()
        .map(|field| format!("{struct_expr}.{field}"))
        .collect();
    array_agg_sql(
        &substanceless_to_null_sql(struct_expr, &identifying),
        alias,
        ascending,
        order_by,
    )
}

/// Representative click-id struct: same shape, but the identifying
/// fields are the configured click-id columns.
pub fn click_id_rollup_sql(
    struct_expr: &str,
    click_id_names: &[String],
    alias: Option<&str>,
    ascending: bool,
    order_by: &str,
) -> String {
    let identifying: Vec<String> = click_id_names
        .iter()
        .map(|name| format!("{struct_expr}.{name}"))
        .collect();
    array_agg_sql(
        &substanceless_to_null_sql(struct_expr, &identifying),
        alias,
        ascending,
        order_by,
    )
}
