//! Whole-configuration compilation.
//!
//! [`CompiledBundle::compile`] validates the merged configuration, then
//! compiles every section into one value the caller can embed in a
//! materialization job. Output is byte-identical across runs for the
//! same configuration and brand.

use std::fmt::Write;

use sqlfmt::FilterKind;

use crate::channel::ChannelEngine;
use crate::checks::Check;
use crate::clickid::{self, DefaultField};
use crate::config::AttributionConfig;
use crate::error::ConfigError;
use crate::params::{compile_params, AliasedExpr, Collection};
use crate::rollup::{self, DEFAULT_ORDER_COLUMN};
use crate::tuple::TupleColumns;
use crate::url::compile_url_params;
use crate::validate;

/// The column URL parameters are extracted from, once the core event
/// params have been flattened.
const PAGE_LOCATION: &str = "page_location";

#[derive(Debug, Clone)]
pub struct CompiledBundle {
    pub event_params: Vec<AliasedExpr>,
    pub event_params_custom: Vec<AliasedExpr>,
    pub user_properties: Vec<AliasedExpr>,
    pub item_params_custom: Vec<AliasedExpr>,
    pub url_params: Vec<AliasedExpr>,
    pub url_params_custom: Vec<AliasedExpr>,
    pub click_id_coalesce: Vec<AliasedExpr>,
    pub attribution_defaults: Vec<AliasedExpr>,
    pub channel_case: String,
    pub session_rollups: Vec<String>,
    pub event_filter: String,
    pub hostname_filter: String,
    pub transactions_dedupe: String,
    pub checks: Vec<Check>,
}

impl CompiledBundle {
    pub fn compile(
        config: &AttributionConfig,
        brand: Option<&str>,
    ) -> Result<CompiledBundle, ConfigError> {
        validate::validate(config)?;
        tracing::info!(
            event_params = config.core_event_params.len() + config.custom_event_params.len(),
            url_params = config.url_params.len() + config.custom_url_params.len(),
            click_ids = config.click_ids.len(),
            custom_rules = config.custom_channel_rules.len(),
            "compiling attribution bundle"
        );

        let engine = ChannelEngine::assemble(
            &config.social_platforms,
            &config.custom_channel_rules,
            brand,
        )?;

        let columns = TupleColumns::flat();
        let attribution_defaults = [
            DefaultField::Source,
            DefaultField::Medium,
            DefaultField::Campaign,
        ]
        .iter()
        .map(|field| {
            clickid::default_case_sql(
                &config.click_ids,
                *field,
                match field {
                    DefaultField::Source => &columns.source,
                    DefaultField::Medium => &columns.medium,
                    DefaultField::Campaign => &columns.campaign,
                },
                &columns.campaign,
            )
        })
        .collect();

        let click_id_names: Vec<String> =
            config.click_ids.iter().map(|c| c.name.clone()).collect();
        let session_rollups = vec![
            rollup::traffic_source_rollup_sql(
                "traffic_source",
                Some("session_traffic_source"),
                true,
                DEFAULT_ORDER_COLUMN,
            ),
            rollup::traffic_source_rollup_sql(
                "traffic_source",
                Some("last_traffic_source"),
                false,
                DEFAULT_ORDER_COLUMN,
            ),
            rollup::click_id_rollup_sql(
                "click_ids",
                &click_id_names,
                Some("session_click_ids"),
                true,
                DEFAULT_ORDER_COLUMN,
            ),
        ];

        Ok(CompiledBundle {
            event_params: compile_params(&config.core_event_params, Collection::EventParams),
            event_params_custom: compile_params(
                &config.custom_event_params,
                Collection::EventParams,
            ),
            user_properties: compile_params(&config.user_properties, Collection::UserProperties),
            item_params_custom: compile_params(&config.item_params, Collection::ItemParams),
            url_params: compile_url_params(PAGE_LOCATION, &config.url_params, true),
            url_params_custom: compile_url_params(PAGE_LOCATION, &config.custom_url_params, true),
            click_id_coalesce: config
                .click_ids
                .iter()
                .map(|spec| spec.resolve_expression())
                .collect(),
            attribution_defaults,
            channel_case: engine.case_sql(&columns),
            session_rollups,
            event_filter: sqlfmt::list_filter(
                FilterKind::Exclude,
                "event_name",
                &config.events_to_exclude,
            ),
            hostname_filter: hostname_filter(config),
            transactions_dedupe: config.checks.transactions_dedupe_sql(),
            checks: config.checks.enabled_checks(config.data_is_final_days),
        })
    }

    /// Render every section as commented SQL, for embedding or review.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut section = |title: &str, body: &str| {
            let _ = write!(out, "-- {title}\n{body}\n\n");
        };
        section("event_params", &projection(&self.event_params));
        section(
            "event_params_custom",
            &struct_column(&self.event_params_custom, "event_params_custom"),
        );
        section("user_properties", &projection(&self.user_properties));
        section(
            "item_params_custom",
            &struct_column(&self.item_params_custom, "item_params_custom"),
        );
        section("url_params", &projection(&self.url_params));
        section(
            "url_params_custom",
            &struct_column(&self.url_params_custom, "url_params_custom"),
        );
        section("click_ids", &projection(&self.click_id_coalesce));
        section(
            "attribution_defaults",
            &projection(&self.attribution_defaults),
        );
        section("channel_grouping", &self.channel_case);
        section("session_rollups", &self.session_rollups.join(",\n"));
        section("event_filter", &self.event_filter);
        section("hostname_filter", &self.hostname_filter);
        if !self.transactions_dedupe.is_empty() {
            section("transactions_dedupe", &self.transactions_dedupe);
        }
        for check in &self.checks {
            section(&format!("check: {}", check.name), &check.condition);
        }
        out
    }
}

fn projection(exprs: &[AliasedExpr]) -> String {
    exprs
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<String>>()
        .join(",\n")
}

/// Custom extractions land in one struct column so they never collide
/// with the core projection.
fn struct_column(exprs: &[AliasedExpr], alias: &str) -> String {
    if exprs.is_empty() {
        return format!("null as {alias}");
    }
    format!("{} as {alias}", sqlfmt::struct_of(&projection(exprs)))
}

fn hostname_filter(config: &AttributionConfig) -> String {
    let parts: Vec<String> = [
        sqlfmt::list_filter(FilterKind::Exclude, "hostname", &config.hostname_exclude),
        sqlfmt::list_filter(
            FilterKind::Include,
            "hostname",
            &config.hostname_include_only,
        ),
    ]
    .into_iter()
    .filter(|part| part != "true")
    .collect();
    if parts.is_empty() {
        "true".to_string()
    } else {
        parts.join(" and ")
    }
}
