//! The merged compiler configuration.
//!
//! Core defaults ship with the crate; a deployment overrides them with
//! a JSON document deserialized into [`CustomConfig`]. The merge is a
//! one-shot, field-wise override (custom over core) producing an
//! immutable [`AttributionConfig`]: there is no mutable global to
//! patch after startup. Malformed entries are rejected by typed
//! deserialization at load time, not at first use.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::channel::CustomRuleConfig;
use crate::checks::QualityToggles;
use crate::clickid::{ClickIdSpec, SourceCollection};
use crate::error::ConfigError;
use crate::params::{CleaningTransform, ParameterSpec, SemanticType};
use crate::url::UrlParamSpec;

#[derive(Debug, Clone)]
pub struct AttributionConfig {
    pub start_date: NaiveDate,
    pub data_is_final_days: u32,
    pub last_non_direct_lookback_days: u32,

    /// Attribution-critical event parameters, extracted for every
    /// deployment. The long tail of known parameter names is data, not
    /// logic, and comes in through `custom_event_params`.
    pub core_event_params: Vec<ParameterSpec>,
    pub custom_event_params: Vec<ParameterSpec>,
    pub user_properties: Vec<ParameterSpec>,
    pub item_params: Vec<ParameterSpec>,
    pub url_params: Vec<UrlParamSpec>,
    pub custom_url_params: Vec<UrlParamSpec>,

    pub click_ids: Vec<ClickIdSpec>,
    pub social_platforms: Vec<String>,
    pub custom_channel_rules: Vec<CustomRuleConfig>,

    pub events_to_exclude: Vec<String>,
    pub hostname_exclude: Vec<String>,
    pub hostname_include_only: Vec<String>,

    pub checks: QualityToggles,
}

/// Deployment overrides. Every field is optional; absent fields keep
/// the core default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CustomConfig {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub data_is_final_days: Option<u32>,
    #[serde(default)]
    pub last_non_direct_lookback_days: Option<u32>,
    #[serde(default)]
    pub core_event_params: Option<Vec<ParameterSpec>>,
    #[serde(default)]
    pub custom_event_params: Option<Vec<ParameterSpec>>,
    #[serde(default)]
    pub user_properties: Option<Vec<ParameterSpec>>,
    #[serde(default)]
    pub item_params: Option<Vec<ParameterSpec>>,
    #[serde(default)]
    pub url_params: Option<Vec<UrlParamSpec>>,
    #[serde(default)]
    pub custom_url_params: Option<Vec<UrlParamSpec>>,
    #[serde(default)]
    pub click_ids: Option<Vec<ClickIdSpec>>,
    #[serde(default)]
    pub social_platforms: Option<Vec<String>>,
    #[serde(default)]
    pub custom_channel_rules: Option<Vec<CustomRuleConfig>>,
    #[serde(default)]
    pub events_to_exclude: Option<Vec<String>>,
    #[serde(default)]
    pub hostname_exclude: Option<Vec<String>>,
    #[serde(default)]
    pub hostname_include_only: Option<Vec<String>>,
    #[serde(default)]
    pub checks: Option<QualityToggles>,
}

impl AttributionConfig {
    /// The shipped core defaults.
    pub fn core() -> Self {
        AttributionConfig {
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).expect("static start date"),
            // measurement-protocol hits can arrive 72 hours late
            data_is_final_days: 3,
            last_non_direct_lookback_days: 90,
            core_event_params: core_event_params(),
            custom_event_params: Vec::new(),
            user_properties: Vec::new(),
            item_params: Vec::new(),
            url_params: core_url_params(),
            custom_url_params: Vec::new(),
            click_ids: core_click_ids(),
            social_platforms: [
                "pinterest",
                "facebook",
                "instagram",
                "reddit",
                "tiktok",
                "linkedin",
                "snapchat",
                "messenger",
                "twitter",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            custom_channel_rules: Vec::new(),
            events_to_exclude: Vec::new(),
            hostname_exclude: Vec::new(),
            hostname_include_only: Vec::new(),
            checks: QualityToggles::default(),
        }
    }

    /// Merge deployment overrides over the core defaults.
    pub fn merged(custom: CustomConfig) -> Self {
        let core = Self::core();
        AttributionConfig {
            start_date: custom.start_date.unwrap_or(core.start_date),
            data_is_final_days: custom.data_is_final_days.unwrap_or(core.data_is_final_days),
            last_non_direct_lookback_days: custom
                .last_non_direct_lookback_days
                .unwrap_or(core.last_non_direct_lookback_days),
            core_event_params: custom.core_event_params.unwrap_or(core.core_event_params),
            custom_event_params: custom
                .custom_event_params
                .unwrap_or(core.custom_event_params),
            user_properties: custom.user_properties.unwrap_or(core.user_properties),
            item_params: custom.item_params.unwrap_or(core.item_params),
            url_params: custom.url_params.unwrap_or(core.url_params),
            custom_url_params: custom.custom_url_params.unwrap_or(core.custom_url_params),
            click_ids: custom.click_ids.unwrap_or(core.click_ids),
            social_platforms: custom.social_platforms.unwrap_or(core.social_platforms),
            custom_channel_rules: custom
                .custom_channel_rules
                .unwrap_or(core.custom_channel_rules),
            events_to_exclude: custom.events_to_exclude.unwrap_or(core.events_to_exclude),
            hostname_exclude: custom.hostname_exclude.unwrap_or(core.hostname_exclude),
            hostname_include_only: custom
                .hostname_include_only
                .unwrap_or(core.hostname_include_only),
            checks: custom.checks.unwrap_or(core.checks),
        }
    }

    /// Parse a deployment override document and merge it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let custom: CustomConfig = serde_json::from_str(json)?;
        Ok(Self::merged(custom))
    }

    pub fn lookback_millis(&self) -> i64 {
        i64::from(self.last_non_direct_lookback_days) * 24 * 3600 * 1000
    }
}

fn core_event_params() -> Vec<ParameterSpec> {
    let string = |name: &str| ParameterSpec::new(name, SemanticType::String);
    let int = |name: &str| ParameterSpec::new(name, SemanticType::Int);
    vec![
        // never remove or rename - the session model depends on these
        string("ignore_referrer"),
        int("ga_session_id"),
        int("ga_session_number"),
        int("engagement_time_msec"),
        int("engaged_session_event"),
        int("entrances"),
        string("session_engaged").cleaned(CleaningTransform::SafeCastInt),
        // page
        string("content_group"),
        string("page_location"),
        string("page_referrer"),
        string("page_title"),
        // campaign
        string("content"),
        string("medium"),
        string("campaign"),
        string("source"),
        string("term"),
        string("gclid"),
        string("dclid"),
        string("srsltid"),
        string("campaign_info_source"),
        // ecommerce
        string("transaction_id"),
        string("currency"),
        ParameterSpec::new("value", SemanticType::Decimal),
        ParameterSpec::new("shipping", SemanticType::Decimal),
        ParameterSpec::new("tax", SemanticType::Decimal),
        // search
        string("search_term"),
    ]
}

fn core_url_params() -> Vec<UrlParamSpec> {
    let lowered = |name: &str| UrlParamSpec::new(name).cleaned(CleaningTransform::Lowercase);
    vec![
        lowered("utm_marketing_tactic"),
        lowered("utm_source_platform"),
        lowered("utm_term"),
        lowered("utm_content"),
        lowered("utm_source"),
        lowered("utm_medium"),
        lowered("utm_campaign"),
        lowered("utm_id"),
        lowered("utm_creative_format"),
        // gtm and linker params, kept verbatim
        UrlParamSpec::new("gtm_debug"),
        UrlParamSpec::new("_gl"),
    ]
}

fn core_click_ids() -> Vec<ClickIdSpec> {
    let broad = vec![
        SourceCollection::CollectedTrafficSource,
        SourceCollection::EventParams,
        SourceCollection::Url,
    ];
    let url_only = vec![SourceCollection::Url];
    vec![
        ClickIdSpec::new("gclid", "google", "cpc", "(not set)", broad.clone()),
        ClickIdSpec::new("dclid", "google", "cpc", "(not set)", broad.clone()),
        ClickIdSpec::new(
            "srsltid",
            "google",
            "organic",
            "Shopping Free Listings",
            broad,
        ),
        ClickIdSpec::new("gbraid", "google", "cpc", "(not set)", url_only.clone()),
        ClickIdSpec::new("wbraid", "google", "cpc", "(not set)", url_only.clone()),
        ClickIdSpec::new("msclkid", "bing", "cpc", "(not set)", url_only),
    ]
}
