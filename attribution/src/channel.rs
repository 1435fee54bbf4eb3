//! The channel classification engine.
//!
//! An ordered list of predicate rules maps a resolved
//! [`AttributionTuple`] to a human-readable channel label, first match
//! wins. Built-in rules reproduce the default channel grouping;
//! site-specific custom rules are spliced in at a fixed position
//! between the shopping rules and the remaining built-ins, established
//! once at assembly time. The evaluator itself is slot-unaware: it
//! walks a single ordered vec of tagged rules.
//!
//! The engine is a pure function of the tuple. It performs no I/O and
//! never fails: an unmatched tuple classifies as [`FALLBACK_LABEL`].

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tuple::{AttributionTuple, TupleColumns};

pub const FALLBACK_LABEL: &str = "(Other)";

/// Index the custom block is spliced at: after Organic Shopping,
/// before Paid Video.
const CUSTOM_SLOT: usize = 7;

const PAID_MEDIUM: &str = "^(.*cp.*|ppc|retargeting|paid.*)$";
const PAID_MEDIUM_SHORT: &str = "^(.*cp.*|ppc|paid.*)$";
const EMAIL: &str = "email|e-mail|e_mail|e mail|newsletter";
const AFFILIATES: &str = "affiliate|affiliates";
const DISPLAY_MEDIUM: &str = "^(display|cpm|banner)$";
const OTHER_ADS_MEDIUM: &str = "^(cpv|cpa|cpp|cpc|content-text)$";
const VIDEO_MEDIUM: &str = "^(.*video.*)$";
const MOBILE_PUSH_MEDIUM: &str = "(mobile|notification|push$)";

const SOCIAL_MEDIUMS: [&str; 6] = [
    "social",
    "social-network",
    "social-media",
    "sm",
    "social network",
    "social media",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Field {
    #[serde(rename = "source")]
    Source,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "campaign")]
    Campaign,
    #[serde(rename = "campaign_id")]
    CampaignId,
    #[serde(rename = "source_category")]
    SourceCategory,
    #[serde(rename = "term")]
    Term,
    #[serde(rename = "content")]
    Content,
}

impl Field {
    fn value<'a>(&self, tuple: &'a AttributionTuple) -> Option<&'a str> {
        match self {
            Field::Source => tuple.source.as_deref(),
            Field::Medium => tuple.medium.as_deref(),
            Field::Campaign => tuple.campaign.as_deref(),
            Field::CampaignId => tuple.campaign_id.as_deref(),
            Field::SourceCategory => tuple.source_category.as_deref(),
            Field::Term => tuple.term.as_deref(),
            Field::Content => tuple.content.as_deref(),
        }
    }

    fn column<'a>(&self, columns: &'a TupleColumns) -> &'a str {
        match self {
            Field::Source => &columns.source,
            Field::Medium => &columns.medium,
            Field::Campaign => &columns.campaign,
            Field::CampaignId => &columns.campaign_id,
            Field::SourceCategory => &columns.source_category,
            Field::Term => &columns.term,
            Field::Content => &columns.content,
        }
    }
}

/// A regex usable on both faces: the raw pattern goes into
/// `regexp_contains`, the compiled form answers in-memory matches.
/// Both are substring searches, so the faces agree.
#[derive(Debug, Clone)]
pub struct SqlRegex {
    pattern: String,
    compiled: Regex,
}

impl SqlRegex {
    fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(SqlRegex {
            pattern: pattern.to_string(),
            compiled: Regex::new(pattern)?,
        })
    }

    fn builtin(pattern: &str) -> Self {
        Self::new(pattern).expect("builtin channel pattern")
    }
}

#[derive(Debug, Clone)]
pub enum Matcher {
    Eq(String),
    In(Vec<String>),
    Regex(SqlRegex),
    /// Lowercase the operand before matching. Used by custom rules that
    /// inspect campaign names.
    LowerRegex(SqlRegex),
}

impl Matcher {
    fn matches(&self, value: Option<&str>) -> bool {
        // a null operand never matches, mirroring SQL three-valued logic
        let Some(value) = value else { return false };
        match self {
            Matcher::Eq(expected) => value == expected,
            Matcher::In(options) => options.iter().any(|o| o == value),
            Matcher::Regex(re) => re.compiled.is_match(value),
            Matcher::LowerRegex(re) => re.compiled.is_match(&value.to_lowercase()),
        }
    }

    fn sql(&self, column: &str) -> String {
        match self {
            Matcher::Eq(expected) => format!("{column} = {}", sqlfmt::literal(expected)),
            Matcher::In(options) => {
                format!("{column} in {}", sqlfmt::literal_list(options))
            }
            Matcher::Regex(re) => format!("regexp_contains({column}, r\"{}\")", re.pattern),
            Matcher::LowerRegex(re) => {
                format!("regexp_contains(lower({column}), r\"{}\")", re.pattern)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Predicate {
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
    /// Every identifying field of the tuple is null.
    AllNull,
    Match { field: Field, matcher: Matcher },
}

impl Predicate {
    fn eq(field: Field, value: &str) -> Predicate {
        Predicate::Match {
            field,
            matcher: Matcher::Eq(value.to_string()),
        }
    }

    fn regex(field: Field, pattern: &str) -> Predicate {
        Predicate::Match {
            field,
            matcher: Matcher::Regex(SqlRegex::builtin(pattern)),
        }
    }

    fn one_of(field: Field, options: &[&str]) -> Predicate {
        Predicate::Match {
            field,
            matcher: Matcher::In(options.iter().map(|s| s.to_string()).collect()),
        }
    }

    pub fn eval(&self, tuple: &AttributionTuple) -> bool {
        match self {
            Predicate::All(ps) => ps.iter().all(|p| p.eval(tuple)),
            Predicate::Any(ps) => ps.iter().any(|p| p.eval(tuple)),
            Predicate::Not(p) => !p.eval(tuple),
            Predicate::AllNull => !tuple.has_substance(),
            Predicate::Match { field, matcher } => matcher.matches(field.value(tuple)),
        }
    }

    pub fn sql(&self, columns: &TupleColumns) -> String {
        match self {
            Predicate::All(ps) => {
                let parts: Vec<String> = ps.iter().map(|p| p.sql(columns)).collect();
                format!("({})", parts.join(" and "))
            }
            Predicate::Any(ps) => {
                let parts: Vec<String> = ps.iter().map(|p| p.sql(columns)).collect();
                format!("({})", parts.join(" or "))
            }
            Predicate::Not(p) => format!("not {}", p.sql(columns)),
            Predicate::AllNull => format!(
                "coalesce({}, {}, {}, {}, {}, {}) is null",
                columns.source,
                columns.medium,
                columns.campaign,
                columns.term,
                columns.content,
                columns.campaign_id,
            ),
            Predicate::Match { field, matcher } => matcher.sql(field.column(columns)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOrigin {
    Builtin,
    Custom,
}

/// One predicate→label rule in the ordered evaluation sequence.
#[derive(Debug, Clone)]
pub struct ChannelRule {
    pub label: String,
    pub predicate: Predicate,
    pub origin: RuleOrigin,
}

/// Declarative custom rule, deserialized from configuration. The
/// conditions are conjunctive; `brand`, when set, restricts the rule to
/// deployments configured with that brand code.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustomRuleConfig {
    pub label: String,
    #[serde(default)]
    pub brand: Option<String>,
    pub all: Vec<FieldCondition>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FieldCondition {
    pub field: Field,
    pub operator: MatchOperator,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum MatchOperator {
    #[serde(rename = "exact")]
    Exact,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "regex")]
    Regex,
    #[serde(rename = "not_regex")]
    NotRegex,
    #[serde(rename = "lower_regex")]
    LowerRegex,
    #[serde(rename = "not_lower_regex")]
    NotLowerRegex,
}

impl FieldCondition {
    fn compile(&self, label: &str) -> Result<Predicate, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidRule {
            label: label.to_string(),
            reason,
        };
        let as_str = || -> Result<&str, ConfigError> {
            self.value
                .as_str()
                .ok_or_else(|| invalid(format!("expected a string value, got {}", self.value)))
        };
        let matcher = match self.operator {
            MatchOperator::Exact => Matcher::Eq(as_str()?.to_string()),
            MatchOperator::In => {
                let options = self
                    .value
                    .as_array()
                    .ok_or_else(|| invalid(format!("expected a list value, got {}", self.value)))?
                    .iter()
                    .map(|v| {
                        v.as_str()
                            .map(String::from)
                            .ok_or_else(|| invalid(format!("expected a string in list, got {v}")))
                    })
                    .collect::<Result<Vec<String>, ConfigError>>()?;
                Matcher::In(options)
            }
            MatchOperator::Regex | MatchOperator::NotRegex => {
                let re = SqlRegex::new(as_str()?)
                    .map_err(|e| invalid(format!("bad pattern: {e}")))?;
                Matcher::Regex(re)
            }
            MatchOperator::LowerRegex | MatchOperator::NotLowerRegex => {
                let re = SqlRegex::new(as_str()?)
                    .map_err(|e| invalid(format!("bad pattern: {e}")))?;
                Matcher::LowerRegex(re)
            }
        };
        let predicate = Predicate::Match {
            field: self.field,
            matcher,
        };
        Ok(match self.operator {
            MatchOperator::NotRegex | MatchOperator::NotLowerRegex => {
                Predicate::Not(Box::new(predicate))
            }
            _ => predicate,
        })
    }
}

/// The assembled engine: built-ins with the custom block spliced in at
/// the fixed slot.
#[derive(Debug, Clone)]
pub struct ChannelEngine {
    rules: Vec<ChannelRule>,
}

impl ChannelEngine {
    pub fn assemble(
        social_platforms: &[String],
        custom: &[CustomRuleConfig],
        brand: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let mut rules = builtin_rules(social_platforms);
        let mut custom_rules = Vec::new();
        for rule_config in custom {
            // brand-gated rules for other brands are pruned here rather
            // than rendered as constant-false SQL branches
            if let Some(rule_brand) = &rule_config.brand {
                if brand != Some(rule_brand.as_str()) {
                    continue;
                }
            }
            let conditions = rule_config
                .all
                .iter()
                .map(|c| c.compile(&rule_config.label))
                .collect::<Result<Vec<Predicate>, ConfigError>>()?;
            if conditions.is_empty() {
                return Err(ConfigError::InvalidRule {
                    label: rule_config.label.clone(),
                    reason: "rule has no conditions".to_string(),
                });
            }
            custom_rules.push(ChannelRule {
                label: rule_config.label.clone(),
                predicate: Predicate::All(conditions),
                origin: RuleOrigin::Custom,
            });
        }
        tracing::debug!(
            builtin = rules.len(),
            custom = custom_rules.len(),
            "assembled channel rules"
        );
        rules.splice(CUSTOM_SLOT..CUSTOM_SLOT, custom_rules);
        Ok(ChannelEngine { rules })
    }

    pub fn rules(&self) -> &[ChannelRule] {
        &self.rules
    }

    /// First matching label, or the fallback. Pure and total.
    pub fn classify(&self, tuple: &AttributionTuple) -> &str {
        self.rules
            .iter()
            .find(|rule| rule.predicate.eval(tuple))
            .map(|rule| rule.label.as_str())
            .unwrap_or(FALLBACK_LABEL)
    }

    /// The classification expression: a single CASE over the tuple's
    /// columns, byte-deterministic for a given configuration.
    pub fn case_sql(&self, columns: &TupleColumns) -> String {
        let mut out = String::from("case");
        for rule in &self.rules {
            out.push_str(&format!(
                "\n  when {} then {}",
                rule.predicate.sql(columns),
                sqlfmt::literal(&rule.label)
            ));
        }
        out.push_str(&format!("\n  else {}\nend", sqlfmt::literal(FALLBACK_LABEL)));
        out
    }
}

fn builtin_rules(social_platforms: &[String]) -> Vec<ChannelRule> {
    let social_source = Predicate::regex(
        Field::Source,
        &format!("^({})$", social_platforms.join("|")),
    );
    let social_category = Predicate::eq(Field::SourceCategory, "SOURCE_CATEGORY_SOCIAL");

    let builtin = |label: &str, predicate: Predicate| ChannelRule {
        label: label.to_string(),
        predicate,
        origin: RuleOrigin::Builtin,
    };

    vec![
        builtin(
            "Direct",
            Predicate::Any(vec![
                Predicate::AllNull,
                Predicate::All(vec![
                    Predicate::eq(Field::Source, "direct"),
                    Predicate::Any(vec![
                        Predicate::eq(Field::Medium, "(none)"),
                        Predicate::eq(Field::Medium, "(not set)"),
                    ]),
                ]),
            ]),
        ),
        builtin(
            "Paid Social",
            Predicate::All(vec![
                Predicate::Any(vec![social_source.clone(), social_category.clone()]),
                Predicate::regex(Field::Medium, PAID_MEDIUM),
            ]),
        ),
        builtin(
            "Organic Social",
            Predicate::Any(vec![
                social_source,
                Predicate::one_of(Field::Medium, &SOCIAL_MEDIUMS),
                social_category,
            ]),
        ),
        builtin(
            "Email",
            Predicate::Any(vec![
                Predicate::regex(Field::Medium, EMAIL),
                Predicate::regex(Field::Source, EMAIL),
            ]),
        ),
        builtin("Affiliates", Predicate::regex(Field::Medium, AFFILIATES)),
        builtin(
            "Paid Shopping",
            Predicate::All(vec![
                Predicate::eq(Field::SourceCategory, "SOURCE_CATEGORY_SHOPPING"),
                Predicate::regex(Field::Medium, PAID_MEDIUM_SHORT),
            ]),
        ),
        builtin(
            "Organic Shopping",
            Predicate::Any(vec![
                Predicate::eq(Field::SourceCategory, "SOURCE_CATEGORY_SHOPPING"),
                Predicate::eq(Field::Campaign, "Shopping Free Listings"),
                Predicate::eq(Field::Medium, "shopping_free"),
            ]),
        ),
        // the custom block is spliced in here
        builtin(
            "Paid Video",
            Predicate::Any(vec![
                Predicate::All(vec![
                    Predicate::eq(Field::SourceCategory, "SOURCE_CATEGORY_VIDEO"),
                    Predicate::regex(Field::Medium, PAID_MEDIUM_SHORT),
                ]),
                Predicate::eq(Field::Source, "dv360_video"),
            ]),
        ),
        builtin(
            "Display",
            Predicate::Any(vec![
                Predicate::regex(Field::Medium, DISPLAY_MEDIUM),
                Predicate::eq(Field::Source, "dv360_display"),
            ]),
        ),
        builtin(
            "Paid Search",
            Predicate::All(vec![
                Predicate::eq(Field::SourceCategory, "SOURCE_CATEGORY_SEARCH"),
                Predicate::regex(Field::Medium, PAID_MEDIUM),
            ]),
        ),
        builtin(
            "Other Advertising",
            Predicate::regex(Field::Medium, OTHER_ADS_MEDIUM),
        ),
        builtin(
            "Organic Search",
            Predicate::Any(vec![
                Predicate::eq(Field::Medium, "organic"),
                Predicate::eq(Field::SourceCategory, "SOURCE_CATEGORY_SEARCH"),
            ]),
        ),
        builtin(
            "Organic Video",
            Predicate::Any(vec![
                Predicate::eq(Field::SourceCategory, "SOURCE_CATEGORY_VIDEO"),
                Predicate::regex(Field::Medium, VIDEO_MEDIUM),
            ]),
        ),
        builtin(
            "Referral",
            Predicate::one_of(Field::Medium, &["referral", "app", "link"]),
        ),
        builtin("Audio", Predicate::eq(Field::Medium, "audio")),
        builtin(
            "SMS",
            Predicate::Any(vec![
                Predicate::eq(Field::Medium, "sms"),
                Predicate::eq(Field::Source, "sms"),
            ]),
        ),
        builtin(
            "Mobile Push Notifications",
            Predicate::Any(vec![
                Predicate::regex(Field::Medium, MOBILE_PUSH_MEDIUM),
                Predicate::eq(Field::Source, "firebase"),
            ]),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platforms() -> Vec<String> {
        [
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
        .collect()
    }

    fn engine() -> ChannelEngine {
        ChannelEngine::assemble(&platforms(), &[], None).unwrap()
    }

    fn tuple(source: Option<&str>, medium: Option<&str>) -> AttributionTuple {
        AttributionTuple {
            source: source.map(String::from),
            medium: medium.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn all_null_tuple_is_direct() {
        assert_eq!(engine().classify(&AttributionTuple::default()), "Direct");
    }

    #[test]
    fn direct_none_medium_is_direct() {
        assert_eq!(engine().classify(&tuple(Some("direct"), Some("(none)"))), "Direct");
        assert_eq!(
            engine().classify(&tuple(Some("direct"), Some("(not set)"))),
            "Direct"
        );
        assert_ne!(engine().classify(&tuple(Some("direct"), Some("cpc"))), "Direct");
    }

    #[test]
    fn facebook_cpc_is_paid_social() {
        assert_eq!(
            engine().classify(&tuple(Some("facebook"), Some("cpc"))),
            "Paid Social"
        );
    }

    #[test]
    fn facebook_without_paid_medium_is_organic_social() {
        assert_eq!(
            engine().classify(&tuple(Some("facebook"), None)),
            "Organic Social"
        );
        assert_eq!(
            engine().classify(&tuple(Some("partnersite"), Some("social-media"))),
            "Organic Social"
        );
    }

    #[test]
    fn social_category_feeds_social_rules() {
        let mut t = tuple(Some("someapp"), Some("retargeting"));
        t.source_category = Some("SOURCE_CATEGORY_SOCIAL".to_string());
        assert_eq!(engine().classify(&t), "Paid Social");
        t.medium = None;
        assert_eq!(engine().classify(&t), "Organic Social");
    }

    #[test]
    fn newsletter_is_email() {
        assert_eq!(
            engine().classify(&tuple(Some("weekly-newsletter"), None)),
            "Email"
        );
        assert_eq!(engine().classify(&tuple(None, Some("e-mail"))), "Email");
    }

    #[test]
    fn affiliates_and_referral() {
        assert_eq!(
            engine().classify(&tuple(None, Some("affiliates"))),
            "Affiliates"
        );
        assert_eq!(engine().classify(&tuple(None, Some("referral"))), "Referral");
        assert_eq!(engine().classify(&tuple(None, Some("app"))), "Referral");
    }

    #[test]
    fn shopping_rules_use_category_and_sentinels() {
        let mut t = tuple(Some("merchant"), Some("cpc"));
        t.source_category = Some("SOURCE_CATEGORY_SHOPPING".to_string());
        assert_eq!(engine().classify(&t), "Paid Shopping");
        t.medium = Some("organic".to_string());
        assert_eq!(engine().classify(&t), "Organic Shopping");

        let mut free = tuple(Some("google"), None);
        free.campaign = Some("Shopping Free Listings".to_string());
        assert_eq!(engine().classify(&free), "Organic Shopping");
        assert_eq!(
            engine().classify(&tuple(None, Some("shopping_free"))),
            "Organic Shopping"
        );
    }

    #[test]
    fn search_rules() {
        let mut t = tuple(Some("google"), Some("cpc"));
        t.source_category = Some("SOURCE_CATEGORY_SEARCH".to_string());
        assert_eq!(engine().classify(&t), "Paid Search");
        t.medium = Some("organic".to_string());
        assert_eq!(engine().classify(&t), "Organic Search");
        // organic medium alone is enough
        assert_eq!(
            engine().classify(&tuple(Some("google"), Some("organic"))),
            "Organic Search"
        );
    }

    #[test]
    fn video_display_and_misc_rules() {
        let mut t = tuple(None, Some("ppc"));
        t.source_category = Some("SOURCE_CATEGORY_VIDEO".to_string());
        assert_eq!(engine().classify(&t), "Paid Video");
        assert_eq!(
            engine().classify(&tuple(Some("dv360_video"), None)),
            "Paid Video"
        );
        assert_eq!(engine().classify(&tuple(None, Some("banner"))), "Display");
        assert_eq!(
            engine().classify(&tuple(None, Some("cpv"))),
            "Other Advertising"
        );
        assert_eq!(
            engine().classify(&tuple(None, Some("product_video"))),
            "Organic Video"
        );
        assert_eq!(engine().classify(&tuple(None, Some("audio"))), "Audio");
        assert_eq!(engine().classify(&tuple(Some("sms"), None)), "SMS");
        assert_eq!(
            engine().classify(&tuple(Some("firebase"), None)),
            "Mobile Push Notifications"
        );
        assert_eq!(
            engine().classify(&tuple(None, Some("push"))),
            "Mobile Push Notifications"
        );
    }

    #[test]
    fn unmatched_tuple_falls_back() {
        assert_eq!(
            engine().classify(&tuple(Some("somewhere"), Some("somehow"))),
            FALLBACK_LABEL
        );
    }

    fn sem_rules() -> Vec<CustomRuleConfig> {
        let guard = |pattern: &str, operator: MatchOperator| {
            vec![
                FieldCondition {
                    field: Field::SourceCategory,
                    operator: MatchOperator::Exact,
                    value: "SOURCE_CATEGORY_SEARCH".into(),
                },
                FieldCondition {
                    field: Field::Medium,
                    operator: MatchOperator::Regex,
                    value: PAID_MEDIUM.into(),
                },
                FieldCondition {
                    field: Field::Campaign,
                    operator,
                    value: pattern.into(),
                },
            ]
        };
        vec![
            CustomRuleConfig {
                label: "SEM-Shopping".to_string(),
                brand: None,
                all: guard("^(.*pmax.*|.*shopping.*)$", MatchOperator::LowerRegex),
            },
            CustomRuleConfig {
                label: "SEM-Pure".to_string(),
                brand: None,
                all: guard("^(.*pure.*)$", MatchOperator::LowerRegex),
            },
            CustomRuleConfig {
                label: "SEM-Hybrid".to_string(),
                brand: None,
                all: guard("^(.*hybrid.*)$", MatchOperator::LowerRegex),
            },
            CustomRuleConfig {
                label: "SEM-Search".to_string(),
                brand: None,
                all: guard("^(.*video.*)$", MatchOperator::NotLowerRegex),
            },
        ]
    }

    #[test]
    fn custom_rules_shadow_paid_search_but_not_shopping() {
        let engine = ChannelEngine::assemble(&platforms(), &sem_rules(), None).unwrap();
        let mut t = tuple(Some("google"), Some("cpc"));
        t.source_category = Some("SOURCE_CATEGORY_SEARCH".to_string());
        t.campaign = Some("Brand_PMAX_All".to_string());
        // campaign is lowercased before matching
        assert_eq!(engine.classify(&t), "SEM-Shopping");
        t.campaign = Some("always-on hybrid q3".to_string());
        assert_eq!(engine.classify(&t), "SEM-Hybrid");
        t.campaign = Some("generic".to_string());
        assert_eq!(engine.classify(&t), "SEM-Search");
        // a video campaign falls through to the built-in Paid Search
        t.campaign = Some("brand video q3".to_string());
        assert_eq!(engine.classify(&t), "Paid Search");

        // shopping rules still outrank the custom block
        t.source_category = Some("SOURCE_CATEGORY_SHOPPING".to_string());
        t.campaign = Some("pmax".to_string());
        assert_eq!(engine.classify(&t), "Paid Shopping");
    }

    #[test]
    fn brand_gated_rules_are_pruned() {
        let rules = vec![CustomRuleConfig {
            label: "CRM".to_string(),
            brand: Some("LN".to_string()),
            all: vec![FieldCondition {
                field: Field::Source,
                operator: MatchOperator::Regex,
                value: ".*emarsy.*".into(),
            }],
        }];
        let t = tuple(Some("emarsys"), Some("whatever"));

        let ln = ChannelEngine::assemble(&platforms(), &rules, Some("LN")).unwrap();
        assert_eq!(ln.classify(&t), "CRM");

        let bb = ChannelEngine::assemble(&platforms(), &rules, Some("BB")).unwrap();
        assert_eq!(bb.classify(&t), FALLBACK_LABEL);
        assert!(bb.rules().iter().all(|r| r.origin == RuleOrigin::Builtin));
    }

    #[test]
    fn empty_custom_rule_is_rejected() {
        let rules = vec![CustomRuleConfig {
            label: "Broken".to_string(),
            brand: None,
            all: vec![],
        }];
        assert!(matches!(
            ChannelEngine::assemble(&platforms(), &rules, None),
            Err(ConfigError::InvalidRule { .. })
        ));
    }

    #[test]
    fn bad_custom_pattern_is_rejected() {
        let rules = vec![CustomRuleConfig {
            label: "Broken".to_string(),
            brand: None,
            all: vec![FieldCondition {
                field: Field::Source,
                operator: MatchOperator::Regex,
                value: "(unclosed".into(),
            }],
        }];
        assert!(matches!(
            ChannelEngine::assemble(&platforms(), &rules, None),
            Err(ConfigError::InvalidRule { .. })
        ));
    }

    #[test]
    fn case_sql_is_deterministic_and_ordered() {
        let engine = ChannelEngine::assemble(&platforms(), &sem_rules(), None).unwrap();
        let columns = TupleColumns::for_struct("ts");
        let sql = engine.case_sql(&columns);
        assert_eq!(sql, engine.case_sql(&columns));
        assert!(sql.starts_with("case\n  when "));
        assert!(sql.ends_with("else '(Other)'\nend"));
        // custom block sits between the shopping and video built-ins
        let organic_shopping = sql.find("'Organic Shopping'").unwrap();
        let sem = sql.find("'SEM-Shopping'").unwrap();
        let paid_video = sql.find("'Paid Video'").unwrap();
        assert!(organic_shopping < sem && sem < paid_video);
        assert!(sql.contains("regexp_contains(lower(ts.campaign)"));
        assert!(sql.contains("coalesce(ts.source, ts.medium, ts.campaign, ts.term, ts.content, ts.campaign_id) is null"));
    }
}
