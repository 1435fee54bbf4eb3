//! Quality-check emission.
//!
//! The toggles gate whether a check's SQL is emitted at all; running
//! and reporting the checks is the orchestrator's job, not ours.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QualityToggles {
    #[serde(default = "default_true")]
    pub event_id_uniqueness: bool,
    #[serde(default = "default_true")]
    pub session_id_uniqueness: bool,
    #[serde(default = "default_true")]
    pub session_duration_validity: bool,
    #[serde(default = "default_true")]
    pub sessions_validity: bool,
    #[serde(default = "default_true")]
    pub tables_timeliness: bool,
    #[serde(default = "default_true")]
    pub transaction_id_completeness: bool,
    #[serde(default = "default_true")]
    pub user_pseudo_id_completeness: bool,
    #[serde(default = "default_true")]
    pub transactions_dedupe: bool,
}

impl Default for QualityToggles {
    fn default() -> Self {
        QualityToggles {
            event_id_uniqueness: true,
            session_id_uniqueness: true,
            session_duration_validity: true,
            sessions_validity: true,
            tables_timeliness: true,
            transaction_id_completeness: true,
            user_pseudo_id_completeness: true,
            transactions_dedupe: true,
        }
    }
}

/// One emitted check: a named condition that must hold over the
/// materialized table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub name: &'static str,
    pub condition: String,
}

impl QualityToggles {
    /// The qualify fragment that dedupes transactions, or nothing when
    /// toggled off.
    pub fn transactions_dedupe_sql(&self) -> String {
        if self.transactions_dedupe {
            "qualify duplicate_count = 1".to_string()
        } else {
            String::new()
        }
    }

    /// Conditions for every enabled check, in a fixed order.
    pub fn enabled_checks(&self, data_is_final_days: u32) -> Vec<Check> {
        let mut checks = Vec::new();
        let mut push = |enabled: bool, name: &'static str, condition: String| {
            if enabled {
                checks.push(Check { name, condition });
            }
        };
        push(
            self.event_id_uniqueness,
            "event_id_uniqueness",
            "count(*) = count(distinct event_id)".to_string(),
        );
        push(
            self.session_id_uniqueness,
            "session_id_uniqueness",
            "count(*) = count(distinct session_id)".to_string(),
        );
        push(
            self.session_duration_validity,
            "session_duration_validity",
            "countif(session_end < session_start) = 0".to_string(),
        );
        push(
            self.sessions_validity,
            "sessions_validity",
            "countif(session_id is null) = 0".to_string(),
        );
        push(
            self.tables_timeliness,
            "tables_timeliness",
            format!(
                "max(event_date) >= date_sub(current_date(), interval {data_is_final_days} day)"
            ),
        );
        push(
            self.transaction_id_completeness,
            "transaction_id_completeness",
            "countif(event_name = 'purchase' and transaction_id is null) = 0".to_string(),
        );
        push(
            self.user_pseudo_id_completeness,
            "user_pseudo_id_completeness",
            "countif(user_pseudo_id is null) = 0".to_string(),
        );
        checks
    }
}
