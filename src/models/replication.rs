use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ReplicationMode {
    Single,
    ThisWeek,
    Recurring,
    Custom,
}

impl ReplicationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicationMode::Single => "single",
            ReplicationMode::ThisWeek => "this-week",
            ReplicationMode::Recurring => "recurring",
            ReplicationMode::Custom => "custom",
        }
    }
}

/// Parameters for one replication call. Never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicationJob {
    pub mode: ReplicationMode,
    pub branch_id: String,
    pub booking_id: Option<String>,
    pub source_start: NaiveDate,
    pub source_end: NaiveDate,
    pub target_start: NaiveDate,
    #[serde(default = "default_recurring_weeks")]
    pub recurring_weeks: u32,
    #[serde(default = "default_true")]
    pub include_staff: bool,
    #[serde(default)]
    pub include_cancelled: bool,
}

fn default_recurring_weeks() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReplicationResult {
    pub success_count: usize,
    pub failed_count: usize,
    pub created_booking_ids: Vec<String>,
}
