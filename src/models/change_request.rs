use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub id: String,
    pub booking_id: String,
    pub kind: ChangeKind,
    pub new_start_time: Option<NaiveDateTime>,
    pub new_end_time: Option<NaiveDateTime>,
    pub reason: Option<String>,
    pub requested_by: String,
    pub status: ChangeRequestStatus,
    pub created_at: NaiveDateTime,
    pub resolved_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Cancel,
    Reschedule,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Cancel => "cancel",
            ChangeKind::Reschedule => "reschedule",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "reschedule" => ChangeKind::Reschedule,
            _ => ChangeKind::Cancel,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl ChangeRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeRequestStatus::Pending => "pending",
            ChangeRequestStatus::Approved => "approved",
            ChangeRequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "approved" => ChangeRequestStatus::Approved,
            "rejected" => ChangeRequestStatus::Rejected,
            _ => ChangeRequestStatus::Pending,
        }
    }
}
