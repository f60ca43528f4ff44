use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: String,
    pub branch_id: String,
    pub client_id: String,
    pub staff_id: Option<String>,
    pub service_id: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub revenue_cents: Option<i64>,
    pub payment_terms: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Scheduled,
    InProgress,
    Done,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Done => "done",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "in_progress" => BookingStatus::InProgress,
            "done" => BookingStatus::Done,
            "cancelled" => BookingStatus::Cancelled,
            _ => BookingStatus::Scheduled,
        }
    }

    /// Check-in, completion and cancellation are the only moves; `done` and
    /// `cancelled` are terminal.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Scheduled, BookingStatus::InProgress)
                | (BookingStatus::Scheduled, BookingStatus::Done)
                | (BookingStatus::Scheduled, BookingStatus::Cancelled)
                | (BookingStatus::InProgress, BookingStatus::Done)
                | (BookingStatus::InProgress, BookingStatus::Cancelled)
        )
    }
}

/// Fields a caller supplies when creating a booking by hand.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub branch_id: String,
    pub client_id: String,
    pub staff_id: Option<String>,
    #[serde(default)]
    pub service_ids: Vec<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub notes: Option<String>,
    pub revenue_cents: Option<i64>,
    pub payment_terms: Option<String>,
}
