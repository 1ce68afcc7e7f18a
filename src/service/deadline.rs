// service/deadline.rs
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::ticketmodel::{Ticket, TicketStatus};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineLevel {
    Green,
    Yellow,
    Red,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeadlineProgress {
    /// Elapsed share of the window between creation and deadline, 0..=100.
    pub percent: f64,
    pub overdue: bool,
    pub level: DeadlineLevel,
    /// Whole hours until the deadline; negative once overdue.
    pub hours_remaining: i64,
}

/// Progress towards a ticket's deadline at `now`. Resolved tickets and tickets
/// without a deadline have no indicator.
pub fn deadline_progress(
    created_at: DateTime<Utc>,
    deadline: Option<DateTime<Utc>>,
    status: TicketStatus,
    now: DateTime<Utc>,
) -> Option<DeadlineProgress> {
    if status == TicketStatus::Resolved {
        return None;
    }
    let deadline = deadline?;

    let total_hours = (deadline - created_at).num_hours();
    let elapsed_hours = (now - created_at).num_hours();

    let percent = if total_hours > 0 {
        elapsed_hours as f64 * 100.0 / total_hours as f64
    } else {
        100.0
    };
    let percent = percent.clamp(0.0, 100.0);

    let overdue = now > deadline;

    let level = if percent > 80.0 || overdue {
        DeadlineLevel::Red
    } else if percent > 50.0 {
        DeadlineLevel::Yellow
    } else {
        DeadlineLevel::Green
    };

    Some(DeadlineProgress {
        percent,
        overdue,
        level,
        hours_remaining: (deadline - now).num_hours(),
    })
}

impl Ticket {
    pub fn deadline_progress(&self, now: DateTime<Utc>) -> Option<DeadlineProgress> {
        deadline_progress(self.created_at, self.deadline, self.status, now)
    }
}
