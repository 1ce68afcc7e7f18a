// src/models/ticketmodel.rs
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
}

impl TicketStatus {
    pub fn to_str(&self) -> &str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "ticket_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub ticket_number: i64,
    pub title: String,
    pub company: Option<String>,
    pub department: Option<String>,
    pub description: String,
    pub contact_number: Option<String>,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub assigned_to: Option<Uuid>,
    pub assigned_user_name: Option<String>,
    pub assigned_user_email: Option<String>,
    pub attachments: Vec<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub rating: Option<i16>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields captured when a ticket is opened; the number is assigned by the
/// counter transaction.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub title: String,
    pub company: Option<String>,
    pub department: Option<String>,
    pub description: String,
    pub contact_number: Option<String>,
    pub priority: TicketPriority,
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TicketComment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_avatar_url: Option<String>,
    pub message: String,
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InternalNote {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_avatar_url: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TicketRating {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub open: i64,
    pub in_progress: i64,
    pub resolved: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.open + self.in_progress + self.resolved
    }
}

#[derive(Debug, Deserialize)]
pub struct TicketQueryParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<TicketStatus>,
}
