use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::ticketmodel::*,
    service::{deadline::DeadlineProgress, statistics::TimeRange},
};

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateTicketDto {
    #[validate(length(min = 5, message = "Title must be at least 5 characters"))]
    pub title: String,

    #[validate(length(max = 255, message = "Company must be at most 255 characters"))]
    pub company: Option<String>,

    #[validate(length(max = 255, message = "Department must be at most 255 characters"))]
    pub department: Option<String>,

    #[validate(length(min = 10, message = "Description must be at least 10 characters"))]
    pub description: String,

    #[validate(length(max = 30, message = "Contact number must be at most 30 characters"))]
    pub contact_number: Option<String>,

    #[serde(default)]
    pub priority: TicketPriority,

    #[serde(default)]
    pub attachments: Vec<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CreateTicketDto {
    pub fn into_new_ticket(self) -> NewTicket {
        NewTicket {
            title: self.title.trim().to_string(),
            company: non_blank(self.company),
            department: non_blank(self.department),
            description: self.description.trim().to_string(),
            contact_number: non_blank(self.contact_number),
            priority: self.priority,
            attachments: self.attachments,
        }
    }
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateCommentDto {
    #[serde(default)]
    #[validate(length(max = 5000, message = "Comment must be at most 5000 characters"))]
    pub message: String,

    #[serde(default)]
    pub attachments: Vec<String>,
}

impl CreateCommentDto {
    /// A comment needs text, an attachment, or both.
    pub fn is_empty(&self) -> bool {
        self.message.trim().is_empty() && self.attachments.is_empty()
    }
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateNoteDto {
    #[validate(length(min = 1, max = 5000, message = "Note must be between 1-5000 characters"))]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTicketStatusDto {
    pub status: TicketStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignTicketDto {
    /// `null` unassigns.
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlineDto {
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct RatingDto {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i16,

    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatisticsQueryDto {
    #[serde(default)]
    pub range: TimeRange,
}

#[derive(Debug, Serialize)]
pub struct TicketResponse {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub deadline_progress: Option<DeadlineProgress>,
}

impl TicketResponse {
    pub fn from_ticket(ticket: Ticket, now: DateTime<Utc>) -> Self {
        let deadline_progress = ticket.deadline_progress(now);
        TicketResponse { ticket, deadline_progress }
    }

    pub fn from_tickets(tickets: Vec<Ticket>, now: DateTime<Utc>) -> Vec<Self> {
        tickets
            .into_iter()
            .map(|t| TicketResponse::from_ticket(t, now))
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct TicketListResponseDto {
    pub status: &'static str,
    pub tickets: Vec<TicketResponse>,
    pub page: i64,
    pub limit: i64,
    pub counts: StatusCounts,
}
