// service/notification_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{db::DBClient, userdb::UserExt},
    mail::{
        mails,
        sendmail::{EmailPayload, Mailer},
    },
    models::{ticketmodel::Ticket, usermodel::User},
    service::error::ServiceError,
};

pub const ATTACHMENT_ONLY_MESSAGE: &str = "A new attachment was added.";
pub const EMPTY_COMMENT_MESSAGE: &str = "New activity on the ticket.";

/// Email notifications for ticket activity. Every `notify_*` call returns
/// immediately; delivery happens on a spawned task and failures are logged.
#[derive(Debug, Clone)]
pub struct NotificationService {
    db_client: Arc<DBClient>,
    mailer: Mailer,
}

impl NotificationService {
    pub fn new(db_client: Arc<DBClient>, mailer: Mailer) -> Self {
        Self { db_client, mailer }
    }

    pub fn notify_ticket_created(&self, ticket: &Ticket) {
        let service = self.clone();
        let ticket = ticket.clone();
        tokio::spawn(async move {
            service.dispatch(mails::ticket_created_email(&ticket)).await;

            match service.staff_recipients(&ticket).await {
                Ok(staff_emails) => {
                    if let Some(alert) = mails::ticket_created_staff_email(&ticket, staff_emails) {
                        service.dispatch(alert).await;
                    }
                }
                Err(e) => {
                    tracing::error!("Could not load staff for ticket #{} alert: {}", ticket.ticket_number, e);
                }
            }
        });
    }

    pub fn notify_comment_added(
        &self,
        ticket: &Ticket,
        commenter: &User,
        message: &str,
        attachment_count: usize,
    ) {
        let Some((recipient_email, recipient_name)) = comment_recipient(ticket, commenter.id) else {
            tracing::debug!("Ticket #{} has no one to notify about the new comment", ticket.ticket_number);
            return;
        };

        let email = mails::new_comment_email(
            ticket,
            &recipient_email,
            &recipient_name,
            &commenter.name,
            &comment_preview(message, attachment_count),
        );
        self.spawn_dispatch(email);
    }

    pub fn notify_ticket_resolved(&self, ticket: &Ticket) {
        self.spawn_dispatch(mails::ticket_resolved_email(ticket));
    }

    pub fn notify_password_reset(&self, user: &User, reset_link: &str) {
        self.spawn_dispatch(mails::password_reset_email(&user.email, &user.name, reset_link));
    }

    async fn staff_recipients(&self, ticket: &Ticket) -> Result<Vec<String>, ServiceError> {
        let staff = self.db_client.get_staff_users().await?;
        Ok(staff
            .into_iter()
            .filter(|u| u.id != ticket.user_id)
            .map(|u| u.email)
            .collect())
    }

    fn spawn_dispatch(&self, email: EmailPayload) {
        let service = self.clone();
        tokio::spawn(async move {
            service.dispatch(email).await;
        });
    }

    async fn dispatch(&self, email: EmailPayload) {
        if let Err(e) = self.mailer.send(&email).await {
            tracing::error!("Failed to send \"{}\" to {}: {}", email.subject, email.to.join(", "), e);
        }
    }
}

/// Comments notify the other side of the conversation: the assignee when the
/// requester writes, the requester when anyone else does.
pub fn comment_recipient(ticket: &Ticket, commenter_id: Uuid) -> Option<(String, String)> {
    if commenter_id == ticket.user_id {
        let email = ticket.assigned_user_email.clone()?;
        let name = ticket
            .assigned_user_name
            .clone()
            .unwrap_or_else(|| email.clone());
        Some((email, name))
    } else {
        Some((ticket.user_email.clone(), ticket.user_name.clone()))
    }
}

pub fn comment_preview(message: &str, attachment_count: usize) -> String {
    let message = message.trim();
    if !message.is_empty() {
        message.to_string()
    } else if attachment_count > 0 {
        ATTACHMENT_ONLY_MESSAGE.to_string()
    } else {
        EMPTY_COMMENT_MESSAGE.to_string()
    }
}
