// mail/mails.rs
//
// Inline HTML bodies for the ticket notifications. Anything a user typed goes
// through `escape` before it is embedded.
use super::sendmail::EmailPayload;
use crate::models::ticketmodel::Ticket;

const SIGNATURE: &str = "<p>Kind regards,<br/>The Support Team</p>";

fn escape(text: &str) -> String {
    ammonia::clean_text(text)
}

pub fn ticket_created_email(ticket: &Ticket) -> EmailPayload {
    EmailPayload {
        to: vec![ticket.user_email.clone()],
        subject: format!("Ticket #{} created: {}", ticket.ticket_number, ticket.title),
        html_body: format!(
            "<h1>Hello {name},</h1>\
             <p>Your ticket <strong>#{number} - \"{title}\"</strong> has been created.</p>\
             <p>Our support team will look at it shortly. You can follow its status in the portal.</p>\
             {SIGNATURE}",
            name = escape(&ticket.user_name),
            number = ticket.ticket_number,
            title = escape(&ticket.title),
        ),
    }
}

/// Alert for the support staff; `None` when there is nobody to tell.
pub fn ticket_created_staff_email(ticket: &Ticket, staff_emails: Vec<String>) -> Option<EmailPayload> {
    if staff_emails.is_empty() {
        return None;
    }
    Some(EmailPayload {
        to: staff_emails,
        subject: format!("New ticket opened: #{} by {}", ticket.ticket_number, ticket.user_name),
        html_body: format!(
            "<h1>New ticket in the portal</h1>\
             <p>A new ticket was opened and needs attention.</p>\
             <ul>\
             <li><strong>Opened by:</strong> {name}</li>\
             <li><strong>Number:</strong> #{number}</li>\
             <li><strong>Title:</strong> {title}</li>\
             <li><strong>Priority:</strong> {priority:?}</li>\
             </ul>\
             <p>Open the portal to see the details and assign the ticket.</p>\
             {SIGNATURE}",
            name = escape(&ticket.user_name),
            number = ticket.ticket_number,
            title = escape(&ticket.title),
            priority = ticket.priority,
        ),
    })
}

pub fn new_comment_email(
    ticket: &Ticket,
    recipient_email: &str,
    recipient_name: &str,
    commenter_name: &str,
    message: &str,
) -> EmailPayload {
    EmailPayload {
        to: vec![recipient_email.to_string()],
        subject: format!("New comment on ticket #{}", ticket.ticket_number),
        html_body: format!(
            "<h1>Hello {recipient},</h1>\
             <p>There is a new reply on ticket <strong>#{number} - \"{title}\"</strong>.</p>\
             <hr/>\
             <p><strong>{commenter}</strong> wrote:</p>\
             <blockquote style=\"border-left: 2px solid #ccc; padding-left: 1em; margin-left: 1em; font-style: italic;\">{message}</blockquote>\
             <hr/>\
             <p>Open the portal to see the full ticket.</p>\
             {SIGNATURE}",
            recipient = escape(recipient_name),
            number = ticket.ticket_number,
            title = escape(&ticket.title),
            commenter = escape(commenter_name),
            message = escape(message),
        ),
    }
}

pub fn ticket_resolved_email(ticket: &Ticket) -> EmailPayload {
    EmailPayload {
        to: vec![ticket.user_email.clone()],
        subject: format!("Your ticket #{} has been resolved", ticket.ticket_number),
        html_body: format!(
            "<h1>Hello {name},</h1>\
             <p>Your ticket <strong>#{number} - \"{title}\"</strong> was marked as resolved by our team.</p>\
             <p>If the problem persists, feel free to open a new ticket.</p>\
             <p>We would appreciate it if you took a moment to <strong>rate the support</strong> you received on the ticket page.</p>\
             {SIGNATURE}",
            name = escape(&ticket.user_name),
            number = ticket.ticket_number,
            title = escape(&ticket.title),
        ),
    }
}

pub fn password_reset_email(to_email: &str, username: &str, reset_link: &str) -> EmailPayload {
    EmailPayload {
        to: vec![to_email.to_string()],
        subject: "Reset your password".to_string(),
        html_body: format!(
            "<h1>Hello {name},</h1>\
             <p>An administrator requested a password reset for your account.</p>\
             <p><a href=\"{link}\">Choose a new password</a>. The link expires in 30 minutes.</p>\
             {SIGNATURE}",
            name = escape(username),
            link = escape(reset_link),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ticketmodel::TicketStatus, usermodel::UserRole};
    use crate::service::access::fixtures;

    #[test]
    fn user_text_is_escaped() {
        let mut owner = fixtures::user(UserRole::User);
        owner.name = "<script>alert(1)</script>".to_string();
        let ticket = fixtures::ticket(&owner, TicketStatus::Open);

        let email = ticket_created_email(&ticket);
        assert!(!email.html_body.contains("<script>"));
        assert!(email.html_body.contains("&lt;script&gt;"));
    }

    #[test]
    fn staff_alert_needs_recipients() {
        let owner = fixtures::user(UserRole::User);
        let ticket = fixtures::ticket(&owner, TicketStatus::Open);

        assert!(ticket_created_staff_email(&ticket, Vec::new()).is_none());
        let alert = ticket_created_staff_email(&ticket, vec!["ti@example.com".to_string()]).unwrap();
        assert_eq!(alert.to, vec!["ti@example.com".to_string()]);
        assert!(alert.subject.starts_with("New ticket opened: #1"));
    }

    #[test]
    fn resolved_email_goes_to_requester() {
        let owner = fixtures::user(UserRole::User);
        let ticket = fixtures::ticket(&owner, TicketStatus::Resolved);
        let email = ticket_resolved_email(&ticket);
        assert_eq!(email.to, vec![owner.email.clone()]);
        assert_eq!(email.subject, "Your ticket #1 has been resolved");
    }
}
