// service/realtime.rs
use serde::Serialize;
use tokio::sync::broadcast;

use crate::{
    models::{ticketmodel::Ticket, usermodel::User},
    service::access::{can_access_internal_notes, TicketScope},
};

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketEventKind {
    Created,
    Updated,
    CommentAdded,
    NoteAdded,
    Rated,
}

impl TicketEventKind {
    pub fn to_str(&self) -> &str {
        match self {
            TicketEventKind::Created => "created",
            TicketEventKind::Updated => "updated",
            TicketEventKind::CommentAdded => "comment_added",
            TicketEventKind::NoteAdded => "note_added",
            TicketEventKind::Rated => "rated",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketEvent {
    pub kind: TicketEventKind,
    pub ticket: Ticket,
}

impl TicketEvent {
    pub fn new(kind: TicketEventKind, ticket: Ticket) -> Self {
        Self { kind, ticket }
    }

    /// Whether a subscriber acting as `user` may receive this event.
    pub fn visible_to(&self, user: &User) -> bool {
        if self.kind == TicketEventKind::NoteAdded && !can_access_internal_notes(user) {
            return false;
        }
        TicketScope::for_user(user).includes(&self.ticket)
    }
}

/// Fan-out of ticket changes to every open live stream.
#[derive(Debug, Clone)]
pub struct TicketEvents {
    sender: broadcast::Sender<TicketEvent>,
}

impl Default for TicketEvents {
    fn default() -> Self {
        Self::new(EVENT_BUFFER)
    }
}

impl TicketEvents {
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TicketEvent> {
        self.sender.subscribe()
    }

    /// Publishing with no subscribers is not an error; the event is dropped.
    pub fn publish(&self, kind: TicketEventKind, ticket: Ticket) {
        let ticket_id = ticket.id;
        match self.sender.send(TicketEvent::new(kind, ticket)) {
            Ok(receivers) => {
                tracing::debug!("Ticket event {} for {} sent to {} streams", kind.to_str(), ticket_id, receivers);
            }
            Err(_) => {
                tracing::trace!("Ticket event {} for {} had no listeners", kind.to_str(), ticket_id);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ticketmodel::TicketStatus, usermodel::UserRole};
    use crate::service::access::fixtures;

    #[test]
    fn requesters_only_see_events_for_their_tickets() {
        let alice = fixtures::user(UserRole::User);
        let bob = fixtures::user(UserRole::User);
        let event = TicketEvent::new(TicketEventKind::Updated, fixtures::ticket(&bob, TicketStatus::Open));

        assert!(!event.visible_to(&alice));
        assert!(event.visible_to(&bob));
        assert!(event.visible_to(&fixtures::user(UserRole::Ti)));
    }

    #[test]
    fn note_events_are_staff_only() {
        let owner = fixtures::user(UserRole::User);
        let event = TicketEvent::new(TicketEventKind::NoteAdded, fixtures::ticket(&owner, TicketStatus::InProgress));

        assert!(!event.visible_to(&owner));
        assert!(event.visible_to(&fixtures::user(UserRole::Admin)));
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let events = TicketEvents::default();
        let mut rx = events.subscribe();
        assert_eq!(events.subscriber_count(), 1);

        let owner = fixtures::user(UserRole::User);
        let ticket = fixtures::ticket(&owner, TicketStatus::Open);
        events.publish(TicketEventKind::Created, ticket.clone());

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, TicketEventKind::Created);
        assert_eq!(received.ticket.id, ticket.id);
    }

    #[test]
    fn publishing_without_listeners_is_harmless() {
        let events = TicketEvents::new(4);
        let owner = fixtures::user(UserRole::User);
        events.publish(TicketEventKind::Rated, fixtures::ticket(&owner, TicketStatus::Resolved));
        assert_eq!(events.subscriber_count(), 0);
    }
}
