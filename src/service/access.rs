// service/access.rs
//
// Who may see and change what. Everything derives from the actor's role plus,
// for ordinary users, whether they opened the ticket.
use uuid::Uuid;

use crate::models::{
    ticketmodel::{Ticket, TicketStatus},
    usermodel::{User, UserRole},
};

/// Which tickets a list query or live stream returns for an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketScope {
    All,
    Own(Uuid),
}

impl TicketScope {
    pub fn for_user(user: &User) -> Self {
        if user.role.is_staff() {
            TicketScope::All
        } else {
            TicketScope::Own(user.id)
        }
    }

    pub fn includes(&self, ticket: &Ticket) -> bool {
        match self {
            TicketScope::All => true,
            TicketScope::Own(user_id) => ticket.user_id == *user_id,
        }
    }

    /// `user_id` filter to bind into ticket queries; `None` means unrestricted.
    pub fn owner(&self) -> Option<Uuid> {
        match self {
            TicketScope::All => None,
            TicketScope::Own(user_id) => Some(*user_id),
        }
    }
}

pub fn can_view_ticket(user: &User, ticket: &Ticket) -> bool {
    TicketScope::for_user(user).includes(ticket)
}

/// Status, assignment and deadline changes.
pub fn can_manage_ticket(user: &User) -> bool {
    user.role.is_staff()
}

pub fn can_comment(user: &User, ticket: &Ticket) -> bool {
    can_view_ticket(user, ticket)
}

pub fn can_access_internal_notes(user: &User) -> bool {
    user.role.is_staff()
}

pub fn can_view_rating(user: &User, ticket: &Ticket) -> bool {
    can_view_ticket(user, ticket)
}

#[derive(Debug, PartialEq, Eq)]
pub enum RatingDenial {
    NotCreator,
    NotResolved,
}

/// Only the person who opened the ticket rates it, once it has been resolved.
pub fn check_can_rate(user: &User, ticket: &Ticket) -> Result<(), RatingDenial> {
    if ticket.user_id != user.id {
        return Err(RatingDenial::NotCreator);
    }
    if ticket.status != TicketStatus::Resolved {
        return Err(RatingDenial::NotResolved);
    }
    Ok(())
}

pub fn can_manage_users(user: &User) -> bool {
    user.role == UserRole::Admin
}

/// A profile edit may only carry a role change when an admin makes it.
pub fn can_change_role(user: &User) -> bool {
    can_manage_users(user)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::models::{
        ticketmodel::{Ticket, TicketPriority, TicketStatus},
        usermodel::{User, UserRole, UserStatus},
    };

    pub fn user(role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: format!("{} person", role.to_str()),
            email: format!("{}@example.com", Uuid::new_v4()),
            password: String::new(),
            role,
            status: UserStatus::Active,
            avatar_url: None,
            reset_token: None,
            reset_token_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn ticket(owner: &User, status: TicketStatus) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: Uuid::new_v4(),
            ticket_number: 1,
            title: "Printer offline".to_string(),
            company: None,
            department: None,
            description: "The second floor printer is offline".to_string(),
            contact_number: None,
            status,
            priority: TicketPriority::Normal,
            user_id: owner.id,
            user_name: owner.name.clone(),
            user_email: owner.email.clone(),
            assigned_to: None,
            assigned_user_name: None,
            assigned_user_email: None,
            attachments: Vec::new(),
            deadline: None,
            rating: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{ticket, user};
    use super::*;

    #[test]
    fn ordinary_users_only_see_their_own_tickets() {
        let alice = user(UserRole::User);
        let bob = user(UserRole::User);
        let mine = ticket(&alice, TicketStatus::Open);
        let theirs = ticket(&bob, TicketStatus::Open);

        let scope = TicketScope::for_user(&alice);
        assert_eq!(scope, TicketScope::Own(alice.id));
        assert_eq!(scope.owner(), Some(alice.id));
        assert!(scope.includes(&mine));
        assert!(!scope.includes(&theirs));
        assert!(!can_view_ticket(&alice, &theirs));
        assert!(!can_comment(&alice, &theirs));
    }

    #[test]
    fn staff_see_everything() {
        let requester = user(UserRole::User);
        let t = ticket(&requester, TicketStatus::Open);

        for role in [UserRole::Ti, UserRole::Admin] {
            let staff = user(role);
            assert_eq!(TicketScope::for_user(&staff), TicketScope::All);
            assert_eq!(TicketScope::All.owner(), None);
            assert!(can_view_ticket(&staff, &t));
            assert!(can_manage_ticket(&staff));
            assert!(can_access_internal_notes(&staff));
        }
    }

    #[test]
    fn requesters_cannot_manage_or_read_notes() {
        let requester = user(UserRole::User);
        assert!(!can_manage_ticket(&requester));
        assert!(!can_access_internal_notes(&requester));
        assert!(!can_manage_users(&requester));
    }

    #[test]
    fn only_admins_manage_users() {
        assert!(can_manage_users(&user(UserRole::Admin)));
        assert!(!can_manage_users(&user(UserRole::Ti)));
        assert!(can_change_role(&user(UserRole::Admin)));
        assert!(!can_change_role(&user(UserRole::Ti)));
    }

    #[test]
    fn rating_requires_creator_and_resolution() {
        let requester = user(UserRole::User);
        let admin = user(UserRole::Admin);

        let open = ticket(&requester, TicketStatus::Open);
        assert_eq!(check_can_rate(&requester, &open), Err(RatingDenial::NotResolved));

        let resolved = ticket(&requester, TicketStatus::Resolved);
        assert_eq!(check_can_rate(&requester, &resolved), Ok(()));
        assert_eq!(check_can_rate(&admin, &resolved), Err(RatingDenial::NotCreator));
    }
}
