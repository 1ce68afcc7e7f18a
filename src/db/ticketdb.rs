// src/db/ticketdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::db::DBClient;
use crate::{
    models::{ticketmodel::*, usermodel::User},
    service::access::TicketScope,
};

/// Name of the shared counter row that hands out ticket numbers.
pub const TICKET_COUNTER: &str = "tickets";

#[async_trait]
pub trait TicketExt {
    /// Assigns the next ticket number and stores the ticket in one
    /// transaction. Concurrent creations serialize on the counter row.
    async fn create_ticket(
        &self,
        creator: &User,
        ticket: NewTicket,
    ) -> Result<Ticket, sqlx::Error>;

    async fn get_tickets(
        &self,
        scope: TicketScope,
        status: Option<TicketStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Ticket>, sqlx::Error>;

    async fn count_tickets_by_status(
        &self,
        scope: TicketScope,
    ) -> Result<StatusCounts, sqlx::Error>;

    async fn get_tickets_created_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Ticket>, sqlx::Error>;

    async fn get_ticket(
        &self,
        ticket_id: Uuid,
    ) -> Result<Option<Ticket>, sqlx::Error>;

    async fn get_oldest_unrated_resolved_ticket(
        &self,
        user_id: Uuid,
    ) -> Result<Option<Ticket>, sqlx::Error>;

    async fn update_ticket_status(
        &self,
        ticket_id: Uuid,
        status: TicketStatus,
    ) -> Result<Ticket, sqlx::Error>;

    /// `None` unassigns the ticket.
    async fn assign_ticket(
        &self,
        ticket_id: Uuid,
        assignee: Option<&User>,
    ) -> Result<Ticket, sqlx::Error>;

    async fn set_ticket_deadline(
        &self,
        ticket_id: Uuid,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Ticket, sqlx::Error>;

    async fn add_comment(
        &self,
        ticket_id: Uuid,
        author: &User,
        message: String,
        attachments: Vec<String>,
    ) -> Result<TicketComment, sqlx::Error>;

    async fn get_comments(
        &self,
        ticket_id: Uuid,
    ) -> Result<Vec<TicketComment>, sqlx::Error>;

    async fn add_internal_note(
        &self,
        ticket_id: Uuid,
        author: &User,
        message: String,
    ) -> Result<InternalNote, sqlx::Error>;

    async fn get_internal_notes(
        &self,
        ticket_id: Uuid,
    ) -> Result<Vec<InternalNote>, sqlx::Error>;

    async fn get_rating(
        &self,
        ticket_id: Uuid,
    ) -> Result<Option<TicketRating>, sqlx::Error>;

    /// Creates the ticket's rating or edits the existing one, mirroring the
    /// score onto the ticket. The flag is true when a new rating was created.
    async fn upsert_rating(
        &self,
        ticket_id: Uuid,
        user_id: Uuid,
        rating: i16,
        comment: Option<String>,
    ) -> Result<(TicketRating, bool), sqlx::Error>;
}

#[async_trait]
impl TicketExt for DBClient {
    async fn create_ticket(
        &self,
        creator: &User,
        ticket: NewTicket,
    ) -> Result<Ticket, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO counters (name, last_number) VALUES ($1, 0) ON CONFLICT (name) DO NOTHING"
        )
        .bind(TICKET_COUNTER)
        .execute(&mut *tx)
        .await?;

        let last_number: i64 = sqlx::query_scalar(
            "SELECT last_number FROM counters WHERE name = $1 FOR UPDATE"
        )
        .bind(TICKET_COUNTER)
        .fetch_one(&mut *tx)
        .await?;

        let ticket_number = last_number + 1;

        sqlx::query("UPDATE counters SET last_number = $1 WHERE name = $2")
            .bind(ticket_number)
            .bind(TICKET_COUNTER)
            .execute(&mut *tx)
            .await?;

        let created = sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (
                ticket_number, title, company, department, description,
                contact_number, status, priority, user_id, user_name,
                user_email, attachments
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#
        )
        .bind(ticket_number)
        .bind(ticket.title)
        .bind(ticket.company)
        .bind(ticket.department)
        .bind(ticket.description)
        .bind(ticket.contact_number)
        .bind(TicketStatus::Open)
        .bind(ticket.priority)
        .bind(creator.id)
        .bind(&creator.name)
        .bind(&creator.email)
        .bind(ticket.attachments)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            ticket_id = %created.id,
            ticket_number = created.ticket_number,
            user_id = %creator.id,
            "Ticket created"
        );

        Ok(created)
    }

    async fn get_tickets(
        &self,
        scope: TicketScope,
        status: Option<TicketStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Ticket>, sqlx::Error> {
        let tickets = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT * FROM tickets
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::ticket_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        )
        .bind(scope.owner())
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(tickets)
    }

    async fn count_tickets_by_status(
        &self,
        scope: TicketScope,
    ) -> Result<StatusCounts, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS total
            FROM tickets
            WHERE ($1::uuid IS NULL OR user_id = $1)
            GROUP BY status
            "#
        )
        .bind(scope.owner())
        .fetch_all(&self.pool)
        .await?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let status: TicketStatus = row.try_get("status")?;
            let total: i64 = row.try_get("total")?;
            match status {
                TicketStatus::Open => counts.open = total,
                TicketStatus::InProgress => counts.in_progress = total,
                TicketStatus::Resolved => counts.resolved = total,
            }
        }

        Ok(counts)
    }

    async fn get_tickets_created_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Ticket>, sqlx::Error> {
        let tickets = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT * FROM tickets
            WHERE created_at >= $1
            ORDER BY created_at ASC
            "#
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(tickets)
    }

    async fn get_ticket(
        &self,
        ticket_id: Uuid,
    ) -> Result<Option<Ticket>, sqlx::Error> {
        let ticket = sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets WHERE id = $1"
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ticket)
    }

    async fn get_oldest_unrated_resolved_ticket(
        &self,
        user_id: Uuid,
    ) -> Result<Option<Ticket>, sqlx::Error> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT * FROM tickets
            WHERE user_id = $1
              AND status = 'resolved'
              AND rating IS NULL
            ORDER BY created_at ASC
            LIMIT 1
            "#
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ticket)
    }

    async fn update_ticket_status(
        &self,
        ticket_id: Uuid,
        status: TicketStatus,
    ) -> Result<Ticket, sqlx::Error> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET status = $1,
                resolved_at = CASE
                    WHEN $1 = 'resolved'::ticket_status THEN COALESCE(resolved_at, NOW())
                    ELSE NULL
                END,
                updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#
        )
        .bind(status)
        .bind(ticket_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ticket)
    }

    async fn assign_ticket(
        &self,
        ticket_id: Uuid,
        assignee: Option<&User>,
    ) -> Result<Ticket, sqlx::Error> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET assigned_to = $1,
                assigned_user_name = $2,
                assigned_user_email = $3,
                updated_at = NOW()
            WHERE id = $4
            RETURNING *
            "#
        )
        .bind(assignee.map(|u| u.id))
        .bind(assignee.map(|u| u.name.clone()))
        .bind(assignee.map(|u| u.email.clone()))
        .bind(ticket_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ticket)
    }

    async fn set_ticket_deadline(
        &self,
        ticket_id: Uuid,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Ticket, sqlx::Error> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET deadline = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#
        )
        .bind(deadline)
        .bind(ticket_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ticket)
    }

    async fn add_comment(
        &self,
        ticket_id: Uuid,
        author: &User,
        message: String,
        attachments: Vec<String>,
    ) -> Result<TicketComment, sqlx::Error> {
        let comment = sqlx::query_as::<_, TicketComment>(
            r#"
            INSERT INTO ticket_comments (ticket_id, user_id, user_name, user_avatar_url, message, attachments)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#
        )
        .bind(ticket_id)
        .bind(author.id)
        .bind(&author.name)
        .bind(&author.avatar_url)
        .bind(message)
        .bind(attachments)
        .fetch_one(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn get_comments(
        &self,
        ticket_id: Uuid,
    ) -> Result<Vec<TicketComment>, sqlx::Error> {
        let comments = sqlx::query_as::<_, TicketComment>(
            r#"
            SELECT * FROM ticket_comments
            WHERE ticket_id = $1
            ORDER BY created_at ASC
            "#
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    async fn add_internal_note(
        &self,
        ticket_id: Uuid,
        author: &User,
        message: String,
    ) -> Result<InternalNote, sqlx::Error> {
        let note = sqlx::query_as::<_, InternalNote>(
            r#"
            INSERT INTO ticket_internal_notes (ticket_id, user_id, user_name, user_avatar_url, message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#
        )
        .bind(ticket_id)
        .bind(author.id)
        .bind(&author.name)
        .bind(&author.avatar_url)
        .bind(message)
        .fetch_one(&self.pool)
        .await?;

        Ok(note)
    }

    async fn get_internal_notes(
        &self,
        ticket_id: Uuid,
    ) -> Result<Vec<InternalNote>, sqlx::Error> {
        let notes = sqlx::query_as::<_, InternalNote>(
            r#"
            SELECT * FROM ticket_internal_notes
            WHERE ticket_id = $1
            ORDER BY created_at ASC
            "#
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notes)
    }

    async fn get_rating(
        &self,
        ticket_id: Uuid,
    ) -> Result<Option<TicketRating>, sqlx::Error> {
        let rating = sqlx::query_as::<_, TicketRating>(
            "SELECT * FROM ticket_ratings WHERE ticket_id = $1"
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rating)
    }

    async fn upsert_rating(
        &self,
        ticket_id: Uuid,
        user_id: Uuid,
        rating: i16,
        comment: Option<String>,
    ) -> Result<(TicketRating, bool), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // Lock the ticket so two submissions for it cannot race past the lookup.
        sqlx::query("SELECT id FROM tickets WHERE id = $1 FOR UPDATE")
            .bind(ticket_id)
            .fetch_one(&mut *tx)
            .await?;

        let existing = sqlx::query_as::<_, TicketRating>(
            "SELECT * FROM ticket_ratings WHERE ticket_id = $1"
        )
        .bind(ticket_id)
        .fetch_optional(&mut *tx)
        .await?;

        let created = existing.is_none();

        let saved = match existing {
            Some(current) => {
                sqlx::query_as::<_, TicketRating>(
                    r#"
                    UPDATE ticket_ratings
                    SET rating = $1, comment = $2, updated_at = NOW()
                    WHERE id = $3
                    RETURNING *
                    "#
                )
                .bind(rating)
                .bind(comment)
                .bind(current.id)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, TicketRating>(
                    r#"
                    INSERT INTO ticket_ratings (ticket_id, user_id, rating, comment)
                    VALUES ($1, $2, $3, $4)
                    RETURNING *
                    "#
                )
                .bind(ticket_id)
                .bind(user_id)
                .bind(rating)
                .bind(comment)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        sqlx::query("UPDATE tickets SET rating = $1, updated_at = NOW() WHERE id = $2")
            .bind(rating)
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok((saved, created))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::{db::userdb::UserExt, models::ticketmodel::TicketPriority};

    async fn test_client() -> DBClient {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for database tests");
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&url)
            .await
            .expect("database connection");
        sqlx::migrate!("./migrations").run(&pool).await.expect("migrations");
        DBClient::new(pool)
    }

    fn new_ticket(title: &str) -> NewTicket {
        NewTicket {
            title: title.to_string(),
            company: None,
            department: None,
            description: "Concurrent numbering check".to_string(),
            contact_number: None,
            priority: TicketPriority::Normal,
            attachments: Vec::new(),
        }
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn concurrent_creations_get_unique_increasing_numbers() {
        let client = Arc::new(test_client().await);
        let email = format!("{}@example.com", Uuid::new_v4());
        let creator = Arc::new(
            client
                .save_user("Counter Test", email.as_str(), "not-a-real-hash")
                .await
                .unwrap(),
        );

        let mut handles = Vec::new();
        for i in 0..20 {
            let client = client.clone();
            let creator = creator.clone();
            handles.push(tokio::spawn(async move {
                client
                    .create_ticket(&creator, new_ticket(&format!("Ticket {}", i)))
                    .await
                    .unwrap()
                    .ticket_number
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap());
        }

        let unique: HashSet<i64> = numbers.iter().copied().collect();
        assert_eq!(unique.len(), numbers.len());

        let highest = numbers.iter().copied().max().unwrap();
        let next = client
            .create_ticket(&creator, new_ticket("After the burst"))
            .await
            .unwrap();
        assert!(next.ticket_number > highest);
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn resubmitting_a_rating_edits_instead_of_duplicating() {
        let client = test_client().await;
        let email = format!("{}@example.com", Uuid::new_v4());
        let creator = client
            .save_user("Rating Test", email.as_str(), "not-a-real-hash")
            .await
            .unwrap();
        let ticket = client.create_ticket(&creator, new_ticket("Rate me")).await.unwrap();
        client.update_ticket_status(ticket.id, TicketStatus::Resolved).await.unwrap();

        let (first, created) = client
            .upsert_rating(ticket.id, creator.id, 3, Some("ok".to_string()))
            .await
            .unwrap();
        assert!(created);
        assert!(first.updated_at.is_none());

        let (second, created) = client
            .upsert_rating(ticket.id, creator.id, 5, None)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.rating, 5);
        assert!(second.updated_at.is_some());

        let ticket = client.get_ticket(ticket.id).await.unwrap().unwrap();
        assert_eq!(ticket.rating, Some(5));
        assert!(ticket.resolved_at.is_some());
    }
}
