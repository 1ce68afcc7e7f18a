use thiserror::Error;
use uuid::Uuid;

use crate::{
    error::{ErrorMessage, HttpError},
    service::storage::StorageError,
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Ticket {0} not found")]
    TicketNotFound(Uuid),

    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error("Please rate ticket #{0} before opening a new one")]
    RatingRequired(i64),

    #[error("Only resolved tickets can be rated")]
    TicketNotResolved,

    #[error("{0} is not an active support user")]
    InvalidAssignee(Uuid),

    #[error("This user still owns tickets and cannot be deleted")]
    UserHasTickets,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Upload error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::TicketNotFound(_) => {
                HttpError::not_found(ErrorMessage::TicketNotFound.to_string())
            }
            ServiceError::UserNotFound(_) => HttpError::not_found(error.to_string()),

            ServiceError::RatingRequired(_)
            | ServiceError::TicketNotResolved
            | ServiceError::InvalidAssignee(_)
            | ServiceError::Validation(_) => HttpError::bad_request(error.to_string()),

            ServiceError::UserHasTickets => HttpError::unique_constraint_violation(error.to_string()),

            ServiceError::Storage(ref storage) => match storage {
                StorageError::Network(_) | StorageError::Rejected { .. } | StorageError::NotConfigured => {
                    tracing::error!("{}", storage);
                    HttpError::new(storage.user_message(), axum::http::StatusCode::BAD_GATEWAY)
                }
                _ => HttpError::bad_request(storage.user_message()),
            },

            ServiceError::Database(_) => HttpError::server_error(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (ServiceError::TicketNotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (ServiceError::RatingRequired(12), StatusCode::BAD_REQUEST),
            (ServiceError::TicketNotResolved, StatusCode::BAD_REQUEST),
            (ServiceError::UserHasTickets, StatusCode::CONFLICT),
            (ServiceError::Database(sqlx::Error::RowNotFound), StatusCode::INTERNAL_SERVER_ERROR),
            (ServiceError::Storage(StorageError::QuotaExceeded), StatusCode::BAD_REQUEST),
            (ServiceError::Storage(StorageError::NotConfigured), StatusCode::BAD_GATEWAY),
        ];
        for (error, status) in cases {
            assert_eq!(HttpError::from(error).status, status);
        }
    }

    #[test]
    fn rating_gate_message_names_the_ticket() {
        let err = HttpError::from(ServiceError::RatingRequired(42));
        assert_eq!(err.message, "Please rate ticket #42 before opening a new one");
    }
}
