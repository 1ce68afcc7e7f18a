pub mod auth;
pub mod comments;
pub mod dashboard;
pub mod ratings;
pub mod tickets;
pub mod users;
