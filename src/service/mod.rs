pub mod access;
pub mod deadline;
pub mod error;
pub mod notification_service;
pub mod realtime;
pub mod schedules;
pub mod statistics;
pub mod storage;
