pub mod ticketdtos;
pub mod userdtos;
