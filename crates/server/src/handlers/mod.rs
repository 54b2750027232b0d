//! API handlers module

pub mod attachments;
pub mod health;
pub mod programs;
pub mod theses;
pub mod users;
