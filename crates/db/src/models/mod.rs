//! Row models and DTOs for the tables the collaboration core touches.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row, plus the input DTOs the gateway accepts.

pub mod draft;
pub mod editing_session;
pub mod page;
pub mod page_history;
pub mod user;
