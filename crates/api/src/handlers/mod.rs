//! HTTP handlers, grouped by resource.

pub mod admin;
pub mod auth;
pub mod pages;
pub mod users;
