//! Domain layer for the tandem collaborative wiki.
//!
//! Has no internal dependencies so the persistence gateway, the socket
//! dispatcher, and any tooling can share the same protocol types, error
//! taxonomy, and pure text algorithms.

pub mod collaboration;
pub mod colors;
pub mod cursor;
pub mod diff;
pub mod error;
pub mod markup;
pub mod protocol;
pub mod roles;
pub mod types;
