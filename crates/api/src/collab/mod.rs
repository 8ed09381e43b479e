//! Realtime collaboration: the draft, presence and cursor services, the
//! audit feed, and the dispatcher that composes them.

pub mod audit;
pub mod cursors;
pub mod dispatcher;
pub mod drafts;
pub mod error;
pub mod presence;

pub use dispatcher::{CollabServer, ConnectedUser, Connection, JoinedPage};
pub use error::{CollabError, CollabResult};
