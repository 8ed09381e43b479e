//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod draft_repo;
pub mod editing_session_repo;
pub mod page_history_repo;
pub mod page_repo;
pub mod page_view_repo;
pub mod user_repo;

pub use draft_repo::DraftRepo;
pub use editing_session_repo::EditingSessionRepo;
pub use page_history_repo::PageHistoryRepo;
pub use page_repo::PageRepo;
pub use page_view_repo::PageViewRepo;
pub use user_repo::UserRepo;
