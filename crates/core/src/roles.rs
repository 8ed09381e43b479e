//! Well-known role name constants.
//!
//! These must match the `ck_users_role` check constraint in the initial
//! migration.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

/// Returns `true` if the role grants access to the admin live channel.
pub fn is_admin(role: &str) -> bool {
    role == ROLE_ADMIN
}
