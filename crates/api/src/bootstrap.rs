//! First-run seeding: an administrator account and a home page.

use tandem_core::roles::ROLE_ADMIN;
use tandem_core::types::DbId;
use tandem_db::models::page::CreatePage;
use tandem_db::models::user::CreateUser;
use tandem_db::{Gateway, StoreResult};

use crate::auth::password::hash_password;
use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};

/// Slug of the page seeded on an empty wiki.
pub const HOME_SLUG: &str = "home";

/// Create the configured admin and the home page if they are missing.
///
/// Safe to run on every startup.
pub async fn run(gateway: &dyn Gateway, config: &ServerConfig) -> AppResult<()> {
    let mut admin_id = None;

    if let Some(admin) = &config.bootstrap_admin {
        match gateway.find_user_by_username(&admin.username).await? {
            Some(existing) => admin_id = Some(existing.id),
            None => {
                let password_hash = hash_password(&admin.password)
                    .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;
                let user = gateway
                    .create_user(&CreateUser {
                        username: admin.username.clone(),
                        password_hash,
                        role: ROLE_ADMIN.to_string(),
                    })
                    .await?;
                tracing::info!(user_id = user.id, username = %user.username, "Created bootstrap admin");
                admin_id = Some(user.id);
            }
        }
    }

    seed_home_page(gateway, admin_id).await?;
    Ok(())
}

async fn seed_home_page(gateway: &dyn Gateway, created_by: Option<DbId>) -> StoreResult<()> {
    if gateway.find_live_page_by_slug(HOME_SLUG).await?.is_some() {
        return Ok(());
    }
    let page = gateway
        .create_page(&CreatePage {
            slug: HOME_SLUG.to_string(),
            title: "Home".to_string(),
            content: "[h1]Welcome[/h1]\nThis page is ready to be edited.".to_string(),
            parent_id: None,
            created_by,
        })
        .await?;
    tracing::info!(page_id = page.id, "Seeded home page");
    Ok(())
}
