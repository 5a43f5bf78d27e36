//! Startup initialization of bootstrap users.

use tracing::{debug, info};

use super::repository::UserRepository;
use super::Database;
use crate::Result;

/// Ensure every configured bootstrap user exists.
///
/// Safe to run on every start; existing users are left untouched.
/// Returns the number of users created.
pub async fn bootstrap_users(db: &Database, emails: &[String]) -> Result<usize> {
    let repo = UserRepository::new(db.pool());
    let mut created = 0;

    for email in emails {
        if repo.create_if_missing(email).await? {
            info!(email = %email, "Created bootstrap user");
            created += 1;
        } else {
            debug!(email = %email, "Bootstrap user already exists");
        }
    }

    Ok(created)
}
