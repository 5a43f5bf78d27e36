//! User model.

/// A user who owns feeds.
///
/// Users authenticate by email; credentials are issued as JWTs at login.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Login email (unique).
    pub email: String,
    /// Account creation timestamp.
    pub created_at: String,
}
