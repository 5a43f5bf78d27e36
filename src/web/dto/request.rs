//! Request DTOs for Web API.

use serde::Deserialize;
use validator::Validate;

use crate::feed::ItemFilter;

/// Login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email of a registered user.
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
}

/// Subscribe request.
#[derive(Debug, Deserialize, Validate)]
pub struct SubscribeRequest {
    /// Feed URL.
    #[validate(
        url(message = "Must be a valid URL"),
        length(max = 2048, message = "Must be at most 2048 characters")
    )]
    pub url: String,
}

/// Item listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ItemsQuery {
    /// Read-state filter (`all`, `unread` or `read`).
    #[serde(default)]
    pub filter: ItemFilter,
}
