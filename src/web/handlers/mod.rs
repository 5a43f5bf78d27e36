//! API handlers for the feedwatch HTTP API.

pub mod auth;
pub mod feeds;
pub mod items;

pub use auth::*;
pub use feeds::*;
pub use items::*;
