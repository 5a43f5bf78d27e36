//! feedwatch - RSS feed subscription and sync service
//!
//! Users subscribe to feeds over an HTTP API; a background scheduler
//! periodically syncs every enabled feed, deduplicating items by URL and
//! disabling feeds that keep failing.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod logging;
pub mod web;

pub use config::Config;
pub use db::{Database, User, UserRepository};
pub use error::{FeedwatchError, Result};
