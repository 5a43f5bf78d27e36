//! Web API module for feedwatch.
//!
//! This module provides the REST API used to log in, manage feed
//! subscriptions and read items.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use router::{create_health_router, create_router};
pub use server::WebServer;
