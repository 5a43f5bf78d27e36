//! Item handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use super::AppState;
use crate::feed::FeedService;
use crate::web::dto::{ApiResponse, MessageResponse};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

/// PUT /api/items/:id/read - Mark an item as read.
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(item_id): Path<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    FeedService::new(&state.db)
        .mark_read(claims.sub, item_id)
        .await?;

    Ok(Json(ApiResponse::new(MessageResponse::new(
        "Item updated successfully",
    ))))
}
