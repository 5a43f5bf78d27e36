//! Feed handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use super::AppState;
use crate::feed::{FeedService, FeedToggle, SubscribeOutcome, SyncError};
use crate::web::dto::{
    ApiResponse, FeedResponse, ForceSyncResponse, ItemResponse, ItemsQuery, MessageResponse,
    SubscribeRequest, SubscribeResponse, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

/// GET /api/feeds - List the caller's feeds.
pub async fn list_feeds(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<Vec<FeedResponse>>>, ApiError> {
    let feeds = FeedService::new(&state.db).list_feeds(claims.sub).await?;
    let responses = feeds.into_iter().map(FeedResponse::from).collect();
    Ok(Json(ApiResponse::new(responses)))
}

/// POST /api/feeds - Subscribe to a feed.
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<SubscribeRequest>,
) -> Result<Json<ApiResponse<SubscribeResponse>>, ApiError> {
    let outcome = FeedService::new(&state.db)
        .subscribe(claims.sub, &req.url)
        .await?;

    let response = match outcome {
        SubscribeOutcome::Subscribed(feed) => SubscribeResponse {
            message: format!("Subscribed to feed '{}' successfully.", feed.url),
            feed: feed.into(),
        },
        SubscribeOutcome::AlreadySubscribed(feed) => SubscribeResponse {
            message: format!("The feed '{}' is already subscribed.", feed.url),
            feed: feed.into(),
        },
    };

    Ok(Json(ApiResponse::new(response)))
}

/// PUT /api/feeds/follow - Update follow/sync flags of several feeds.
pub async fn update_feeds(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Json(toggles): Json<Vec<FeedToggle>>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    FeedService::new(&state.db)
        .update_feeds(claims.sub, &toggles)
        .await?;

    Ok(Json(ApiResponse::new(MessageResponse::new(
        "Feed updated successfully",
    ))))
}

/// PUT /api/feeds/:id/force-sync - Sync one feed now.
pub async fn force_sync(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(feed_id): Path<i64>,
) -> Result<Json<ApiResponse<ForceSyncResponse>>, ApiError> {
    let feed = FeedService::new(&state.db)
        .get_owned_feed(claims.sub, feed_id)
        .await?;

    match state.engine.sync_one(&feed).await {
        Ok(added) => Ok(Json(ApiResponse::new(ForceSyncResponse {
            added,
            message: format!("{} items added to the feed", added),
        }))),
        Err(SyncError::Malformed(cause)) => Err(ApiError::bad_request(format!(
            "Syncing feed ID {} failed. {}",
            feed_id, cause
        ))),
        Err(SyncError::Persistence(e)) => {
            tracing::error!(feed_id, "Forced sync rolled back: {}", e);
            Err(ApiError::bad_request(format!(
                "Syncing feed ID {} failed. Changes were rolled back.",
                feed_id
            )))
        }
    }
}

/// GET /api/feeds/:id/items - List a feed's items.
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(feed_id): Path<i64>,
    Query(query): Query<ItemsQuery>,
) -> Result<Json<ApiResponse<Vec<ItemResponse>>>, ApiError> {
    let items = FeedService::new(&state.db)
        .list_items(claims.sub, feed_id, query.filter)
        .await?;
    let responses = items.into_iter().map(ItemResponse::from).collect();
    Ok(Json(ApiResponse::new(responses)))
}
