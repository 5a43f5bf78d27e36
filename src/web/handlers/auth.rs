//! Authentication handlers.

use axum::{extract::State, Json};
use jsonwebtoken::{encode, EncodingKey, Header};
use std::sync::Arc;

use crate::db::UserRepository;
use crate::feed::SyncEngine;
use crate::web::dto::{ApiResponse, LoginRequest, LoginResponse, ValidatedJson};
use crate::web::error::ApiError;
use crate::web::middleware::JwtClaims;
use crate::Database;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database handle.
    pub db: Database,
    /// Sync engine used for forced syncs.
    pub engine: Arc<SyncEngine>,
    /// JWT encoding key.
    pub encoding_key: EncodingKey,
    /// Access token expiry in seconds.
    pub access_token_expiry: u64,
}

impl AppState {
    /// Create a new application state.
    pub fn new(db: Database, engine: Arc<SyncEngine>, jwt_secret: &str, access_expiry: u64) -> Self {
        Self {
            db,
            engine,
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            access_token_expiry: access_expiry,
        }
    }

    /// Generate an access token for a user.
    pub fn generate_access_token(&self, user_id: i64, email: &str) -> Result<String, ApiError> {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = JwtClaims {
            sub: user_id,
            email: email.to_string(),
            iat: now,
            exp: now + self.access_token_expiry,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode JWT: {}", e);
            ApiError::internal("Failed to generate token")
        })
    }
}

/// POST /api/auth/login - Log in by email.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let user = UserRepository::new(state.db.pool())
        .get_by_email(req.email.trim())
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User '{}' not found.", req.email)))?;

    let access_token = state.generate_access_token(user.id, &user.email)?;
    tracing::info!(user_id = user.id, "User logged in");

    let response = LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: state.access_token_expiry,
    };

    Ok(Json(ApiResponse::new(response)))
}
