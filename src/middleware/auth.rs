use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::jwt::verify_token;
use crate::error::AppError;

/// Authenticated actor attached to the request after token verification.
/// `user_id` is recorded as `updated_by` on pricing mutations.
#[derive(Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub role: String,
    pub email: String,
}

pub async fn require_auth(mut req: Request<Body>, next: Next) -> Response {
    let token = match bearer_token(&req) {
        Some(t) => t,
        None => {
            return AppError::unauthorized("Missing or malformed Authorization header")
                .into_response()
        }
    };

    let secret = match std::env::var("JWT_SECRET") {
        Ok(s) => s,
        Err(_) => return AppError::internal("Server auth misconfiguration").into_response(),
    };

    let claims = match verify_token(token, &secret) {
        Ok(c) => c,
        Err(e) => return e.into_response(),
    };

    req.extensions_mut().insert(AuthContext {
        user_id: claims.sub,
        role: claims.role,
        email: claims.email,
    });

    next.run(req).await
}

// Expect "Bearer <token>"
fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
