//! Bearer API-key authentication

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Mask an API key for logs
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..8].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Reject requests without a configured `Authorization: Bearer <key>`
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(key) = bearer_token(&req) else {
        return Err(AppError::Auth("Authorization header required".to_string()));
    };

    if !state.settings.is_valid_api_key(key) {
        warn!("Invalid API key attempted: {}", mask_api_key(key));
        return Err(AppError::Auth("Invalid API key".to_string()));
    }

    debug!("Valid API key used: {}", mask_api_key(key));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key("short"), "*****");
        assert_eq!(mask_api_key("demo-api-key-please-change"), "demo-api...ange");
    }
}
