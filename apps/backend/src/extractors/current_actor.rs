//! Authenticated caller for HTTP routes and the websocket upgrade.
//!
//! The token comes from `Authorization: Bearer <jwt>`, or from the `token`
//! query parameter for browsers that cannot set headers on a websocket
//! handshake.

use std::collections::HashMap;

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use tracing::debug;

use crate::auth::jwt::verify_access_token;
use crate::domain::identity::Actor;
use crate::error::AppError;
use crate::errors::ErrorCode;
use crate::state::app_state::AppState;

#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

impl FromRequest for CurrentActor {
    type Error = AppError;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();

        Box::pin(async move {
            let app_state = req
                .app_data::<web::Data<AppState>>()
                .cloned()
                .ok_or_else(|| AppError::internal("AppState not available"))?;
            let token = bearer_token(&req)?
                .or_else(|| query_token(req.query_string()))
                .ok_or_else(|| AppError::unauthorized("missing access token"))?;
            authenticate(&app_state, &token).await.map(CurrentActor)
        })
    }
}

/// Verify a token and resolve the identity behind it.
pub async fn authenticate(app_state: &AppState, token: &str) -> Result<Actor, AppError> {
    let claims = verify_access_token(token, &app_state.security)?;
    let user_id = claims.user_id()?;
    let Some(identity) = app_state.identities.find_user(user_id).await? else {
        debug!(user_id, "token for unknown user");
        return Err(AppError::unauthorized("unknown user"));
    };
    if !identity.is_active {
        return Err(AppError::forbidden(
            ErrorCode::AccountInactive,
            "account is inactive",
        ));
    }
    Ok(Actor::from(&identity))
}

fn bearer_token(req: &HttpRequest) -> Result<Option<String>, AppError> {
    let Some(value) = req.headers().get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::unauthorized("malformed Authorization header"))?;

    let parts: Vec<&str> = value.split_whitespace().collect();
    match parts.as_slice() {
        ["Bearer", token] if !token.is_empty() => Ok(Some((*token).to_string())),
        _ => Err(AppError::unauthorized("missing or invalid Bearer token")),
    }
}

fn query_token(query: &str) -> Option<String> {
    let params = web::Query::<HashMap<String, String>>::from_query(query).ok()?;
    params.get("token").cloned().filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn bearer_header_is_parsed() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer abc.def"))
            .to_http_request();
        assert_eq!(bearer_token(&req).unwrap(), Some("abc.def".to_string()));
    }

    #[test]
    fn non_bearer_scheme_is_rejected() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic Zm9v"))
            .to_http_request();
        assert!(bearer_token(&req).is_err());
    }

    #[test]
    fn query_token_fallback() {
        assert_eq!(query_token("token=xyz&x=1"), Some("xyz".to_string()));
        assert_eq!(query_token("token="), None);
        assert_eq!(query_token(""), None);
    }
}
