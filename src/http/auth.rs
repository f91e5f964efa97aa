use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;

use crate::app::auth::SessionToken;
use crate::http::AppError;
use crate::AppState;

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: uuid::Uuid,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| AppError::unauthorized("missing session"))?;

        let session = state
            .auth_service()
            .authenticate_session_token(&token)
            .map_err(|err| {
                tracing::error!(error = ?err, "failed to authenticate session");
                AppError::internal("failed to authenticate")
            })?;

        let session = session.ok_or_else(|| AppError::unauthorized("invalid session"))?;
        Ok(AuthUser {
            user_id: session.user_id,
        })
    }
}

/// Cookie carrying `session`, expiring together with its token.
pub fn session_cookie(state: &AppState, session: SessionToken) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.token))
        .path("/")
        .http_only(true)
        .secure(state.cookie_secure)
        .same_site(SameSite::Lax)
        .expires(session.expires_at)
        .build()
}

pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}
