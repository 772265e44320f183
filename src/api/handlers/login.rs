//! First-party login, logout and session introspection.

use axum::{
    body::Bytes,
    extract::Extension,
    http::{
        header::{CONTENT_TYPE, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;

use crate::gateway::{
    authenticator::{AuthOutcome, RequestTarget},
    gate::unavailable,
    session::{clear_session_cookie, extract_session_id},
    strategy::{local, Credentials},
    Gateway, PrincipalView,
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    user: PrincipalView,
    message: String,
    auth: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LogoutResponse {
    message: String,
    auth: String,
}

#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginRequest, content_type = "application/json"),
    responses(
        (status = 200, description = "Authenticated, session cookie set", body = LoginResponse),
        (status = 400, description = "Missing username or password"),
        (status = 401, description = "Wrong username or password"),
        (status = 503, description = "Credential store unavailable"),
    ),
    tag = "auth",
)]
#[instrument(skip_all)]
pub async fn login(
    Extension(gateway): Extension<Arc<Gateway>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok());
    let Some(claim) = local::parse_body(content_type, &body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Missing username or password." })),
        )
            .into_response();
    };

    let credentials = Credentials::default().with_form(Some(claim));
    let target = RequestTarget {
        method: "POST",
        uri: "/login",
    };
    match gateway
        .authenticator()
        .authenticate(None, &credentials, target)
        .await
    {
        Ok(AuthOutcome::Established {
            principal, session, ..
        }) => {
            info!(principal = %principal.username, "login succeeded");
            let mut response = Json(LoginResponse {
                user: principal.public_view(),
                message: "Authenticated".to_string(),
                auth: "1".to_string(),
            })
            .into_response();
            gateway.attach_session(&mut response, &session);
            response
        }
        Ok(_) => {
            info!("login rejected");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "Wrong username or password." })),
            )
                .into_response()
        }
        Err(err) => unavailable(&err),
    }
}

#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 200, description = "Session destroyed", body = LogoutResponse),
    ),
    tag = "auth",
)]
pub async fn logout(Extension(gateway): Extension<Arc<Gateway>>, headers: HeaderMap) -> Response {
    if let Some(id) = extract_session_id(&headers) {
        if let Err(err) = gateway.sessions().destroy(&id).await {
            return unavailable(&err);
        }
    }

    let mut response = Json(LogoutResponse {
        message: "Logged Out".to_string(),
        auth: "0".to_string(),
    })
    .into_response();
    match clear_session_cookie(gateway.config().session_cookie_secure()) {
        Ok(cookie) => {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
        Err(err) => error!("failed to build session cookie: {err}"),
    }
    response
}

#[utoipa::path(
    get,
    path = "/current-user",
    responses(
        (status = 200, description = "Principal bound to the session", body = PrincipalView),
        (status = 401, description = "No live session"),
    ),
    tag = "auth",
)]
pub async fn current_user(
    Extension(gateway): Extension<Arc<Gateway>>,
    headers: HeaderMap,
) -> Response {
    let principal = match extract_session_id(&headers) {
        Some(id) => match gateway.sessions().deserialize(&id).await {
            Ok(principal) => principal,
            Err(err) => return unavailable(&err),
        },
        None => None,
    };

    match principal {
        Some(principal) => Json(principal.public_view()).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "User not authenticated" })),
        )
            .into_response(),
    }
}
