//! Permission gate.
//!
//! Runs before every downstream handler: classify the path, authenticate when
//! the zone asks for it, check the role, then forward or answer forbidden.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{
        header::{CONTENT_TYPE, SET_COOKIE, WWW_AUTHENTICATE},
        uri::PathAndQuery,
        HeaderValue, StatusCode, Uri,
    },
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;
use std::{fmt, sync::Arc};
use tracing::{debug, error, info, instrument, warn};

use super::{
    authenticator::{AuthOutcome, Authenticator, RequestTarget},
    config::GatewayConfig,
    error::AuthError,
    principal::Principal,
    session::{extract_session_id, session_cookie, SessionId, SessionManager, SessionStore},
    store::{BoundedStore, CredentialStore},
    strategy::{basic, digest, local, Credentials},
    zone::{canonical_path, encode_path, Requirement, ZoneTable},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForbiddenReason {
    /// No strategy accepted the request's credentials.
    CredentialsRejected,
    /// Authenticated, but the role is not allowed in this zone.
    RoleDenied,
}

impl fmt::Display for ForbiddenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CredentialsRejected => f.write_str("credentials_rejected"),
            Self::RoleDenied => f.write_str("role_denied"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    Forward {
        principal: Option<Principal>,
        established: Option<SessionId>,
    },
    /// `established` is set when a strategy succeeded but the role check did
    /// not; the session stays valid for other zones.
    Forbidden {
        reason: ForbiddenReason,
        established: Option<SessionId>,
    },
}

/// One request as the gate sees it.
pub struct AccessRequest<'a> {
    pub path: &'a str,
    pub method: &'a str,
    /// Path and query, the value a digest response is bound to.
    pub uri: &'a str,
    pub session: Option<&'a SessionId>,
    pub credentials: &'a Credentials,
}

/// Whether an authenticated principal satisfies the requirement.
#[must_use]
pub fn authorize(requirement: &Requirement, principal: &Principal) -> bool {
    match requirement {
        Requirement::Public | Requirement::Authenticated => true,
        Requirement::RequiresRole(roles) => principal.role.is_some_and(|role| roles.contains(&role)),
    }
}

pub struct Gateway {
    config: GatewayConfig,
    zones: ZoneTable,
    sessions: SessionManager,
    authenticator: Authenticator,
}

impl Gateway {
    /// Wire the gateway; every credential lookup is bounded by the
    /// configured store timeout.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        zones: ZoneTable,
    ) -> Self {
        let store: Arc<dyn CredentialStore> =
            Arc::new(BoundedStore::new(store, config.store_timeout()));
        let sessions = SessionManager::new(sessions, store.clone());
        let authenticator = Authenticator::new(store, sessions.clone(), &config);
        Self {
            config,
            zones,
            sessions,
            authenticator,
        }
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    #[must_use]
    pub fn zones(&self) -> &ZoneTable {
        &self.zones
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    #[must_use]
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Decide whether the request may reach the downstream handler.
    ///
    /// # Errors
    /// Returns an error if the credential store or the session store fails.
    #[instrument(skip_all, fields(path = access.path))]
    pub async fn evaluate(&self, access: &AccessRequest<'_>) -> Result<Decision, AuthError> {
        let requirement = self.zones.classify(access.path);
        if *requirement == Requirement::Public {
            return Ok(Decision::Forward {
                principal: None,
                established: None,
            });
        }

        let resolved = match access.session {
            Some(id) => self.sessions.deserialize(id).await?,
            None => None,
        };
        let target = RequestTarget {
            method: access.method,
            uri: access.uri,
        };
        let outcome = self
            .authenticator
            .authenticate(resolved, access.credentials, target)
            .await?;

        let (principal, established) = match outcome {
            AuthOutcome::Resumed(principal) => (principal, None),
            AuthOutcome::Established {
                principal, session, ..
            } => (principal, Some(session)),
            AuthOutcome::AllFailed(attempt) => {
                info!(
                    zone = %requirement,
                    reason = %ForbiddenReason::CredentialsRejected,
                    presented = !attempt.nothing_presented(),
                    "access forbidden"
                );
                return Ok(Decision::Forbidden {
                    reason: ForbiddenReason::CredentialsRejected,
                    established: None,
                });
            }
        };

        if !authorize(requirement, &principal) {
            info!(
                zone = %requirement,
                principal = %principal.username,
                role = ?principal.role,
                reason = %ForbiddenReason::RoleDenied,
                "access forbidden"
            );
            return Ok(Decision::Forbidden {
                reason: ForbiddenReason::RoleDenied,
                established,
            });
        }

        debug!(zone = %requirement, principal = %principal.username, "access granted");
        Ok(Decision::Forward {
            principal: Some(principal),
            established,
        })
    }

    /// Append the session cookie for a freshly established session.
    pub fn attach_session(&self, response: &mut Response, id: &SessionId) {
        match session_cookie(
            id,
            self.config.session_ttl_seconds(),
            self.config.session_cookie_secure(),
        ) {
            Ok(cookie) => {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            Err(err) => error!("failed to build session cookie: {err}"),
        }
    }

    fn forbidden(&self, reason: ForbiddenReason) -> Response {
        let body = Json(json!({ "message": "access forbidden", "reason": reason }));
        match reason {
            ForbiddenReason::RoleDenied => (StatusCode::FORBIDDEN, body).into_response(),
            ForbiddenReason::CredentialsRejected => {
                let mut response = (StatusCode::UNAUTHORIZED, body).into_response();
                let challenges = [
                    basic::challenge(self.authenticator.realm()),
                    digest::challenge(self.authenticator.realm(), self.authenticator.opaque()),
                ];
                for challenge in challenges {
                    if let Ok(value) = HeaderValue::from_str(&challenge) {
                        response.headers_mut().append(WWW_AUTHENTICATE, value);
                    }
                }
                response
            }
        }
    }
}

/// Response for a failing backing store.
#[must_use]
pub fn unavailable(err: &AuthError) -> Response {
    error!("{err}");
    let message = match err {
        AuthError::StoreUnavailable(_) => "credential store unavailable",
        AuthError::SessionStoreUnavailable(_) => "session store unavailable",
    };
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "message": message })),
    )
        .into_response()
}

/// The request URI with its path replaced by the canonical, re-encoded form.
fn canonical_uri(uri: &Uri) -> Option<Uri> {
    let path = encode_path(&canonical_path(uri.path())?);
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}

/// axum middleware enforcing the zone table.
///
/// The request continues with its canonical path, the one the zone table
/// classified.
pub async fn enforce(
    State(gateway): State<Arc<Gateway>>,
    mut request: Request,
    next: Next,
) -> Response {
    // Digest responses are bound to the URI exactly as the client sent it.
    let raw_uri = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path().to_string(), |pq| pq.as_str().to_string());
    let Some(canonical) = canonical_uri(request.uri()) else {
        warn!(path = %request.uri().path(), "request path does not decode");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "invalid request path" })),
        )
            .into_response();
    };
    *request.uri_mut() = canonical;

    let path = request.uri().path().to_string();
    if *gateway.zones().classify(&path) == Requirement::Public {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let mut credentials = Credentials::from_headers(&parts.headers);
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    // Only bodies that can carry form credentials are buffered.
    let body = if local::accepts_content_type(content_type.as_deref()) {
        let Ok(bytes) = to_bytes(body, gateway.config().max_form_bytes()).await else {
            warn!(path = %path, "request body exceeds form limit");
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "message": "request body too large" })),
            )
                .into_response();
        };
        credentials = credentials.with_form(local::parse_body(content_type.as_deref(), &bytes));
        Body::from(bytes)
    } else {
        body
    };

    let session = extract_session_id(&parts.headers);
    let method = parts.method.as_str().to_string();
    let access = AccessRequest {
        path: &path,
        method: &method,
        uri: &raw_uri,
        session: session.as_ref(),
        credentials: &credentials,
    };

    match gateway.evaluate(&access).await {
        Ok(Decision::Forward {
            principal,
            established,
        }) => {
            if let Some(principal) = principal {
                parts.extensions.insert(principal);
            }
            let mut response = next.run(Request::from_parts(parts, body)).await;
            if let Some(id) = established {
                gateway.attach_session(&mut response, &id);
            }
            response
        }
        Ok(Decision::Forbidden {
            reason,
            established,
        }) => {
            let mut response = gateway.forbidden(reason);
            if let Some(id) = established {
                gateway.attach_session(&mut response, &id);
            }
            response
        }
        Err(err) => unavailable(&err),
    }
}
