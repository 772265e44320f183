//! Reverse proxy to the upstream data service.
//!
//! Everything the router does not serve itself lands here once the gate has
//! let it through, carrying the canonical path the gate classified. Bodies
//! stream in both directions. The authenticated principal travels upstream in
//! `x-fieldgate-user` / `x-fieldgate-role`; client-supplied copies of those
//! headers are dropped.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Extension, Request},
    http::{
        header::{CONNECTION, HOST, TRANSFER_ENCODING},
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use reqwest::Client;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tracing::{error, instrument};
use url::Url;

use crate::{gateway::Principal, APP_USER_AGENT};

pub const USER_HEADER: &str = "x-fieldgate-user";
pub const ROLE_HEADER: &str = "x-fieldgate-role";

const HOP_BY_HOP: [&str; 6] = [
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "upgrade",
];

#[derive(Clone, Debug)]
pub struct Upstream {
    client: Client,
    base: Url,
}

impl Upstream {
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base).with_context(|| format!("invalid upstream URL: {base}"))?;
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client, base })
    }

    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn target(&self, path_and_query: &str) -> Url {
        let mut url = self.base.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        let (path, query) = path_and_query
            .split_once('?')
            .map_or((path_and_query, None), |(path, query)| (path, Some(query)));
        url.set_path(&format!("{base_path}{path}"));
        url.set_query(query);
        url
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    *name == CONNECTION
        || *name == TRANSFER_ENCODING
        || HOP_BY_HOP.contains(&name.as_str())
}

fn upstream_headers(incoming: &HeaderMap, principal: Option<&Principal>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in incoming {
        if is_hop_by_hop(name)
            || *name == HOST
            || name.as_str() == USER_HEADER
            || name.as_str() == ROLE_HEADER
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    if let Some(principal) = principal {
        if let Ok(value) = HeaderValue::from_str(&principal.username) {
            headers.insert(USER_HEADER, value);
        }
        if let Some(role) = principal.role {
            headers.insert(ROLE_HEADER, HeaderValue::from_static(role.as_str()));
        }
    }
    headers
}

async fn relay(upstream: &Upstream, principal: Option<&Principal>, request: Request) -> Result<Response> {
    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path(), |pq| pq.as_str());
    let url = upstream.target(path_and_query);

    let reply = upstream
        .client
        .request(parts.method, url)
        .headers(upstream_headers(&parts.headers, principal))
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await
        .context("upstream request failed")?;

    let status = reply.status();
    let mut headers = HeaderMap::new();
    for (name, value) in reply.headers() {
        if !is_hop_by_hop(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    let mut response = Body::from_stream(reply.bytes_stream()).into_response();
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn forward(
    Extension(upstream): Extension<Option<Arc<Upstream>>>,
    principal: Option<Extension<Principal>>,
    request: Request,
) -> Response {
    let Some(upstream) = upstream else {
        return (StatusCode::NOT_FOUND, Json(json!({ "message": "not found" }))).into_response();
    };
    let principal = principal.map(|Extension(principal)| principal);
    match relay(&upstream, principal.as_ref(), request).await {
        Ok(response) => response,
        Err(err) => {
            error!("{err:#}");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "message": "upstream unavailable" })),
            )
                .into_response()
        }
    }
}
