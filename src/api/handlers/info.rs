use axum::response::{IntoResponse, Json, Redirect};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const PAGES_PATH: &str = "/omk/pages";

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Info {
    name: String,
    description: String,
    status: u16,
    service: String,
    version: String,
}

#[utoipa::path(
    get,
    path = "/omk/info",
    responses(
        (status = 200, description = "Service information", body = Info)
    ),
    tag = "info",
)]
pub async fn info() -> impl IntoResponse {
    Json(Info {
        name: env!("CARGO_PKG_NAME").to_string(),
        description: env!("CARGO_PKG_DESCRIPTION").to_string(),
        status: 200,
        service: "omk-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// `/` and `/omk` land on the pages app.
pub async fn pages() -> Redirect {
    Redirect::to(PAGES_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::{
        body::{to_bytes, Body},
        http::{header::LOCATION, Request, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn info_reports_service() -> Result<()> {
        let app = Router::new().route("/omk/info", get(info));
        let response = app
            .oneshot(Request::builder().uri("/omk/info").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let info: Info = serde_json::from_slice(&body)?;
        assert_eq!(info.status, 200);
        assert_eq!(info.service, "omk-server");
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        Ok(())
    }

    #[tokio::test]
    async fn root_redirects_to_pages() -> Result<()> {
        let app = Router::new().route("/", get(pages));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).and_then(|v| v.to_str().ok()),
            Some(PAGES_PATH)
        );
        Ok(())
    }
}
