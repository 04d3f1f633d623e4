//! Public-facing web server.
//!
//! Thin HTTP surface over the extraction service and the download proxy:
//! - `GET /health`
//! - `GET /api/info?url=` returns VideoInfo with one signed token per format
//! - `GET /api/download?token=` verifies the token, then redirects or streams
//!
//! Runs on WEB_PORT (default 3000).

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::core::error::{AppError, AppResult};
use crate::delivery::grant::{DownloadGrant, GrantCodec};
use crate::delivery::proxy::{Delivery, DownloadProxy};
use crate::download::formats::CanonicalFormat;
use crate::download::service::ExtractionService;

/// Shared state for the web server.
#[derive(Clone)]
pub struct WebState {
    pub service: Arc<ExtractionService>,
    pub grants: Arc<dyn GrantCodec>,
    pub proxy: Arc<DownloadProxy>,
}

#[derive(Debug, Deserialize)]
struct InfoQuery {
    url: String,
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InfoResponse<'a> {
    title: &'a str,
    thumbnail: Option<&'a str>,
    duration: u64,
    formats: Vec<TokenizedFormat<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenizedFormat<'a> {
    #[serde(flatten)]
    format: &'a CanonicalFormat,
    token: String,
    download_url: String,
}

/// Build the application router.
pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        .route("/api/download", get(download_handler))
        .with_state(state)
}

/// Start the public web server.
pub async fn start_web_server(port: u16, state: WebState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(state);

    log::info!("Starting web server on http://{}", addr);
    log::info!("  /health              - Health check");
    log::info!("  /api/info?url=       - Extract formats (JSON)");
    log::info!("  /api/download?token= - Redirect or stream a format");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// GET /health — simple health check.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// GET /api/info?url=
async fn info_handler(State(state): State<WebState>, Query(query): Query<InfoQuery>) -> AppResult<Response> {
    let info = state.service.get_info(&query.url).await?;

    let mut formats = Vec::with_capacity(info.formats.len());
    for format in &info.formats {
        let token = state.grants.sign(&DownloadGrant {
            url: format.url.clone(),
            quality: format.quality.to_string(),
            format: format.format.clone(),
        })?;
        let download_url = format!("/api/download?token={token}");
        formats.push(TokenizedFormat {
            format,
            token,
            download_url,
        });
    }

    let body = InfoResponse {
        title: &info.title,
        thumbnail: info.thumbnail.as_deref(),
        duration: info.duration,
        formats,
    };
    Ok(Json(body).into_response())
}

/// GET /api/download?token=
async fn download_handler(
    State(state): State<WebState>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let grant = state.grants.verify(&query.token)?;
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());

    match state.proxy.serve(&grant, range).await? {
        Delivery::Redirect(target) => Ok((StatusCode::FOUND, [(header::LOCATION, target)]).into_response()),
        Delivery::Stream(stream) => {
            let status = StatusCode::from_u16(stream.status).unwrap_or(StatusCode::OK);
            let mut builder = Response::builder()
                .status(status)
                .header(header::CONTENT_TYPE, stream.content_type)
                .header(
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", stream.filename),
                )
                .header(header::ACCEPT_RANGES, "bytes");
            if let Some(length) = stream.content_length {
                builder = builder.header(header::CONTENT_LENGTH, length);
            }
            if let Some(range) = stream.content_range {
                builder = builder.header(header::CONTENT_RANGE, range);
            }
            builder
                .body(Body::from_stream(stream.body))
                .map_err(|e| AppError::UpstreamFetch(format!("invalid upstream headers: {e}")))
        }
    }
}
