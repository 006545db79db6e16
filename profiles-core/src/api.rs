//! Read-only HTTP query API over the catalog
//!
//! | Route | Catalog query |
//! |-------|---------------|
//! | `GET /profiles?name=q` | `search` (all entries without `name`) |
//! | `GET /profiles/:catalog/:profile` | `get` |
//! | `GET /profiles/:catalog/:profile/:version` | `get_with_version` |
//! | `GET /profiles/:catalog/:profile/:version/available_updates` | `greater_than_version` |

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::catalog::{Catalog, CatalogEntry};

/// Error body returned for every non-2xx response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        let body = ErrorResponse {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
struct SearchParams {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfilePath {
    catalog: String,
    profile: String,
}

#[derive(Debug, Deserialize)]
struct VersionPath {
    catalog: String,
    profile: String,
    version: String,
}

/// Build the query router for `catalog`
pub fn router(catalog: Arc<Catalog>) -> Router {
    Router::new()
        .route("/profiles", get(search_profiles))
        .route("/profiles/:catalog/:profile", get(get_profile))
        .route("/profiles/:catalog/:profile/:version", get(get_profile_version))
        .route(
            "/profiles/:catalog/:profile/:version/available_updates",
            get(available_updates),
        )
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(catalog)
}

fn require<'a>(name: &str, value: &'a str) -> Result<&'a str, ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("missing parameter '{name}'")));
    }
    Ok(value)
}

async fn search_profiles(
    State(catalog): State<Arc<Catalog>>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<CatalogEntry>> {
    let entries = match params.name.as_deref() {
        Some(query) => catalog.search(query).await,
        None => catalog.search_all().await,
    };
    Json(entries)
}

async fn get_profile(
    State(catalog): State<Arc<Catalog>>,
    Path(path): Path<ProfilePath>,
) -> ApiResult<CatalogEntry> {
    let source = require("catalog", &path.catalog)?;
    let name = require("profile", &path.profile)?;

    catalog
        .get(source, name)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("profile {name} not found in catalog {source}")))
}

async fn get_profile_version(
    State(catalog): State<Arc<Catalog>>,
    Path(path): Path<VersionPath>,
) -> ApiResult<CatalogEntry> {
    let source = require("catalog", &path.catalog)?;
    let name = require("profile", &path.profile)?;
    let version = require("version", &path.version)?;

    catalog
        .get_with_version(source, name, version)
        .await
        .map(Json)
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "profile {name} at version {version} not found in catalog {source}"
            ))
        })
}

async fn available_updates(
    State(catalog): State<Arc<Catalog>>,
    Path(path): Path<VersionPath>,
) -> ApiResult<Vec<CatalogEntry>> {
    let source = require("catalog", &path.catalog)?;
    let name = require("profile", &path.profile)?;
    let version = require("version", &path.version)?;

    let newer = catalog.greater_than_version(source, name, version).await;
    if newer.is_empty() {
        return Err(ApiError::NotFound(format!(
            "no updates available for profile {name} newer than {version} in catalog {source}"
        )));
    }
    Ok(Json(newer))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("not found".to_string())
}
