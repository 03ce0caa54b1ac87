// Copyright (c) 2022 Tomohide Takao
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

//! HTTP surface over the directory and the expiry evaluator.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::account::{fetch_account_info, fetch_account_summary, AccountInfo, AccountSummary};
use crate::directory::{AccessKey, Directory, User};
use crate::error::Result;
use crate::expired_keys::{fetch_expired_keys, KeyReport, ThresholdHours};

const BANNER: &str = "AWS Access Key expiration checker for IAM Users";

#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn Directory>,
    /// Maximum number of concurrent per-user key listings.
    pub concurrency: usize,
}

#[derive(Debug, Deserialize)]
pub struct KeyCheckQuery {
    pub hours: i64,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/account/summary", get(account_summary))
        .route("/account/info", get(account_info))
        .route("/key-check", get(key_check))
        .route("/user/:user_name", get(user))
        .route("/user/:user_name/access-keys", get(user_access_keys))
        // Paths of the first release.
        .route("/account_summary", get(account_summary))
        .route("/account_info", get(account_info))
        .route("/key_check", get(key_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    BANNER
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "Status": "healthy" }))
}

async fn account_summary(State(state): State<AppState>) -> Result<Json<AccountSummary>> {
    Ok(Json(fetch_account_summary(state.directory.as_ref()).await?))
}

async fn account_info(State(state): State<AppState>) -> Result<Json<AccountInfo>> {
    Ok(Json(fetch_account_info(state.directory.as_ref()).await?))
}

async fn key_check(
    State(state): State<AppState>,
    Query(query): Query<KeyCheckQuery>,
) -> Result<Json<Vec<KeyReport>>> {
    let threshold = ThresholdHours::new(query.hours)?;
    let reports =
        fetch_expired_keys(state.directory.as_ref(), threshold, state.concurrency).await?;
    Ok(Json(reports))
}

async fn user(
    State(state): State<AppState>,
    Path(user_name): Path<String>,
) -> Result<Json<User>> {
    Ok(Json(state.directory.get_user(&user_name).await?))
}

async fn user_access_keys(
    State(state): State<AppState>,
    Path(user_name): Path<String>,
) -> Result<Json<Vec<AccessKey>>> {
    Ok(Json(state.directory.list_access_keys(&user_name).await?))
}
