//! HTTP request handlers for the knowledge base API
//!
//! Handlers are thin: they extract parameters, call into the repository,
//! search and stats modules, and wrap the result in JSON. Administrative
//! handlers receive the [`AdminSession`] injected by
//! [`crate::middleware::require_admin`] and pass it on.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;

use crate::auth::{self, AdminSession};
use crate::database::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::{ClientIp, SessionToken};
use crate::model::{
    ArticleInput, ArticleView, Category, CategoryInput, CategoryPage, HomePage, LoginRequest,
    LoginResponse, PopularParams, ReorderRequest, SearchParams, UploadResponse, Vote,
    VoteRequest,
};
use crate::search::MAX_RESULTS;
use crate::stats::{DashboardStats, PopularSearch, SearchReport};
use crate::upload::save_image;
use crate::{repository, search, stats};

// ---------------------------------------------------------------------------
// Public
// ---------------------------------------------------------------------------

/// `GET /api/home` - categories in display order and the latest articles
pub async fn home(State(state): State<AppState>) -> AppResult<Json<HomePage>> {
    Ok(Json(repository::home(&state.db)?))
}

/// `GET /api/categories`
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(repository::list_categories(&state.db)?))
}

/// `GET /api/categories/{id}`
pub async fn category_page(
    Path(id): Path<u64>,
    State(state): State<AppState>,
) -> AppResult<Json<CategoryPage>> {
    Ok(Json(repository::category_page(&state.db, id)?))
}

/// `GET /api/articles/{id}`
///
/// Every call counts as one view. The incremented counter is persisted
/// before the response is built.
pub async fn article_detail(
    Path(id): Path<u64>,
    State(state): State<AppState>,
) -> AppResult<Json<ArticleView>> {
    Ok(Json(repository::view_article(&state.db, id)?))
}

/// `POST /api/articles/{id}/vote`
///
/// # Request Body
///
/// ```json
/// { "vote": "up" }
/// ```
///
/// # Response
///
/// - **200 OK** - the article with updated counters and rating
/// - **400 Bad Request** - vote is neither `up` nor `down`
/// - **404 Not Found** - unknown article
pub async fn vote_article(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Json(payload): Json<VoteRequest>,
) -> AppResult<Json<ArticleView>> {
    let vote: Vote = payload.vote.parse().map_err(AppError::Validation)?;
    Ok(Json(repository::vote(&state.db, id, vote)?))
}

/// `GET /api/search?q=...&log=true`
///
/// Live-as-you-type queries omit `log`; a submitted search sets it and is
/// recorded in the search log together with the client address.
pub async fn search_articles(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Query(params): Query<SearchParams>,
) -> AppResult<impl IntoResponse> {
    let outcome = search::search(&state.db, &params.q, params.log, ip.as_deref())?;
    Ok(Json(json!({
        "query": outcome.query,
        "total_matches": outcome.total_matches,
        "limit": MAX_RESULTS,
        "results": outcome.results,
    })))
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// `POST /admin/login`
///
/// - **200 OK** - `{ "token": "...", "expires_at": "..." }`
/// - **401 Unauthorized** - wrong username or password
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let response = auth::login(&state.db, &state.config, &payload.username, &payload.password)?;
    Ok(Json(response))
}

/// `POST /admin/logout`
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    Extension(SessionToken(token)): Extension<SessionToken>,
) -> AppResult<impl IntoResponse> {
    auth::logout(&state.db, &session, &token)?;
    Ok(Json(json!({ "message": "Logged out" })))
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// `GET /admin/dashboard`
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
) -> AppResult<Json<DashboardStats>> {
    Ok(Json(stats::dashboard(&state.db, &session)?))
}

/// `GET /admin/dashboard-data` - just the search outcome split, for the chart
pub async fn dashboard_data(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
) -> AppResult<impl IntoResponse> {
    let metrics = stats::search_metrics(&state.db, &session)?;
    Ok(Json(json!({ "search_metrics": metrics })))
}

/// `GET /admin/search-report`
pub async fn search_report(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
) -> AppResult<Json<SearchReport>> {
    Ok(Json(stats::search_report(&state.db, &session)?))
}

/// `GET /admin/search-logs`
pub async fn search_logs(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
) -> AppResult<impl IntoResponse> {
    let logs = stats::export_search_logs(&state.db, &session)?;
    Ok(Json(logs))
}

/// `GET /admin/popular-searches?limit=10`
pub async fn popular_searches(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    Query(params): Query<PopularParams>,
) -> AppResult<Json<Vec<PopularSearch>>> {
    Ok(Json(stats::popular_searches(
        &state.db,
        &session,
        params.limit,
    )?))
}

// ---------------------------------------------------------------------------
// Category administration
// ---------------------------------------------------------------------------

/// `GET /admin/categories`
pub async fn admin_list_categories(
    State(state): State<AppState>,
    Extension(_session): Extension<AdminSession>,
) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(repository::list_categories(&state.db)?))
}

/// `POST /admin/categories`
///
/// - **201 Created** - the stored category
/// - **400 Bad Request** - name missing or too long, description too long
/// - **409 Conflict** - a category with that name exists
pub async fn create_category(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    Json(payload): Json<CategoryInput>,
) -> AppResult<impl IntoResponse> {
    let category = repository::create_category(&state.db, &session, &payload)?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// `PUT /admin/categories/{id}`
pub async fn update_category(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    Json(payload): Json<CategoryInput>,
) -> AppResult<Json<Category>> {
    Ok(Json(repository::update_category(
        &state.db, &session, id, &payload,
    )?))
}

/// `DELETE /admin/categories/{id}`
///
/// - **200 OK** - deleted
/// - **404 Not Found** - unknown category
/// - **409 Conflict** - the category still owns articles
pub async fn delete_category(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
) -> AppResult<impl IntoResponse> {
    repository::delete_category(&state.db, &session, id)?;
    Ok(Json(json!({
        "message": "Category deleted successfully",
        "deleted_id": id
    })))
}

/// `POST /admin/categories/reorder`
///
/// ```json
/// { "categories": [3, 1, 2] }
/// ```
pub async fn reorder_categories(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    Json(payload): Json<ReorderRequest>,
) -> AppResult<impl IntoResponse> {
    let updated = repository::reorder_categories(&state.db, &session, &payload.categories)?;
    Ok(Json(json!({
        "message": "Categories reordered successfully",
        "updated": updated
    })))
}

// ---------------------------------------------------------------------------
// Article administration
// ---------------------------------------------------------------------------

/// `GET /admin/articles`
pub async fn admin_list_articles(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
) -> AppResult<Json<Vec<ArticleView>>> {
    Ok(Json(repository::list_articles(&state.db, &session)?))
}

/// `POST /admin/articles`
///
/// Content is cleaned against the rich-text allow-list before it is stored.
pub async fn create_article(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    Json(payload): Json<ArticleInput>,
) -> AppResult<impl IntoResponse> {
    let article = repository::create_article(&state.db, &session, &payload)?;
    Ok((StatusCode::CREATED, Json(article)))
}

/// `PUT /admin/articles/{id}`
pub async fn update_article(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    Json(payload): Json<ArticleInput>,
) -> AppResult<Json<ArticleView>> {
    Ok(Json(repository::update_article(
        &state.db, &session, id, &payload,
    )?))
}

/// `DELETE /admin/articles/{id}`
pub async fn delete_article(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
) -> AppResult<impl IntoResponse> {
    repository::delete_article(&state.db, &session, id)?;
    Ok(Json(json!({
        "message": "Article deleted successfully",
        "deleted_id": id
    })))
}

/// `POST /admin/upload`
///
/// Accepts a multipart form with a single `file` field holding an image.
/// Responds with `{ "location": "/uploads/<name>" }`.
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;

        let location = save_image(state.upload_dir(), &filename, &data).await?;
        tracing::debug!(admin = session.username(), %location, "upload stored");
        return Ok(Json(UploadResponse { location }));
    }

    Err(AppError::Validation("No file provided".into()))
}
