//! Route definitions for the knowledge base API
//!
//! Public browsing and search live under `/api`, administration under
//! `/admin` behind the session middleware, and uploaded images are served
//! from `/uploads`.

use axum::routing::{get, post, put};
use axum::{middleware, Router};
use tower_http::services::ServeDir;

use crate::database::AppState;
use crate::handler::{
    admin_list_articles, admin_list_categories, article_detail, category_page, create_article,
    create_category, dashboard, dashboard_data, delete_article, delete_category, home,
    list_categories, login, logout, popular_searches, reorder_categories, search_articles,
    search_logs, search_report, update_article, update_category, upload_image, vote_article,
};
use crate::middleware::require_admin;
use crate::upload::UPLOAD_URL_PREFIX;

/// Creates and configures the Axum application router with all routes
///
/// # Route Definitions
///
/// Public:
/// - `GET /api/home`, `GET /api/categories`, `GET /api/categories/{id}`
/// - `GET /api/articles/{id}` (counts a view), `POST /api/articles/{id}/vote`
/// - `GET /api/search?q=&log=`
/// - `POST /admin/login`
///
/// Admin (requires `Authorization: Bearer <token>`):
/// - `POST /admin/logout`
/// - `GET /admin/dashboard`, `/admin/dashboard-data`, `/admin/search-report`,
///   `/admin/search-logs`, `/admin/popular-searches`
/// - `GET|POST /admin/categories`, `PUT|DELETE /admin/categories/{id}`,
///   `POST /admin/categories/reorder`
/// - `GET|POST /admin/articles`, `PUT|DELETE /admin/articles/{id}`
/// - `POST /admin/upload`
///
/// # Example Usage
///
/// ```no_run
/// # use knowledge_base::config::Config;
/// # use knowledge_base::database::{init_db, AppState};
/// # use knowledge_base::route::create_app;
/// # let db = init_db("kb.db").unwrap();
/// # let config = Config::from_env().unwrap();
/// let state = AppState::new(db, config);
/// let app = create_app(state);
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/home", get(home))
        .route("/categories", get(list_categories))
        .route("/categories/{id}", get(category_page))
        .route("/articles/{id}", get(article_detail))
        .route("/articles/{id}/vote", post(vote_article))
        .route("/search", get(search_articles));

    let admin_routes = Router::new()
        .route("/logout", post(logout))
        .route("/dashboard", get(dashboard))
        .route("/dashboard-data", get(dashboard_data))
        .route("/search-report", get(search_report))
        .route("/search-logs", get(search_logs))
        .route("/popular-searches", get(popular_searches))
        .route(
            "/categories",
            get(admin_list_categories).post(create_category),
        )
        .route("/categories/reorder", post(reorder_categories))
        .route(
            "/categories/{id}",
            put(update_category).delete(delete_category),
        )
        .route("/articles", get(admin_list_articles).post(create_article))
        .route("/articles/{id}", put(update_article).delete(delete_article))
        .route("/upload", post(upload_image))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin))
        // Login sits outside the session layer
        .route("/login", post(login));

    let uploads = ServeDir::new(state.upload_dir());

    Router::new()
        .nest("/api", public_routes)
        .nest("/admin", admin_routes)
        .nest_service(UPLOAD_URL_PREFIX, uploads)
        .with_state(state)
}
