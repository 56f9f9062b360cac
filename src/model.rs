//! Data models for the knowledge base
//!
//! Stored records (`Category`, `Article`, `SearchLog`, `SessionRecord`) are
//! serialized to JSON inside redb tables. The remaining types are request
//! payloads and response views exchanged with HTTP clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stats::rating_percentage;

/// A group of articles shown together in the public navigation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Category {
    pub id: u64,

    /// Display name, markup stripped, 1-100 characters, unique
    pub name: String,

    /// Optional short blurb, markup stripped, at most 500 characters
    #[serde(default)]
    pub description: String,

    /// Position in the navigation. Lower comes first; gaps are allowed.
    pub order: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A knowledge base article.
///
/// The three counters only ever grow. They are changed exclusively through
/// the increment operations of the repository, never through edits.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Article {
    pub id: u64,
    pub title: String,

    /// Rich text, already passed through the allow-list sanitizer
    pub content: String,

    pub category_id: u64,

    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub upvotes: u64,
    #[serde(default)]
    pub downvotes: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One submitted public search. Append-only.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SearchLog {
    pub id: u64,
    pub term: String,
    pub results_count: u64,
    pub created_at: DateTime<Utc>,
    pub ip_address: Option<String>,
}

/// Persisted admin session, keyed by its bearer token.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionRecord {
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Direction of a reader's vote on an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Up,
    Down,
}

impl std::str::FromStr for Vote {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Vote::Up),
            "down" => Ok(Vote::Down),
            other => Err(format!("Invalid vote '{other}', expected 'up' or 'down'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Body for creating or editing a category
///
/// ```json
/// { "name": "Getting Started", "description": "Basic guides" }
/// ```
#[derive(Deserialize, Debug, Clone, Default)]
pub struct CategoryInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Body for creating or editing an article
///
/// `category_id` is optional at the wire level so that a missing value is
/// reported as a validation error instead of a deserialization failure.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ArticleInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub category_id: Option<u64>,
}

/// Body for `POST /admin/categories/reorder`
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ReorderRequest {
    #[serde(default)]
    pub categories: Vec<u64>,
}

/// Body for `POST /api/articles/{id}/vote`
#[derive(Deserialize, Debug, Clone)]
pub struct VoteRequest {
    pub vote: String,
}

/// Query string for `GET /api/search`
///
/// Example: `?q=install&log=true`
#[derive(Deserialize, Debug, Clone, Default)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,

    /// Only submitted searches are logged; live-as-you-type queries leave this unset.
    #[serde(default)]
    pub log: bool,
}

/// Query string for `GET /admin/popular-searches`
#[derive(Deserialize, Debug, Clone, Default)]
pub struct PopularParams {
    pub limit: Option<usize>,
}

/// Body for `POST /admin/login`
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// ---------------------------------------------------------------------------
// Response views
// ---------------------------------------------------------------------------

/// Article as shown to clients, with derived fields filled in.
#[derive(Serialize, Debug, Clone)]
pub struct ArticleView {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub category_id: u64,
    pub category_name: String,
    pub views: u64,
    pub upvotes: u64,
    pub downvotes: u64,
    pub rating_percentage: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ArticleView {
    pub fn new(article: Article, category_name: impl Into<String>) -> Self {
        let rating_percentage = rating_percentage(article.upvotes, article.downvotes);
        Self {
            id: article.id,
            title: article.title,
            content: article.content,
            category_id: article.category_id,
            category_name: category_name.into(),
            views: article.views,
            upvotes: article.upvotes,
            downvotes: article.downvotes,
            rating_percentage,
            created_at: article.created_at,
            updated_at: article.updated_at,
        }
    }
}

/// Category page payload
#[derive(Serialize, Debug)]
pub struct CategoryPage {
    pub category: Category,
    pub articles: Vec<ArticleView>,
}

/// Landing page payload
#[derive(Serialize, Debug)]
pub struct HomePage {
    pub categories: Vec<Category>,
    pub recent_articles: Vec<ArticleView>,
}

/// Response returned after a successful login
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Response for a successful image upload, in the shape rich-text editors expect
#[derive(Serialize, Debug)]
pub struct UploadResponse {
    pub location: String,
}
