//! Database initialization, table definitions and the transactional wrapper
//!
//! This module sets up the embedded redb database and exposes [`Db`], whose
//! [`Db::transact`] method is the single place where mutations begin, commit
//! or roll back.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use redb::{Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::model::Category;

/// Categories keyed by id
///
/// Value: JSON-serialized `Category`
pub const TABLE_CATEGORIES: TableDefinition<u64, &str> = TableDefinition::new("categories_v1");

/// Articles keyed by id
///
/// Value: JSON-serialized `Article`
pub const TABLE_ARTICLES: TableDefinition<u64, &str> = TableDefinition::new("articles_v1");

/// Secondary index of articles per category
///
/// Key: `(category_id, article_id)`. A range scan over one category id
/// answers "does this category own articles" without touching the article
/// bodies.
pub const TABLE_CATEGORY_ARTICLES: TableDefinition<(u64, u64), ()> =
    TableDefinition::new("category_articles_v1");

/// Search logs keyed by id. Ids grow with insertion time.
///
/// Value: JSON-serialized `SearchLog`
pub const TABLE_SEARCH_LOGS: TableDefinition<u64, &str> = TableDefinition::new("search_logs_v1");

/// Admin sessions keyed by bearer token
///
/// Value: JSON-serialized `SessionRecord`
pub const TABLE_SESSIONS: TableDefinition<&str, &str> = TableDefinition::new("sessions_v1");

/// Names and descriptions seeded into an empty database.
const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("Getting Started", "Introduction and basic concepts"),
    ("User Guide", "Detailed user documentation"),
    ("API Reference", "API documentation and examples"),
    ("Tutorials", "Step-by-step tutorials and guides"),
    ("FAQs", "Frequently asked questions"),
];

/// Handle to the embedded database.
///
/// Cheap to clone; all clones share the same underlying file.
#[derive(Clone)]
pub struct Db {
    inner: Arc<Database>,
}

impl Db {
    pub fn new(db: Database) -> Self {
        Self { inner: Arc::new(db) }
    }

    /// Opens a read-only snapshot.
    pub fn read(&self) -> AppResult<ReadTransaction> {
        Ok(self.inner.begin_read()?)
    }

    /// Runs `work` inside a single write transaction.
    ///
    /// The transaction commits only when `work` returns `Ok`. On any error,
    /// whether raised by validation inside `work` or by the storage engine,
    /// the transaction is aborted and none of its writes become visible.
    /// redb allows one writer at a time, so everything done inside `work`
    /// (including read-then-increment of a counter) is atomic with respect
    /// to other writers.
    pub fn transact<T, F>(&self, work: F) -> AppResult<T>
    where
        F: FnOnce(&WriteTransaction) -> AppResult<T>,
    {
        let txn = self.inner.begin_write()?;
        match work(&txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                if err.is_client_error() {
                    tracing::debug!(error = %err, "transaction rejected");
                } else {
                    tracing::error!(error = %err, "transaction failed, rolling back");
                }
                if let Err(abort_err) = txn.abort() {
                    tracing::error!(error = %abort_err, "failed to abort transaction");
                }
                Err(err)
            }
        }
    }
}

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        Self {
            db: Db::new(db),
            config: Arc::new(config),
        }
    }

    pub fn upload_dir(&self) -> &PathBuf {
        &self.config.upload_dir
    }
}

/// Initializes the embedded database and creates required tables
///
/// # Arguments
///
/// * `db_path` - File path where the database should be stored (e.g., "kb.db")
///
/// # Example
///
/// ```no_run
/// # use knowledge_base::database::init_db;
/// let db = init_db("kb.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database, AppError> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_CATEGORIES)?;
        write_txn.open_table(TABLE_ARTICLES)?;
        write_txn.open_table(TABLE_CATEGORY_ARTICLES)?;
        write_txn.open_table(TABLE_SEARCH_LOGS)?;
        write_txn.open_table(TABLE_SESSIONS)?;
    }
    write_txn.commit()?;

    Ok(db)
}

/// Inserts the default categories when the categories table is empty.
///
/// Returns the number of categories created.
pub fn seed_default_categories(db: &Db) -> AppResult<usize> {
    db.transact(|txn| {
        let mut table = txn.open_table(TABLE_CATEGORIES)?;
        if table.first()?.is_some() {
            return Ok(0);
        }

        let now = Utc::now();
        for (index, (name, description)) in DEFAULT_CATEGORIES.iter().enumerate() {
            let id = index as u64 + 1;
            let category = Category {
                id,
                name: name.to_string(),
                description: description.to_string(),
                order: id as i64,
                created_at: now,
                updated_at: now,
            };
            let json = serde_json::to_string(&category)?;
            table.insert(id, json.as_str())?;
        }
        Ok(DEFAULT_CATEGORIES.len())
    })
}

/// Returns the id following the largest key of `table` (1 for an empty table).
pub(crate) fn next_id<T>(table: &T) -> AppResult<u64>
where
    T: ReadableTable<u64, &'static str>,
{
    Ok(table.last()?.map(|(key, _)| key.value() + 1).unwrap_or(1))
}
