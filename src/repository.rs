//! Category and article operations
//!
//! Public reads take only the database handle. Every administrative
//! mutation additionally requires an [`AdminSession`] and runs through
//! [`Db::transact`], so validation failures and storage errors leave the
//! database untouched.

use std::collections::HashMap;

use chrono::Utc;
use redb::{ReadableTable, Table, WriteTransaction};

use crate::auth::AdminSession;
use crate::database::{
    next_id, Db, TABLE_ARTICLES, TABLE_CATEGORIES, TABLE_CATEGORY_ARTICLES,
};
use crate::error::{AppError, AppResult};
use crate::model::{
    Article, ArticleInput, ArticleView, Category, CategoryInput, CategoryPage, HomePage, Vote,
};
use crate::sanitize::{clean_rich_text, strip_markup};

pub const MAX_CATEGORY_NAME: usize = 100;
pub const MAX_CATEGORY_DESCRIPTION: usize = 500;
pub const MAX_ARTICLE_TITLE: usize = 200;
const RECENT_ARTICLES: usize = 5;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validated, sanitized category fields ready to be stored.
struct CategoryFields {
    name: String,
    description: String,
}

fn validate_category(input: &CategoryInput) -> AppResult<CategoryFields> {
    let name = input.name.trim();
    let description = input.description.trim();

    if name.is_empty() {
        return Err(AppError::Validation("Category name is required".into()));
    }
    if name.chars().count() > MAX_CATEGORY_NAME {
        return Err(AppError::Validation(format!(
            "Category name must be at most {MAX_CATEGORY_NAME} characters"
        )));
    }
    if description.chars().count() > MAX_CATEGORY_DESCRIPTION {
        return Err(AppError::Validation(format!(
            "Description must be at most {MAX_CATEGORY_DESCRIPTION} characters"
        )));
    }

    let name = strip_markup(name).trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("Category name is required".into()));
    }

    Ok(CategoryFields {
        name,
        description: strip_markup(description).trim().to_string(),
    })
}

struct ArticleFields {
    title: String,
    content: String,
    category_id: u64,
}

fn validate_article(input: &ArticleInput) -> AppResult<ArticleFields> {
    let title = input.title.trim();
    let content = input.content.trim();

    let category_id = match input.category_id {
        Some(id) if !title.is_empty() && !content.is_empty() => id,
        _ => {
            return Err(AppError::Validation(
                "Title, content, and category are required".into(),
            ))
        }
    };
    if title.chars().count() > MAX_ARTICLE_TITLE {
        return Err(AppError::Validation(format!(
            "Title must be at most {MAX_ARTICLE_TITLE} characters"
        )));
    }

    let title = strip_markup(title).trim().to_string();
    let content = clean_rich_text(content).trim().to_string();
    if title.is_empty() || content.is_empty() {
        return Err(AppError::Validation(
            "Title and content must not be empty after sanitization".into(),
        ));
    }

    Ok(ArticleFields {
        title,
        content,
        category_id,
    })
}

// ---------------------------------------------------------------------------
// Table helpers
// ---------------------------------------------------------------------------

fn load_category<T>(table: &T, id: u64) -> AppResult<Option<Category>>
where
    T: ReadableTable<u64, &'static str>,
{
    match table.get(id)? {
        Some(guard) => Ok(Some(serde_json::from_str(guard.value())?)),
        None => Ok(None),
    }
}

fn load_article<T>(table: &T, id: u64) -> AppResult<Option<Article>>
where
    T: ReadableTable<u64, &'static str>,
{
    match table.get(id)? {
        Some(guard) => Ok(Some(serde_json::from_str(guard.value())?)),
        None => Ok(None),
    }
}

fn all_categories<T>(table: &T) -> AppResult<Vec<Category>>
where
    T: ReadableTable<u64, &'static str>,
{
    let mut categories = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        categories.push(serde_json::from_str::<Category>(value.value())?);
    }
    Ok(categories)
}

pub(crate) fn all_articles<T>(table: &T) -> AppResult<Vec<Article>>
where
    T: ReadableTable<u64, &'static str>,
{
    let mut articles = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        articles.push(serde_json::from_str::<Article>(value.value())?);
    }
    Ok(articles)
}

fn store_json<S: serde::Serialize>(
    table: &mut Table<'_, u64, &'static str>,
    id: u64,
    record: &S,
) -> AppResult<()> {
    let json = serde_json::to_string(record)?;
    table.insert(id, json.as_str())?;
    Ok(())
}

fn sort_categories(categories: &mut [Category]) {
    categories.sort_by(|a, b| a.order.cmp(&b.order).then(a.id.cmp(&b.id)));
}

/// Newest first, id as the tie-breaker so equal timestamps stay stable.
pub(crate) fn sort_newest_first(articles: &mut [Article]) {
    articles.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

/// Maps category ids to their names for building [`ArticleView`]s.
pub(crate) fn category_names<T>(table: &T) -> AppResult<HashMap<u64, String>>
where
    T: ReadableTable<u64, &'static str>,
{
    Ok(all_categories(table)?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect())
}

pub(crate) fn to_views(articles: Vec<Article>, names: &HashMap<u64, String>) -> Vec<ArticleView> {
    articles
        .into_iter()
        .map(|a| {
            let name = names.get(&a.category_id).cloned().unwrap_or_default();
            ArticleView::new(a, name)
        })
        .collect()
}

fn category_has_articles(txn: &WriteTransaction, category_id: u64) -> AppResult<bool> {
    let index = txn.open_table(TABLE_CATEGORY_ARTICLES)?;
    let mut range = index.range((category_id, 0)..=(category_id, u64::MAX))?;
    let has_any = range.next().transpose()?.is_some();
    Ok(has_any)
}

fn name_taken<T>(table: &T, name: &str, except: Option<u64>) -> AppResult<bool>
where
    T: ReadableTable<u64, &'static str>,
{
    Ok(all_categories(table)?
        .iter()
        .any(|c| Some(c.id) != except && c.name == name))
}

// ---------------------------------------------------------------------------
// Public reads
// ---------------------------------------------------------------------------

/// All categories in display order.
pub fn list_categories(db: &Db) -> AppResult<Vec<Category>> {
    let txn = db.read()?;
    let table = txn.open_table(TABLE_CATEGORIES)?;
    let mut categories = all_categories(&table)?;
    sort_categories(&mut categories);
    Ok(categories)
}

/// Categories in display order plus the most recent articles.
pub fn home(db: &Db) -> AppResult<HomePage> {
    let txn = db.read()?;
    let categories_table = txn.open_table(TABLE_CATEGORIES)?;
    let articles_table = txn.open_table(TABLE_ARTICLES)?;

    let mut categories = all_categories(&categories_table)?;
    sort_categories(&mut categories);
    let names: HashMap<u64, String> = categories.iter().map(|c| (c.id, c.name.clone())).collect();

    let mut articles = all_articles(&articles_table)?;
    sort_newest_first(&mut articles);
    articles.truncate(RECENT_ARTICLES);

    Ok(HomePage {
        categories,
        recent_articles: to_views(articles, &names),
    })
}

/// A category together with its articles, newest first.
pub fn category_page(db: &Db, id: u64) -> AppResult<CategoryPage> {
    let txn = db.read()?;
    let categories_table = txn.open_table(TABLE_CATEGORIES)?;
    let articles_table = txn.open_table(TABLE_ARTICLES)?;
    let index = txn.open_table(TABLE_CATEGORY_ARTICLES)?;

    let category = load_category(&categories_table, id)?.ok_or(AppError::NotFound {
        entity: "Category",
        id,
    })?;

    let mut articles = Vec::new();
    for entry in index.range((id, 0)..=(id, u64::MAX))? {
        let (key, _) = entry?;
        let (_, article_id) = key.value();
        if let Some(article) = load_article(&articles_table, article_id)? {
            articles.push(article);
        }
    }
    sort_newest_first(&mut articles);

    let views = articles
        .into_iter()
        .map(|a| ArticleView::new(a, category.name.clone()))
        .collect();

    Ok(CategoryPage {
        category,
        articles: views,
    })
}

/// Records one view of the article and returns it with the new count.
///
/// The increment happens inside a write transaction, so concurrent readers
/// never lose each other's views.
pub fn view_article(db: &Db, id: u64) -> AppResult<ArticleView> {
    let (article, category_name) = db.transact(|txn| {
        let article = increment_counter(txn, id, |a| a.views += 1)?;
        let categories = txn.open_table(TABLE_CATEGORIES)?;
        let name = load_category(&categories, article.category_id)?
            .map(|c| c.name)
            .unwrap_or_default();
        Ok((article, name))
    })?;

    tracing::debug!(article_id = id, views = article.views, "article viewed");
    Ok(ArticleView::new(article, category_name))
}

/// Applies a reader's vote to an article.
pub fn vote(db: &Db, id: u64, vote: Vote) -> AppResult<ArticleView> {
    let (article, category_name) = db.transact(|txn| {
        let article = increment_counter(txn, id, |a| match vote {
            Vote::Up => a.upvotes += 1,
            Vote::Down => a.downvotes += 1,
        })?;
        let categories = txn.open_table(TABLE_CATEGORIES)?;
        let name = load_category(&categories, article.category_id)?
            .map(|c| c.name)
            .unwrap_or_default();
        Ok((article, name))
    })?;

    tracing::info!(
        article_id = id,
        ?vote,
        upvotes = article.upvotes,
        downvotes = article.downvotes,
        "vote recorded"
    );
    Ok(ArticleView::new(article, category_name))
}

/// Loads the article, applies `bump` and writes it back, all inside `txn`.
///
/// Because the caller holds the only write transaction, no other writer can
/// interleave between the read and the write.
fn increment_counter<F>(txn: &WriteTransaction, id: u64, bump: F) -> AppResult<Article>
where
    F: FnOnce(&mut Article),
{
    let mut table = txn.open_table(TABLE_ARTICLES)?;
    let mut article = load_article(&table, id)?.ok_or(AppError::NotFound {
        entity: "Article",
        id,
    })?;
    bump(&mut article);
    store_json(&mut table, id, &article)?;
    Ok(article)
}

// ---------------------------------------------------------------------------
// Category administration
// ---------------------------------------------------------------------------

pub fn create_category(
    db: &Db,
    session: &AdminSession,
    input: &CategoryInput,
) -> AppResult<Category> {
    let fields = validate_category(input)?;

    let category = db.transact(|txn| {
        let mut table = txn.open_table(TABLE_CATEGORIES)?;
        let existing = all_categories(&table)?;
        if existing.iter().any(|c| c.name == fields.name) {
            return Err(AppError::Conflict(format!(
                "Category '{}' already exists",
                fields.name
            )));
        }

        let max_order = existing.iter().map(|c| c.order).max().unwrap_or(0);
        let now = Utc::now();
        let category = Category {
            id: next_id(&table)?,
            name: fields.name,
            description: fields.description,
            order: max_order + 1,
            created_at: now,
            updated_at: now,
        };
        store_json(&mut table, category.id, &category)?;
        Ok(category)
    })?;

    tracing::info!(
        admin = session.username(),
        category_id = category.id,
        "category created"
    );
    Ok(category)
}

pub fn update_category(
    db: &Db,
    session: &AdminSession,
    id: u64,
    input: &CategoryInput,
) -> AppResult<Category> {
    let fields = validate_category(input)?;

    let category = db.transact(|txn| {
        let mut table = txn.open_table(TABLE_CATEGORIES)?;
        let mut category = load_category(&table, id)?.ok_or(AppError::NotFound {
            entity: "Category",
            id,
        })?;
        if name_taken(&table, &fields.name, Some(id))? {
            return Err(AppError::Conflict(format!(
                "Category '{}' already exists",
                fields.name
            )));
        }

        category.name = fields.name;
        category.description = fields.description;
        category.updated_at = Utc::now();
        store_json(&mut table, id, &category)?;
        Ok(category)
    })?;

    tracing::info!(admin = session.username(), category_id = id, "category updated");
    Ok(category)
}

/// Deletes a category that owns no articles.
pub fn delete_category(db: &Db, session: &AdminSession, id: u64) -> AppResult<()> {
    db.transact(|txn| {
        let mut table = txn.open_table(TABLE_CATEGORIES)?;
        if table.get(id)?.is_none() {
            return Err(AppError::NotFound {
                entity: "Category",
                id,
            });
        }
        if category_has_articles(txn, id)? {
            return Err(AppError::Conflict(
                "Cannot delete category that has articles".into(),
            ));
        }
        table.remove(id)?;
        Ok(())
    })?;

    tracing::info!(admin = session.username(), category_id = id, "category deleted");
    Ok(())
}

/// Assigns each listed category its 0-based position. Unknown ids are skipped.
///
/// Returns the number of categories that were reordered.
pub fn reorder_categories(db: &Db, session: &AdminSession, ids: &[u64]) -> AppResult<usize> {
    let updated = db.transact(|txn| {
        let mut table = txn.open_table(TABLE_CATEGORIES)?;
        let now = Utc::now();
        let mut updated = 0;
        for (position, id) in ids.iter().enumerate() {
            let Some(mut category) = load_category(&table, *id)? else {
                continue;
            };
            category.order = position as i64;
            category.updated_at = now;
            store_json(&mut table, *id, &category)?;
            updated += 1;
        }
        Ok(updated)
    })?;

    tracing::info!(admin = session.username(), updated, "categories reordered");
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Article administration
// ---------------------------------------------------------------------------

/// All articles, newest first.
pub fn list_articles(db: &Db, _session: &AdminSession) -> AppResult<Vec<ArticleView>> {
    let txn = db.read()?;
    let names = category_names(&txn.open_table(TABLE_CATEGORIES)?)?;
    let mut articles = all_articles(&txn.open_table(TABLE_ARTICLES)?)?;
    sort_newest_first(&mut articles);
    Ok(to_views(articles, &names))
}

pub fn create_article(
    db: &Db,
    session: &AdminSession,
    input: &ArticleInput,
) -> AppResult<ArticleView> {
    let fields = validate_article(input)?;

    let (article, category_name) = db.transact(|txn| {
        let categories = txn.open_table(TABLE_CATEGORIES)?;
        let category = load_category(&categories, fields.category_id)?.ok_or_else(|| {
            AppError::Validation(format!("Category {} does not exist", fields.category_id))
        })?;

        let mut table = txn.open_table(TABLE_ARTICLES)?;
        let mut index = txn.open_table(TABLE_CATEGORY_ARTICLES)?;
        let now = Utc::now();
        let article = Article {
            id: next_id(&table)?,
            title: fields.title,
            content: fields.content,
            category_id: category.id,
            views: 0,
            upvotes: 0,
            downvotes: 0,
            created_at: now,
            updated_at: now,
        };
        store_json(&mut table, article.id, &article)?;
        index.insert((category.id, article.id), ())?;
        Ok((article, category.name))
    })?;

    tracing::info!(
        admin = session.username(),
        article_id = article.id,
        category_id = article.category_id,
        "article created"
    );
    Ok(ArticleView::new(article, category_name))
}

/// Replaces title, content and category. Counters are left untouched.
pub fn update_article(
    db: &Db,
    session: &AdminSession,
    id: u64,
    input: &ArticleInput,
) -> AppResult<ArticleView> {
    let fields = validate_article(input)?;

    let (article, category_name) = db.transact(|txn| {
        let mut table = txn.open_table(TABLE_ARTICLES)?;
        let mut article = load_article(&table, id)?.ok_or(AppError::NotFound {
            entity: "Article",
            id,
        })?;

        let categories = txn.open_table(TABLE_CATEGORIES)?;
        let category = load_category(&categories, fields.category_id)?.ok_or_else(|| {
            AppError::Validation(format!("Category {} does not exist", fields.category_id))
        })?;

        if article.category_id != category.id {
            let mut index = txn.open_table(TABLE_CATEGORY_ARTICLES)?;
            index.remove((article.category_id, id))?;
            index.insert((category.id, id), ())?;
        }

        article.title = fields.title;
        article.content = fields.content;
        article.category_id = category.id;
        article.updated_at = Utc::now();
        store_json(&mut table, id, &article)?;
        Ok((article, category.name))
    })?;

    tracing::info!(admin = session.username(), article_id = id, "article updated");
    Ok(ArticleView::new(article, category_name))
}

pub fn delete_article(db: &Db, session: &AdminSession, id: u64) -> AppResult<()> {
    db.transact(|txn| {
        let mut table = txn.open_table(TABLE_ARTICLES)?;
        let article = load_article(&table, id)?.ok_or(AppError::NotFound {
            entity: "Article",
            id,
        })?;
        table.remove(id)?;
        let mut index = txn.open_table(TABLE_CATEGORY_ARTICLES)?;
        index.remove((article.category_id, id))?;
        Ok(())
    })?;

    tracing::info!(admin = session.username(), article_id = id, "article deleted");
    Ok(())
}
