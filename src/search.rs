//! Public article search and search logging

use chrono::Utc;
use redb::ReadableTable;

use crate::database::{next_id, Db, TABLE_ARTICLES, TABLE_CATEGORIES, TABLE_SEARCH_LOGS};
use crate::error::AppResult;
use crate::model::{ArticleView, SearchLog};
use crate::repository::{all_articles, category_names, sort_newest_first, to_views};
use crate::sanitize::{strip_markup, truncate_chars, truncate_escaped};

/// Longest query accepted, in characters. Longer queries return nothing.
pub const MAX_QUERY_LEN: usize = 100;

/// Most results returned for one query.
pub const MAX_RESULTS: usize = 10;

/// Enough for a textual IPv6 address.
pub const MAX_IP_LEN: usize = 45;

/// Result of one search: the sanitized term, the capped result list and the
/// number of articles that actually matched.
#[derive(Debug)]
pub struct SearchOutcome {
    pub query: String,
    pub results: Vec<ArticleView>,
    pub total_matches: u64,
}

impl SearchOutcome {
    fn empty(query: String) -> Self {
        Self {
            query,
            results: Vec::new(),
            total_matches: 0,
        }
    }
}

/// Searches article titles and content for `query`.
///
/// Matching is case-insensitive substring containment. At most
/// [`MAX_RESULTS`] articles are returned, newest first. When `log` is set a
/// [`SearchLog`] row is appended recording the sanitized term and the full
/// match count (not the capped count). Empty or oversized queries return an
/// empty outcome and are never logged.
pub fn search(db: &Db, query: &str, log: bool, ip_address: Option<&str>) -> AppResult<SearchOutcome> {
    let trimmed = query.trim();
    if trimmed.is_empty() || query.chars().count() > MAX_QUERY_LEN {
        return Ok(SearchOutcome::empty(String::new()));
    }

    let term = strip_markup(trimmed).trim().to_string();
    if term.is_empty() {
        return Ok(SearchOutcome::empty(term));
    }
    let needle = term.to_lowercase();

    let (mut matches, names) = {
        let txn = db.read()?;
        let names = category_names(&txn.open_table(TABLE_CATEGORIES)?)?;
        let matches: Vec<_> = all_articles(&txn.open_table(TABLE_ARTICLES)?)?
            .into_iter()
            .filter(|a| {
                a.title.to_lowercase().contains(&needle)
                    || a.content.to_lowercase().contains(&needle)
            })
            .collect();
        (matches, names)
    };

    let total_matches = matches.len() as u64;
    sort_newest_first(&mut matches);
    matches.truncate(MAX_RESULTS);

    if log {
        record_search(db, &term, total_matches, ip_address)?;
    }

    tracing::debug!(term = %term, total_matches, logged = log, "search executed");
    Ok(SearchOutcome {
        query: term,
        results: to_views(matches, &names),
        total_matches,
    })
}

/// Appends one immutable search log row.
pub fn record_search(
    db: &Db,
    term: &str,
    results_count: u64,
    ip_address: Option<&str>,
) -> AppResult<SearchLog> {
    db.transact(|txn| {
        let mut table = txn.open_table(TABLE_SEARCH_LOGS)?;
        let entry = SearchLog {
            id: next_id(&table)?,
            term: truncate_escaped(term, MAX_QUERY_LEN),
            results_count,
            created_at: Utc::now(),
            ip_address: ip_address.map(|ip| truncate_chars(ip, MAX_IP_LEN)),
        };
        let json = serde_json::to_string(&entry)?;
        table.insert(entry.id, json.as_str())?;
        Ok(entry)
    })
}

/// Every search log row, newest first.
pub fn all_search_logs(db: &Db) -> AppResult<Vec<SearchLog>> {
    let txn = db.read()?;
    let table = txn.open_table(TABLE_SEARCH_LOGS)?;
    let mut logs = Vec::new();
    for entry in table.iter()?.rev() {
        let (_, value) = entry?;
        logs.push(serde_json::from_str::<SearchLog>(value.value())?);
    }
    Ok(logs)
}
