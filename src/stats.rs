//! Usage metrics: article ratings, popular searches and the admin dashboard
//!
//! Nothing here keeps running totals. Every figure is recomputed from the
//! stored records when it is requested.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::AdminSession;
use crate::database::{Db, TABLE_ARTICLES, TABLE_CATEGORIES};
use crate::error::AppResult;
use crate::model::{ArticleView, SearchLog};
use crate::repository::{all_articles, category_names, sort_newest_first, to_views};
use crate::search::all_search_logs;

pub const DEFAULT_POPULAR_LIMIT: usize = 10;
pub const MAX_POPULAR_LIMIT: usize = 100;
const RECENT_SEARCHES: usize = 100;
const RECENT_ARTICLES: usize = 5;

/// Upvotes as a percentage of all votes, rounded half away from zero.
///
/// An article nobody voted on rates 0.
///
/// ```
/// use knowledge_base::stats::rating_percentage;
///
/// assert_eq!(rating_percentage(3, 1), 75);
/// assert_eq!(rating_percentage(1, 2), 33);
/// assert_eq!(rating_percentage(0, 0), 0);
/// ```
pub fn rating_percentage(upvotes: u64, downvotes: u64) -> u32 {
    let total = upvotes as u128 + downvotes as u128;
    if total == 0 {
        return 0;
    }
    // round(up * 100 / total) == floor((2 * up * 100 + total) / (2 * total))
    let scaled = 200 * upvotes as u128 + total;
    (scaled / (2 * total)) as u32
}

/// One distinct search term and how often it was searched.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PopularSearch {
    /// Casing of the most recent search in the group
    pub term: String,
    pub count: u64,
    pub last_searched: DateTime<Utc>,
}

/// Split of logged searches by whether they found anything.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchMetrics {
    pub with_results: u64,
    pub no_results: u64,
}

#[derive(Serialize, Debug)]
pub struct DashboardStats {
    pub total_articles: u64,
    pub total_views: u64,
    pub total_categories: u64,
    pub average_rating: f64,
    pub total_searches: u64,
    pub search_metrics: SearchMetrics,
    pub recent_articles: Vec<ArticleView>,
    pub popular_searches: Vec<PopularSearch>,
}

#[derive(Serialize, Debug)]
pub struct SearchReport {
    pub total_searches: u64,
    pub avg_results: f64,
    /// Share of searches that found nothing, as a percentage
    pub no_results_rate: f64,
    /// Most recent searches, newest first
    pub searches: Vec<SearchLog>,
}

/// Groups `logs` by lowercase term and ranks the groups.
///
/// Groups are ordered by count, then by their most recent search, both
/// descending; the term itself breaks any remaining tie. Ids grow with
/// insertion order, so among rows sharing a timestamp the higher id is the
/// more recent one.
pub fn rank_popular(logs: &[SearchLog], limit: usize) -> Vec<PopularSearch> {
    struct Group<'a> {
        latest: &'a SearchLog,
        count: u64,
    }

    let mut groups: HashMap<String, Group> = HashMap::new();
    for log in logs {
        groups
            .entry(log.term.to_lowercase())
            .and_modify(|g| {
                g.count += 1;
                if (log.created_at, log.id) > (g.latest.created_at, g.latest.id) {
                    g.latest = log;
                }
            })
            .or_insert(Group {
                latest: log,
                count: 1,
            });
    }

    let mut ranked: Vec<PopularSearch> = groups
        .into_values()
        .map(|g| PopularSearch {
            term: g.latest.term.clone(),
            count: g.count,
            last_searched: g.latest.created_at,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then(b.last_searched.cmp(&a.last_searched))
            .then(a.term.cmp(&b.term))
    });
    ranked.truncate(limit);
    ranked
}

/// Counts searches with at least one result against the rest.
pub fn search_outcome(logs: &[SearchLog]) -> SearchMetrics {
    let with_results = logs.iter().filter(|l| l.results_count > 0).count() as u64;
    SearchMetrics {
        with_results,
        no_results: logs.len() as u64 - with_results,
    }
}

/// Most searched terms, at most `limit` (default 10, capped at 100).
///
/// A limit of 0 yields an empty list.
pub fn popular_searches(
    db: &Db,
    _session: &AdminSession,
    limit: Option<usize>,
) -> AppResult<Vec<PopularSearch>> {
    let limit = limit
        .unwrap_or(DEFAULT_POPULAR_LIMIT)
        .min(MAX_POPULAR_LIMIT);
    Ok(rank_popular(&all_search_logs(db)?, limit))
}

pub fn search_metrics(db: &Db, _session: &AdminSession) -> AppResult<SearchMetrics> {
    Ok(search_outcome(&all_search_logs(db)?))
}

/// Figures shown on the admin landing page.
pub fn dashboard(db: &Db, _session: &AdminSession) -> AppResult<DashboardStats> {
    let (mut articles, names, total_categories) = {
        let txn = db.read()?;
        let names = category_names(&txn.open_table(TABLE_CATEGORIES)?)?;
        let articles = all_articles(&txn.open_table(TABLE_ARTICLES)?)?;
        let total_categories = names.len() as u64;
        (articles, names, total_categories)
    };
    let logs = all_search_logs(db)?;

    let total_articles = articles.len() as u64;
    let total_views = articles.iter().map(|a| a.views).sum();
    let average_rating = if articles.is_empty() {
        0.0
    } else {
        let sum: u64 = articles
            .iter()
            .map(|a| rating_percentage(a.upvotes, a.downvotes) as u64)
            .sum();
        sum as f64 / articles.len() as f64
    };

    sort_newest_first(&mut articles);
    articles.truncate(RECENT_ARTICLES);

    Ok(DashboardStats {
        total_articles,
        total_views,
        total_categories,
        average_rating,
        total_searches: logs.len() as u64,
        search_metrics: search_outcome(&logs),
        recent_articles: to_views(articles, &names),
        popular_searches: rank_popular(&logs, DEFAULT_POPULAR_LIMIT),
    })
}

/// Search volume, average hits and the share of fruitless searches.
pub fn search_report(db: &Db, _session: &AdminSession) -> AppResult<SearchReport> {
    let mut logs = all_search_logs(db)?;
    let total_searches = logs.len() as u64;

    let (avg_results, no_results_rate) = if logs.is_empty() {
        (0.0, 0.0)
    } else {
        let total_results: u64 = logs.iter().map(|l| l.results_count).sum();
        let no_results = search_outcome(&logs).no_results;
        (
            total_results as f64 / total_searches as f64,
            no_results as f64 / total_searches as f64 * 100.0,
        )
    };

    logs.truncate(RECENT_SEARCHES);
    Ok(SearchReport {
        total_searches,
        avg_results,
        no_results_rate,
        searches: logs,
    })
}

/// Every search log row, newest first.
pub fn export_search_logs(db: &Db, _session: &AdminSession) -> AppResult<Vec<SearchLog>> {
    all_search_logs(db)
}
