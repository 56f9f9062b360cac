//! Repository-level tests: counters under concurrent writers, seeding and
//! the category ownership invariant, exercised without the HTTP layer.

use std::path::PathBuf;
use std::thread;

use redb::ReadableTableMetadata;
use tempfile::NamedTempFile;

use knowledge_base::auth::{self, hash_password, AdminSession};
use knowledge_base::config::Config;
use knowledge_base::database::{init_db, seed_default_categories, Db, TABLE_SESSIONS};
use knowledge_base::error::AppError;
use knowledge_base::model::{ArticleInput, CategoryInput, Vote};
use knowledge_base::{repository, search};

fn test_config(session_ttl_hours: i64) -> Config {
    Config {
        port: 0,
        database_url: String::new(),
        admin_username: "admin".to_string(),
        admin_password_hash: hash_password("admin123").unwrap(),
        upload_dir: PathBuf::from("uploads"),
        session_ttl_hours,
        seed_default_categories: false,
    }
}

fn session_count(db: &Db) -> u64 {
    let txn = db.read().unwrap();
    txn.open_table(TABLE_SESSIONS).unwrap().len().unwrap()
}

fn setup() -> (Db, AdminSession, NamedTempFile) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let db = Db::new(init_db(temp_db.path().to_str().unwrap()).unwrap());
    let login = auth::login(&db, &test_config(1), "admin", "admin123").unwrap();
    let session = auth::authenticate(&db, &login.token).unwrap();
    (db, session, temp_db)
}

fn category(db: &Db, session: &AdminSession, name: &str) -> u64 {
    repository::create_category(
        db,
        session,
        &CategoryInput {
            name: name.to_string(),
            description: String::new(),
        },
    )
    .unwrap()
    .id
}

fn article(db: &Db, session: &AdminSession, title: &str, category_id: u64) -> u64 {
    repository::create_article(
        db,
        session,
        &ArticleInput {
            title: title.to_string(),
            content: "Body text".to_string(),
            category_id: Some(category_id),
        },
    )
    .unwrap()
    .id
}

#[test]
fn test_concurrent_views_are_not_lost() {
    let (db, session, _temp_db) = setup();
    let cat = category(&db, &session, "Busy");
    let id = article(&db, &session, "Popular", cat);

    let threads = 8;
    let views_per_thread = 25;
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let db = db.clone();
            thread::spawn(move || {
                for _ in 0..views_per_thread {
                    repository::view_article(&db, id).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let final_view = repository::view_article(&db, id).unwrap();
    assert_eq!(final_view.views, (threads * views_per_thread) as u64 + 1);
}

#[test]
fn test_concurrent_votes_are_not_lost() {
    let (db, session, _temp_db) = setup();
    let cat = category(&db, &session, "Votes");
    let id = article(&db, &session, "Rated", cat);

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let db = db.clone();
            thread::spawn(move || {
                let vote = if i % 5 == 0 { Vote::Down } else { Vote::Up };
                for _ in 0..10 {
                    repository::vote(&db, id, vote).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let result = repository::vote(&db, id, Vote::Up).unwrap();
    assert_eq!(result.upvotes, 81);
    assert_eq!(result.downvotes, 20);
    // 81 / 101 = 80.19%
    assert_eq!(result.rating_percentage, 80);
}

#[test]
fn test_vote_on_missing_article() {
    let (db, _session, _temp_db) = setup();

    let err = repository::vote(&db, 9, Vote::Up).unwrap_err();
    assert!(matches!(err, AppError::NotFound { entity: "Article", id: 9 }));
}

#[test]
fn test_failed_category_delete_leaves_state_unchanged() {
    let (db, session, _temp_db) = setup();
    let cat = category(&db, &session, "Keep");
    article(&db, &session, "One", cat);
    article(&db, &session, "Two", cat);

    let before = repository::category_page(&db, cat).unwrap();
    let err = repository::delete_category(&db, &session, cat).unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let after = repository::category_page(&db, cat).unwrap();
    assert_eq!(before.category, after.category);
    assert_eq!(after.articles.len(), 2);
    for (b, a) in before.articles.iter().zip(after.articles.iter()) {
        assert_eq!(b.id, a.id);
        assert_eq!(b.title, a.title);
        assert_eq!(b.updated_at, a.updated_at);
    }
}

#[test]
fn test_rejected_create_writes_nothing() {
    let (db, session, _temp_db) = setup();

    let err = repository::create_article(
        &db,
        &session,
        &ArticleInput {
            title: "Orphan".into(),
            content: "Body".into(),
            category_id: Some(404),
        },
    )
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(repository::list_articles(&db, &session).unwrap().is_empty());
}

#[test]
fn test_seed_default_categories_only_once() {
    let (db, _session, _temp_db) = setup();

    assert_eq!(seed_default_categories(&db).unwrap(), 5);
    assert_eq!(seed_default_categories(&db).unwrap(), 0);

    let names: Vec<_> = repository::list_categories(&db)
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(
        names,
        vec!["Getting Started", "User Guide", "API Reference", "Tutorials", "FAQs"]
    );
}

#[test]
fn test_search_strips_markup_from_logged_term() {
    let (db, session, _temp_db) = setup();
    let cat = category(&db, &session, "Docs");
    article(&db, &session, "Install guide", cat);

    let outcome = search::search(&db, "<b>install</b>", true, Some("127.0.0.1")).unwrap();
    assert_eq!(outcome.total_matches, 1);

    let logs = search::all_search_logs(&db).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].term, "install");
    assert_eq!(logs[0].ip_address.as_deref(), Some("127.0.0.1"));
}

#[test]
fn test_search_log_keeps_results_count_when_nothing_matches() {
    let (db, _session, _temp_db) = setup();

    let outcome = search::search(&db, "absent", true, None).unwrap();
    assert!(outcome.results.is_empty());

    let logs = search::all_search_logs(&db).unwrap();
    assert_eq!(logs[0].results_count, 0);
    assert_eq!(logs[0].ip_address, None);
}

#[test]
fn test_login_sweeps_expired_sessions() {
    let (db, _session, _temp_db) = setup();
    assert_eq!(session_count(&db), 1);

    let expired = auth::login(&db, &test_config(0), "admin", "admin123").unwrap();
    assert_eq!(session_count(&db), 2);

    auth::login(&db, &test_config(1), "admin", "admin123").unwrap();
    assert_eq!(session_count(&db), 2);
    assert!(matches!(
        auth::authenticate(&db, &expired.token),
        Err(AppError::Unauthorized(_))
    ));
}

#[test]
fn test_login_with_unrepresentable_ttl_fails_cleanly() {
    let (db, _session, _temp_db) = setup();

    let err = auth::login(&db, &test_config(i64::MAX), "admin", "admin123").unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
    assert_eq!(session_count(&db), 1);
}

#[test]
fn test_logged_term_is_not_cut_inside_an_entity() {
    let (db, _session, _temp_db) = setup();

    let query = format!("{}&b", "a".repeat(97));
    let outcome = search::search(&db, &query, true, None).unwrap();
    assert_eq!(outcome.query, format!("{}&amp;b", "a".repeat(97)));

    let logs = search::all_search_logs(&db).unwrap();
    assert_eq!(logs[0].term, "a".repeat(97));
}
