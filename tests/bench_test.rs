//! Benchmark tests for critical operations
//!
//! Run with: cargo test --release bench -- --ignored --nocapture

use std::path::PathBuf;
use std::time::Instant;

use tempfile::NamedTempFile;

use knowledge_base::auth::{self, hash_password, AdminSession};
use knowledge_base::config::Config;
use knowledge_base::database::{init_db, Db};
use knowledge_base::model::{ArticleInput, CategoryInput};
use knowledge_base::{repository, search};

/// Benchmark helper to measure execution time
fn benchmark<F>(name: &str, iterations: usize, mut f: F)
where
    F: FnMut(),
{
    let start = Instant::now();

    for _ in 0..iterations {
        f();
    }

    let duration = start.elapsed();
    let avg_ms = duration.as_millis() as f64 / iterations as f64;
    let ops_per_sec = (iterations as f64 / duration.as_secs_f64()) as u64;

    println!("  {} ({} iterations)", name, iterations);
    println!("    Total time: {:?}", duration);
    println!("    Avg time: {:.3}ms", avg_ms);
    println!("    Throughput: {} ops/sec\n", ops_per_sec);
}

fn setup(articles: usize) -> (Db, AdminSession, u64, NamedTempFile) {
    let temp_db = NamedTempFile::new().unwrap();
    let db = Db::new(init_db(temp_db.path().to_str().unwrap()).unwrap());
    let config = Config {
        port: 0,
        database_url: String::new(),
        admin_username: "admin".to_string(),
        admin_password_hash: hash_password("admin123").unwrap(),
        upload_dir: PathBuf::from("uploads"),
        session_ttl_hours: 1,
        seed_default_categories: false,
    };
    let login = auth::login(&db, &config, "admin", "admin123").unwrap();
    let session = auth::authenticate(&db, &login.token).unwrap();

    let category = repository::create_category(
        &db,
        &session,
        &CategoryInput {
            name: "Bench".into(),
            description: String::new(),
        },
    )
    .unwrap();

    let mut first_article = 0;
    for i in 0..articles {
        let article = repository::create_article(
            &db,
            &session,
            &ArticleInput {
                title: format!("Article {i}"),
                content: format!("<p>Content for benchmark article number {i}</p>"),
                category_id: Some(category.id),
            },
        )
        .unwrap();
        if i == 0 {
            first_article = article.id;
        }
    }

    (db, session, first_article, temp_db)
}

#[test]
#[ignore] // Run explicitly with: cargo test bench --release -- --ignored --nocapture
fn bench_view_increments() {
    println!("\n=== Benchmark: View Increments ===\n");

    let (db, _session, id, _temp_db) = setup(1);
    benchmark("Sequential views", 1000, || {
        repository::view_article(&db, id).unwrap();
    });
}

#[test]
#[ignore]
fn bench_search_scaling() {
    println!("\n=== Benchmark: Search Scaling ===\n");

    for &size in &[100, 1000, 5000] {
        println!("  Testing with {} articles in database...", size);
        let (db, _session, _id, _temp_db) = setup(size);

        benchmark("Live search", 100, || {
            search::search(&db, "benchmark article number 4", false, None).unwrap();
        });
        benchmark("Logged search", 100, || {
            search::search(&db, "article", true, Some("127.0.0.1")).unwrap();
        });
    }
}

#[test]
#[ignore]
fn bench_concurrent_views() {
    println!("\n=== Benchmark: Concurrent Views ===\n");

    let (db, _session, id, _temp_db) = setup(1);
    let num_threads = 16;
    let ops_per_thread = 100;

    let start = Instant::now();
    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let db = db.clone();
            std::thread::spawn(move || {
                for _ in 0..ops_per_thread {
                    repository::view_article(&db, id).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let duration = start.elapsed();

    let total_ops = num_threads * ops_per_thread;
    let final_views = repository::view_article(&db, id).unwrap().views;
    assert_eq!(final_views, total_ops as u64 + 1);

    println!("  Total operations: {}", total_ops);
    println!("  Total time: {:?}", duration);
    println!(
        "  Throughput: {:.0} ops/sec\n",
        total_ops as f64 / duration.as_secs_f64()
    );
}
