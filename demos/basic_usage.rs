//! Basic usage example of the memoizer.

use memo_kit::{
    backend::InMemoryBackend, error::Result, CacheKey, KeyRule, MemoizeOptions, Memoizer,
    WrapOptions,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Example entity: Employment
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
struct Employment {
    id: String,
    employer_name: String,
    salary: f64,
}

/// Simulates a slow database lookup.
async fn fetch_employment(id: String) -> Result<Option<Employment>> {
    println!("  [DB] Fetching employment: {}", id);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let employment = match id.as_str() {
        "emp_001" => Some(Employment {
            id: id.clone(),
            employer_name: "Acme Corp".to_string(),
            salary: 75000.0,
        }),
        "emp_002" => Some(Employment {
            id: id.clone(),
            employer_name: "Tech Inc".to_string(),
            salary: 95000.0,
        }),
        _ => None,
    };

    Ok(employment)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== memo-kit - Basic Example ===\n");

    // 1. Global defaults
    println!("1. Creating memoizer over an in-memory backend...");
    let backend = InMemoryBackend::new();
    let memoizer = Memoizer::new(
        MemoizeOptions::new()
            .with_client(backend.clone())
            .with_prefix("hr:")
            .with_ttl(Duration::from_secs(300)),
    );

    // Temporary ids ("tmp_*") are never cached
    let employments = memoizer.wrap(
        fetch_employment,
        WrapOptions::new().with_key(KeyRule::from_fn(|f, id: &String| {
            if id.starts_with("tmp_") {
                CacheKey::Skip
            } else {
                CacheKey::key(format!("{}:{}", f.name, id))
            }
        })),
    )?;
    println!("   ✓ Memoized {}\n", employments.name());

    // 2. First call - miss, hits the database
    println!("2. First call for emp_001:");
    let emp = employments.call("emp_001".to_string()).await?;
    println!("   ✓ Loaded: {:?}\n", emp);

    // 3. Second call - served from cache
    println!("3. Second call for emp_001:");
    let emp = employments.call("emp_001".to_string()).await?;
    println!("   ✓ Loaded from cache: {:?}\n", emp);

    // 4. Absent results are never cached
    println!("4. Call for unknown emp_999 (twice):");
    employments.call("emp_999".to_string()).await?;
    employments.call("emp_999".to_string()).await?;
    println!("   ✓ Database was asked both times\n");

    // 5. Seed the cache directly
    println!("5. Seeding emp_002 with set():");
    let seeded = Employment {
        id: "emp_002".to_string(),
        employer_name: "Seeded Ltd".to_string(),
        salary: 1.0,
    };
    employments.set(&"emp_002".to_string(), seeded).await?;
    let emp = employments.call("emp_002".to_string()).await?;
    println!("   ✓ Call returned seeded value: {:?}\n", emp);

    // 6. Clear and recompute
    println!("6. Clearing emp_002:");
    let removed = employments.clear(&"emp_002".to_string()).await?;
    println!("   ✓ Removed {:?} entries", removed);
    let emp = employments.call("emp_002".to_string()).await?;
    println!("   ✓ Recomputed: {:?}\n", emp);

    // 7. Skipped keys bypass the cache
    println!("7. Skipped key tmp_1:");
    employments.call("tmp_1".to_string()).await?;
    println!("   ✓ Cache entries: {}\n", backend.len().await);

    println!("=== Example Complete ===\n");

    Ok(())
}
