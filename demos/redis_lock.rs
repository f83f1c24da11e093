//! Example: Using Redis named locks
//!
//! Run with: `cargo run --example redis_lock`
//!
//! Requires a Redis server. Set REDIS_URL environment variable
//! or modify the URL below.

use named_lock::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Get Redis URL from environment or use default
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

    println!("Connecting to Redis...");
    let backend = RedisLockBackend::connect(&redis_url).await?;
    let engine = LockEngine::new(backend);

    // Locks left behind by a crashed process expire on their own
    let expiration = engine.set_expiration(Duration::from_secs(30));
    println!("Lock keys expire after {expiration:?}");

    println!("Acquiring lock with 5 second timeout...");
    if engine
        .acquire_lock("example-resource", Duration::from_secs(5))
        .await?
    {
        println!("Lock acquired!");

        // Keep the work well below the expiration
        tokio::time::sleep(Duration::from_secs(2)).await;
        println!("Work completed");

        engine.release_lock("example-resource").await?;
        println!("Lock released");
    } else {
        println!("Lock is held by another process");
    }

    engine.shutdown().await?;
    Ok(())
}
