//! Example: Using MongoDB named locks
//!
//! Run with: `cargo run --example mongo_lock`
//!
//! Requires a MongoDB server. Set MONGODB_URI environment variable
//! or modify the URI below.

use named_lock::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let uri =
        std::env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

    // Connection setup stays with the caller; the backend takes a ready handle
    let client = mongodb::Client::with_uri_str(&uri).await?;
    let backend = MongoLockBackend::from_database(&client.database("named_lock_demo"));
    backend.ensure_ttl_index().await?;

    let engine = LockEngine::new(backend);
    engine.set_expiration(Duration::from_secs(60));

    println!("Acquiring lock with 5 second timeout...");
    if engine
        .acquire_lock("example-resource", Duration::from_secs(5))
        .await?
    {
        println!("Lock acquired by {}", engine.backend().holder());

        tokio::time::sleep(Duration::from_secs(2)).await;

        engine.release_lock("example-resource").await?;
        println!("Lock released");
    } else {
        println!("Lock is held by another process");
    }

    engine.shutdown().await?;
    Ok(())
}
