//! Example: Using file-based named locks
//!
//! Run with: `cargo run --example file_lock`
//!
//! Start it twice in parallel to watch the second process wait.

use named_lock::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Create a file lock backend
    let backend = FileLockBackend::builder()
        .directory(std::env::temp_dir().join("named-locks"))
        .build()?;
    println!("Lock files in {}", backend.directory().display());

    let engine = LockEngine::new(backend);

    // Try to acquire the lock once
    if engine.try_acquire_lock("example-resource").await? {
        println!("Lock acquired on first attempt");
    } else {
        println!("Lock is currently held by another process, waiting up to 10 seconds...");
        if !engine
            .acquire_lock("example-resource", Duration::from_secs(10))
            .await?
        {
            println!("Gave up waiting");
            return Ok(());
        }
        println!("Lock acquired!");
    }

    // Do some work while holding the lock
    tokio::time::sleep(Duration::from_secs(2)).await;
    println!("Work completed");

    engine.release_lock("example-resource").await?;
    println!("Lock released");

    engine.shutdown().await?;
    Ok(())
}
