//! Example: Using MySQL named locks
//!
//! Run with: `cargo run --example mysql_lock`
//!
//! Connection details come from `MYSQL_HOST`, `MYSQL_PORT`, `MYSQL_USER`,
//! `MYSQL_PASSWORD` and, for TLS, `MYSQL_SSL_CA`.

use named_lock::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut options = MySqlLockOptions::builder();
    if let Ok(host) = std::env::var("MYSQL_HOST") {
        options = options.host(host);
    }
    if let Ok(port) = std::env::var("MYSQL_PORT") {
        options = options.port(port.parse()?);
    }
    if let Ok(user) = std::env::var("MYSQL_USER") {
        options = options.user(user);
    }
    if let Ok(password) = std::env::var("MYSQL_PASSWORD") {
        options = options.password(password);
    }
    if let Ok(ca) = std::env::var("MYSQL_SSL_CA") {
        options = options.ssl_ca(ca);
    }
    let options = options.build();

    // Report degraded settings before connecting
    for warning in options.validate() {
        println!("Configuration warning: {warning}");
    }
    println!("Using {}@{}:{}", options.user(), options.host(), options.port());

    let engine = LockEngine::new(MySqlLockBackend::new(options));

    println!("Acquiring lock with 5 second timeout...");
    if engine.acquire_lock("example-lock", Duration::from_secs(5)).await? {
        println!("Lock acquired!");
        println!("Locked: {}", engine.is_locked("example-lock").await?);

        tokio::time::sleep(Duration::from_secs(2)).await;

        engine.release_lock("example-lock").await?;
        println!("Lock released");
    } else {
        println!("Lock is held by another session");
    }

    // Closes every session the backend opened
    engine.shutdown().await?;
    Ok(())
}
