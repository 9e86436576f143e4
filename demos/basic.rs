//! Basic usage examples for Pool

use lagoon::{BoxError, Pool, PoolConfiguration, Resource, ResourceFactory};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Connection {
    id: usize,
}

impl Resource for Connection {
    fn dispose(self) -> Result<(), BoxError> {
        println!("   Closing connection {}", self.id);
        Ok(())
    }
}

#[derive(Default)]
struct ConnectionFactory {
    next_id: AtomicUsize,
}

impl ResourceFactory<Connection> for ConnectionFactory {
    fn create(&self) -> Result<Connection, BoxError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        println!("   Opening connection {}", id);
        Ok(Connection { id })
    }
}

#[tokio::main]
async fn main() {
    println!("=== Lagoon - Basic Examples ===\n");

    // Example 1: Simple pool
    simple_pool().await;

    // Example 2: Pool with configuration
    configured_pool().await;

    // Example 3: Try methods
    try_methods().await;

    // Example 4: Metrics
    metrics().await;
}

async fn simple_pool() {
    println!("1. Simple Pool:");
    let pool = Pool::new(ConnectionFactory::default(), PoolConfiguration::default()).unwrap();

    {
        let conn = pool.acquire(&CancellationToken::new()).await.unwrap();
        println!("   Got connection: {}", conn.id);
        // Connection automatically returned when dropped
    }

    println!("   Available after return: {}", pool.available_count());
    pool.shutdown().unwrap();
    println!();
}

async fn configured_pool() {
    println!("2. Configured Pool:");

    let config = PoolConfiguration::new()
        .with_min_objects(1)
        .with_max_objects(5);

    let pool = Pool::new(ConnectionFactory::default(), config).unwrap();
    let token = CancellationToken::new();

    {
        let _conn1 = pool.acquire(&token).await.unwrap();
        let _conn2 = pool.acquire(&token).await.unwrap();
        println!("   Active: {}", pool.active_count());
        println!("   Available: {}", pool.available_count());
    }

    println!("   After return - Available: {}", pool.available_count());
    println!("   Pruned down to the floor: {} destroyed", pool.prune());
    pool.shutdown().unwrap();
    println!();
}

async fn try_methods() {
    println!("3. Try Methods:");
    let pool = Pool::new(
        ConnectionFactory::default(),
        PoolConfiguration::new().with_max_objects(1),
    )
    .unwrap();

    // Nothing idle yet, and try_acquire never creates
    assert!(pool.try_acquire().is_none());
    println!("   First try: None (nothing idle)");

    drop(pool.acquire(&CancellationToken::new()).await.unwrap());

    let conn = pool.try_acquire();
    assert!(conn.is_some());
    println!("   Second try: Success");

    // The single slot is taken
    assert!(pool.try_acquire().is_none());
    println!("   Third try: None (pool saturated)\n");
}

async fn metrics() {
    println!("4. Metrics:");
    let pool = Pool::new(ConnectionFactory::default(), PoolConfiguration::default()).unwrap();
    let token = CancellationToken::new();

    {
        let _conn1 = pool.acquire(&token).await.unwrap();
        let _conn2 = pool.acquire(&token).await.unwrap();
        let snapshot = pool.metrics();
        println!("   Utilization: {:.1}%", snapshot.utilization * 100.0);
        println!(
            "   Active: {}, Available: {}",
            snapshot.active_resources, snapshot.available_resources
        );
    }

    let mut metrics: Vec<_> = pool.export_metrics().into_iter().collect();
    metrics.sort();
    println!("\n   Metrics:");
    for (key, value) in metrics {
        println!("     {}: {}", key, value);
    }
}
