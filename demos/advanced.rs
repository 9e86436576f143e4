//! Advanced features: transparent dispose, reclaimer, shutdown, Prometheus export

use lagoon::{BoxError, Pool, PoolConfiguration, Resource, ResourceFactory};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Connection {
    id: u32,
    data: String,
    keep_alive: bool,
}

impl Resource for Connection {
    fn dispose(self) -> Result<(), BoxError> {
        println!("   Connection {} torn down", self.id);
        Ok(())
    }
}

struct ConnectionFactory;

impl ResourceFactory<Connection> for ConnectionFactory {
    fn create(&self) -> Result<Connection, BoxError> {
        let id = rand::random();
        Ok(Connection {
            id,
            data: format!("Connection-{}", id),
            keep_alive: id % 2 == 0,
        })
    }
}

/// Code that only knows it owns "some resource" and disposes it when done.
fn finish_with<R: Resource>(resource: R) {
    resource.dispose().unwrap();
}

#[tokio::main]
async fn main() {
    println!("=== Lagoon - Advanced Features ===\n");

    // Example 1: Transparent dispose
    transparent_dispose().await;

    // Example 2: Background reclaimer
    reclaimer().await;

    // Example 3: Shutdown guard and passivation
    shutdown().await;

    // Example 4: Prometheus metrics
    prometheus_export().await;
}

async fn transparent_dispose() {
    println!("1. Transparent Dispose:");
    let pool = Pool::new(ConnectionFactory, PoolConfiguration::default()).unwrap();

    let conn = pool.acquire(&CancellationToken::new()).await.unwrap();
    println!("   Using: {}", conn.data);
    finish_with(conn);

    println!("   Active: {}, Available: {}", pool.active_count(), pool.available_count());
    println!();
}

async fn reclaimer() {
    println!("2. Background Reclaimer:");

    let config = PoolConfiguration::new()
        .with_min_objects(1)
        .with_max_objects(4)
        .with_sweep_interval(Duration::from_millis(100));
    let pool = Pool::new(ConnectionFactory, config).unwrap();
    let token = CancellationToken::new();

    {
        let _a = pool.acquire(&token).await.unwrap();
        let _b = pool.acquire(&token).await.unwrap();
        let _c = pool.acquire(&token).await.unwrap();
    }
    println!("   Idle after burst: {}", pool.available_count());

    tokio::time::sleep(Duration::from_millis(250)).await;
    println!("   Idle after sweep: {}", pool.available_count());
    println!();
}

async fn shutdown() {
    println!("3. Shutdown:");

    let config = PoolConfiguration::new().with_passivator(|conn: &Connection| !conn.keep_alive);
    let pool = Pool::new(ConnectionFactory, config).unwrap();
    let token = CancellationToken::new();

    let a = pool.acquire(&token).await.unwrap();
    let b = pool.acquire(&token).await.unwrap();

    match pool.shutdown() {
        Ok(_) => println!("   Shut down"),
        Err(e) => println!("   Refused: {}", e),
    }

    drop(a);
    drop(b);

    let kept = pool.shutdown().unwrap();
    let kept_ids: Vec<_> = kept.iter().map(|c| c.id).collect();
    println!("   Kept alive for reuse elsewhere: {:?}", kept_ids);
    println!();
}

async fn prometheus_export() {
    println!("4. Prometheus Metrics Export:");

    let pool = Pool::new(ConnectionFactory, PoolConfiguration::default()).unwrap();
    let token = CancellationToken::new();

    {
        let _conn1 = pool.acquire(&token).await.unwrap();
        let _conn2 = pool.acquire(&token).await.unwrap();

        let mut tags = HashMap::new();
        tags.insert("service".to_string(), "example".to_string());
        tags.insert("env".to_string(), "dev".to_string());

        let prometheus_text = pool.export_metrics_prometheus("example_pool", Some(&tags));
        println!("{}", prometheus_text);
    }
}

// Simple random number generator for example
mod rand {
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn random() -> u32 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or_default()
    }
}
