//! Async usage examples: activation, timeouts, cancellation, concurrency

use async_trait::async_trait;
use lagoon::{BoxError, Pool, PoolConfiguration, PoolError, Resource, ResourceFactory};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

struct Session {
    warmed_up: bool,
}

impl Resource for Session {}

struct SessionFactory;

#[async_trait]
impl ResourceFactory<Session> for SessionFactory {
    fn create(&self) -> Result<Session, BoxError> {
        Ok(Session { warmed_up: false })
    }

    async fn activate(
        &self,
        session: &mut Session,
        _cancel: &CancellationToken,
    ) -> Result<(), BoxError> {
        sleep(Duration::from_millis(20)).await;
        session.warmed_up = true;
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Lagoon - Async Examples ===\n");

    // Example 1: Activation
    activation().await;

    // Example 2: Saturation with timeout
    saturation_timeout().await;

    // Example 3: Cancellation
    cancellation().await;

    // Example 4: Concurrent access
    concurrent_access().await;
}

async fn activation() {
    println!("1. Activation:");
    let pool = Pool::new(SessionFactory, PoolConfiguration::default()).unwrap();

    {
        let session = pool.acquire(&CancellationToken::new()).await.unwrap();
        println!("   Warmed up: {}", session.warmed_up);
    }

    println!();
}

async fn saturation_timeout() {
    println!("2. Saturation with Timeout:");

    let config = PoolConfiguration::new()
        .with_min_objects(0)
        .with_max_objects(1)
        .with_acquisition_timeout(Duration::from_millis(100));

    let pool = Pool::new(SessionFactory, config).unwrap();
    let token = CancellationToken::new();

    // Take the only slot
    let _session = pool.acquire(&token).await.unwrap();

    // Try to get another (should time out)
    match pool.acquire(&token).await {
        Ok(_) => println!("   Got session"),
        Err(e) => println!("   Error: {}", e),
    }

    println!();
}

async fn cancellation() {
    println!("3. Cancellation:");

    let pool = Pool::new(SessionFactory, PoolConfiguration::new().with_max_objects(1)).unwrap();
    let token = CancellationToken::new();
    let _session = pool.acquire(&token).await.unwrap();

    let canceller = token.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let result = pool.acquire(&token).await;
    println!("   Cancelled while waiting: {}", matches!(result, Err(PoolError::Cancelled)));
    println!();
}

async fn concurrent_access() {
    println!("4. Concurrent Access:");

    let config = PoolConfiguration::new()
        .with_max_objects(3)
        .with_acquisition_timeout(Duration::from_secs(1));
    let pool = Arc::new(Pool::new(SessionFactory, config).unwrap());

    let mut handles = vec![];

    for i in 0..10 {
        let pool_clone = Arc::clone(&pool);
        let handle = tokio::spawn(async move {
            match pool_clone.acquire(&CancellationToken::new()).await {
                Ok(session) => {
                    println!("   Task {} got session (warm: {})", i, session.warmed_up);
                    sleep(Duration::from_millis(50)).await;
                }
                Err(e) => println!("   Task {} couldn't get session: {}", i, e),
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap();
    }

    println!("   Final available: {}", pool.available_count());
    println!("   Created in total: {}", pool.metrics().total_created);
}
