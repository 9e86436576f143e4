use async_trait::async_trait;
use dashmap::DashSet;
use lagoon::{
    BoxError, Pool, PoolConfiguration, PoolError, PooledObject, Resource, ResourceFactory,
};
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Foo {
    serial: usize,
    disposed: Arc<AtomicUsize>,
}

impl Foo {
    fn id(&self) -> usize {
        self.serial
    }
}

impl Resource for Foo {
    fn dispose(self) -> Result<(), BoxError> {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct Counters {
    created: AtomicUsize,
    activated: AtomicUsize,
    disposed: Arc<AtomicUsize>,
    fail_create: AtomicBool,
    fail_activate: AtomicBool,
    slow_activate: AtomicBool,
}

impl Counters {
    fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn activated(&self) -> usize {
        self.activated.load(Ordering::SeqCst)
    }

    fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

struct FooFactory(Arc<Counters>);

#[async_trait]
impl ResourceFactory<Foo> for FooFactory {
    fn create(&self) -> Result<Foo, BoxError> {
        if self.0.fail_create.load(Ordering::SeqCst) {
            return Err("connection refused".into());
        }
        let serial = self.0.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Foo {
            serial,
            disposed: Arc::clone(&self.0.disposed),
        })
    }

    async fn activate(&self, _foo: &mut Foo, _cancel: &CancellationToken) -> Result<(), BoxError> {
        self.0.activated.fetch_add(1, Ordering::SeqCst);
        if self.0.slow_activate.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        if self.0.fail_activate.load(Ordering::SeqCst) {
            return Err("handshake failed".into());
        }
        Ok(())
    }
}

fn pool_with(config: PoolConfiguration<Foo>) -> (Pool<Foo>, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let pool = Pool::new(FooFactory(Arc::clone(&counters)), config).unwrap();
    (pool, counters)
}

fn quiet_config() -> PoolConfiguration<Foo> {
    PoolConfiguration::new()
        .with_min_objects(0)
        .with_max_objects(10)
        .with_sweep_interval(Duration::from_secs(1200))
        .with_acquisition_timeout(Duration::from_millis(500))
}

#[tokio::test]
async fn one_available_gets_one_from_pool() {
    let (pool, counters) = pool_with(quiet_config());
    let token = CancellationToken::new();

    assert_eq!(pool.active_count(), 0);
    let first = pool.acquire(&token).await.unwrap();
    assert_eq!(pool.active_count(), 1);
    first.dispose().unwrap();
    assert_eq!(pool.active_count(), 0);
    let _second = pool.acquire(&token).await.unwrap();
    assert_eq!(pool.active_count(), 1);

    assert_eq!(counters.created(), 1);
    assert_eq!(counters.disposed(), 0);
}

#[tokio::test]
async fn reuse_is_last_in_first_out() {
    let (pool, _counters) = pool_with(quiet_config());
    let token = CancellationToken::new();

    let r1 = pool.acquire(&token).await.unwrap();
    let r2 = pool.acquire(&token).await.unwrap();
    let (id1, id2) = (PooledObject::id(&r1), PooledObject::id(&r2));

    drop(r1);
    drop(r2);

    let first = pool.acquire(&token).await.unwrap();
    let second = pool.acquire(&token).await.unwrap();
    assert_eq!(PooledObject::id(&first), id2);
    assert_eq!(PooledObject::id(&second), id1);
}

#[tokio::test]
async fn releasing_twice_does_not_duplicate() {
    let (pool, _counters) = pool_with(quiet_config());
    let mut handle = pool.acquire(&CancellationToken::new()).await.unwrap();

    pool.release(&mut handle).unwrap();
    pool.release(&mut handle).unwrap();
    handle.dispose().unwrap();

    assert_eq!(pool.available_count(), 1);
    assert_eq!(pool.active_count(), 0);
}

#[tokio::test]
async fn dispose_through_generic_code_returns_to_pool() {
    fn finish_with<R: Resource>(resource: R) {
        resource.dispose().unwrap();
    }

    let (pool, counters) = pool_with(quiet_config());
    let handle = pool.acquire(&CancellationToken::new()).await.unwrap();
    assert_eq!(handle.serial, 1);

    finish_with(handle);

    assert_eq!(pool.available_count(), 1);
    assert_eq!(counters.disposed(), 0);
}

#[tokio::test]
async fn activator_true_activates_once_per_creation() {
    let (pool, counters) = pool_with(quiet_config().with_activator(|_| true));
    let token = CancellationToken::new();

    let a = pool.acquire(&token).await.unwrap();
    let b = pool.acquire(&token).await.unwrap();
    drop(a);
    let _c = pool.acquire(&token).await.unwrap();
    drop(b);

    assert_eq!(counters.created(), 2);
    assert_eq!(counters.activated(), 2);
}

#[tokio::test]
async fn activator_false_does_not_activate() {
    let (pool, counters) = pool_with(quiet_config().with_activator(|_| false));

    let _foo = pool.acquire(&CancellationToken::new()).await.unwrap();

    assert_eq!(counters.created(), 1);
    assert_eq!(counters.activated(), 0);
}

#[tokio::test]
async fn cancelled_token_fails_before_any_work() {
    let (pool, counters) = pool_with(quiet_config());
    let token = CancellationToken::new();
    token.cancel();

    let result = pool.acquire(&token).await;

    assert!(matches!(result, Err(PoolError::Cancelled)));
    assert_eq!(counters.created(), 0);
}

#[tokio::test]
async fn factory_failure_is_wrapped() {
    let (pool, counters) = pool_with(quiet_config().with_max_objects(1));
    counters.fail_create.store(true, Ordering::SeqCst);

    let err = pool.acquire(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, PoolError::CreationFailed(_)));
    assert_eq!(err.source().unwrap().to_string(), "connection refused");
    assert_eq!(pool.active_count(), 0);

    // The admission slot was not leaked by the failure.
    counters.fail_create.store(false, Ordering::SeqCst);
    let _foo = pool.acquire(&CancellationToken::new()).await.unwrap();
    assert_eq!(pool.metrics().creation_failures, 1);
}

#[tokio::test]
async fn activation_failure_discards_resource() {
    let (pool, counters) = pool_with(quiet_config());
    counters.fail_activate.store(true, Ordering::SeqCst);

    let err = pool.acquire(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, PoolError::ActivationFailed(_)));
    assert!(err.to_string().contains("activating"));
    assert_eq!(pool.active_count(), 0);
    assert_eq!(pool.available_count(), 0);
    assert_eq!(counters.disposed(), 1);
}

#[tokio::test]
async fn timeout_expires_when_saturated() {
    let config = quiet_config()
        .with_max_objects(1)
        .with_acquisition_timeout(Duration::from_millis(500));
    let (pool, _counters) = pool_with(config);
    let token = CancellationToken::new();

    let _held = pool.acquire(&token).await.unwrap();
    assert_eq!(pool.active_count(), 1);

    let started = Instant::now();
    let result = pool.acquire(&token).await;
    let waited = started.elapsed();

    assert!(matches!(result, Err(PoolError::PoolExhausted(_))));
    assert!(waited >= Duration::from_millis(450), "gave up too early: {:?}", waited);
    assert!(waited < Duration::from_secs(3), "waited too long: {:?}", waited);
    assert_eq!(pool.metrics().exhausted_events, 1);
}

#[tokio::test]
async fn waiter_gets_released_resource() {
    let config = quiet_config()
        .with_max_objects(1)
        .with_acquisition_timeout(Duration::from_secs(5));
    let (pool, counters) = pool_with(config);
    let pool = Arc::new(pool);
    let token = CancellationToken::new();

    let held = pool.acquire(&token).await.unwrap();
    let held_id = PooledObject::id(&held);

    let releaser = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(held);
    });

    let started = Instant::now();
    let next = pool.acquire(&token).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(80));
    assert_eq!(PooledObject::id(&next), held_id);
    assert_eq!(counters.created(), 1);
    releaser.await.unwrap();
}

#[tokio::test]
async fn cancellation_while_waiting_beats_exhaustion() {
    let config = quiet_config()
        .with_max_objects(1)
        .with_acquisition_timeout(Duration::from_secs(10));
    let (pool, _counters) = pool_with(config);
    let token = CancellationToken::new();
    let _held = pool.acquire(&token).await.unwrap();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let result = pool.acquire(&token).await;

    assert!(matches!(result, Err(PoolError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn background_reclaimer_prunes() {
    let config = PoolConfiguration::new()
        .with_min_objects(0)
        .with_max_objects(1)
        .with_acquisition_timeout(Duration::from_millis(500))
        .with_sweep_interval(Duration::from_millis(100));
    let (pool, counters) = pool_with(config);

    let foo = pool.acquire(&CancellationToken::new()).await.unwrap();
    foo.dispose().unwrap();
    assert_eq!(pool.available_count(), 1);

    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(pool.available_count(), 0);
    assert_eq!(pool.active_count(), 0);
    assert_eq!(counters.disposed(), 1);
}

#[tokio::test]
async fn reclaimer_keeps_the_floor() {
    let config = PoolConfiguration::new()
        .with_min_objects(2)
        .with_max_objects(5)
        .with_sweep_interval(Duration::from_millis(50));
    let (pool, counters) = pool_with(config);
    let token = CancellationToken::new();

    let held: Vec<_> = acquire_many(&pool, &token, 4).await;
    drop(held);
    assert_eq!(pool.available_count(), 4);

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(pool.available_count(), 2);
    assert_eq!(counters.disposed(), 2);
}

async fn acquire_many(
    pool: &Pool<Foo>,
    token: &CancellationToken,
    count: usize,
) -> Vec<PooledObject<Foo>> {
    let mut held = Vec::with_capacity(count);
    for _ in 0..count {
        held.push(pool.acquire(token).await.unwrap());
    }
    held
}

#[tokio::test]
async fn shutdown_refused_with_active_resources() {
    let (pool, counters) = pool_with(quiet_config());
    let foo = pool.acquire(&CancellationToken::new()).await.unwrap();

    let err = pool.shutdown().unwrap_err();
    assert!(matches!(err, PoolError::ActiveResourcesOutstanding(1)));
    assert!(err.to_string().contains("1 active resource(s)"));
    assert!(!pool.is_shut_down());

    drop(foo);
    let kept = pool.shutdown().unwrap();

    assert!(kept.is_empty());
    assert_eq!(counters.disposed(), 1);
}

#[tokio::test]
async fn shutdown_passivator_false_keeps_resources() {
    let (pool, counters) = pool_with(quiet_config().with_passivator(|_| false));
    drop(pool.acquire(&CancellationToken::new()).await.unwrap());

    let kept = pool.shutdown().unwrap();

    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].serial, 1);
    assert_eq!(counters.disposed(), 0);
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let (pool, counters) = pool_with(quiet_config());
    drop(pool.acquire(&CancellationToken::new()).await.unwrap());

    pool.shutdown().unwrap();
    let again = pool.shutdown().unwrap();

    assert!(again.is_empty());
    assert_eq!(counters.disposed(), 1);
}

#[tokio::test]
async fn shutdown_during_creation_retires_the_new_resource() {
    let (pool, counters) = pool_with(quiet_config());
    counters.slow_activate.store(true, Ordering::SeqCst);
    let pool = Arc::new(pool);

    let acquiring = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.acquire(&CancellationToken::new()).await.map(|_| ()) })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(counters.created(), 1);

    let kept = pool.shutdown().unwrap();
    assert!(kept.is_empty());

    let result = acquiring.await.unwrap();
    assert!(matches!(result, Err(PoolError::ShutDown)));
    assert_eq!(counters.disposed(), 1);
    assert_eq!(pool.active_count(), 0);
    assert_eq!(pool.available_count(), 0);
}

#[tokio::test]
async fn shutdown_during_creation_honors_passivator() {
    let (pool, counters) = pool_with(quiet_config().with_passivator(|_| false));
    counters.slow_activate.store(true, Ordering::SeqCst);
    let pool = Arc::new(pool);

    let acquiring = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.acquire(&CancellationToken::new()).await.map(|_| ()) })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    pool.shutdown().unwrap();

    let result = acquiring.await.unwrap();
    assert!(matches!(result, Err(PoolError::ShutDown)));
    assert_eq!(counters.disposed(), 0);
    assert_eq!(pool.active_count(), 0);
}

#[tokio::test]
async fn handle_calls_reach_resource_methods() {
    let (pool, _counters) = pool_with(quiet_config());
    let mut handle = pool.acquire(&CancellationToken::new()).await.unwrap();

    assert_eq!(handle.id(), 1);
    assert_eq!(handle.id(), handle.serial);
    assert_ne!(PooledObject::id(&handle).to_string(), "1");
    assert!(!PooledObject::is_released(&handle));

    pool.release(&mut handle).unwrap();
    assert!(PooledObject::is_released(&handle));
    assert!(PooledObject::detach(handle).is_none());
}

#[tokio::test]
async fn invalid_configuration_is_rejected() {
    let counters = Arc::new(Counters::default());
    let result = Pool::new(
        FooFactory(counters),
        PoolConfiguration::new().with_min_objects(4).with_max_objects(2),
    );

    assert!(matches!(result, Err(PoolError::InvalidConfiguration(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_are_exclusive_and_bounded() {
    let config = quiet_config()
        .with_max_objects(4)
        .with_acquisition_timeout(Duration::from_secs(10));
    let (pool, counters) = pool_with(config);
    let pool = Arc::new(pool);
    let in_use = Arc::new(DashSet::new());
    let holders = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let pool = Arc::clone(&pool);
        let in_use = Arc::clone(&in_use);
        let holders = Arc::clone(&holders);
        let peak = Arc::clone(&peak);
        tasks.push(tokio::spawn(async move {
            for _ in 0..20 {
                let foo = pool.acquire(&CancellationToken::new()).await.unwrap();
                assert!(
                    in_use.insert(PooledObject::id(&foo)),
                    "resource handed to two consumers"
                );
                let holding = holders.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(holding, Ordering::SeqCst);
                tokio::task::yield_now().await;
                holders.fetch_sub(1, Ordering::SeqCst);
                in_use.remove(&PooledObject::id(&foo));
                drop(foo);
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 4);
    assert_eq!(pool.active_count(), 0);
    assert!(pool.available_count() <= counters.created());
    assert!(counters.created() <= 4);
}
