//! # Lagoon
//!
//! Generic, thread-safe async pool for expensive-to-create, reusable
//! resources such as connections or large buffers.
//!
//! ## Features
//!
//! - Bounded concurrent checkouts with a configurable wait timeout
//! - Most-recently-released reuse to keep a warm working set
//! - Transparent return: dropping or disposing a handle gives the resource back
//! - Asynchronous activation hook for freshly created resources
//! - Background reclaimer that trims idle resources down to a floor
//! - Cooperative cancellation via `CancellationToken`
//! - Metrics and Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use lagoon::{BoxError, Pool, PoolConfiguration, Resource, ResourceFactory};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Connection {
//!     peer: String,
//! }
//!
//! impl Resource for Connection {}
//!
//! struct ConnectionFactory;
//!
//! impl ResourceFactory<Connection> for ConnectionFactory {
//!     fn create(&self) -> Result<Connection, BoxError> {
//!         Ok(Connection { peer: "db:5432".to_string() })
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let pool = Pool::new(ConnectionFactory, PoolConfiguration::default()).unwrap();
//! {
//!     let conn = pool.acquire(&CancellationToken::new()).await.unwrap();
//!     println!("Talking to {}", conn.peer);
//!     // Connection automatically returned when `conn` goes out of scope
//! }
//! assert_eq!(pool.available_count(), 1);
//! # }
//! ```

mod config;
mod errors;
mod factory;
mod metrics;
mod pool;
mod pooled;
mod reclaimer;

pub use config::PoolConfiguration;
pub use errors::{BoxError, PoolError, PoolResult, SharedError};
pub use factory::{Resource, ResourceFactory};
pub use metrics::{MetricsExporter, PoolMetrics};
pub use pool::Pool;
pub use pooled::PooledObject;
