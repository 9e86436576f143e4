//! Metrics collection and export for resource pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use lagoon::{BoxError, Pool, PoolConfiguration, Resource, ResourceFactory};
/// use tokio_util::sync::CancellationToken;
///
/// struct Session;
/// impl Resource for Session {}
///
/// struct Sessions;
/// impl ResourceFactory<Session> for Sessions {
///     fn create(&self) -> Result<Session, BoxError> {
///         Ok(Session)
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() {
/// let pool = Pool::new(Sessions, PoolConfiguration::default()).unwrap();
/// {
///     let _session = pool.acquire(&CancellationToken::new()).await.unwrap();
///     let metrics = pool.metrics();
///     assert_eq!(metrics.total_created, 1);
///     assert_eq!(metrics.active_resources, 1);
/// }
/// assert_eq!(pool.metrics().total_released, 1);
/// # }
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Resources created by the factory
    pub total_created: usize,

    /// Checkouts served by an idle resource
    pub total_reused: usize,

    /// Resources returned to the pool
    pub total_released: usize,

    /// Resources torn down by the reclaimer or on shutdown
    pub total_destroyed: usize,

    /// Factory construction failures
    pub creation_failures: usize,

    /// Factory activation failures
    pub activation_failures: usize,

    /// Acquisitions that found the pool saturated and had to wait
    pub saturated_waits: usize,

    /// Waits that ended in a timeout
    pub exhausted_events: usize,

    /// Current checked out resources
    pub active_resources: usize,

    /// Current idle resources
    pub available_resources: usize,

    /// Active resources relative to the admission bound (0.0 to 1.0)
    pub utilization: f64,

    /// Admission bound
    pub max_objects: usize,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_reused".to_string(), self.total_reused.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("total_destroyed".to_string(), self.total_destroyed.to_string());
        metrics.insert("creation_failures".to_string(), self.creation_failures.to_string());
        metrics.insert("activation_failures".to_string(), self.activation_failures.to_string());
        metrics.insert("saturated_waits".to_string(), self.saturated_waits.to_string());
        metrics.insert("exhausted_events".to_string(), self.exhausted_events.to_string());
        metrics.insert("active_resources".to_string(), self.active_resources.to_string());
        metrics.insert("available_resources".to_string(), self.available_resources.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert("max_objects".to_string(), self.max_objects.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let labels = Self::format_labels(pool_name, tags);
        let mut output = String::new();

        let gauges = [
            (
                "lagoon_resources_active",
                "Current checked out resources",
                metrics.active_resources as f64,
            ),
            (
                "lagoon_resources_available",
                "Current idle resources",
                metrics.available_resources as f64,
            ),
            (
                "lagoon_utilization",
                "Active resources relative to the admission bound",
                metrics.utilization,
            ),
        ];
        for (name, help, value) in gauges {
            output.push_str(&format!("# HELP {} {}\n", name, help));
            output.push_str(&format!("# TYPE {} gauge\n", name));
            output.push_str(&format!("{}{{{}}} {}\n", name, labels, value));
        }

        let counters = [
            (
                "lagoon_resources_created_total",
                "Resources created by the factory",
                metrics.total_created,
            ),
            (
                "lagoon_resources_reused_total",
                "Checkouts served by an idle resource",
                metrics.total_reused,
            ),
            (
                "lagoon_resources_released_total",
                "Resources returned to the pool",
                metrics.total_released,
            ),
            ("lagoon_resources_destroyed_total", "Resources torn down", metrics.total_destroyed),
            (
                "lagoon_creation_failures_total",
                "Factory construction failures",
                metrics.creation_failures,
            ),
            (
                "lagoon_activation_failures_total",
                "Factory activation failures",
                metrics.activation_failures,
            ),
            (
                "lagoon_saturated_waits_total",
                "Acquisitions that waited on a saturated pool",
                metrics.saturated_waits,
            ),
            (
                "lagoon_events_exhausted_total",
                "Acquisitions that timed out",
                metrics.exhausted_events,
            ),
        ];
        for (name, help, value) in counters {
            output.push_str(&format!("# HELP {} {}\n", name, help));
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{}{{{}}} {}\n", name, labels, value));
        }

        output
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut tags: Vec<_> = tags.iter().collect();
            tags.sort();
            for (key, value) in tags {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub created: AtomicUsize,
    pub reused: AtomicUsize,
    pub released: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub creation_failures: AtomicUsize,
    pub activation_failures: AtomicUsize,
    pub saturated_waits: AtomicUsize,
    pub exhausted_events: AtomicUsize,
}

impl MetricsTracker {
    pub fn get_metrics(&self, active: usize, available: usize, max_objects: usize) -> PoolMetrics {
        let utilization = if max_objects > 0 {
            (active as f64 / max_objects as f64).min(1.0)
        } else {
            0.0
        };

        PoolMetrics {
            total_created: self.created.load(Ordering::Relaxed),
            total_reused: self.reused.load(Ordering::Relaxed),
            total_released: self.released.load(Ordering::Relaxed),
            total_destroyed: self.destroyed.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            activation_failures: self.activation_failures.load(Ordering::Relaxed),
            saturated_waits: self.saturated_waits.load(Ordering::Relaxed),
            exhausted_events: self.exhausted_events.load(Ordering::Relaxed),
            active_resources: active,
            available_resources: available,
            utilization,
            max_objects,
        }
    }
}
