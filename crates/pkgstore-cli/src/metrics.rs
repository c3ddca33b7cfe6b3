//! Prometheus metrics
//!
//! Gauges mirror blob store and repository usage; counters and histograms
//! track content operations run by this process.

use once_cell::sync::Lazy;
use pkgstore_blob::BlobStoreMetrics;
use pkgstore_service::{RepositoryRegistry, RepositoryUsage, ServiceResult};
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, Encoder,
    HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder,
};
use std::time::Instant;

/// Promoted blobs per store
pub static BLOB_COUNT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!("pkgstore_blob_count", "Number of promoted blobs", &["store"])
        .expect("Failed to create blob count gauge")
});

/// Bytes held by promoted blobs
pub static BLOB_TOTAL_BYTES: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pkgstore_blob_total_bytes",
        "Total size of promoted blobs in bytes",
        &["store"]
    )
    .expect("Failed to create blob size gauge")
});

/// Staged blobs not yet promoted or discarded
pub static BLOB_TEMP_COUNT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pkgstore_blob_temp_count",
        "Number of staged temporary blobs",
        &["store"]
    )
    .expect("Failed to create temporary blob gauge")
});

/// Usable space per backing volume
pub static BLOB_AVAILABLE_BYTES: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pkgstore_blob_available_bytes",
        "Usable space per volume in bytes",
        &["store", "volume"]
    )
    .expect("Failed to create available space gauge")
});

/// Components per repository
pub static REPOSITORY_COMPONENTS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pkgstore_repository_components",
        "Number of components in a repository",
        &["repository"]
    )
    .expect("Failed to create repository components gauge")
});

/// Assets per repository
pub static REPOSITORY_ASSETS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pkgstore_repository_assets",
        "Number of assets in a repository",
        &["repository"]
    )
    .expect("Failed to create repository assets gauge")
});

/// Content operations by outcome
pub static CONTENT_OPERATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pkgstore_content_operations_total",
        "Total number of content operations",
        &["repository", "operation", "status"]
    )
    .expect("Failed to create content operations counter")
});

/// Content operation duration
pub static CONTENT_OPERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "pkgstore_content_operation_duration_seconds",
        "Content operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to create content operation duration histogram")
});

/// Build information
pub static PKGSTORE_INFO: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!("pkgstore_info", "pkgstore build information", &["version"])
        .expect("Failed to create info gauge")
});

/// Initialize metrics
pub fn init_metrics() {
    Lazy::force(&BLOB_COUNT);
    Lazy::force(&BLOB_TOTAL_BYTES);
    Lazy::force(&BLOB_TEMP_COUNT);
    Lazy::force(&BLOB_AVAILABLE_BYTES);
    Lazy::force(&REPOSITORY_COMPONENTS);
    Lazy::force(&REPOSITORY_ASSETS);
    Lazy::force(&CONTENT_OPERATIONS_TOTAL);
    Lazy::force(&CONTENT_OPERATION_DURATION);
    Lazy::force(&PKGSTORE_INFO);

    PKGSTORE_INFO
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1);

    tracing::debug!("Metrics initialized");
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Failed to convert metrics to string: {}", e))
}

/// Timer for measuring operation duration
pub struct MetricsTimer {
    start: Instant,
    histogram: HistogramVec,
    labels: Vec<String>,
}

impl MetricsTimer {
    pub fn new(histogram: HistogramVec, labels: Vec<String>) -> Self {
        Self {
            start: Instant::now(),
            histogram,
            labels,
        }
    }

    /// Time one content operation
    pub fn operation(operation: &str) -> Self {
        Self::new(CONTENT_OPERATION_DURATION.clone(), vec![operation.to_string()])
    }

    /// Stop the timer and record the duration
    pub fn stop(self) {
        let duration = self.start.elapsed();
        let label_refs: Vec<&str> = self.labels.iter().map(|s| s.as_str()).collect();

        self.histogram
            .with_label_values(&label_refs)
            .observe(duration.as_secs_f64());
    }
}

/// Record a content operation
pub fn record_operation(repository: &str, operation: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    CONTENT_OPERATIONS_TOTAL
        .with_label_values(&[repository, operation, status])
        .inc();
}

/// Update blob store gauges
pub fn update_blob_metrics(store: &str, metrics: &BlobStoreMetrics) {
    BLOB_COUNT
        .with_label_values(&[store])
        .set(metrics.blob_count as i64);
    BLOB_TOTAL_BYTES
        .with_label_values(&[store])
        .set(metrics.total_size as i64);
    BLOB_TEMP_COUNT
        .with_label_values(&[store])
        .set(metrics.temp_count as i64);

    for (volume, available) in &metrics.available_space {
        BLOB_AVAILABLE_BYTES
            .with_label_values(&[store, volume])
            .set(i64::try_from(*available).unwrap_or(i64::MAX));
    }
}

/// Update per-repository gauges
pub fn update_repository_usage(repository: &str, usage: &RepositoryUsage) {
    REPOSITORY_COMPONENTS
        .with_label_values(&[repository])
        .set(usage.components);
    REPOSITORY_ASSETS
        .with_label_values(&[repository])
        .set(usage.assets);
}

/// Refresh every gauge from the current state of the registry
pub async fn update_from(registry: &RepositoryRegistry) -> ServiceResult<()> {
    update_blob_metrics(registry.blob_store().name(), &registry.blob_metrics());
    for (name, usage) in registry.usage().await? {
        update_repository_usage(&name, &usage);
    }
    Ok(())
}
