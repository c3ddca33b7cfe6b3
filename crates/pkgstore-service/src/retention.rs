//! Snapshot retention selection
//!
//! Selection only; callers decide whether to purge the candidates.

use chrono::{DateTime, Duration, Utc};
use pkgstore_core::Component;
use pkgstore_db::ContentStore;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{ServiceError, ServiceResult};

/// Picks snapshot components that may be removed
#[derive(Clone)]
pub struct SnapshotRetention {
    store: Arc<dyn ContentStore>,
}

impl SnapshotRetention {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// All but the newest `minimum_retained` components of each snapshot line
    #[instrument(skip(self), fields(repository = %self.store.repository().name))]
    pub async fn find_snapshot_candidates(
        &self,
        minimum_retained: u32,
    ) -> ServiceResult<Vec<Component>> {
        let lines = self.store.find_snapshot_lines(minimum_retained).await?;
        let mut candidates = Vec::new();

        for line in lines {
            let components = self
                .store
                .find_line_components(&line.namespace, &line.name, &line.base_version)
                .await?;
            debug!(
                line = %format!("{}:{}:{}", line.namespace, line.name, line.base_version),
                held = components.len(),
                "Snapshot line over retention"
            );
            candidates.extend(components.into_iter().skip(minimum_retained as usize));
        }

        Ok(candidates)
    }

    /// Every component of snapshot lines released at least `grace` before `now`
    #[instrument(skip(self, now), fields(repository = %self.store.repository().name))]
    pub async fn find_snapshots_after_release(
        &self,
        grace: Duration,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<Component>> {
        if grace < Duration::zero() {
            return Err(ServiceError::ValidationFailed(format!(
                "grace period cannot be negative: {}",
                grace
            )));
        }

        let released = self.store.find_released_snapshot_lines().await?;
        let mut candidates = Vec::new();

        for line in released {
            if line.released_at + grace > now {
                debug!(
                    line = %format!("{}:{}:{}", line.namespace, line.name, line.base_version),
                    released_at = %line.released_at,
                    "Release still within grace period"
                );
                continue;
            }
            let components = self
                .store
                .find_line_components(&line.namespace, &line.name, &line.base_version)
                .await?;
            candidates.extend(components);
        }

        Ok(candidates)
    }
}
