//! Bundle of collaborator handles passed to the incident pipeline.

use std::sync::Arc;

use crate::service::{InventoryService, MetricsService, RemediationExecutor};
use crate::simulated::{SimulatedExecutor, SimulatedInventory, SimulatedMetrics};

/// Region reported by the simulated inventory.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Shared, read-only collaborator handles.
#[derive(Clone)]
pub struct Toolkit {
    inventory: Arc<dyn InventoryService>,
    metrics: Arc<dyn MetricsService>,
    executor: Arc<dyn RemediationExecutor>,
}

impl Toolkit {
    pub fn new(
        inventory: Arc<dyn InventoryService>,
        metrics: Arc<dyn MetricsService>,
        executor: Arc<dyn RemediationExecutor>,
    ) -> Self {
        Self {
            inventory,
            metrics,
            executor,
        }
    }

    /// Simulated collaborators, reproducible when a seed is given.
    pub fn simulated(seed: Option<u64>) -> Self {
        // Offset the seeds so the three generators don't share a sequence.
        let offset = |n: u64| seed.map(|s| s.wrapping_add(n));
        Self::new(
            Arc::new(SimulatedInventory::new(DEFAULT_REGION, offset(0))),
            Arc::new(SimulatedMetrics::new(offset(1))),
            Arc::new(SimulatedExecutor::new(offset(2))),
        )
    }

    pub fn inventory(&self) -> &dyn InventoryService {
        self.inventory.as_ref()
    }

    pub fn metrics(&self) -> &dyn MetricsService {
        self.metrics.as_ref()
    }

    pub fn executor(&self) -> &dyn RemediationExecutor {
        self.executor.as_ref()
    }
}

impl std::fmt::Debug for Toolkit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolkit").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmm_core::metric;

    #[tokio::test]
    async fn test_simulated_toolkit_is_reproducible() {
        let a = Toolkit::simulated(Some(9));
        let b = Toolkit::simulated(Some(9));

        let sa = a.metrics().analyze("acme-01", metric::CPU_UTILIZATION, "1h").await.unwrap();
        let sb = b.metrics().analyze("acme-01", metric::CPU_UTILIZATION, "1h").await.unwrap();
        assert_eq!(sa.current_value, sb.current_value);

        let ia = a.inventory().query("acme-01", None).await.unwrap();
        let ib = b.inventory().query("acme-01", None).await.unwrap();
        assert_eq!(ia.instances, ib.instances);
    }
}
