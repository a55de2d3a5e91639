//! Simulation metrics.

use std::collections::BTreeMap;

/// Attempt counts for one operation kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationCounts {
    pub successful: u64,
    pub failed: u64,
}

/// Simulation metrics.
#[derive(Debug, Clone, Default)]
pub struct SimulationMetrics {
    /// Total operations attempted.
    pub total_operations: u64,
    /// Successful operations.
    pub successful_operations: u64,
    /// Failed operations.
    pub failed_operations: u64,
    /// Counts per operation kind.
    by_kind: BTreeMap<&'static str, OperationCounts>,
    /// Failures per error code.
    failures_by_code: BTreeMap<&'static str, u64>,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful operation.
    pub fn record_success(&mut self, kind: &'static str) {
        self.total_operations += 1;
        self.successful_operations += 1;
        self.by_kind.entry(kind).or_default().successful += 1;
    }

    /// Record a failed operation.
    pub fn record_failure(&mut self, kind: &'static str, code: &'static str) {
        self.total_operations += 1;
        self.failed_operations += 1;
        self.by_kind.entry(kind).or_default().failed += 1;
        *self.failures_by_code.entry(code).or_insert(0) += 1;
    }

    /// Counts for one operation kind.
    #[allow(dead_code)]
    pub fn for_kind(&self, kind: &str) -> OperationCounts {
        self.by_kind.get(kind).cloned().unwrap_or_default()
    }

    /// Per-kind counts in name order.
    pub fn kinds(&self) -> impl Iterator<Item = (&&'static str, &OperationCounts)> {
        self.by_kind.iter()
    }

    /// Failure counts per error code in code order.
    pub fn failure_codes(&self) -> impl Iterator<Item = (&&'static str, &u64)> {
        self.failures_by_code.iter()
    }

    /// Get success rate.
    pub fn success_rate(&self) -> f64 {
        if self.total_operations == 0 {
            return 0.0;
        }

        self.successful_operations as f64 / self.total_operations as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let mut metrics = SimulationMetrics::new();

        metrics.record_success("deposit");
        metrics.record_success("deposit");
        metrics.record_success("transfer");
        metrics.record_failure("withdraw", "INSUFFICIENT_BALANCE");

        assert_eq!(metrics.total_operations, 4);
        assert_eq!(metrics.successful_operations, 3);
        assert_eq!(metrics.failed_operations, 1);
        assert_eq!(metrics.success_rate(), 0.75);
        assert_eq!(
            metrics.for_kind("deposit"),
            OperationCounts { successful: 2, failed: 0 }
        );
        assert_eq!(
            metrics.failure_codes().collect::<Vec<_>>(),
            vec![(&"INSUFFICIENT_BALANCE", &1)]
        );
    }
}
