pub mod binpacking;
pub mod vcu;

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::domain::truck::Truck;
use crate::domain::types::Order;

/// What one pipeline (or one of its phases) produced.
#[derive(Debug, Default)]
pub struct PipelineResult {
    pub trucks: Vec<Truck>,
    pub assigned: BTreeSet<String>,
    pub not_included: Vec<Order>,
    pub phases: Vec<&'static str>,
    pub elapsed_ms: u128,
}

impl PipelineResult {
    pub fn absorb(&mut self, other: PipelineResult) {
        self.trucks.extend(other.trucks);
        self.assigned.extend(other.assigned);
    }
}

/// Shared state across pipeline phases: the absolute deadline, the per-group
/// budget and the monotonic set of already-assigned order ids.
#[derive(Debug)]
pub struct PhaseContext {
    pub deadline: Instant,
    /// Base per-group time budget, seconds.
    pub tpg: u64,
    pub assigned: BTreeSet<String>,
}

impl PhaseContext {
    pub fn new(timeout_secs: u64, tpg: u64) -> Self {
        PhaseContext {
            deadline: Instant::now() + Duration::from_secs(timeout_secs),
            tpg,
            assigned: BTreeSet::new(),
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// True when less than the phase margin is left; the caller skips the
    /// next phase and returns partial results.
    pub fn near_deadline(&self) -> bool {
        use crate::config::constant::DEADLINE_MARGIN_SECS;
        self.remaining().as_secs_f64() < DEADLINE_MARGIN_SECS
    }
}

/// Clone-filter helper shared by the pipelines.
pub(crate) fn filter_available(orders: &[Order], assigned: &BTreeSet<String>) -> Vec<Order> {
    orders
        .iter()
        .filter(|o| !assigned.contains(&o.id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::order_generator::basic_order;

    #[test]
    fn context_tracks_deadline() {
        let ctx = PhaseContext::new(100, 10);
        assert!(!ctx.near_deadline());
        let tight = PhaseContext::new(1, 10);
        assert!(tight.near_deadline());
    }

    #[test]
    fn filter_available_drops_assigned() {
        let orders = vec![basic_order("A", 1.0, 1.0, 1.0), basic_order("B", 1.0, 1.0, 1.0)];
        let mut assigned = BTreeSet::new();
        assigned.insert("A".to_string());
        let rest = filter_available(&orders, &assigned);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, "B");
    }
}
