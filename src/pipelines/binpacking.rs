use std::time::{Duration, Instant};

use tracing::{info, info_span, warn};

use crate::clients::ClientConfig;
use crate::domain::types::Order;
use crate::groups::{adjust_group_time, generate_groups, GroupMode};
use crate::pipelines::{filter_available, PhaseContext, PipelineResult};
use crate::solver::binpacking::optimize_group_binpacking;
use crate::strategies::truck_selector::{SelectorPhase, SelectorPolicy};
use crate::validation::cycle::run_validation_cycle;
use crate::validation::OptimizeMode;

/// Single-pass pipeline: every group goes through the truck-minimising
/// model, then one validation cycle. No adherence, no reclassification.
pub struct BinPackingPipeline<'a> {
    cfg: &'a ClientConfig,
    selector: SelectorPolicy,
}

impl<'a> BinPackingPipeline<'a> {
    pub fn new(cfg: &'a ClientConfig) -> Self {
        BinPackingPipeline {
            selector: SelectorPolicy::for_client(cfg.name),
            cfg,
        }
    }

    pub fn run(&self, orders: &[Order], timeout_secs: u64, tpg: u64) -> PipelineResult {
        let span = info_span!("pipeline_binpacking", orders = orders.len());
        let _guard = span.enter();
        let started = Instant::now();

        if orders.is_empty() {
            return PipelineResult::default();
        }

        let ctx = PhaseContext::new(timeout_secs, tpg);
        let groups = generate_groups(orders, self.cfg, GroupMode::Binpacking);

        let mut trucks = vec![];
        let mut assigned = std::collections::BTreeSet::new();

        for (group, members) in groups {
            if ctx.near_deadline() {
                warn!(group = %group.id, "deadline cercano, grupo omitido");
                break;
            }
            let allowed = self.cfg.allowed_trucks_for_route(
                &group.cd,
                &group.ce,
                group.route_type,
                group.single_flow(),
            );
            let truck_type = self
                .selector
                .select(&group, &allowed, SelectorPhase::Binpacking);
            let capacity = self.cfg.capacity_for(truck_type);

            let budget = Duration::from_secs(adjust_group_time(ctx.tpg, members.len()))
                .min(ctx.remaining());
            let outcome = optimize_group_binpacking(
                &members,
                &group,
                self.cfg,
                &capacity,
                budget,
                truck_type,
            );
            if outcome.is_usable() && !outcome.trucks.is_empty() {
                assigned.extend(outcome.assigned_ids.iter().cloned());
                trucks.extend(outcome.trucks);
            }
        }

        let cycle =
            run_validation_cycle(trucks, self.cfg, OptimizeMode::Binpacking, "binpacking");

        let mut result = PipelineResult {
            assigned: cycle.assigned,
            trucks: cycle.trucks,
            ..PipelineResult::default()
        };
        result.not_included = filter_available(orders, &result.assigned);
        result.phases.push("binpacking");
        result.elapsed_ms = started.elapsed().as_millis();

        info!(
            trucks = result.trucks.len(),
            assigned = result.assigned.len(),
            not_included = result.not_included.len(),
            "pipeline binpacking terminado"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients;
    use crate::fixtures::order_generator::basic_order;

    fn cencosud_order(id: &str, weight: f64, volume: f64, pallets: f64) -> Order {
        let mut o = basic_order(id, weight, volume, pallets);
        o.cd = "N725 Bodega Noviciado".into();
        o.ce = "0079".into();
        o
    }

    #[test]
    fn all_viable_orders_get_assigned() {
        let cfg = clients::get("cencosud").unwrap().effective(None);
        let orders: Vec<Order> = (0..31)
            .map(|i| cencosud_order(&format!("P{i:02}"), 500.0, 2.0, 1.0))
            .collect();

        let result = BinPackingPipeline::new(&cfg).run(&orders, 60, 5);
        assert!(result.trucks.len() >= 1);
        assert_eq!(result.assigned.len(), 31);
        assert!(result.not_included.is_empty());
    }

    #[test]
    fn only_individually_oversized_orders_stay_out() {
        let cfg = clients::get("cencosud").unwrap().effective(None);
        let mut orders = vec![cencosud_order("BIG", 40_000.0, 100.0, 2.0)];
        orders.extend((0..5).map(|i| cencosud_order(&format!("P{i}"), 500.0, 2.0, 1.0)));

        let result = BinPackingPipeline::new(&cfg).run(&orders, 60, 5);
        assert_eq!(result.not_included.len(), 1);
        assert_eq!(result.not_included[0].id, "BIG");
        assert_eq!(result.assigned.len(), 5);
    }

    #[test]
    fn empty_input_is_empty_output() {
        let cfg = clients::get("cencosud").unwrap().effective(None);
        let result = BinPackingPipeline::new(&cfg).run(&[], 60, 5);
        assert!(result.trucks.is_empty());
        assert!(result.not_included.is_empty());
    }
}
