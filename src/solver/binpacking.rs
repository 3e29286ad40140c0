use std::time::Duration;

use tracing::{debug, info_span};

use crate::clients::ClientConfig;
use crate::config;
use crate::config::constant::BINPACKING_TRUCK_SLACK;
use crate::domain::types::{GroupConfig, Order, RouteType, TruckCapacity, TruckType};
use crate::solver::engine::{self, SolveStatus};
use crate::solver::model::{
    ffd_estimate, po_bundles, scale_capacity, scale_orders, AssignmentModel, Objective,
};
use crate::solver::output::{
    decode_solution, split_oversized, ExclusionReason, GroupSolveOutcome,
};

/// Drive one group through the truck-count-minimising model. Every viable
/// order must be placed; only individually-oversized orders stay out.
pub fn optimize_group_binpacking(
    orders: &[Order],
    group: &GroupConfig,
    cfg: &ClientConfig,
    capacity: &TruckCapacity,
    time_limit: Duration,
    truck_type: TruckType,
) -> GroupSolveOutcome {
    let span = info_span!("solver_binpacking", group = %group.id, orders = orders.len());
    let _guard = span.enter();

    if orders.is_empty() {
        return GroupSolveOutcome::empty(SolveStatus::NoSolution);
    }

    let (viable, oversized) = split_oversized(orders, capacity);
    if viable.is_empty() {
        let mut outcome = GroupSolveOutcome::empty(SolveStatus::NoSolution);
        outcome.excluded = oversized;
        return outcome;
    }

    let n_trucks = ffd_estimate(&viable, capacity)
        .saturating_add(BINPACKING_TRUCK_SLACK)
        .min(viable.len())
        .min(config::max_trucks());

    let scaled = scale_orders(&viable, capacity);
    let bundles = if cfg.agrupar_por_po {
        po_bundles(&scaled)
    } else {
        vec![]
    };
    let multi_cd_caps = if group.route_type == RouteType::MultiCd {
        cfg.multi_cd_caps
    } else {
        None
    };

    let model = AssignmentModel {
        capacity: scale_capacity(capacity),
        orders: scaled,
        n_trucks,
        objective: Objective::MinimizeTrucks,
        require_all: true,
        enforce_min_vcu: false,
        po_bundles: bundles,
        max_orders_per_truck: if multi_cd_caps.is_some() {
            None
        } else {
            cfg.max_ordenes
        },
        multi_cd_caps,
        enforce_stacking: true,
    };

    let solution = engine::solve(&model, time_limit);
    if solution.status == SolveStatus::NoSolution {
        let mut outcome = GroupSolveOutcome::empty(SolveStatus::NoSolution);
        outcome.excluded = oversized;
        outcome
            .excluded
            .extend(viable.into_iter().map(|order| {
                crate::solver::output::ExcludedOrder {
                    order,
                    reason: ExclusionReason::SinSolucion,
                }
            }));
        return outcome;
    }

    let mut outcome = decode_solution(&solution, &viable, group, capacity, truck_type);
    outcome.excluded.extend(oversized);
    debug!(
        trucks = outcome.trucks.len(),
        assigned = outcome.assigned_ids.len(),
        status = ?outcome.status,
        "grupo empaquetado"
    );
    outcome
}
