use std::time::Duration;

use tracing::{debug, info_span};

use crate::clients::ClientConfig;
use crate::config;
use crate::config::constant::VCU_TRUCK_SLACK;
use crate::domain::types::{GroupConfig, Order, RouteType, TruckCapacity, TruckType};
use crate::solver::engine::{self, SolveStatus};
use crate::solver::model::{
    ffd_estimate, po_bundles, scale_capacity, scale_orders, AssignmentModel, Objective,
};
use crate::solver::output::{decode_solution, split_oversized, GroupSolveOutcome};

/// Drive one group through the utilisation-maximising model.
pub fn optimize_group_vcu(
    orders: &[Order],
    group: &GroupConfig,
    cfg: &ClientConfig,
    capacity: &TruckCapacity,
    time_limit: Duration,
    truck_type: TruckType,
) -> GroupSolveOutcome {
    let span = info_span!("solver_vcu", group = %group.id, orders = orders.len());
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
        .saturating_add(VCU_TRUCK_SLACK)
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
        objective: Objective::MaximizeVcu,
        require_all: false,
        enforce_min_vcu: true,
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
        return outcome;
    }

    let mut outcome = decode_solution(&solution, &viable, group, capacity, truck_type);
    outcome.excluded.extend(oversized);
    debug!(
        trucks = outcome.trucks.len(),
        assigned = outcome.assigned_ids.len(),
        excluded = outcome.excluded.len(),
        status = ?outcome.status,
        "grupo resuelto"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients;
    use crate::domain::types::FlowFilter;
    use crate::fixtures::order_generator::basic_order;

    fn group() -> GroupConfig {
        GroupConfig::new(
            RouteType::Normal,
            vec!["CD1".into()],
            vec!["0079".into()],
            FlowFilter::Any,
        )
    }

    fn capacity(min_vcu: f64) -> TruckCapacity {
        TruckCapacity {
            min_vcu,
            ..TruckCapacity::default()
        }
    }

    #[test]
    fn single_order_below_floor_ends_excluded() {
        let cfg = clients::get("cencosud").unwrap();
        // vcu_max = max(1000/23000, 10000/70000) ≈ 0.143 < 0.2.
        let orders = vec![basic_order("P1", 1_000.0, 10_000.0, 2.0)];
        let outcome = optimize_group_vcu(
            &orders,
            &group(),
            &cfg,
            &capacity(0.2),
            Duration::from_secs(2),
            TruckType::Paquetera,
        );
        assert!(outcome.trucks.is_empty());
        assert_eq!(outcome.excluded.len(), 1);
    }

    #[test]
    fn single_order_above_floor_gets_one_truck() {
        let cfg = clients::get("cencosud").unwrap();
        let orders = vec![basic_order("P1", 1_000.0, 10_000.0, 2.0)];
        let outcome = optimize_group_vcu(
            &orders,
            &group(),
            &cfg,
            &capacity(0.1),
            Duration::from_secs(2),
            TruckType::Paquetera,
        );
        assert_eq!(outcome.trucks.len(), 1);
        assert!(outcome.excluded.is_empty());
        let vcu = outcome.trucks[0].vcu_max();
        assert!((vcu - 10_000.0 / 70_000.0).abs() < 1e-6);
    }

    #[test]
    fn po_grouping_keeps_pairs_together() {
        let cfg = clients::get("cencosud").unwrap();
        assert!(cfg.agrupar_por_po);

        let mut x1 = basic_order("X1", 8_000.0, 20_000.0, 8.0);
        let mut x2 = basic_order("X2", 8_000.0, 20_000.0, 8.0);
        let x3 = basic_order("X3", 8_000.0, 20_000.0, 8.0);
        x1.po = "PO_SAME".into();
        x2.po = "PO_SAME".into();

        let outcome = optimize_group_vcu(
            &[x1, x2, x3],
            &group(),
            &cfg,
            &capacity(0.3),
            Duration::from_secs(2),
            TruckType::Paquetera,
        );

        let truck_of = |id: &str| -> Option<usize> {
            outcome
                .trucks
                .iter()
                .position(|t| t.orders().iter().any(|o| o.id == id))
        };
        match (truck_of("X1"), truck_of("X2")) {
            (Some(a), Some(b)) => assert_eq!(a, b, "shared PO split across trucks"),
            (None, None) => {}
            other => panic!("PO pair partially assigned: {other:?}"),
        }
    }

    #[test]
    fn base_and_superior_pair_into_one_position() {
        use crate::fixtures::order_generator::basic_sku;
        use crate::validation::truck_validator::validate_single_truck;

        let cfg = clients::get("cencosud").unwrap();

        let mut a = basic_order("A", 900.0, 2_000.0, 1.0);
        a.base = 1.0;
        let mut sku_a = basic_sku(&a, "SKU_A", 150.0);
        sku_a.base = 1.0;
        a.skus = vec![sku_a];

        let mut b = basic_order("B", 700.0, 1_500.0, 1.0);
        b.base = 0.0;
        b.superior = 1.0;
        let mut sku_b = basic_sku(&b, "SKU_B", 100.0);
        sku_b.base = 0.0;
        sku_b.superior = 1.0;
        b.skus = vec![sku_b];

        let outcome = optimize_group_vcu(
            &[a, b],
            &group(),
            &cfg,
            &capacity(0.01),
            Duration::from_secs(2),
            TruckType::Paquetera,
        );
        assert_eq!(outcome.trucks.len(), 1);
        // The solver's stacking formula pairs one base with one superior.
        assert_eq!(outcome.trucks[0].pos_total, 1.0);

        // The physical layout agrees: position 0 holds both pallets.
        let mut truck = outcome.trucks.into_iter().next().unwrap();
        validate_single_truck(&mut truck, &cfg);
        let info = truck.layout_info.as_ref().unwrap();
        assert!(info.altura_validada);
        assert_eq!(info.posiciones_usadas, 1);
        assert_eq!(truck.pos_total, 1.0);
        assert!((info.altura_maxima_usada_cm - 250.0).abs() < 1e-6);
    }

    #[test]
    fn oversized_orders_are_reported_not_modeled() {
        let cfg = clients::get("cencosud").unwrap();
        let giant = basic_order("P1", 90_000.0, 100.0, 2.0);
        let outcome = optimize_group_vcu(
            &[giant],
            &group(),
            &cfg,
            &capacity(0.1),
            Duration::from_secs(2),
            TruckType::Paquetera,
        );
        assert!(outcome.trucks.is_empty());
        assert_eq!(outcome.excluded.len(), 1);
    }
}
