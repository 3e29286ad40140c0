use std::collections::BTreeSet;

use itertools::Itertools;
use tracing::{debug, info_span};

use crate::clients::ClientConfig;
use crate::config::constant::{MAX_ADJUST_ITERATIONS, MAX_REMOVAL_COMBO};
use crate::domain::truck::Truck;
use crate::domain::types::Order;
use crate::validation::truck_validator::validate_single_truck;
use crate::validation::OptimizeMode;

#[derive(Debug)]
pub struct AdjustmentResult {
    pub valid_trucks: Vec<Truck>,
    pub removed_orders: Vec<Order>,
    pub disarmed: usize,
}

/// Repair invalid trucks by removing the orders whose fragment counts match
/// the failed placements, re-validating after each removal. Trucks that stay
/// invalid are disarmed: every order goes back to the pool.
pub fn adjust_trucks(
    trucks: Vec<Truck>,
    mode: OptimizeMode,
    cfg: &ClientConfig,
) -> AdjustmentResult {
    let span = info_span!("ajuste_post_validacion", trucks = trucks.len());
    let _guard = span.enter();

    let mut removed_orders: Vec<Order> = vec![];
    let mut valid_trucks = vec![];
    let mut disarmed = 0;

    for mut truck in trucks {
        if truck.failed_validation() {
            adjust_single_truck(&mut truck, mode, cfg, &mut removed_orders);
        }
        // Unvalidated trucks (no layout_info) pass through untouched.
        if truck.failed_validation() {
            debug!(truck = %truck.id, orders = truck.orders().len(), "camión desarmado");
            removed_orders.extend(truck.remove_all_orders());
            disarmed += 1;
        } else {
            valid_trucks.push(truck);
        }
    }

    debug!(
        valid = valid_trucks.len(),
        removed = removed_orders.len(),
        disarmed,
        "ajuste terminado"
    );
    AdjustmentResult {
        valid_trucks,
        removed_orders,
        disarmed,
    }
}

fn adjust_single_truck(
    truck: &mut Truck,
    mode: OptimizeMode,
    cfg: &ClientConfig,
    removed_orders: &mut Vec<Order>,
) {
    for _ in 0..MAX_ADJUST_ITERATIONS {
        let failed = truck
            .layout_info
            .as_ref()
            .map_or(0, |info| info.fragmentos_fallidos.len());
        if failed == 0 {
            break;
        }

        let mut selection = select_orders_to_remove(truck, failed, false);
        if selection.is_empty() && mode == OptimizeMode::Binpacking {
            // Bin-packing has no VCU floor to protect; force the removal.
            selection = select_orders_to_remove(truck, failed, true);
        }
        if selection.is_empty() {
            break;
        }

        removed_orders.extend(truck.remove_orders(&selection));
        validate_single_truck(truck, cfg);

        if truck.is_validated() {
            break;
        }
    }
}

/// Pick the cheapest set of orders whose fragment counts cover the failed
/// placements: exact single order, exact combination, then the closest
/// approximation. Removal must keep the truck's VCU above the floor unless
/// forced.
fn select_orders_to_remove(truck: &Truck, target: usize, force: bool) -> BTreeSet<String> {
    let orders = truck.orders();
    if orders.is_empty() {
        return BTreeSet::new();
    }

    // Removing volume hurts less when weight is the binding dimension.
    let impact = |o: &Order| -> f64 {
        if truck.vcu_vol() >= truck.vcu_peso() {
            o.volume_m3
        } else {
            o.weight_kg
        }
    };
    let data: Vec<(usize, usize, f64)> = orders
        .iter()
        .enumerate()
        .map(|(idx, o)| (idx, o.fragment_count(), impact(o)))
        .collect();

    // Exact single order.
    let single = data
        .iter()
        .filter(|(_, frags, _)| *frags == target)
        .min_by(|a, b| a.2.total_cmp(&b.2));
    if let Some(&(idx, _, _)) = single {
        let selection = BTreeSet::from([orders[idx].id.clone()]);
        if removal_keeps_vcu(truck, &selection, force) {
            return selection;
        }
    }

    let max_combo = MAX_REMOVAL_COMBO.min(data.len());

    // Exact combinations, cheapest first.
    let mut exact: Vec<(Vec<usize>, f64)> = vec![];
    for r in 2..=max_combo {
        for combo in data.iter().combinations(r) {
            let frags: usize = combo.iter().map(|(_, f, _)| f).sum();
            if frags == target {
                let cost: f64 = combo.iter().map(|(_, _, c)| c).sum();
                exact.push((combo.iter().map(|(i, _, _)| *i).collect(), cost));
            }
        }
    }
    exact.sort_by(|a, b| a.1.total_cmp(&b.1));
    for (indices, _) in &exact {
        let selection: BTreeSet<String> =
            indices.iter().map(|&i| orders[i].id.clone()).collect();
        if removal_keeps_vcu(truck, &selection, force) {
            return selection;
        }
    }

    // Best approximation: smallest fragment-count difference, then impact.
    let mut approx: Vec<(Vec<usize>, usize, f64)> = vec![];
    for r in 1..=max_combo {
        for combo in data.iter().combinations(r) {
            let frags: usize = combo.iter().map(|(_, f, _)| f).sum();
            let diff = frags.abs_diff(target);
            let cost: f64 = combo.iter().map(|(_, _, c)| c).sum();
            approx.push((combo.iter().map(|(i, _, _)| *i).collect(), diff, cost));
        }
    }
    approx.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.2.total_cmp(&b.2)));
    for (indices, _, _) in &approx {
        let selection: BTreeSet<String> =
            indices.iter().map(|&i| orders[i].id.clone()).collect();
        if removal_keeps_vcu(truck, &selection, force) {
            return selection;
        }
    }

    BTreeSet::new()
}

fn removal_keeps_vcu(truck: &Truck, selection: &BTreeSet<String>, force: bool) -> bool {
    let remaining = truck.orders().len() - selection.len();
    if remaining == 0 {
        return false;
    }
    if force {
        return true;
    }
    let weight: f64 = truck
        .orders()
        .iter()
        .filter(|o| !selection.contains(&o.id))
        .map(|o| o.weight_kg)
        .sum();
    let volume: f64 = truck
        .orders()
        .iter()
        .filter(|o| !selection.contains(&o.id))
        .map(|o| o.volume_m3)
        .sum();
    let (_, _, vcu_max) = truck.capacity.vcu_for(weight, volume);
    vcu_max >= truck.capacity.min_vcu
}
