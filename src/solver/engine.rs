use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::solver::model::{AssignmentModel, Objective, TruckLoad};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    Feasible,
    NoSolution,
}

/// Engine output: per-order truck slot, or None for unassigned.
#[derive(Debug, Clone)]
pub struct Solution {
    pub status: SolveStatus,
    pub assignment: Vec<Option<usize>>,
}

impl Solution {
    fn no_solution(n: usize) -> Self {
        Solution {
            status: SolveStatus::NoSolution,
            assignment: vec![None; n],
        }
    }
}

/// Deterministic bounded search over the assignment model.
///
/// FFD-seeded construction first, then improvement passes (truck merging,
/// unassigned rescue, minimum-VCU enforcement) until convergence or the
/// wall-clock budget runs out. Single worker, no randomness: equal inputs
/// give equal outputs.
pub fn solve(model: &AssignmentModel, time_limit: Duration) -> Solution {
    let n_orders = model.orders.len();
    if n_orders == 0 || model.n_trucks == 0 {
        return Solution::no_solution(n_orders);
    }
    let deadline = Instant::now() + time_limit;

    // Units: PO bundles move as one, everything else alone.
    let mut units: Vec<Vec<usize>> = if model.po_bundles.is_empty() {
        (0..n_orders).map(|i| vec![i]).collect()
    } else {
        model.po_bundles.clone()
    };
    units.sort_by(|a, b| {
        let key = |unit: &[usize]| {
            let vol: i64 = unit.iter().map(|&i| model.orders[i].vcu_vol).sum();
            let peso: i64 = unit.iter().map(|&i| model.orders[i].vcu_peso).sum();
            vol.max(peso)
        };
        key(b)
            .cmp(&key(a))
            .then_with(|| model.orders[a[0]].id.cmp(&model.orders[b[0]].id))
    });

    let mut loads: Vec<TruckLoad> = vec![TruckLoad::default(); model.n_trucks];
    let mut assignment: Vec<Option<usize>> = vec![None; n_orders];
    let mut unplaced: Vec<Vec<usize>> = vec![];

    // Construction: first fit over the decreasing units.
    for unit in &units {
        if !place_unit(model, &mut loads, &mut assignment, unit) {
            if model.require_all {
                debug!("unidad sin camión factible en modo exhaustivo");
                return Solution::no_solution(n_orders);
            }
            unplaced.push(unit.clone());
        }
    }

    let mut timed_out = false;

    // Improvement: merge open trucks while the objective gains.
    loop {
        if Instant::now() >= deadline {
            timed_out = true;
            break;
        }
        if !merge_pass(model, &mut loads, &mut assignment) {
            break;
        }
    }

    if !model.require_all {
        if !timed_out {
            timed_out = enforce_min_vcu(
                model,
                &units,
                &mut loads,
                &mut assignment,
                &mut unplaced,
                deadline,
            );
        }

        // Rescue: place leftovers into surviving trucks, or open a fresh one
        // when it would stand on its own feet.
        if !timed_out {
            let mut still_unplaced = vec![];
            for unit in unplaced.drain(..) {
                if Instant::now() >= deadline {
                    timed_out = true;
                    still_unplaced.push(unit);
                    continue;
                }
                if !rescue_unit(model, &mut loads, &mut assignment, &unit) {
                    still_unplaced.push(unit);
                }
            }
            unplaced = still_unplaced;
        }
    }

    trace!(
        objective = model.objective_value(&loads),
        unassigned = unplaced.len(),
        "búsqueda terminada"
    );

    Solution {
        status: if timed_out {
            SolveStatus::Feasible
        } else {
            SolveStatus::Optimal
        },
        assignment,
    }
}

fn place_unit(
    model: &AssignmentModel,
    loads: &mut [TruckLoad],
    assignment: &mut [Option<usize>],
    unit: &[usize],
) -> bool {
    for j in 0..loads.len() {
        let mut candidate = loads[j].clone();
        for &idx in unit {
            candidate.add(&model.orders[idx]);
        }
        if model.load_ok(&candidate) {
            loads[j] = candidate;
            for &idx in unit {
                assignment[idx] = Some(j);
            }
            return true;
        }
    }
    false
}

/// One merge sweep; true when a merge was applied.
fn merge_pass(
    model: &AssignmentModel,
    loads: &mut [TruckLoad],
    assignment: &mut [Option<usize>],
) -> bool {
    use crate::config::constant::{OBJ_WEIGHT_TRUCKS, OBJ_WEIGHT_VCU, SCALE_VCU};

    for a in 0..loads.len() {
        if loads[a].is_empty() {
            continue;
        }
        for b in (a + 1)..loads.len() {
            if loads[b].is_empty() {
                continue;
            }
            let mut merged = loads[a].clone();
            for (idx, slot) in assignment.iter().enumerate() {
                if *slot == Some(b) {
                    merged.add(&model.orders[idx]);
                }
            }
            if !model.load_ok(&merged) {
                continue;
            }

            let accept = match model.objective {
                Objective::MinimizeTrucks => true,
                Objective::MaximizeVcu => {
                    let delta = OBJ_WEIGHT_VCU
                        * (merged.vcu_max() - loads[a].vcu_max() - loads[b].vcu_max())
                        + OBJ_WEIGHT_TRUCKS * SCALE_VCU;
                    delta > 0
                }
            };
            if !accept {
                continue;
            }

            loads[a] = merged;
            loads[b] = TruckLoad::default();
            for slot in assignment.iter_mut() {
                if *slot == Some(b) {
                    *slot = Some(a);
                }
            }
            return true;
        }
    }
    false
}

/// Drop or drain trucks sitting under the minimum VCU. Units relocate whole
/// so PO bundles never split. Returns true when the deadline interrupted the
/// pass.
fn enforce_min_vcu(
    model: &AssignmentModel,
    units: &[Vec<usize>],
    loads: &mut [TruckLoad],
    assignment: &mut [Option<usize>],
    unplaced: &mut Vec<Vec<usize>>,
    deadline: Instant,
) -> bool {
    if !model.enforce_min_vcu {
        return false;
    }
    loop {
        if Instant::now() >= deadline {
            return true;
        }
        let offender = (0..loads.len())
            .filter(|&j| !loads[j].is_empty() && !model.meets_min_vcu(&loads[j]))
            .min_by_key(|&j| loads[j].vcu_max());
        let Some(j) = offender else {
            return false;
        };

        // Relocate whole units into other open trucks when possible.
        for unit in units {
            if unit.iter().any(|&idx| assignment[idx] != Some(j)) {
                continue;
            }
            let relocated = (0..loads.len()).find(|&k| {
                if k == j || loads[k].is_empty() {
                    return false;
                }
                let mut candidate = loads[k].clone();
                for &idx in unit {
                    candidate.add(&model.orders[idx]);
                }
                model.load_ok(&candidate)
            });
            if let Some(k) = relocated {
                for &idx in unit {
                    loads[j].remove(&model.orders[idx]);
                    loads[k].add(&model.orders[idx]);
                    assignment[idx] = Some(k);
                }
            }
        }

        // Whatever is left on an under-minimum truck leaves the solution.
        if !loads[j].is_empty() && !model.meets_min_vcu(&loads[j]) {
            let mut dropped = vec![];
            for idx in 0..assignment.len() {
                if assignment[idx] == Some(j) {
                    assignment[idx] = None;
                    dropped.push(idx);
                }
            }
            loads[j] = TruckLoad::default();
            if !dropped.is_empty() {
                debug!(truck = j, orders = dropped.len(), "camión bajo VCU mínimo descartado");
                unplaced.push(dropped);
            }
        }
    }
}

fn rescue_unit(
    model: &AssignmentModel,
    loads: &mut [TruckLoad],
    assignment: &mut [Option<usize>],
    unit: &[usize],
) -> bool {
    // Existing trucks first.
    for j in 0..loads.len() {
        if loads[j].is_empty() {
            continue;
        }
        let mut candidate = loads[j].clone();
        for &idx in unit {
            candidate.add(&model.orders[idx]);
        }
        if model.load_ok(&candidate) {
            loads[j] = candidate;
            for &idx in unit {
                assignment[idx] = Some(j);
            }
            return true;
        }
    }
    // A fresh truck only when it meets the VCU floor on its own.
    for j in 0..loads.len() {
        if !loads[j].is_empty() {
            continue;
        }
        let mut candidate = TruckLoad::default();
        for &idx in unit {
            candidate.add(&model.orders[idx]);
        }
        if model.load_ok(&candidate) && model.meets_min_vcu(&candidate) {
            loads[j] = candidate;
            for &idx in unit {
                assignment[idx] = Some(j);
            }
            return true;
        }
        break;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::TruckCapacity;
    use crate::fixtures::order_generator::basic_order;
    use crate::solver::model::{po_bundles, scale_capacity, scale_orders};

    fn model_for(
        orders: Vec<crate::domain::types::Order>,
        capacity: TruckCapacity,
        objective: Objective,
        n_trucks: usize,
    ) -> AssignmentModel {
        let scaled = scale_orders(&orders, &capacity);
        AssignmentModel {
            capacity: scale_capacity(&capacity),
            orders: scaled,
            n_trucks,
            objective,
            require_all: objective == Objective::MinimizeTrucks,
            enforce_min_vcu: objective == Objective::MaximizeVcu,
            po_bundles: vec![],
            max_orders_per_truck: None,
            multi_cd_caps: None,
            enforce_stacking: true,
        }
    }

    fn cap(min_vcu: f64) -> TruckCapacity {
        TruckCapacity {
            min_vcu,
            ..TruckCapacity::default()
        }
    }

    #[test]
    fn single_fitting_order_is_assigned_when_vcu_floor_allows() {
        let orders = vec![basic_order("P1", 1_000.0, 10_000.0, 2.0)];
        let model = model_for(orders, cap(0.1), Objective::MaximizeVcu, 2);
        let sol = solve(&model, Duration::from_secs(2));
        assert_eq!(sol.status, SolveStatus::Optimal);
        assert_eq!(sol.assignment, vec![Some(0)]);
    }

    #[test]
    fn vcu_floor_drops_thin_truck() {
        // vcu_max ≈ 0.143 < 0.2 floor.
        let orders = vec![basic_order("P1", 1_000.0, 10_000.0, 2.0)];
        let model = model_for(orders, cap(0.2), Objective::MaximizeVcu, 2);
        let sol = solve(&model, Duration::from_secs(2));
        assert_eq!(sol.assignment, vec![None]);
    }

    #[test]
    fn binpacking_places_every_order() {
        let orders: Vec<_> = (0..31)
            .map(|i| basic_order(&format!("P{i:02}"), 500.0, 2.0, 1.0))
            .collect();
        let capacity = TruckCapacity {
            max_pallets: 30,
            min_vcu: 0.0,
            ..TruckCapacity::default()
        };
        let model = model_for(orders, capacity, Objective::MinimizeTrucks, 6);
        let sol = solve(&model, Duration::from_secs(2));
        assert_ne!(sol.status, SolveStatus::NoSolution);
        assert!(sol.assignment.iter().all(|a| a.is_some()));
        let trucks: std::collections::BTreeSet<usize> =
            sol.assignment.iter().flatten().copied().collect();
        assert!(trucks.len() >= 2, "31 pallets cannot ride one 30-pallet truck");
    }

    #[test]
    fn po_bundle_moves_together_or_not_at_all() {
        let mut o1 = basic_order("P1", 12_000.0, 1_000.0, 2.0);
        let mut o2 = basic_order("P2", 12_000.0, 1_000.0, 2.0);
        let o3 = basic_order("P3", 500.0, 1_000.0, 1.0);
        o1.po = "SHARED".into();
        o2.po = "SHARED".into();

        let capacity = cap(0.0);
        let scaled = scale_orders(&[o1, o2, o3], &capacity);
        let bundles = po_bundles(&scaled);
        let model = AssignmentModel {
            capacity: scale_capacity(&capacity),
            orders: scaled,
            n_trucks: 3,
            objective: Objective::MaximizeVcu,
            require_all: false,
            enforce_min_vcu: false,
            po_bundles: bundles,
            max_orders_per_truck: None,
            multi_cd_caps: None,
            enforce_stacking: true,
        };
        let sol = solve(&model, Duration::from_secs(2));
        // 12t + 12t exceeds one truck: the bundle cannot ride together, so
        // both stay out while the independent order lands.
        assert_eq!(sol.assignment[0], None);
        assert_eq!(sol.assignment[1], None);
        assert!(sol.assignment[2].is_some());
    }

    #[test]
    fn merge_raises_utilisation() {
        // Four quarter-loads fit one truck; construction may spread them,
        // merging must bring them together.
        let orders: Vec<_> = (0..4)
            .map(|i| basic_order(&format!("P{i}"), 5_750.0, 2_000.0, 2.0))
            .collect();
        let model = model_for(orders, cap(0.1), Objective::MaximizeVcu, 4);
        let sol = solve(&model, Duration::from_secs(2));
        let trucks: std::collections::BTreeSet<usize> =
            sol.assignment.iter().flatten().copied().collect();
        assert_eq!(trucks.len(), 1, "all four orders share one truck");
    }

    #[test]
    fn deterministic_across_runs() {
        let cfg = crate::clients::get("walmart").unwrap();
        let orders = crate::fixtures::order_generator::random_orders(25, 9, &cfg);
        let model_a = model_for(orders.clone(), cap(0.2), Objective::MaximizeVcu, 8);
        let model_b = model_for(orders, cap(0.2), Objective::MaximizeVcu, 8);
        let a = solve(&model_a, Duration::from_secs(2));
        let b = solve(&model_b, Duration::from_secs(2));
        assert_eq!(a.assignment, b.assignment);
    }
}
