use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::domain::stacking::stack_positions;
use crate::domain::truck::Truck;
use crate::domain::types::{GroupConfig, Order, TruckCapacity, TruckType};
use crate::solver::engine::{Solution, SolveStatus};

static TRUCK_SEQ: AtomicU64 = AtomicU64::new(1);

pub fn next_truck_id() -> String {
    format!("cam_{:06}", TRUCK_SEQ.fetch_add(1, Ordering::Relaxed))
}

/// Why an order did not make it into a truck of this group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    ExcedePeso,
    ExcedeVolumen,
    ExcedePallets,
    SinCamion,
    SinSolucion,
}

#[derive(Debug, Clone)]
pub struct ExcludedOrder {
    pub order: Order,
    pub reason: ExclusionReason,
}

/// Outcome of driving one group through the engine.
#[derive(Debug, Clone)]
pub struct GroupSolveOutcome {
    pub status: SolveStatus,
    pub trucks: Vec<Truck>,
    pub assigned_ids: Vec<String>,
    pub excluded: Vec<ExcludedOrder>,
}

impl GroupSolveOutcome {
    pub fn empty(status: SolveStatus) -> Self {
        GroupSolveOutcome {
            status,
            trucks: vec![],
            assigned_ids: vec![],
            excluded: vec![],
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self.status, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

/// Split orders that individually break a capacity limit off the batch.
pub fn split_oversized(
    orders: &[Order],
    capacity: &TruckCapacity,
) -> (Vec<Order>, Vec<ExcludedOrder>) {
    let mut viable = vec![];
    let mut oversized = vec![];
    for order in orders {
        let reason = if order.weight_kg > capacity.weight_kg {
            Some(ExclusionReason::ExcedePeso)
        } else if order.volume_m3 > capacity.volume_m3 {
            Some(ExclusionReason::ExcedeVolumen)
        } else if order.pallets_capacity() > capacity.max_pallets as f64 {
            Some(ExclusionReason::ExcedePallets)
        } else {
            None
        };
        match reason {
            Some(reason) => oversized.push(ExcludedOrder {
                order: order.clone(),
                reason,
            }),
            None => viable.push(order.clone()),
        }
    }
    (viable, oversized)
}

/// Build trucks from the engine's assignment. Slot indices compact into
/// first-seen order, so decoded trucks come out consecutive.
pub fn decode_solution(
    solution: &Solution,
    orders: &[Order],
    group: &GroupConfig,
    capacity: &TruckCapacity,
    truck_type: TruckType,
) -> GroupSolveOutcome {
    let mut by_slot: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut slot_order: Vec<usize> = vec![];
    for (idx, slot) in solution.assignment.iter().enumerate() {
        if let Some(j) = slot {
            if !by_slot.contains_key(j) {
                slot_order.push(*j);
            }
            by_slot.entry(*j).or_default().push(idx);
        }
    }

    let mut trucks = vec![];
    let mut assigned_ids = vec![];
    for slot in slot_order {
        let members = &by_slot[&slot];
        let truck_orders: Vec<Order> = members.iter().map(|&i| orders[i].clone()).collect();
        assigned_ids.extend(truck_orders.iter().map(|o| o.id.clone()));

        let mut truck = Truck::new(
            &next_truck_id(),
            group.route_type,
            truck_type,
            group.cd.clone(),
            group.ce.clone(),
            &group.id,
            *capacity,
        )
        .with_orders(truck_orders);
        truck.pos_total = stack_positions(truck.orders());
        trucks.push(truck);
    }

    let excluded = solution
        .assignment
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.is_none())
        .map(|(idx, _)| ExcludedOrder {
            order: orders[idx].clone(),
            reason: ExclusionReason::SinCamion,
        })
        .collect();

    GroupSolveOutcome {
        status: solution.status,
        trucks,
        assigned_ids,
        excluded,
    }
}
