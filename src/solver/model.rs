use std::collections::HashMap;

use crate::clients::MultiCdCaps;
use crate::config::constant::{SCALE_PALLETS, SCALE_VCU};
use crate::domain::stacking::stack_positions_scaled;
use crate::domain::types::{Order, TruckCapacity};

/// One order scaled to the integer domain the engine searches over. VCU is
/// scaled by 1000, pallet and stackability counts by 10.
#[derive(Debug, Clone)]
pub struct ScaledOrder {
    pub id: String,
    pub vcu_vol: i64,
    pub vcu_peso: i64,
    pub weight: i64,
    pub volume: i64,
    pub pallets: i64,
    pub base: i64,
    pub superior: i64,
    pub flexible: i64,
    pub no_apilable: i64,
    pub si_mismo: i64,
    pub cd: String,
    pub po: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ScaledCapacity {
    pub weight: i64,
    pub volume: i64,
    /// Scaled by SCALE_PALLETS.
    pub pallets: i64,
    pub positions: i64,
    pub levels: i64,
    /// Scaled by SCALE_VCU.
    pub min_vcu: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Maximize utilisation: 1000·Σ vcu_max + 3000·Σ assigned − 200·scale·Σ open.
    MaximizeVcu,
    /// Minimize open trucks; every order must be placed.
    MinimizeTrucks,
}

/// The integer model handed to the engine: the full contract of §solver.
#[derive(Debug, Clone)]
pub struct AssignmentModel {
    pub orders: Vec<ScaledOrder>,
    pub capacity: ScaledCapacity,
    pub n_trucks: usize,
    pub objective: Objective,
    /// Exactly-one assignment (bin-packing) vs at-most-one (VCU).
    pub require_all: bool,
    pub enforce_min_vcu: bool,
    /// Index bundles that must land on the same truck (PO grouping).
    pub po_bundles: Vec<Vec<usize>>,
    pub max_orders_per_truck: Option<u32>,
    pub multi_cd_caps: Option<MultiCdCaps>,
    pub enforce_stacking: bool,
}

/// Running totals of one truck inside the engine.
#[derive(Debug, Clone, Default)]
pub struct TruckLoad {
    pub vcu_vol: i64,
    pub vcu_peso: i64,
    pub weight: i64,
    pub volume: i64,
    pub pallets: i64,
    pub base: i64,
    pub superior: i64,
    pub flexible: i64,
    pub no_apilable: i64,
    pub si_mismo: i64,
    pub n_orders: usize,
    pub per_cd: HashMap<String, u32>,
}

impl TruckLoad {
    pub fn add(&mut self, order: &ScaledOrder) {
        self.vcu_vol += order.vcu_vol;
        self.vcu_peso += order.vcu_peso;
        self.weight += order.weight;
        self.volume += order.volume;
        self.pallets += order.pallets;
        self.base += order.base;
        self.superior += order.superior;
        self.flexible += order.flexible;
        self.no_apilable += order.no_apilable;
        self.si_mismo += order.si_mismo;
        self.n_orders += 1;
        *self.per_cd.entry(order.cd.clone()).or_insert(0) += 1;
    }

    pub fn remove(&mut self, order: &ScaledOrder) {
        self.vcu_vol -= order.vcu_vol;
        self.vcu_peso -= order.vcu_peso;
        self.weight -= order.weight;
        self.volume -= order.volume;
        self.pallets -= order.pallets;
        self.base -= order.base;
        self.superior -= order.superior;
        self.flexible -= order.flexible;
        self.no_apilable -= order.no_apilable;
        self.si_mismo -= order.si_mismo;
        self.n_orders -= 1;
        if let Some(count) = self.per_cd.get_mut(&order.cd) {
            *count -= 1;
            if *count == 0 {
                self.per_cd.remove(&order.cd);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.n_orders == 0
    }

    pub fn vcu_max(&self) -> i64 {
        self.vcu_vol.max(self.vcu_peso)
    }

    pub fn stack_total(&self) -> i64 {
        stack_positions_scaled(
            self.base,
            self.superior,
            self.flexible,
            self.no_apilable,
            self.si_mismo,
            SCALE_PALLETS,
        )
    }
}

impl AssignmentModel {
    /// Every hard constraint of one truck, evaluated over its running load.
    pub fn load_ok(&self, load: &TruckLoad) -> bool {
        let cap = &self.capacity;
        if load.weight > cap.weight || load.volume > cap.volume {
            return false;
        }
        if load.vcu_vol > SCALE_VCU || load.vcu_peso > SCALE_VCU {
            return false;
        }
        if load.pallets > cap.pallets {
            return false;
        }
        if let Some(max_orders) = self.max_orders_per_truck {
            if load.n_orders > max_orders as usize {
                return false;
            }
        }
        if let Some(caps) = self.multi_cd_caps {
            if load.n_orders > caps.total as usize {
                return false;
            }
            if load.per_cd.values().any(|&n| n > caps.per_cd) {
                return false;
            }
        }
        if self.enforce_stacking {
            let lim = cap.positions * SCALE_PALLETS;
            if load.base > lim || load.superior > lim || load.no_apilable > lim {
                return false;
            }
            if load.flexible > lim * cap.levels {
                return false;
            }
            if load.base + load.no_apilable > lim || load.superior + load.no_apilable > lim {
                return false;
            }
            if load.stack_total() > lim {
                return false;
            }
        }
        true
    }

    pub fn meets_min_vcu(&self, load: &TruckLoad) -> bool {
        !self.enforce_min_vcu || load.vcu_max() >= self.capacity.min_vcu
    }

    /// Objective value of a candidate solution, higher is better for both
    /// modes (MinimizeTrucks negates the open count).
    pub fn objective_value(&self, loads: &[TruckLoad]) -> i64 {
        use crate::config::constant::{OBJ_WEIGHT_ORDERS, OBJ_WEIGHT_TRUCKS, OBJ_WEIGHT_VCU};

        let open: i64 = loads.iter().filter(|l| !l.is_empty()).count() as i64;
        match self.objective {
            Objective::MinimizeTrucks => -open,
            Objective::MaximizeVcu => {
                let vcu_sum: i64 = loads.iter().map(|l| l.vcu_max()).sum();
                let assigned: i64 = loads.iter().map(|l| l.n_orders as i64).sum();
                OBJ_WEIGHT_VCU * vcu_sum + OBJ_WEIGHT_ORDERS * assigned
                    - OBJ_WEIGHT_TRUCKS * SCALE_VCU * open
            }
        }
    }
}

/// Scale a batch of orders against one truck capacity.
pub fn scale_orders(orders: &[Order], capacity: &TruckCapacity) -> Vec<ScaledOrder> {
    orders
        .iter()
        .map(|o| {
            let (vcu_peso, vcu_vol, _) = o.vcu(capacity);
            ScaledOrder {
                id: o.id.clone(),
                vcu_vol: scale_vcu_frac(vcu_vol),
                vcu_peso: scale_vcu_frac(vcu_peso),
                weight: o.weight_kg.round() as i64,
                volume: o.volume_m3.round() as i64,
                pallets: scale_pallets(o.pallets_capacity()),
                base: scale_pallets(o.base),
                superior: scale_pallets(o.superior),
                flexible: scale_pallets(o.flexible),
                no_apilable: scale_pallets(o.no_apilable),
                si_mismo: scale_pallets(o.si_mismo),
                cd: o.cd.clone(),
                po: o.po.clone(),
            }
        })
        .collect()
}

pub fn scale_capacity(capacity: &TruckCapacity) -> ScaledCapacity {
    ScaledCapacity {
        weight: capacity.weight_kg.round() as i64,
        volume: capacity.volume_m3.round() as i64,
        pallets: capacity.max_pallets as i64 * SCALE_PALLETS,
        positions: capacity.max_positions as i64,
        levels: capacity.levels as i64,
        min_vcu: (capacity.min_vcu * SCALE_VCU as f64).round() as i64,
    }
}

fn scale_vcu_frac(frac: f64) -> i64 {
    ((frac * SCALE_VCU as f64).round() as i64).clamp(0, SCALE_VCU)
}

fn scale_pallets(pallets: f64) -> i64 {
    (pallets * SCALE_PALLETS as f64).round() as i64
}

/// First-Fit-Decreasing truck estimate over the composite
/// max(weight-ratio, volume-ratio) key.
pub fn ffd_estimate(orders: &[Order], capacity: &TruckCapacity) -> usize {
    let mut sorted: Vec<&Order> = orders.iter().collect();
    sorted.sort_by(|a, b| {
        let ka = a.vcu(capacity).2;
        let kb = b.vcu(capacity).2;
        kb.partial_cmp(&ka)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut bins: Vec<(f64, f64)> = vec![];
    for order in sorted {
        let slot = bins.iter_mut().find(|(w, v)| {
            w + order.weight_kg <= capacity.weight_kg && v + order.volume_m3 <= capacity.volume_m3
        });
        match slot {
            Some((w, v)) => {
                *w += order.weight_kg;
                *v += order.volume_m3;
            }
            None => bins.push((order.weight_kg, order.volume_m3)),
        }
    }
    bins.len()
}

/// Group order indices by purchase order.
pub fn po_bundles(orders: &[ScaledOrder]) -> Vec<Vec<usize>> {
    let mut by_po: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, order) in orders.iter().enumerate() {
        by_po.entry(order.po.as_str()).or_default().push(idx);
    }
    let mut bundles: Vec<Vec<usize>> = by_po.into_values().collect();
    bundles.sort_by_key(|b| b[0]);
    bundles
}
