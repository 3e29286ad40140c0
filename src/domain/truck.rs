use std::cell::Cell;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::stacking::{stack_positions, PositionSnapshot};
use crate::domain::types::{Order, RouteType, TruckCapacity, TruckType};
use crate::utils::within_capacity;

/// Reason a batch of orders did not fit a truck.
#[derive(Debug, Clone, PartialEq)]
pub enum CapacityOverflow {
    Volume { used: f64, cap: f64 },
    Weight { used: f64, cap: f64 },
    Pallets { used: f64, cap: f64 },
    Positions { used: f64, cap: f64 },
}

impl fmt::Display for CapacityOverflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityOverflow::Volume { used, cap } => {
                write!(f, "excede capacidad de volumen: {used:.1} > {cap:.1}")
            }
            CapacityOverflow::Weight { used, cap } => {
                write!(f, "excede capacidad de peso: {used:.1} > {cap:.1}")
            }
            CapacityOverflow::Pallets { used, cap } => {
                write!(f, "excede capacidad de pallets: {used:.1} > {cap:.0}")
            }
            CapacityOverflow::Positions { used, cap } => {
                write!(f, "excede posiciones de apilabilidad: {used:.1} > {cap:.0}")
            }
        }
    }
}

impl std::error::Error for CapacityOverflow {}

/// Validation result written back onto a truck after the height validator
/// runs. Wire-shaped: this struct serializes into the `layout_info` field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub altura_validada: bool,
    #[serde(default)]
    pub validacion_skipped: bool,
    #[serde(default)]
    pub errores_validacion: Vec<String>,
    #[serde(default)]
    pub fragmentos_fallidos: Vec<String>,
    #[serde(default)]
    pub fragmentos_totales: usize,
    #[serde(default)]
    pub posiciones_usadas: u32,
    #[serde(default)]
    pub posiciones_disponibles: u32,
    #[serde(default)]
    pub altura_maxima_cm: f64,
    #[serde(default)]
    pub total_pallets_fisicos: u32,
    #[serde(default)]
    pub altura_maxima_usada_cm: f64,
    #[serde(default)]
    pub altura_promedio_usada: f64,
    /// Percent of interior height in use.
    #[serde(default)]
    pub aprovechamiento_altura: f64,
    /// Percent of floor positions in use.
    #[serde(default)]
    pub aprovechamiento_posiciones: f64,
    #[serde(default)]
    pub posiciones: Vec<PositionSnapshot>,
}

/// A truck being assembled: capacity, assigned orders and cached metrics.
///
/// Metric caches invalidate on every mutation and recompute lazily.
#[derive(Debug, Clone)]
pub struct Truck {
    pub id: String,
    pub number: usize,
    pub route_type: RouteType,
    pub truck_type: TruckType,
    pub cd: Vec<String>,
    pub ce: Vec<String>,
    pub group: String,
    pub capacity: TruckCapacity,
    orders: Vec<Order>,
    vcu_cache: Cell<Option<(f64, f64, f64)>>,
    /// Stacking-position total, set after validation or solver decode.
    pub pos_total: f64,
    pub layout_info: Option<LayoutInfo>,
    pub truck_type_options: Vec<TruckType>,
}

impl Truck {
    pub fn new(
        id: &str,
        route_type: RouteType,
        truck_type: TruckType,
        cd: Vec<String>,
        ce: Vec<String>,
        group: &str,
        capacity: TruckCapacity,
    ) -> Self {
        Truck {
            id: id.to_string(),
            number: 0,
            route_type,
            truck_type,
            cd,
            ce,
            group: group.to_string(),
            capacity,
            orders: vec![],
            vcu_cache: Cell::new(None),
            pos_total: 0.0,
            layout_info: None,
            truck_type_options: vec![truck_type],
        }
    }

    /// Solver decode path: take ownership of already-feasible orders without
    /// re-checking capacity. The model enforced the limits.
    pub fn with_orders(mut self, orders: Vec<Order>) -> Self {
        self.orders = orders;
        self.reassign_orders();
        self.invalidate_metrics();
        self
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Atomically add a batch: either every order fits and all are assigned,
    /// or nothing changes and the overflow reason is returned.
    pub fn add_orders(&mut self, orders: Vec<Order>) -> Result<(), CapacityOverflow> {
        if orders.is_empty() {
            return Ok(());
        }

        let vol_total = self.total_volume() + orders.iter().map(|o| o.volume_m3).sum::<f64>();
        if !within_capacity(vol_total, self.capacity.volume_m3) {
            return Err(CapacityOverflow::Volume {
                used: vol_total,
                cap: self.capacity.volume_m3,
            });
        }

        let weight_total = self.total_weight() + orders.iter().map(|o| o.weight_kg).sum::<f64>();
        if !within_capacity(weight_total, self.capacity.weight_kg) {
            return Err(CapacityOverflow::Weight {
                used: weight_total,
                cap: self.capacity.weight_kg,
            });
        }

        let pallets_total =
            self.pallets_capacity() + orders.iter().map(|o| o.pallets_capacity()).sum::<f64>();
        if !within_capacity(pallets_total, self.capacity.max_pallets as f64) {
            return Err(CapacityOverflow::Pallets {
                used: pallets_total,
                cap: self.capacity.max_pallets as f64,
            });
        }

        let mut simulated: Vec<Order> = self.orders.clone();
        simulated.extend(orders.iter().cloned());
        let positions = stack_positions(&simulated);
        if !within_capacity(positions, self.capacity.max_positions as f64) {
            return Err(CapacityOverflow::Positions {
                used: positions,
                cap: self.capacity.max_positions as f64,
            });
        }

        self.orders.extend(orders);
        self.reassign_orders();
        self.invalidate_metrics();
        Ok(())
    }

    pub fn remove_order(&mut self, order_id: &str) -> Option<Order> {
        let idx = self.orders.iter().position(|o| o.id == order_id)?;
        let mut removed = self.orders.remove(idx);
        removed.unassign();
        self.reassign_orders();
        self.invalidate_metrics();
        Some(removed)
    }

    /// Remove every order whose id is in `ids`, returning them unassigned.
    pub fn remove_orders(&mut self, ids: &BTreeSet<String>) -> Vec<Order> {
        let mut removed = vec![];
        let mut kept = vec![];
        for mut order in std::mem::take(&mut self.orders) {
            if ids.contains(&order.id) {
                order.unassign();
                removed.push(order);
            } else {
                kept.push(order);
            }
        }
        self.orders = kept;
        self.reassign_orders();
        self.invalidate_metrics();
        removed
    }

    pub fn remove_all_orders(&mut self) -> Vec<Order> {
        let mut orders = std::mem::take(&mut self.orders);
        for order in &mut orders {
            order.unassign();
        }
        self.invalidate_metrics();
        orders
    }

    /// Switch truck type and capacity in place, propagating to the orders.
    pub fn change_type(&mut self, truck_type: TruckType, capacity: TruckCapacity) {
        self.truck_type = truck_type;
        self.capacity = capacity;
        self.reassign_orders();
        self.invalidate_metrics();
    }

    /// Whether the current load fits under a candidate capacity (weight,
    /// volume, pallets and stacking positions; no minimum-VCU check).
    pub fn fits_capacity(&self, capacity: &TruckCapacity) -> bool {
        if self.orders.is_empty() {
            return true;
        }
        let (vcu_peso, vcu_vol, _) = capacity.vcu_for(self.total_weight(), self.total_volume());
        if !within_capacity(vcu_vol, 1.0) || !within_capacity(vcu_peso, 1.0) {
            return false;
        }
        if !within_capacity(self.pallets_capacity(), capacity.max_pallets as f64) {
            return false;
        }
        within_capacity(stack_positions(&self.orders), capacity.max_positions as f64)
    }

    pub fn total_weight(&self) -> f64 {
        self.orders.iter().map(|o| o.weight_kg).sum()
    }

    pub fn total_volume(&self) -> f64 {
        self.orders.iter().map(|o| o.volume_m3).sum()
    }

    pub fn pallets_conf(&self) -> f64 {
        self.orders.iter().map(|o| o.pallets).sum()
    }

    pub fn pallets_capacity(&self) -> f64 {
        self.orders.iter().map(|o| o.pallets_capacity()).sum()
    }

    pub fn total_value(&self) -> f64 {
        self.orders.iter().map(|o| o.value).sum()
    }

    pub fn coffee_value(&self) -> f64 {
        self.orders.iter().map(|o| o.coffee_value).sum()
    }

    pub fn vcu_peso(&self) -> f64 {
        self.vcu_metrics().0
    }

    pub fn vcu_vol(&self) -> f64 {
        self.vcu_metrics().1
    }

    pub fn vcu_max(&self) -> f64 {
        self.vcu_metrics().2
    }

    pub fn has_chocolates(&self) -> bool {
        self.orders.iter().any(|o| o.chocolates)
    }

    pub fn has_valuable(&self) -> bool {
        self.orders.iter().any(|o| o.valuable)
    }

    pub fn has_pdq(&self) -> bool {
        self.orders.iter().any(|o| o.pdq)
    }

    pub fn has_low_turnover(&self) -> bool {
        self.orders.iter().any(|o| o.low_turnover)
    }

    pub fn has_directed_lot(&self) -> bool {
        self.orders.iter().any(|o| o.directed_lot)
    }

    /// Flow tag of the truck: none, the single shared tag, or "MIX".
    pub fn flujo_oc(&self) -> Option<String> {
        let flows: BTreeSet<&str> = self
            .orders
            .iter()
            .filter_map(|o| o.flow.as_deref())
            .collect();
        match flows.len() {
            0 => None,
            1 => flows.into_iter().next().map(str::to_string),
            _ => Some("MIX".to_string()),
        }
    }

    pub fn can_switch_truck_type(&self) -> bool {
        self.truck_type_options.len() > 1
    }

    /// True when the height validator ran and every fragment was placed.
    pub fn is_validated(&self) -> bool {
        self.layout_info
            .as_ref()
            .map_or(false, |info| info.altura_validada)
    }

    /// True when the validator ran and the layout did not fit.
    pub fn failed_validation(&self) -> bool {
        self.layout_info
            .as_ref()
            .map_or(false, |info| !info.altura_validada)
    }

    fn vcu_metrics(&self) -> (f64, f64, f64) {
        if let Some(cached) = self.vcu_cache.get() {
            return cached;
        }
        let metrics = self
            .capacity
            .vcu_for(self.total_weight(), self.total_volume());
        self.vcu_cache.set(Some(metrics));
        metrics
    }

    fn invalidate_metrics(&mut self) {
        self.vcu_cache.set(None);
    }

    /// Sequential truck number, assigned when the final state is assembled.
    pub fn set_number(&mut self, number: usize) {
        self.number = number;
        self.reassign_orders();
    }

    fn reassign_orders(&mut self) {
        let (id, group) = (self.id.clone(), self.group.clone());
        let (route_type, truck_type, number) = (self.route_type, self.truck_type, self.number);
        for order in self.orders.iter_mut() {
            order.assign(&id, number, &group, route_type, truck_type);
        }
    }
}
