use crate::domain::truck::Truck;
use crate::domain::types::{Order, TruckCapacity};

/// Complete outcome of one optimization pass: every input order ends up in
/// exactly one truck or in the not-included pool.
#[derive(Debug, Clone)]
pub struct OptimizationState {
    pub trucks: Vec<Truck>,
    pub not_included: Vec<Order>,
    pub reference_capacity: TruckCapacity,
}

impl OptimizationState {
    pub fn new(
        mut trucks: Vec<Truck>,
        not_included: Vec<Order>,
        reference_capacity: TruckCapacity,
    ) -> Self {
        for (idx, truck) in trucks.iter_mut().enumerate() {
            truck.set_number(idx + 1);
        }
        OptimizationState {
            trucks,
            not_included,
            reference_capacity,
        }
    }

    pub fn total_trucks(&self) -> usize {
        self.trucks.len()
    }

    pub fn nestle_trucks(&self) -> impl Iterator<Item = &Truck> {
        self.trucks.iter().filter(|t| t.truck_type.is_nestle())
    }

    pub fn backhaul_trucks(&self) -> impl Iterator<Item = &Truck> {
        self.trucks.iter().filter(|t| t.truck_type.is_backhaul())
    }

    pub fn assigned_orders(&self) -> usize {
        self.trucks.iter().map(|t| t.orders().len()).sum()
    }

    pub fn total_orders(&self) -> usize {
        self.assigned_orders() + self.not_included.len()
    }

    pub fn avg_vcu(&self) -> f64 {
        avg(self.trucks.iter().map(|t| t.vcu_max()))
    }

    pub fn avg_vcu_nestle(&self) -> f64 {
        avg(self.nestle_trucks().map(|t| t.vcu_max()))
    }

    pub fn avg_vcu_backhaul(&self) -> f64 {
        avg(self.backhaul_trucks().map(|t| t.vcu_max()))
    }

    pub fn total_value(&self) -> f64 {
        self.trucks.iter().map(|t| t.total_value()).sum()
    }

    pub fn valid_trucks(&self) -> usize {
        self.trucks.iter().filter(|t| t.is_validated()).count()
    }

    pub fn invalid_trucks(&self) -> usize {
        self.trucks.iter().filter(|t| t.failed_validation()).count()
    }

    /// Trucks the validator never ran on (no SKU data, or validation off).
    pub fn unvalidated_trucks(&self) -> usize {
        self.trucks
            .iter()
            .filter(|t| t.layout_info.is_none())
            .count()
    }

    /// Percent of validated trucks that passed.
    pub fn validation_rate(&self) -> f64 {
        let validated = self.valid_trucks() + self.invalid_trucks();
        if validated == 0 {
            0.0
        } else {
            self.valid_trucks() as f64 / validated as f64 * 100.0
        }
    }
}

fn avg(values: impl Iterator<Item = f64>) -> f64 {
    let collected: Vec<f64> = values.collect();
    if collected.is_empty() {
        0.0
    } else {
        collected.iter().sum::<f64>() / collected.len() as f64
    }
}
