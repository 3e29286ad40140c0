use tracing::{debug, info_span};

use crate::clients::ClientConfig;
use crate::domain::truck::Truck;
use crate::domain::types::TruckType;
use crate::validation::truck_validator::validate_single_truck;

#[derive(Debug, Clone, Copy, Default)]
pub struct AdherenceReport {
    pub converted: usize,
    pub target: usize,
    pub initial_deficit: usize,
}

impl AdherenceReport {
    pub fn meets_target(&self) -> bool {
        self.converted >= self.initial_deficit
    }
}

/// Convert the lowest-utilisation Nestle trucks to backhaul until the target
/// ratio is met. A conversion only sticks when the route permits backhaul,
/// the load fits the backhaul capacity and revalidation under the lower
/// interior height passes.
pub fn apply_backhaul_adherence(
    trucks: &mut [Truck],
    cfg: &ClientConfig,
    target_ratio: f64,
) -> AdherenceReport {
    let total = trucks.len();
    if total == 0 || target_ratio <= 0.0 {
        return AdherenceReport::default();
    }
    let span = info_span!("adherencia_backhaul", total, target_ratio);
    let _guard = span.enter();

    let current_bh = trucks.iter().filter(|t| t.truck_type.is_backhaul()).count();
    let required = (total as f64 * target_ratio).ceil() as usize;
    let deficit = required.saturating_sub(current_bh);

    if deficit == 0 {
        return AdherenceReport {
            converted: 0,
            target: required,
            initial_deficit: 0,
        };
    }

    let bh_capacity = match cfg.truck_types.get(&TruckType::Backhaul) {
        Some(cap) => *cap,
        None => {
            debug!("cliente sin capacidad backhaul configurada");
            return AdherenceReport {
                converted: 0,
                target: required,
                initial_deficit: deficit,
            };
        }
    };

    // Lowest VCU first: the thinnest Nestle trucks convert with least cost.
    let mut candidates: Vec<usize> = (0..trucks.len())
        .filter(|&i| trucks[i].truck_type.is_nestle())
        .collect();
    candidates.sort_by(|&a, &b| {
        trucks[a]
            .vcu_max()
            .total_cmp(&trucks[b].vcu_max())
            .then_with(|| trucks[a].id.cmp(&trucks[b].id))
    });

    let mut converted = 0;
    for idx in candidates {
        if converted >= deficit {
            break;
        }
        let truck = &mut trucks[idx];

        let flow = truck.flujo_oc().filter(|f| f != "MIX");
        let allowed = cfg.allowed_trucks_for_route(
            &truck.cd,
            &truck.ce,
            truck.route_type,
            flow.as_deref(),
        );
        if !allowed.iter().any(|t| t.is_backhaul()) {
            continue;
        }
        if truck.total_weight() > bh_capacity.weight_kg
            || truck.total_volume() > bh_capacity.volume_m3
        {
            continue;
        }

        if convert_to_backhaul(truck, bh_capacity, cfg) {
            converted += 1;
        }
    }

    debug!(converted, deficit, required, "adherencia aplicada");
    AdherenceReport {
        converted,
        target: required,
        initial_deficit: deficit,
    }
}

/// In-place conversion with revalidation; reverts everything on failure.
fn convert_to_backhaul(
    truck: &mut Truck,
    bh_capacity: crate::domain::types::TruckCapacity,
    cfg: &ClientConfig,
) -> bool {
    let original_type = truck.truck_type;
    let original_capacity = truck.capacity;
    let original_layout = truck.layout_info.clone();
    let original_pos_total = truck.pos_total;

    truck.change_type(TruckType::Backhaul, bh_capacity);

    if cfg.validar_altura {
        validate_single_truck(truck, cfg);
        if !truck.is_validated() {
            truck.change_type(original_type, original_capacity);
            truck.layout_info = original_layout;
            truck.pos_total = original_pos_total;
            return false;
        }
    }
    true
}
