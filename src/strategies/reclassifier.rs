use tracing::{debug, info_span};

use crate::clients::ClientConfig;
use crate::domain::stacking::stack_positions;
use crate::domain::truck::Truck;
use crate::domain::types::{TruckCapacity, TruckType};
use crate::utils::{round1, safe_ratio, within_capacity};

/// Downgrade paquetera trucks to rampla_directa when the validated layout
/// actually fits the lower interior. Runs after validation, before the
/// adherence manager. Applying it twice equals applying it once.
pub fn reclassify_nestle(trucks: &mut [Truck], cfg: &ClientConfig) -> usize {
    let span = info_span!("reclasificacion_nestle", trucks = trucks.len());
    let _guard = span.enter();

    let rampla = match cfg.truck_types.get(&TruckType::RamplaDirecta) {
        Some(cap) => *cap,
        None => return 0,
    };
    let paquetera = cfg.capacity_for(TruckType::Paquetera);
    if same_dimensions(&paquetera, &rampla) {
        return 0;
    }

    let mut reclassified = 0;
    for truck in trucks.iter_mut() {
        if truck.truck_type != TruckType::Paquetera || !truck.is_validated() {
            continue;
        }
        if !fits_rampla(truck, &rampla) {
            continue;
        }

        truck.change_type(TruckType::RamplaDirecta, rampla);
        truck.pos_total = stack_positions(truck.orders());
        rewrite_layout_ratios(truck, &rampla);
        reclassified += 1;
    }

    if reclassified > 0 {
        debug!(reclassified, "paquetera → rampla_directa");
    }
    reclassified
}

fn same_dimensions(a: &TruckCapacity, b: &TruckCapacity) -> bool {
    a.max_positions == b.max_positions
        && a.weight_kg == b.weight_kg
        && a.volume_m3 == b.volume_m3
        && a.height_cm == b.height_cm
}

fn fits_rampla(truck: &Truck, rampla: &TruckCapacity) -> bool {
    let info = match &truck.layout_info {
        Some(info) => info,
        None => return false,
    };

    // The real validated height is the deciding measurement.
    if info.altura_maxima_usada_cm > rampla.height_cm {
        return false;
    }
    if info.posiciones_usadas > rampla.max_positions {
        return false;
    }
    if !within_capacity(truck.total_weight(), rampla.weight_kg)
        || !within_capacity(truck.total_volume(), rampla.volume_m3)
        || !within_capacity(truck.pallets_capacity(), rampla.max_pallets as f64)
    {
        return false;
    }
    let (_, _, vcu_max) = rampla.vcu_for(truck.total_weight(), truck.total_volume());
    vcu_max >= rampla.min_vcu
}

/// Utilisation ratios are relative to the truck's capacity; rewrite them
/// against the new reference.
fn rewrite_layout_ratios(truck: &mut Truck, capacity: &TruckCapacity) {
    if let Some(info) = truck.layout_info.as_mut() {
        info.altura_maxima_cm = capacity.height_cm;
        info.aprovechamiento_altura = round1(
            safe_ratio(info.altura_maxima_usada_cm, capacity.height_cm) * 100.0,
        );
        info.posiciones_disponibles =
            capacity.max_positions.saturating_sub(info.posiciones_usadas);
        info.aprovechamiento_posiciones = round1(
            safe_ratio(info.posiciones_usadas as f64, capacity.max_positions as f64) * 100.0,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients;
    use crate::domain::types::{Order, RouteType};
    use crate::fixtures::order_generator::{basic_order, basic_sku};
    use crate::validation::truck_validator::validate_single_truck;

    fn validated_paquetera(height_cm: f64, weight: f64) -> Truck {
        let cfg = clients::get("cencosud").unwrap();
        let mut order: Order = basic_order("P1", weight, 60_000.0, 4.0);
        let sku = basic_sku(&order, "SKU_1", height_cm);
        order.skus = vec![sku];

        let mut truck = Truck::new(
            "T1",
            RouteType::Normal,
            TruckType::Paquetera,
            vec!["N725 Bodega Noviciado".into()],
            vec!["0079".into()],
            "g",
            cfg.capacity_for(TruckType::Paquetera),
        )
        .with_orders(vec![order]);
        validate_single_truck(&mut truck, &cfg);
        assert!(truck.is_validated());
        truck
    }

    #[test]
    fn low_layout_downgrades_to_rampla() {
        let cfg = clients::get("cencosud").unwrap();
        // 160cm used height fits the 220cm rampla; VCU 0.857 over its floor.
        let mut trucks = vec![validated_paquetera(160.0, 19_800.0)];
        let n = reclassify_nestle(&mut trucks, &cfg);

        assert_eq!(n, 1);
        assert_eq!(trucks[0].truck_type, TruckType::RamplaDirecta);
        let info = trucks[0].layout_info.as_ref().unwrap();
        assert_eq!(info.altura_maxima_cm, 220.0);
        assert!((info.aprovechamiento_altura - round1(160.0 / 220.0 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn tall_layout_stays_paquetera() {
        let cfg = clients::get("cencosud").unwrap();
        let mut trucks = vec![validated_paquetera(250.0, 19_800.0)];
        let n = reclassify_nestle(&mut trucks, &cfg);
        assert_eq!(n, 0);
        assert_eq!(trucks[0].truck_type, TruckType::Paquetera);
    }

    #[test]
    fn reclassification_is_idempotent() {
        let cfg = clients::get("cencosud").unwrap();
        let mut trucks = vec![validated_paquetera(160.0, 19_800.0)];
        reclassify_nestle(&mut trucks, &cfg);
        let snapshot: Vec<TruckType> = trucks.iter().map(|t| t.truck_type).collect();
        let second = reclassify_nestle(&mut trucks, &cfg);
        assert_eq!(second, 0);
        let after: Vec<TruckType> = trucks.iter().map(|t| t.truck_type).collect();
        assert_eq!(snapshot, after);
    }

    #[test]
    fn unvalidated_trucks_never_downgrade() {
        let cfg = clients::get("cencosud").unwrap();
        let mut truck = validated_paquetera(160.0, 19_800.0);
        truck.layout_info = None;
        let mut trucks = vec![truck];
        assert_eq!(reclassify_nestle(&mut trucks, &cfg), 0);
    }
}
