use std::collections::HashMap;

use crate::clients::{ClientConfig, RouteEntry};
use crate::domain::types::{RouteType, TruckCapacity, TruckType};

const CD: &str = "Disvet Pudahuel";
const CES: [&str; 3] = ["2101", "2102", "2110"];

pub fn config() -> ClientConfig {
    let mut truck_types = HashMap::new();
    truck_types.insert(
        TruckType::Paquetera,
        TruckCapacity {
            weight_kg: 23_000.0,
            volume_m3: 70_000.0,
            max_positions: 30,
            max_pallets: 60,
            levels: 2,
            min_vcu: 0.75,
            height_cm: 270.0,
        },
    );
    truck_types.insert(
        TruckType::RamplaDirecta,
        TruckCapacity {
            weight_kg: 23_000.0,
            volume_m3: 70_000.0,
            max_positions: 30,
            max_pallets: 60,
            levels: 2,
            min_vcu: 0.75,
            height_cm: 220.0,
        },
    );

    let allowed = [TruckType::Paquetera, TruckType::RamplaDirecta];

    let mut normal = vec![];
    for ce in CES {
        normal.push(RouteEntry::new(&[CD], &[ce], &allowed));
    }

    let mut routes = HashMap::new();
    routes.insert(RouteType::Normal, normal);

    ClientConfig {
        name: "disvet",
        usa_oc: false,
        agrupar_por_po: false,
        max_ordenes: Some(50),
        multi_cd_caps: None,
        mix_grupos: vec![],
        named_origin: None,
        validar_altura: true,
        permite_consolidacion: false,
        max_skus_por_pallet: 1,
        altura_max_picking_apilado_cm: None,
        alvi_altura_max_cm: None,
        adherencia_backhaul: None,
        modo_adherencia: None,
        truck_types,
        routes,
        binpacking_route_types: vec![RouteType::Normal],
        channels: vec![],
    }
}
