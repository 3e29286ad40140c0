use std::collections::HashMap;

use crate::clients::{ClientConfig, RouteEntry, NO_FLOW};
use crate::domain::types::{RouteType, TruckCapacity, TruckType};

const CD_ALVI: &str = "Alvi Lo Espejo";
const CD_RENDIC: &str = "Rendic Coquimbo";
const CES: [&str; 4] = ["1201", "1205", "1330", "1442"];

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
            min_vcu: 0.8,
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
            min_vcu: 0.8,
            height_cm: 220.0,
        },
    );
    truck_types.insert(
        TruckType::Mediano,
        TruckCapacity {
            weight_kg: 14_000.0,
            volume_m3: 42_000.0,
            max_positions: 18,
            max_pallets: 36,
            levels: 2,
            min_vcu: 0.6,
            height_cm: 250.0,
        },
    );
    truck_types.insert(
        TruckType::Pequeno,
        TruckCapacity {
            weight_kg: 7_000.0,
            volume_m3: 21_000.0,
            max_positions: 10,
            max_pallets: 20,
            levels: 2,
            min_vcu: 0.5,
            height_cm: 230.0,
        },
    );
    truck_types.insert(
        TruckType::Backhaul,
        TruckCapacity {
            weight_kg: 23_000.0,
            volume_m3: 70_000.0,
            max_positions: 26,
            max_pallets: 52,
            levels: 2,
            min_vcu: 0.55,
            height_cm: 240.0,
        },
    );

    let alvi_allowed = [
        TruckType::Pequeno,
        TruckType::Mediano,
        TruckType::Paquetera,
        TruckType::RamplaDirecta,
    ];
    let rendic_allowed = [
        TruckType::Paquetera,
        TruckType::RamplaDirecta,
        TruckType::Backhaul,
    ];

    let mut normal = vec![];
    for ce in CES {
        normal.push(
            RouteEntry::new(&[CD_ALVI], &[ce], &alvi_allowed)
                .with_flows(&["INV", "CRR", NO_FLOW]),
        );
    }
    for ce in CES {
        normal.push(RouteEntry::new(&[CD_RENDIC], &[ce], &rendic_allowed));
    }

    let mut bh = vec![];
    for ce in CES {
        bh.push(RouteEntry::new(&[CD_RENDIC], &[ce], &[TruckType::Backhaul]));
    }

    let mut routes = HashMap::new();
    routes.insert(RouteType::Normal, normal);
    routes.insert(
        RouteType::MultiCe,
        vec![
            RouteEntry::new(&[CD_ALVI], &["1201", "1205"], &alvi_allowed),
            RouteEntry::new(&[CD_RENDIC], &["1330", "1442"], &rendic_allowed),
        ],
    );
    routes.insert(RouteType::Bh, bh);

    ClientConfig {
        name: "smu",
        usa_oc: true,
        agrupar_por_po: false,
        max_ordenes: Some(20),
        multi_cd_caps: None,
        mix_grupos: vec![vec!["INV".to_string(), "CRR".to_string()]],
        named_origin: None,
        validar_altura: true,
        permite_consolidacion: true,
        max_skus_por_pallet: 3,
        altura_max_picking_apilado_cm: Some(180.0),
        alvi_altura_max_cm: Some(230.0),
        adherencia_backhaul: None,
        modo_adherencia: None,
        truck_types,
        routes,
        binpacking_route_types: vec![RouteType::Normal],
        channels: vec![],
    }
}
