use std::collections::HashMap;

use crate::clients::{ChannelOverrides, ClientConfig, RouteEntry};
use crate::domain::types::{RouteType, TruckCapacity, TruckType};

const CDS: [&str; 3] = [
    "N725 Bodega Noviciado",
    "N641 Bodega Noviciado PYP",
    "N794 Bodega Chillan",
];
const CES: [&str; 6] = ["0079", "0080", "0088", "0103", "3598", "8150"];

// Origins with backhaul coverage.
const CDS_BH: [&str; 2] = ["N725 Bodega Noviciado", "N641 Bodega Noviciado PYP"];

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
        TruckType::Backhaul,
        TruckCapacity {
            weight_kg: 23_000.0,
            volume_m3: 70_000.0,
            max_positions: 26,
            max_pallets: 26,
            levels: 2,
            min_vcu: 0.55,
            height_cm: 240.0,
        },
    );

    let nestle_bh = [
        TruckType::Paquetera,
        TruckType::RamplaDirecta,
        TruckType::Backhaul,
    ];
    let nestle_only = [TruckType::Paquetera, TruckType::RamplaDirecta];

    let mut normal = vec![];
    for cd in CDS {
        for ce in CES {
            let allowed: &[TruckType] = if CDS_BH.contains(&cd) {
                &nestle_bh
            } else {
                &nestle_only
            };
            normal.push(RouteEntry::new(&[cd], &[ce], allowed));
        }
    }

    let mut multi_ce = vec![];
    for cd in CDS {
        multi_ce.push(RouteEntry::new(&[cd], &["0088", "0103"], &nestle_only));
    }

    let mut bh = vec![];
    for cd in CDS_BH {
        for ce in CES {
            bh.push(RouteEntry::new(&[cd], &[ce], &[TruckType::Backhaul]));
        }
    }

    let mut routes = HashMap::new();
    routes.insert(RouteType::Normal, normal);
    routes.insert(RouteType::MultiCe, multi_ce);
    routes.insert(RouteType::Bh, bh);

    ClientConfig {
        name: "cencosud",
        usa_oc: false,
        agrupar_por_po: true,
        max_ordenes: Some(100),
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
        channels: vec![(
            "Frios",
            ChannelOverrides {
                adherencia_backhaul: Some(0.4),
                ..ChannelOverrides::default()
            },
        )],
    }
}
