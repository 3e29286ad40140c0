use std::collections::HashMap;

use crate::clients::{ClientConfig, MultiCdCaps, RouteEntry};
use crate::domain::types::{RouteType, TruckCapacity, TruckType};

pub const CD_LO_AGUIRRE: &str = "6009 Lo Aguirre";

const CDS: [&str; 5] = [
    CD_LO_AGUIRRE,
    "6020 Peñón",
    "6010 Chillán",
    "6024 Temuco",
    "6003 Antofagasta",
];
const CES: [&str; 7] = ["0079", "0080", "0088", "0097", "0103", "3598", "8150"];

const CDS_BH: [&str; 2] = [CD_LO_AGUIRRE, "6020 Peñón"];

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
            max_positions: 28,
            max_pallets: 56,
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
    routes.insert(
        RouteType::MultiCd,
        vec![RouteEntry::new(
            &[CD_LO_AGUIRRE, "6020 Peñón"],
            &CES,
            &nestle_only,
        )],
    );
    routes.insert(RouteType::Bh, bh);

    ClientConfig {
        name: "walmart",
        usa_oc: true,
        agrupar_por_po: false,
        max_ordenes: Some(10),
        multi_cd_caps: Some(MultiCdCaps {
            per_cd: 10,
            total: 20,
        }),
        mix_grupos: vec![
            vec!["INV".to_string(), "CRR".to_string()],
            vec!["CRR".to_string(), "XDOCK".to_string()],
        ],
        named_origin: Some(CD_LO_AGUIRRE.to_string()),
        validar_altura: true,
        permite_consolidacion: true,
        max_skus_por_pallet: 3,
        altura_max_picking_apilado_cm: Some(180.0),
        alvi_altura_max_cm: None,
        adherencia_backhaul: None,
        modo_adherencia: None,
        truck_types,
        routes,
        binpacking_route_types: vec![RouteType::Normal, RouteType::MultiCd],
        channels: vec![],
    }
}
