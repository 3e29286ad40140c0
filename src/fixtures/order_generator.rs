use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::clients::ClientConfig;
use crate::domain::types::{Order, RouteType, Sku};

/// Minimal order for tests and by-hand scenarios: all pallets `base`.
pub fn basic_order(id: &str, weight_kg: f64, volume_m3: f64, pallets: f64) -> Order {
    Order {
        id: id.to_string(),
        po: format!("PO_{id}"),
        cd: "CD1".to_string(),
        ce: "0079".to_string(),
        flow: None,
        weight_kg,
        volume_m3,
        pallets,
        pallets_real: None,
        value: weight_kg * 2.0,
        coffee_value: 0.0,
        chocolates: false,
        valuable: false,
        pdq: false,
        low_turnover: false,
        directed_lot: false,
        base: pallets,
        superior: 0.0,
        flexible: 0.0,
        no_apilable: 0.0,
        si_mismo: 0.0,
        skus: vec![],
        assignment: None,
    }
}

/// A single-SKU detail row matching the order totals.
pub fn basic_sku(order: &Order, sku_id: &str, full_height_cm: f64) -> Sku {
    Sku {
        sku_id: sku_id.to_string(),
        order_id: order.id.clone(),
        pallet_qty: order.pallets,
        full_pallet_height_cm: full_height_cm,
        picking_height_cm: None,
        weight_kg: order.weight_kg,
        volume_m3: order.volume_m3,
        value: order.value,
        base: order.base,
        superior: order.superior,
        flexible: order.flexible,
        no_apilable: order.no_apilable,
        si_mismo: order.si_mismo,
        max_stack_height_cm: None,
    }
}

/// Seeded random batch over the client's normal routes. Used by the demo
/// binary when no CSV is given.
pub fn random_orders(n: usize, seed: u64, cfg: &ClientConfig) -> Vec<Order> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let entries = cfg.routes_for(RouteType::Normal);
    let flows = ["INV", "CRR", "XDOCK"];

    let mut orders = Vec::with_capacity(n);
    for i in 0..n {
        let entry = match entries.choose(&mut rng) {
            Some(e) => e,
            None => break,
        };
        let cd = entry.cds.choose(&mut rng).cloned().unwrap_or_default();
        let ce = entry.ces.choose(&mut rng).cloned().unwrap_or_default();

        let pallets = rng.gen_range(1..=8) as f64;
        let weight = pallets * rng.gen_range(250.0..900.0);
        let volume = pallets * rng.gen_range(1_500.0..3_200.0);

        let mut order = basic_order(&format!("P{:04}", i + 1), weight, volume, pallets);
        order.cd = cd;
        order.ce = ce;
        order.po = format!("PO{:03}", rng.gen_range(1..=n.max(2) / 2));
        order.value = weight * rng.gen_range(1.5..4.0);
        order.chocolates = rng.gen_bool(0.1);
        order.valuable = rng.gen_bool(0.05);

        if cfg.usa_oc && rng.gen_bool(0.8) {
            order.flow = flows.choose(&mut rng).map(|f| f.to_string());
        }

        // Spread the pallets over stackability categories.
        let split = rng.gen_range(0.0..=pallets);
        order.base = split;
        order.superior = (pallets - split) * 0.5;
        order.flexible = pallets - order.base - order.superior;

        // Most orders carry SKU detail; the rest exercise the legacy path.
        if rng.gen_bool(0.85) {
            let n_skus = rng.gen_range(1..=3);
            let qty = pallets / n_skus as f64;
            order.skus = (0..n_skus)
                .map(|s| {
                    let mut sku = basic_sku(&order, &format!("SKU{:03}_{s}", i + 1), 0.0);
                    sku.pallet_qty = qty;
                    sku.full_pallet_height_cm = rng.gen_range(110.0..190.0);
                    sku.weight_kg = order.weight_kg / n_skus as f64;
                    sku.volume_m3 = order.volume_m3 / n_skus as f64;
                    sku.base = order.base / n_skus as f64;
                    sku.superior = order.superior / n_skus as f64;
                    sku.flexible = order.flexible / n_skus as f64;
                    if rng.gen_bool(0.3) {
                        sku.picking_height_cm = Some(rng.gen_range(40.0..90.0));
                    }
                    sku
                })
                .collect();
        }

        orders.push(order);
    }
    orders
}
