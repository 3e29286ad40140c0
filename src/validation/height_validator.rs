use tracing::trace;

use crate::config::constant::{LEGACY_PALLET_HEIGHT_CM, PICKING_RESIDUE_MIN};
use crate::domain::stacking::{Fragment, PhysicalPallet, TruckLayout};
use crate::domain::truck::Truck;
use crate::domain::types::Order;

/// Result of building the physical layout for one truck.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// True iff every fragment found a slot.
    pub fits: bool,
    pub errors: Vec<String>,
    pub layout: Option<TruckLayout>,
    /// SKU ids of the fragments that did not fit.
    pub failed_fragments: Vec<String>,
    pub total_fragments: usize,
}

/// Physical feasibility check: rebuilds fragments from SKU data and places
/// them greedily under the stacking rule set. Pure; the caller writes the
/// outcome back onto the truck.
#[derive(Debug, Clone)]
pub struct HeightValidator {
    pub max_height_cm: f64,
    pub levels: u32,
    pub permite_consolidacion: bool,
    pub max_skus_por_pallet: u32,
    /// Hard cap on a consolidated picking pallet's height.
    pub max_picking_stack_cm: Option<f64>,
}

impl HeightValidator {
    pub fn validate_truck(&self, truck: &Truck) -> ValidationOutcome {
        let fragments = extract_fragments(truck.orders());
        let total_fragments = fragments.len();

        if fragments.is_empty() {
            return ValidationOutcome {
                fits: true,
                errors: vec![],
                layout: None,
                failed_fragments: vec![],
                total_fragments: 0,
            };
        }

        // Quick rejection: an over-tall fragment can never be placed, so the
        // truck must be torn apart rather than adjusted fragment by fragment.
        let errors: Vec<String> = fragments
            .iter()
            .filter(|f| f.height_cm > self.max_height_cm)
            .map(|f| {
                format!(
                    "SKU {} del pedido {} excede altura: {:.1}cm > {:.1}cm",
                    f.sku_id, f.order_id, f.height_cm, self.max_height_cm
                )
            })
            .collect();
        if !errors.is_empty() {
            return ValidationOutcome {
                fits: false,
                errors,
                layout: None,
                failed_fragments: vec![],
                total_fragments,
            };
        }

        let (layout, failed) = self.build_layout(truck, fragments);
        let failed_ids: Vec<String> = failed.iter().map(|f| f.sku_id.clone()).collect();
        let errors = failed
            .iter()
            .map(|f| {
                format!(
                    "sin posición para SKU {} del pedido {}",
                    f.sku_id, f.order_id
                )
            })
            .collect();

        trace!(
            truck = %truck.id,
            placed = total_fragments - failed_ids.len(),
            failed = failed_ids.len(),
            "layout construido"
        );

        ValidationOutcome {
            fits: failed_ids.is_empty(),
            errors,
            layout: Some(layout),
            failed_fragments: failed_ids,
            total_fragments,
        }
    }

    /// Greedy placement in category priority order. Failures accumulate so
    /// the adjuster can size its removal target.
    fn build_layout(&self, truck: &Truck, mut fragments: Vec<Fragment>) -> (TruckLayout, Vec<Fragment>) {
        fragments.sort_by_key(|f| f.category.placement_rank());

        let mut layout = TruckLayout::new(&truck.id, truck.capacity.max_positions, self.max_height_cm);
        let mut pallet_seq: u32 = 0;
        let mut failed = vec![];

        'fragments: for fragment in fragments {
            // Existing positions: consolidate pickings or open a new level.
            for pos in layout.positions.iter_mut() {
                if pos.is_empty() {
                    continue;
                }
                if self.permite_consolidacion && fragment.is_picking {
                    let joinable = pos
                        .top()
                        .map_or(false, |top| self.can_join_pallet(top, &fragment))
                        && pos.used_height_cm() + fragment.height_cm <= self.max_height_cm;
                    if joinable {
                        pos.top_mut().unwrap().push(fragment);
                        continue 'fragments;
                    }
                }
                if (pos.stack.len() as u32) < self.levels {
                    let mut pallet = PhysicalPallet::new(pallet_seq, pos.index, pos.stack.len());
                    pallet.push(fragment.clone());
                    if pos.stack_pallet(pallet).is_ok() {
                        pallet_seq += 1;
                        continue 'fragments;
                    }
                }
            }

            // Fresh floor position.
            let empty = layout.positions.iter_mut().find(|p| p.is_empty());
            match empty {
                Some(pos) => {
                    let mut pallet = PhysicalPallet::new(pallet_seq, pos.index, 0);
                    pallet.push(fragment.clone());
                    if pos.stack_pallet(pallet).is_ok() {
                        pallet_seq += 1;
                    } else {
                        failed.push(fragment);
                    }
                }
                None => failed.push(fragment),
            }
        }
        (layout, failed)
    }

    /// Hard gates for adding a picking fragment to an existing pallet.
    fn can_join_pallet(&self, pallet: &PhysicalPallet, fragment: &Fragment) -> bool {
        // Pickings never mix with full pallets.
        if pallet.has_full_pallets() {
            return false;
        }
        // Same stacking type only.
        if !pallet.fragments.iter().any(|f| f.category == fragment.category) {
            return false;
        }
        let skus = pallet.sku_ids();
        if !skus.contains(fragment.sku_id.as_str())
            && skus.len() >= self.max_skus_por_pallet as usize
        {
            return false;
        }
        if let Some(cap) = self.max_picking_stack_cm {
            if pallet.height_cm() + fragment.height_cm > cap {
                return false;
            }
        }
        true
    }
}

/// Rebuild the transient fragments of a batch of orders from SKU detail.
/// Orders without SKUs fall back to a single estimated fragment.
pub fn extract_fragments(orders: &[Order]) -> Vec<Fragment> {
    let mut fragments = vec![];

    for order in orders {
        if !order.has_skus() {
            fragments.push(legacy_fragment(order));
            continue;
        }
        for sku in &order.skus {
            let qty = sku.pallet_qty;
            let category = sku.dominant_category();

            if qty < 1.0 {
                // Picking-only SKU.
                let height = sku
                    .picking_height_cm
                    .filter(|h| *h > 0.0)
                    .unwrap_or(sku.full_pallet_height_cm * qty)
                    .max(1.0);
                fragments.push(Fragment {
                    sku_id: sku.sku_id.clone(),
                    order_id: order.id.clone(),
                    fraction: qty,
                    height_cm: height,
                    weight_kg: sku.weight_kg,
                    volume_m3: sku.volume_m3,
                    category,
                    max_stack_height_cm: sku.max_stack_height_cm,
                    is_picking: true,
                });
                continue;
            }

            let full = qty.floor() as usize;
            let residue = qty - qty.floor();
            for _ in 0..full {
                fragments.push(Fragment {
                    sku_id: sku.sku_id.clone(),
                    order_id: order.id.clone(),
                    fraction: 1.0,
                    height_cm: sku.full_pallet_height_cm.max(1.0),
                    weight_kg: sku.weight_kg / qty,
                    volume_m3: sku.volume_m3 / qty,
                    category,
                    max_stack_height_cm: sku.max_stack_height_cm,
                    is_picking: false,
                });
            }
            if residue > PICKING_RESIDUE_MIN {
                let height = sku
                    .picking_height_cm
                    .filter(|h| *h > 0.0)
                    .unwrap_or(sku.full_pallet_height_cm * residue)
                    .max(1.0);
                fragments.push(Fragment {
                    sku_id: sku.sku_id.clone(),
                    order_id: order.id.clone(),
                    fraction: residue,
                    height_cm: height,
                    weight_kg: sku.weight_kg * residue / qty,
                    volume_m3: sku.volume_m3 * residue / qty,
                    category,
                    max_stack_height_cm: sku.max_stack_height_cm,
                    is_picking: true,
                });
            }
        }
    }
    fragments
}

fn legacy_fragment(order: &Order) -> Fragment {
    Fragment {
        sku_id: order.id.clone(),
        order_id: order.id.clone(),
        fraction: 1.0,
        height_cm: order.pallets * LEGACY_PALLET_HEIGHT_CM,
        weight_kg: order.weight_kg,
        volume_m3: order.volume_m3,
        category: order.dominant_category(),
        max_stack_height_cm: None,
        is_picking: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{RouteType, StackCategory, TruckCapacity, TruckType};
    use crate::fixtures::order_generator::{basic_order, basic_sku};

    fn validator() -> HeightValidator {
        HeightValidator {
            max_height_cm: 270.0,
            levels: 2,
            permite_consolidacion: false,
            max_skus_por_pallet: 1,
            max_picking_stack_cm: None,
        }
    }

    fn truck_with(orders: Vec<Order>) -> Truck {
        Truck::new(
            "T1",
            RouteType::Normal,
            TruckType::Paquetera,
            vec!["CD1".into()],
            vec!["0079".into()],
            "g",
            TruckCapacity::default(),
        )
        .with_orders(orders)
    }

    fn order_with_sku(id: &str, pallets: f64, height: f64, category: StackCategory) -> Order {
        let mut o = basic_order(id, 1_000.0, 5_000.0, pallets);
        o.base = 0.0;
        match category {
            StackCategory::Base => o.base = pallets,
            StackCategory::Superior => o.superior = pallets,
            StackCategory::Flexible => o.flexible = pallets,
            StackCategory::NoApilable => o.no_apilable = pallets,
            StackCategory::SiMismo => o.si_mismo = pallets,
        }
        let mut sku = basic_sku(&o, &format!("SKU_{id}"), height);
        sku.base = o.base;
        sku.superior = o.superior;
        sku.flexible = o.flexible;
        sku.no_apilable = o.no_apilable;
        sku.si_mismo = o.si_mismo;
        o.skus = vec![sku];
        o
    }

    #[test]
    fn base_and_superior_share_one_position() {
        let a = order_with_sku("A", 1.0, 150.0, StackCategory::Base);
        let b = order_with_sku("B", 1.0, 100.0, StackCategory::Superior);
        let truck = truck_with(vec![a, b]);

        let outcome = validator().validate_truck(&truck);
        assert!(outcome.fits);
        let layout = outcome.layout.unwrap();
        assert_eq!(layout.used_positions(), 1);
        assert_eq!(layout.positions[0].stack.len(), 2);
        assert!((layout.positions[0].used_height_cm() - 250.0).abs() < 1e-9);
    }

    #[test]
    fn overtall_fragment_rejects_without_failed_list() {
        let a = order_with_sku("A", 1.0, 300.0, StackCategory::Base);
        let truck = truck_with(vec![a]);

        let outcome = validator().validate_truck(&truck);
        assert!(!outcome.fits);
        assert!(outcome.layout.is_none());
        assert!(outcome.failed_fragments.is_empty());
        assert!(outcome.errors[0].contains("excede altura"));
    }

    #[test]
    fn fragments_that_run_out_of_floor_are_collected() {
        // 3 no_apilable pallets on a 2-position truck: one fragment fails.
        let a = order_with_sku("A", 3.0, 150.0, StackCategory::NoApilable);
        let mut truck = truck_with(vec![a]);
        truck.capacity.max_positions = 2;

        let outcome = validator().validate_truck(&truck);
        assert!(!outcome.fits);
        assert_eq!(outcome.failed_fragments.len(), 1);
        assert_eq!(outcome.total_fragments, 3);
        let layout = outcome.layout.unwrap();
        assert_eq!(layout.used_positions(), 2);
    }

    #[test]
    fn picking_residue_becomes_its_own_fragment() {
        let mut order = order_with_sku("A", 2.5, 160.0, StackCategory::Base);
        order.skus[0].picking_height_cm = Some(60.0);
        let fragments = extract_fragments(&[order]);
        assert_eq!(fragments.len(), 3);
        assert!(!fragments[0].is_picking);
        let picking = fragments.iter().find(|f| f.is_picking).unwrap();
        assert!((picking.fraction - 0.5).abs() < 1e-9);
        assert_eq!(picking.height_cm, 60.0);
        // Weight splits proportionally.
        assert!((picking.weight_kg - 1_000.0 * 0.5 / 2.5).abs() < 1e-9);
    }

    #[test]
    fn legacy_order_estimates_height_from_pallets() {
        let order = basic_order("L1", 500.0, 1_000.0, 2.0);
        let fragments = extract_fragments(&[order]);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].height_cm, 300.0);
    }

    #[test]
    fn consolidation_joins_pickings_of_same_category() {
        let mut a = order_with_sku("A", 0.4, 150.0, StackCategory::Flexible);
        a.skus[0].picking_height_cm = Some(50.0);
        let mut b = order_with_sku("B", 0.3, 150.0, StackCategory::Flexible);
        b.skus[0].picking_height_cm = Some(40.0);
        let truck = truck_with(vec![a, b]);

        let mut v = validator();
        v.permite_consolidacion = true;
        v.max_skus_por_pallet = 3;

        let outcome = v.validate_truck(&truck);
        assert!(outcome.fits);
        let layout = outcome.layout.unwrap();
        assert_eq!(layout.used_positions(), 1);
        assert_eq!(layout.total_pallets(), 1, "both pickings share one pallet");
        assert!(layout.positions[0].stack[0].is_consolidated());
    }

    #[test]
    fn consolidation_respects_sku_cap() {
        let mut orders = vec![];
        for (i, id) in ["A", "B", "C"].iter().enumerate() {
            let mut o = order_with_sku(id, 0.3, 150.0, StackCategory::Flexible);
            o.skus[0].picking_height_cm = Some(30.0 + i as f64);
            orders.push(o);
        }
        let truck = truck_with(orders);

        let mut v = validator();
        v.permite_consolidacion = true;
        v.max_skus_por_pallet = 2;

        let outcome = v.validate_truck(&truck);
        assert!(outcome.fits);
        let layout = outcome.layout.unwrap();
        // Third SKU opens a second pallet.
        assert_eq!(layout.total_pallets(), 2);
    }

    #[test]
    fn consolidation_respects_picking_stack_height_cap() {
        let mut a = order_with_sku("A", 0.5, 150.0, StackCategory::Flexible);
        a.skus[0].picking_height_cm = Some(100.0);
        let mut b = order_with_sku("B", 0.5, 150.0, StackCategory::Flexible);
        b.skus[0].picking_height_cm = Some(90.0);
        let truck = truck_with(vec![a, b]);

        let mut v = validator();
        v.permite_consolidacion = true;
        v.max_skus_por_pallet = 3;
        v.max_picking_stack_cm = Some(180.0);

        let outcome = v.validate_truck(&truck);
        assert!(outcome.fits);
        // 100 + 90 > 180: the second picking cannot join the first pallet.
        assert_eq!(outcome.layout.unwrap().total_pallets(), 2);
    }

    #[test]
    fn si_mismo_stacks_only_with_itself() {
        let mut a = order_with_sku("A", 2.0, 120.0, StackCategory::SiMismo);
        a.skus[0].sku_id = "SAME".into();
        let mut b = order_with_sku("B", 1.0, 120.0, StackCategory::SiMismo);
        b.skus[0].sku_id = "OTHER".into();
        let truck = truck_with(vec![a, b]);

        let outcome = validator().validate_truck(&truck);
        assert!(outcome.fits);
        let layout = outcome.layout.unwrap();
        // SAME pallets pair up; OTHER starts its own position.
        assert_eq!(layout.used_positions(), 2);
    }
}
