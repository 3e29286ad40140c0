use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::constant::SCALE_PALLETS;
use crate::domain::types::{Order, StackCategory};
use crate::utils::{round1, round2, safe_ratio};

/// One unit going into a physical pallet slot: either a full pallet of a SKU
/// or its picking residue.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub sku_id: String,
    pub order_id: String,
    /// Portion of a full pallet in (0, 1].
    pub fraction: f64,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub volume_m3: f64,
    pub category: StackCategory,
    pub max_stack_height_cm: Option<f64>,
    pub is_picking: bool,
}

/// A physical pallet on the truck. May hold fragments from several orders
/// when picking consolidation is enabled.
#[derive(Debug, Clone)]
pub struct PhysicalPallet {
    pub id: u32,
    pub position: usize,
    pub level: usize,
    pub fragments: Vec<Fragment>,
}

impl PhysicalPallet {
    pub fn new(id: u32, position: usize, level: usize) -> Self {
        PhysicalPallet {
            id,
            position,
            level,
            fragments: vec![],
        }
    }

    pub fn push(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    pub fn height_cm(&self) -> f64 {
        self.fragments.iter().map(|f| f.height_cm).sum()
    }

    pub fn weight_kg(&self) -> f64 {
        self.fragments.iter().map(|f| f.weight_kg).sum()
    }

    pub fn volume_m3(&self) -> f64 {
        self.fragments.iter().map(|f| f.volume_m3).sum()
    }

    pub fn order_ids(&self) -> BTreeSet<&str> {
        self.fragments.iter().map(|f| f.order_id.as_str()).collect()
    }

    pub fn sku_ids(&self) -> BTreeSet<&str> {
        self.fragments.iter().map(|f| f.sku_id.as_str()).collect()
    }

    /// Consolidated means it carries fragments from two or more orders.
    pub fn is_consolidated(&self) -> bool {
        self.order_ids().len() >= 2
    }

    pub fn has_pickings(&self) -> bool {
        self.fragments.iter().any(|f| f.is_picking)
    }

    pub fn has_full_pallets(&self) -> bool {
        self.fragments.iter().any(|f| !f.is_picking)
    }

    /// Most restrictive category among the fragments.
    pub fn dominant_category(&self) -> StackCategory {
        self.fragments
            .iter()
            .map(|f| f.category)
            .min_by_key(|c| c.dominance_rank())
            .unwrap_or(StackCategory::Flexible)
    }

    /// Same-SKU stack cap carried by the fragments, when any.
    pub fn max_stack_height_cm(&self) -> Option<f64> {
        self.fragments.iter().find_map(|f| f.max_stack_height_cm)
    }
}

/// A slot on the truck floor holding a vertical stack of pallets.
#[derive(Debug, Clone)]
pub struct FloorPosition {
    pub index: usize,
    pub max_height_cm: f64,
    pub stack: Vec<PhysicalPallet>,
}

impl FloorPosition {
    pub fn new(index: usize, max_height_cm: f64) -> Self {
        FloorPosition {
            index,
            max_height_cm,
            stack: vec![],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn used_height_cm(&self) -> f64 {
        self.stack.iter().map(|p| p.height_cm()).sum()
    }

    pub fn available_height_cm(&self) -> f64 {
        (self.max_height_cm - self.used_height_cm()).max(0.0)
    }

    pub fn top(&self) -> Option<&PhysicalPallet> {
        self.stack.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut PhysicalPallet> {
        self.stack.last_mut()
    }

    /// Stacking rule check: can `pallet` go on top of the current stack?
    pub fn can_stack(&self, pallet: &PhysicalPallet) -> Result<(), String> {
        if pallet.height_cm() > self.available_height_cm() {
            return Err(format!(
                "excede altura: {:.1}cm > {:.1}cm disponibles",
                pallet.height_cm(),
                self.available_height_cm()
            ));
        }
        let below = match self.top() {
            // Empty position: anything goes to the floor.
            None => return Ok(()),
            Some(p) => p,
        };

        let cat_below = below.dominant_category();
        let cat_above = pallet.dominant_category();

        if cat_below == StackCategory::NoApilable {
            return Err("pallet inferior es NO_APILABLE".into());
        }
        if cat_above == StackCategory::NoApilable {
            return Err("pallet superior es NO_APILABLE".into());
        }

        match cat_below {
            StackCategory::Base | StackCategory::Flexible | StackCategory::Superior => {
                if matches!(cat_above, StackCategory::Superior | StackCategory::Flexible) {
                    Ok(())
                } else {
                    Err(format!(
                        "{} no acepta {} encima",
                        cat_below.as_str(),
                        cat_above.as_str()
                    ))
                }
            }
            StackCategory::SiMismo => {
                let below_skus = below.sku_ids();
                let above_skus = pallet.sku_ids();
                if below_skus.len() != 1 || below_skus != above_skus {
                    return Err("SI_MISMO requiere exactamente el mismo SKU único".into());
                }
                let sku_id = *below_skus.iter().next().unwrap();
                if let Some(limit) = below.max_stack_height_cm() {
                    let accumulated: f64 = self
                        .stack
                        .iter()
                        .filter(|p| p.sku_ids().contains(sku_id))
                        .map(|p| p.height_cm())
                        .sum::<f64>()
                        + pallet.height_cm();
                    if accumulated > limit {
                        return Err(format!(
                            "excede altura máxima apilable para SKU {sku_id}: \
                             {accumulated:.1}cm > {limit:.1}cm"
                        ));
                    }
                }
                Ok(())
            }
            StackCategory::NoApilable => unreachable!("handled above"),
        }
    }

    pub fn stack_pallet(&mut self, mut pallet: PhysicalPallet) -> Result<(), String> {
        self.can_stack(&pallet)?;
        pallet.position = self.index;
        pallet.level = self.stack.len();
        self.stack.push(pallet);
        Ok(())
    }
}

/// Full physical layout of a truck after placement.
#[derive(Debug, Clone)]
pub struct TruckLayout {
    pub truck_id: String,
    pub max_positions: u32,
    pub max_height_cm: f64,
    pub positions: Vec<FloorPosition>,
}

impl TruckLayout {
    pub fn new(truck_id: &str, max_positions: u32, max_height_cm: f64) -> Self {
        let positions = (0..max_positions as usize)
            .map(|i| FloorPosition::new(i, max_height_cm))
            .collect();
        TruckLayout {
            truck_id: truck_id.to_string(),
            max_positions,
            max_height_cm,
            positions,
        }
    }

    pub fn used_positions(&self) -> u32 {
        self.positions.iter().filter(|p| !p.is_empty()).count() as u32
    }

    pub fn available_positions(&self) -> u32 {
        self.max_positions - self.used_positions()
    }

    pub fn total_pallets(&self) -> u32 {
        self.positions.iter().map(|p| p.stack.len() as u32).sum()
    }

    pub fn max_used_height_cm(&self) -> f64 {
        self.positions
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| p.used_height_cm())
            .fold(0.0, f64::max)
    }

    pub fn avg_used_height_cm(&self) -> f64 {
        let used: Vec<f64> = self
            .positions
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| p.used_height_cm())
            .collect();
        if used.is_empty() {
            0.0
        } else {
            used.iter().sum::<f64>() / used.len() as f64
        }
    }

    /// Average fraction of the interior height in use (0..1).
    pub fn height_utilization(&self) -> f64 {
        safe_ratio(self.avg_used_height_cm(), self.max_height_cm)
    }

    /// Fraction of floor positions in use (0..1).
    pub fn position_utilization(&self) -> f64 {
        safe_ratio(self.used_positions() as f64, self.max_positions as f64)
    }

    pub fn snapshot(&self) -> Vec<PositionSnapshot> {
        self.positions
            .iter()
            .filter(|p| !p.is_empty())
            .map(|pos| PositionSnapshot {
                id: pos.index,
                altura_usada_cm: round1(pos.used_height_cm()),
                altura_disponible_cm: round1(pos.available_height_cm()),
                num_pallets: pos.stack.len(),
                pallets: pos
                    .stack
                    .iter()
                    .map(|pallet| PalletSnapshot {
                        id: pallet.id,
                        nivel: pallet.level,
                        altura_cm: round1(pallet.height_cm()),
                        consolidado: pallet.is_consolidated(),
                        skus: pallet
                            .fragments
                            .iter()
                            .map(|f| FragmentSnapshot {
                                sku_id: f.sku_id.clone(),
                                pedido_id: f.order_id.clone(),
                                fraccion: round2(f.fraction),
                                altura_cm: round1(f.height_cm),
                                categoria: f.category.as_str().to_string(),
                                es_picking: f.is_picking,
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect()
    }
}

/// Serialized view of a floor position, wire-shaped for the front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub id: usize,
    pub altura_usada_cm: f64,
    pub altura_disponible_cm: f64,
    pub num_pallets: usize,
    pub pallets: Vec<PalletSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PalletSnapshot {
    pub id: u32,
    pub nivel: usize,
    pub altura_cm: f64,
    pub consolidado: bool,
    pub skus: Vec<FragmentSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentSnapshot {
    pub sku_id: String,
    pub pedido_id: String,
    pub fraccion: f64,
    pub altura_cm: f64,
    pub categoria: String,
    pub es_picking: bool,
}

/// Linearised stacking-position formula over scaled integer counts. The
/// solver enforces it per truck and the decoder recomputes it; both must use
/// the same scale.
pub fn stack_positions_scaled(
    base: i64,
    superior: i64,
    flexible: i64,
    no_apilable: i64,
    si_mismo: i64,
    scale: i64,
) -> i64 {
    let diff = base - superior;
    let abs_diff = diff.abs();

    let m0 = base.min(superior);
    let m1 = abs_diff.min(flexible);
    let rem = flexible - m1;
    let half = (rem + 1) / 2;
    let m2 = (abs_diff - flexible).max(0);

    // Same-SKU pallets pair up vertically; each pair takes one position.
    let pair_q = si_mismo / (2 * scale);
    let self_rem = si_mismo - pair_q * 2 * scale;

    m0 + m1 + half + m2 + no_apilable + pair_q * scale + self_rem
}

/// Stacking positions a set of orders needs, in real pallets.
pub fn stack_positions(orders: &[Order]) -> f64 {
    let scaled = |f: fn(&Order) -> f64| -> i64 {
        (orders.iter().map(f).sum::<f64>() * SCALE_PALLETS as f64).round() as i64
    };

    let total = stack_positions_scaled(
        scaled(|o| o.base),
        scaled(|o| o.superior),
        scaled(|o| o.flexible),
        scaled(|o| o.no_apilable),
        scaled(|o| o.si_mismo),
        SCALE_PALLETS,
    );
    total as f64 / SCALE_PALLETS as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(sku: &str, order: &str, category: StackCategory, height: f64) -> Fragment {
        Fragment {
            sku_id: sku.into(),
            order_id: order.into(),
            fraction: 1.0,
            height_cm: height,
            weight_kg: 100.0,
            volume_m3: 1.0,
            category,
            max_stack_height_cm: None,
            is_picking: false,
        }
    }

    fn pallet(id: u32, fragment: Fragment) -> PhysicalPallet {
        let mut p = PhysicalPallet::new(id, 0, 0);
        p.push(fragment);
        p
    }

    #[test]
    fn base_accepts_superior_and_flexible_only() {
        let mut pos = FloorPosition::new(0, 270.0);
        pos.stack_pallet(pallet(0, frag("A", "P1", StackCategory::Base, 150.0)))
            .unwrap();

        assert!(pos
            .can_stack(&pallet(1, frag("B", "P2", StackCategory::Superior, 100.0)))
            .is_ok());
        assert!(pos
            .can_stack(&pallet(2, frag("C", "P3", StackCategory::Flexible, 100.0)))
            .is_ok());
        assert!(pos
            .can_stack(&pallet(3, frag("D", "P4", StackCategory::Base, 100.0)))
            .is_err());
    }

    #[test]
    fn no_apilable_blocks_both_directions() {
        let mut pos = FloorPosition::new(0, 270.0);
        pos.stack_pallet(pallet(0, frag("A", "P1", StackCategory::NoApilable, 100.0)))
            .unwrap();
        assert!(pos
            .can_stack(&pallet(1, frag("B", "P2", StackCategory::Flexible, 50.0)))
            .is_err());

        let mut pos2 = FloorPosition::new(1, 270.0);
        pos2.stack_pallet(pallet(2, frag("C", "P3", StackCategory::Base, 100.0)))
            .unwrap();
        assert!(pos2
            .can_stack(&pallet(3, frag("D", "P4", StackCategory::NoApilable, 50.0)))
            .is_err());
    }

    #[test]
    fn height_limit_blocks_stacking() {
        let mut pos = FloorPosition::new(0, 270.0);
        pos.stack_pallet(pallet(0, frag("A", "P1", StackCategory::Base, 200.0)))
            .unwrap();
        assert!(pos
            .can_stack(&pallet(1, frag("B", "P2", StackCategory::Superior, 100.0)))
            .is_err());
    }

    #[test]
    fn si_mismo_requires_same_single_sku() {
        let mut pos = FloorPosition::new(0, 270.0);
        pos.stack_pallet(pallet(0, frag("A", "P1", StackCategory::SiMismo, 100.0)))
            .unwrap();
        assert!(pos
            .can_stack(&pallet(1, frag("A", "P2", StackCategory::SiMismo, 100.0)))
            .is_ok());
        assert!(pos
            .can_stack(&pallet(2, frag("B", "P2", StackCategory::SiMismo, 100.0)))
            .is_err());
    }

    #[test]
    fn si_mismo_honors_max_stack_height() {
        let mut bottom = frag("A", "P1", StackCategory::SiMismo, 100.0);
        bottom.max_stack_height_cm = Some(150.0);
        let mut pos = FloorPosition::new(0, 270.0);
        pos.stack_pallet(pallet(0, bottom)).unwrap();

        let mut above = frag("A", "P2", StackCategory::SiMismo, 100.0);
        above.max_stack_height_cm = Some(150.0);
        // 100 + 100 > 150 even though the position itself has room.
        assert!(pos.can_stack(&pallet(1, above)).is_err());
    }

    #[test]
    fn consolidated_pallet_takes_most_restrictive_category() {
        let mut p = PhysicalPallet::new(0, 0, 0);
        p.push(frag("A", "P1", StackCategory::Flexible, 40.0));
        p.push(frag("B", "P2", StackCategory::Base, 40.0));
        assert_eq!(p.dominant_category(), StackCategory::Base);
        assert!(p.is_consolidated());
    }

    #[test]
    fn stack_formula_pairs_base_with_superior() {
        // 2 base + 2 superior pair into 2 positions.
        assert_eq!(stack_positions_scaled(20, 20, 0, 0, 0, 10), 20);
        // 3 base alone take 3 positions.
        assert_eq!(stack_positions_scaled(30, 0, 0, 0, 0, 10), 30);
        // 1 base + 1 superior + 2 flexible: pair + one flexible column.
        assert_eq!(stack_positions_scaled(10, 10, 20, 0, 0, 10), 20);
        // si_mismo: 4 pallets pair into 2 positions.
        assert_eq!(stack_positions_scaled(0, 0, 0, 0, 40, 10), 20);
        // no_apilable always alone.
        assert_eq!(stack_positions_scaled(0, 0, 0, 30, 0, 10), 30);
    }

    #[test]
    fn layout_metrics() {
        let mut layout = TruckLayout::new("T1", 30, 270.0);
        layout.positions[0]
            .stack_pallet(pallet(0, frag("A", "P1", StackCategory::Base, 150.0)))
            .unwrap();
        layout.positions[0]
            .stack_pallet(pallet(1, frag("B", "P2", StackCategory::Superior, 100.0)))
            .unwrap();
        layout.positions[1]
            .stack_pallet(pallet(2, frag("C", "P3", StackCategory::Base, 120.0)))
            .unwrap();

        assert_eq!(layout.used_positions(), 2);
        assert_eq!(layout.total_pallets(), 3);
        assert_eq!(layout.max_used_height_cm(), 250.0);
        assert!((layout.avg_used_height_cm() - 185.0).abs() < 1e-9);
        let snap = layout.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].num_pallets, 2);
    }
}
