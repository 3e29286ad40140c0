use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::safe_ratio;

/// Route categories a group of orders can be optimized under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteType {
    Normal,
    MultiCe,
    MultiCePrioridad,
    MultiCd,
    Bh,
}

impl RouteType {
    /// Phase precedence for VCU mode group generation.
    pub const VCU_ORDER: [RouteType; 5] = [
        RouteType::MultiCePrioridad,
        RouteType::Normal,
        RouteType::MultiCe,
        RouteType::MultiCd,
        RouteType::Bh,
    ];

    /// Sub-phase order inside the Nestle and backhaul passes.
    pub const NESTLE_ORDER: [RouteType; 4] = [
        RouteType::MultiCePrioridad,
        RouteType::Normal,
        RouteType::MultiCe,
        RouteType::MultiCd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteType::Normal => "normal",
            RouteType::MultiCe => "multi_ce",
            RouteType::MultiCePrioridad => "multi_ce_prioridad",
            RouteType::MultiCd => "multi_cd",
            RouteType::Bh => "bh",
        }
    }
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Truck fleet types. Everything except backhaul counts as Nestle category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TruckType {
    #[serde(rename = "paquetera")]
    Paquetera,
    #[serde(rename = "rampla_directa")]
    RamplaDirecta,
    #[serde(rename = "backhaul")]
    Backhaul,
    #[serde(rename = "mediano")]
    Mediano,
    #[serde(rename = "pequeño")]
    Pequeno,
}

impl TruckType {
    pub fn is_nestle(&self) -> bool {
        !matches!(self, TruckType::Backhaul)
    }

    pub fn is_backhaul(&self) -> bool {
        matches!(self, TruckType::Backhaul)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TruckType::Paquetera => "paquetera",
            TruckType::RamplaDirecta => "rampla_directa",
            TruckType::Backhaul => "backhaul",
            TruckType::Mediano => "mediano",
            TruckType::Pequeno => "pequeño",
        }
    }
}

impl fmt::Display for TruckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stackability categories, mapped one-to-one to the source columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackCategory {
    NoApilable,
    Base,
    Superior,
    SiMismo,
    Flexible,
}

impl StackCategory {
    /// Most restrictive first; a consolidated pallet inherits the lowest rank
    /// present among its fragments.
    pub fn dominance_rank(&self) -> u8 {
        match self {
            StackCategory::NoApilable => 0,
            StackCategory::Base => 1,
            StackCategory::Superior => 2,
            StackCategory::SiMismo => 3,
            StackCategory::Flexible => 4,
        }
    }

    /// Placement order used by the height validator: heaviest constraints
    /// first, `superior` fills remaining tops last.
    pub fn placement_rank(&self) -> u8 {
        match self {
            StackCategory::NoApilable => 0,
            StackCategory::Base => 1,
            StackCategory::SiMismo => 2,
            StackCategory::Flexible => 3,
            StackCategory::Superior => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StackCategory::NoApilable => "no_apilable",
            StackCategory::Base => "base",
            StackCategory::Superior => "superior",
            StackCategory::SiMismo => "si_mismo",
            StackCategory::Flexible => "flexible",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    SkuIntegrity { sku_id: String, reason: String },
    OrderIntegrity { order_id: String, reason: String },
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::SkuIntegrity { sku_id, reason } => {
                write!(f, "SKU {sku_id}: {reason}")
            }
            DomainError::OrderIntegrity { order_id, reason } => {
                write!(f, "pedido {order_id}: {reason}")
            }
        }
    }
}

impl std::error::Error for DomainError {}

/// One SKU row inside an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sku {
    pub sku_id: String,
    pub order_id: String,
    /// Pallet quantity, may be fractional ("Pal. Conf." at SKU level).
    pub pallet_qty: f64,
    pub full_pallet_height_cm: f64,
    pub picking_height_cm: Option<f64>,
    pub weight_kg: f64,
    pub volume_m3: f64,
    pub value: f64,
    // Stackability counts in pallets, not booleans.
    pub base: f64,
    pub superior: f64,
    pub flexible: f64,
    pub no_apilable: f64,
    pub si_mismo: f64,
    /// Cap for same-SKU vertical stacks, when configured.
    pub max_stack_height_cm: Option<f64>,
}

impl Sku {
    pub fn dominant_category(&self) -> StackCategory {
        if self.no_apilable > 0.0 {
            StackCategory::NoApilable
        } else if self.base > 0.0 {
            StackCategory::Base
        } else if self.superior > 0.0 {
            StackCategory::Superior
        } else if self.si_mismo > 0.0 {
            StackCategory::SiMismo
        } else {
            StackCategory::Flexible
        }
    }

    pub fn has_picking_height(&self) -> bool {
        self.picking_height_cm.map_or(false, |h| h > 0.0)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let err = |reason: String| DomainError::SkuIntegrity {
            sku_id: self.sku_id.clone(),
            reason,
        };

        if self.pallet_qty <= 0.0 {
            return Err(err("cantidad de pallets debe ser > 0".into()));
        }
        if self.full_pallet_height_cm < 0.0 {
            return Err(err("altura full pallet no puede ser negativa".into()));
        }
        if let Some(h) = self.picking_height_cm {
            if h < 0.0 {
                return Err(err("altura picking no puede ser negativa".into()));
            }
        }
        if self.full_pallet_height_cm <= 0.0 && !self.has_picking_height() {
            return Err(err(
                "debe tener al menos una altura válida (full pallet o picking)".into(),
            ));
        }

        let category_sum =
            self.base + self.superior + self.flexible + self.no_apilable + self.si_mismo;
        if category_sum <= 0.0 {
            return Err(err(
                "debe tener al menos una categoría de apilabilidad > 0".into(),
            ));
        }
        if category_sum > self.pallet_qty + 0.1 {
            return Err(err(format!(
                "suma de categorías ({category_sum:.2}) excede cantidad de pallets ({:.2})",
                self.pallet_qty
            )));
        }
        Ok(())
    }
}

/// Assignment info written onto an order when it enters a truck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub truck_id: String,
    pub truck_number: usize,
    pub group: String,
    pub route_type: RouteType,
    pub truck_type: TruckType,
}

/// A customer order: the atomic unit the solvers move between trucks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub po: String,
    pub cd: String,
    pub ce: String,
    /// Order-flow tag ("OC"), absent for clients that do not segment by flow.
    pub flow: Option<String>,

    pub weight_kg: f64,
    pub volume_m3: f64,
    pub pallets: f64,
    /// Real-pallet override used when configured and real pallets differ.
    pub pallets_real: Option<f64>,
    pub value: f64,
    pub coffee_value: f64,

    pub chocolates: bool,
    pub valuable: bool,
    pub pdq: bool,
    pub low_turnover: bool,
    pub directed_lot: bool,

    pub base: f64,
    pub superior: f64,
    pub flexible: f64,
    pub no_apilable: f64,
    pub si_mismo: f64,

    #[serde(default)]
    pub skus: Vec<Sku>,
    #[serde(default)]
    pub assignment: Option<Assignment>,
}

impl Order {
    pub fn has_skus(&self) -> bool {
        !self.skus.is_empty()
    }

    pub fn pallets_from_skus(&self) -> f64 {
        self.skus.iter().map(|s| s.pallet_qty).sum()
    }

    /// Pallets that count against truck capacity: the real-pallet override
    /// wins, then the SKU sum, then the configured total.
    pub fn pallets_capacity(&self) -> f64 {
        if let Some(real) = self.pallets_real {
            return real;
        }
        if self.has_skus() {
            return self.pallets_from_skus();
        }
        self.pallets
    }

    pub fn dominant_category(&self) -> StackCategory {
        if self.no_apilable > 0.0 {
            StackCategory::NoApilable
        } else if self.base > 0.0 {
            StackCategory::Base
        } else if self.superior > 0.0 {
            StackCategory::Superior
        } else if self.si_mismo > 0.0 {
            StackCategory::SiMismo
        } else {
            StackCategory::Flexible
        }
    }

    /// Number of physical fragments the height validator will emit for this
    /// order. The adjuster sizes removal targets with this count.
    pub fn fragment_count(&self) -> usize {
        use crate::config::constant::PICKING_RESIDUE_MIN;

        if !self.has_skus() {
            return 1;
        }
        self.skus
            .iter()
            .map(|sku| {
                if sku.pallet_qty < 1.0 {
                    1
                } else {
                    let full = sku.pallet_qty.floor() as usize;
                    let residue = sku.pallet_qty - sku.pallet_qty.floor();
                    full + usize::from(residue > PICKING_RESIDUE_MIN)
                }
            })
            .sum()
    }

    pub fn vcu(&self, capacity: &TruckCapacity) -> (f64, f64, f64) {
        capacity.vcu_for(self.weight_kg, self.volume_m3)
    }

    pub fn is_assigned(&self) -> bool {
        self.assignment.is_some()
    }

    pub fn assign(
        &mut self,
        truck_id: &str,
        truck_number: usize,
        group: &str,
        route_type: RouteType,
        truck_type: TruckType,
    ) {
        self.assignment = Some(Assignment {
            truck_id: truck_id.to_string(),
            truck_number,
            group: group.to_string(),
            route_type,
            truck_type,
        });
    }

    pub fn unassign(&mut self) {
        self.assignment = None;
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let err = |reason: String| DomainError::OrderIntegrity {
            order_id: self.id.clone(),
            reason,
        };

        if self.weight_kg < 0.0 || self.volume_m3 < 0.0 || self.pallets < 0.0 {
            return Err(err("dimensiones no pueden ser negativas".into()));
        }
        let counts = [
            self.base,
            self.superior,
            self.flexible,
            self.no_apilable,
            self.si_mismo,
        ];
        if counts.iter().any(|c| *c < 0.0) {
            return Err(err("categorías de apilabilidad no pueden ser negativas".into()));
        }
        let category_sum: f64 = counts.iter().sum();
        if category_sum > self.pallets + 0.1 {
            return Err(err(format!(
                "suma de categorías ({category_sum:.2}) excede pallets ({:.2})",
                self.pallets
            )));
        }
        for sku in &self.skus {
            sku.validate()?;
        }
        Ok(())
    }

    /// Aggregate totals vs SKU sums, 0.1 tolerance. Returns the mismatches.
    pub fn validate_sku_coherence(&self) -> Vec<String> {
        if !self.has_skus() {
            return vec![];
        }
        const TOL: f64 = 0.1;
        let mut errors = vec![];

        let pallets_skus = self.pallets_from_skus();
        if (pallets_skus - self.pallets).abs() > TOL {
            errors.push(format!(
                "pedido {}: pallets agregado ({:.2}) != suma SKUs ({:.2})",
                self.id, self.pallets, pallets_skus
            ));
        }
        let weight_skus: f64 = self.skus.iter().map(|s| s.weight_kg).sum();
        if (weight_skus - self.weight_kg).abs() > TOL {
            errors.push(format!(
                "pedido {}: peso agregado ({:.2}) != suma SKUs ({:.2})",
                self.id, self.weight_kg, weight_skus
            ));
        }
        let volume_skus: f64 = self.skus.iter().map(|s| s.volume_m3).sum();
        if (volume_skus - self.volume_m3).abs() > TOL {
            errors.push(format!(
                "pedido {}: volumen agregado ({:.2}) != suma SKUs ({:.2})",
                self.id, self.volume_m3, volume_skus
            ));
        }
        let base_skus: f64 = self.skus.iter().map(|s| s.base).sum();
        if (base_skus - self.base).abs() > TOL {
            errors.push(format!(
                "pedido {}: base agregado ({:.2}) != suma SKUs ({:.2})",
                self.id, self.base, base_skus
            ));
        }
        errors
    }
}

/// Capacity limits of one truck type. Immutable during an optimization pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TruckCapacity {
    pub weight_kg: f64,
    pub volume_m3: f64,
    pub max_positions: u32,
    pub max_pallets: u32,
    pub levels: u32,
    pub min_vcu: f64,
    pub height_cm: f64,
}

impl TruckCapacity {
    pub fn vcu_for(&self, weight: f64, volume: f64) -> (f64, f64, f64) {
        let vcu_peso = safe_ratio(weight, self.weight_kg);
        let vcu_vol = safe_ratio(volume, self.volume_m3);
        (vcu_peso, vcu_vol, vcu_peso.max(vcu_vol))
    }
}

impl Default for TruckCapacity {
    fn default() -> Self {
        TruckCapacity {
            weight_kg: 23_000.0,
            volume_m3: 70_000.0,
            max_positions: 30,
            max_pallets: 60,
            levels: 2,
            min_vcu: 0.85,
            height_cm: 270.0,
        }
    }
}

/// Flow filter carried by a group: which order-flow tags it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowFilter {
    /// No filter; any order matches.
    Any,
    /// Only orders without a flow tag.
    NoFlow,
    One(String),
    Mix(Vec<String>),
}

impl FlowFilter {
    pub fn matches(&self, flow: Option<&str>) -> bool {
        match self {
            FlowFilter::Any => true,
            FlowFilter::NoFlow => flow.is_none(),
            FlowFilter::One(tag) => flow == Some(tag.as_str()),
            FlowFilter::Mix(tags) => flow.map_or(false, |f| tags.iter().any(|t| t == f)),
        }
    }

    pub fn id_suffix(&self) -> String {
        match self {
            FlowFilter::Any => String::new(),
            FlowFilter::NoFlow => "__SIN_OC".to_string(),
            FlowFilter::One(tag) => format!("__{tag}"),
            FlowFilter::Mix(tags) => format!("__{}", tags.join("_")),
        }
    }
}

/// One optimization sub-problem: a route plus the flow slice it covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub id: String,
    pub route_type: RouteType,
    pub cd: Vec<String>,
    pub ce: Vec<String>,
    pub flow: FlowFilter,
}

impl GroupConfig {
    pub fn new(route_type: RouteType, cd: Vec<String>, ce: Vec<String>, flow: FlowFilter) -> Self {
        let id = format!(
            "{}__{}__{}{}",
            route_type.as_str(),
            cd.join("-"),
            ce.join("-"),
            flow.id_suffix()
        );
        GroupConfig {
            id,
            route_type,
            cd,
            ce,
            flow,
        }
    }

    /// The single flow tag of this group, when it has one.
    pub fn single_flow(&self) -> Option<&str> {
        match &self.flow {
            FlowFilter::One(tag) => Some(tag.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sku(qty: f64, base: f64, flexible: f64) -> Sku {
        Sku {
            sku_id: "SKU_A".into(),
            order_id: "P1".into(),
            pallet_qty: qty,
            full_pallet_height_cm: 150.0,
            picking_height_cm: None,
            weight_kg: 100.0,
            volume_m3: 1.0,
            value: 10.0,
            base,
            superior: 0.0,
            flexible,
            no_apilable: 0.0,
            si_mismo: 0.0,
            max_stack_height_cm: None,
        }
    }

    pub(crate) fn order(id: &str, weight: f64, volume: f64, pallets: f64) -> Order {
        Order {
            id: id.into(),
            po: format!("PO_{id}"),
            cd: "CD1".into(),
            ce: "0079".into(),
            flow: None,
            weight_kg: weight,
            volume_m3: volume,
            pallets,
            pallets_real: None,
            value: 0.0,
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

    #[test]
    fn sku_requires_some_height() {
        let mut s = sku(2.0, 2.0, 0.0);
        s.full_pallet_height_cm = 0.0;
        assert!(s.validate().is_err());
        s.picking_height_cm = Some(60.0);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn sku_category_sum_tolerance() {
        let mut s = sku(2.0, 2.05, 0.0);
        assert!(s.validate().is_ok(), "0.05 over is inside tolerance");
        s.base = 2.2;
        assert!(s.validate().is_err());
    }

    #[test]
    fn dominant_category_priority() {
        let mut s = sku(2.0, 1.0, 1.0);
        assert_eq!(s.dominant_category(), StackCategory::Base);
        s.no_apilable = 0.5;
        assert_eq!(s.dominant_category(), StackCategory::NoApilable);
        s.no_apilable = 0.0;
        s.base = 0.0;
        assert_eq!(s.dominant_category(), StackCategory::Flexible);
    }

    #[test]
    fn pallets_capacity_prefers_real_override() {
        let mut o = order("P1", 1000.0, 10.0, 4.0);
        assert_eq!(o.pallets_capacity(), 4.0);
        o.skus.push(sku(3.0, 3.0, 0.0));
        assert_eq!(o.pallets_capacity(), 3.0);
        o.pallets_real = Some(5.0);
        assert_eq!(o.pallets_capacity(), 5.0);
    }

    #[test]
    fn fragment_count_counts_picking_residue() {
        let mut o = order("P1", 1000.0, 10.0, 2.5);
        o.skus.push(sku(2.5, 2.5, 0.0));
        // 2 full pallets plus one picking residue.
        assert_eq!(o.fragment_count(), 3);
        o.skus[0].pallet_qty = 2.005;
        assert_eq!(o.fragment_count(), 2, "residue below 0.01 is dropped");
        o.skus[0].pallet_qty = 0.4;
        assert_eq!(o.fragment_count(), 1);
    }

    #[test]
    fn sku_coherence_reports_mismatches() {
        let mut o = order("P1", 1000.0, 10.0, 2.0);
        assert!(o.validate_sku_coherence().is_empty(), "no SKUs, nothing to check");

        let mut s = sku(2.0, 2.0, 0.0);
        s.weight_kg = 1000.0;
        s.volume_m3 = 10.0;
        o.skus.push(s);
        assert!(o.validate_sku_coherence().is_empty());

        o.skus[0].weight_kg = 800.0;
        let errors = o.validate_sku_coherence();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("peso"));
    }

    #[test]
    fn flow_filter_matching() {
        assert!(FlowFilter::Any.matches(Some("INV")));
        assert!(FlowFilter::Any.matches(None));
        assert!(FlowFilter::NoFlow.matches(None));
        assert!(!FlowFilter::NoFlow.matches(Some("INV")));
        assert!(FlowFilter::One("INV".into()).matches(Some("INV")));
        assert!(!FlowFilter::One("INV".into()).matches(Some("CRR")));
        let mix = FlowFilter::Mix(vec!["INV".into(), "CRR".into()]);
        assert!(mix.matches(Some("CRR")));
        assert!(!mix.matches(None));
    }

    #[test]
    fn group_id_embeds_route_and_flow() {
        let g = GroupConfig::new(
            RouteType::Normal,
            vec!["6009 Lo Aguirre".into()],
            vec!["0079".into()],
            FlowFilter::One("INV".into()),
        );
        assert_eq!(g.id, "normal__6009 Lo Aguirre__0079__INV");
    }

    #[test]
    fn vcu_is_max_of_weight_and_volume_ratio() {
        let cap = TruckCapacity::default();
        let (peso, vol, max) = cap.vcu_for(11_500.0, 14_000.0);
        assert!((peso - 0.5).abs() < 1e-9);
        assert!((vol - 0.2).abs() < 1e-9);
        assert_eq!(max, peso);
    }
}
