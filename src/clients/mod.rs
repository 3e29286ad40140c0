pub mod cencosud;
pub mod disvet;
pub mod smu;
pub mod walmart;

use std::collections::HashMap;
use std::fmt;

use crate::domain::types::{Order, RouteType, TruckCapacity, TruckType};

/// Sentinel accepted inside a route flow whitelist: matches orders without a
/// flow tag.
pub const NO_FLOW: &str = "SIN_OC";

/// One row of a client's route table: which origins and centres it covers,
/// which truck types it allows, and an optional flow whitelist.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub cds: Vec<String>,
    pub ces: Vec<String>,
    pub allowed_trucks: Vec<TruckType>,
    pub flows: Vec<String>,
}

impl RouteEntry {
    pub fn new(cds: &[&str], ces: &[&str], allowed_trucks: &[TruckType]) -> Self {
        RouteEntry {
            cds: cds.iter().map(|s| s.to_string()).collect(),
            ces: ces.iter().map(|s| normalize_ce(s)).collect(),
            allowed_trucks: allowed_trucks.to_vec(),
            flows: vec![],
        }
    }

    pub fn with_flows(mut self, flows: &[&str]) -> Self {
        self.flows = flows.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn matches_order(&self, order: &Order) -> bool {
        self.cds.iter().any(|cd| cd == &order.cd)
            && self.ces.iter().any(|ce| *ce == normalize_ce(&order.ce))
            && self.matches_flow(order.flow.as_deref())
    }

    pub fn matches_flow(&self, flow: Option<&str>) -> bool {
        if self.flows.is_empty() {
            return true;
        }
        match flow {
            Some(f) => self.flows.iter().any(|w| w == f),
            None => self.flows.iter().any(|w| w == NO_FLOW),
        }
    }
}

/// Per-CD and per-truck order caps for multi-CD routes.
#[derive(Debug, Clone, Copy)]
pub struct MultiCdCaps {
    pub per_cd: u32,
    pub total: u32,
}

/// Per-channel overrides applied on top of the client defaults.
#[derive(Debug, Clone, Default)]
pub struct ChannelOverrides {
    pub usa_oc: Option<bool>,
    pub agrupar_por_po: Option<bool>,
    pub max_ordenes: Option<u32>,
    pub mix_grupos: Option<Vec<Vec<String>>>,
    pub validar_altura: Option<bool>,
    pub permite_consolidacion: Option<bool>,
    pub max_skus_por_pallet: Option<u32>,
    pub adherencia_backhaul: Option<f64>,
    pub truck_types: Option<HashMap<TruckType, TruckCapacity>>,
    pub routes: Option<HashMap<RouteType, Vec<RouteEntry>>>,
}

/// Static configuration of one client. Read-only at request time; the
/// channel-effective view is resolved once per optimization run.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub name: &'static str,

    pub usa_oc: bool,
    pub agrupar_por_po: bool,
    pub max_ordenes: Option<u32>,
    pub multi_cd_caps: Option<MultiCdCaps>,
    pub mix_grupos: Vec<Vec<String>>,
    /// Origin warehouse whose normal routes split per centre and per flow.
    pub named_origin: Option<String>,

    pub validar_altura: bool,
    pub permite_consolidacion: bool,
    pub max_skus_por_pallet: u32,
    pub altura_max_picking_apilado_cm: Option<f64>,
    pub alvi_altura_max_cm: Option<f64>,

    pub adherencia_backhaul: Option<f64>,
    pub modo_adherencia: Option<&'static str>,

    pub truck_types: HashMap<TruckType, TruckCapacity>,
    pub routes: HashMap<RouteType, Vec<RouteEntry>>,
    pub binpacking_route_types: Vec<RouteType>,

    pub channels: Vec<(&'static str, ChannelOverrides)>,
}

impl ClientConfig {
    /// Resolve the per-channel view. Channel lookup is case-insensitive; an
    /// unknown channel falls back to the client defaults.
    pub fn effective(&self, channel: Option<&str>) -> ClientConfig {
        let mut cfg = self.clone();
        let Some(channel) = channel else {
            cfg.channels.clear();
            return cfg;
        };

        let overrides = self
            .channels
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(channel))
            .map(|(_, o)| o.clone());

        if let Some(o) = overrides {
            if let Some(v) = o.usa_oc {
                cfg.usa_oc = v;
            }
            if let Some(v) = o.agrupar_por_po {
                cfg.agrupar_por_po = v;
            }
            if let Some(v) = o.max_ordenes {
                cfg.max_ordenes = Some(v);
            }
            if let Some(v) = o.mix_grupos {
                cfg.mix_grupos = v;
            }
            if let Some(v) = o.validar_altura {
                cfg.validar_altura = v;
            }
            if let Some(v) = o.permite_consolidacion {
                cfg.permite_consolidacion = v;
            }
            if let Some(v) = o.max_skus_por_pallet {
                cfg.max_skus_por_pallet = v;
            }
            if let Some(v) = o.adherencia_backhaul {
                cfg.adherencia_backhaul = Some(v);
            }
            if let Some(v) = o.truck_types {
                cfg.truck_types = v;
            }
            if let Some(v) = o.routes {
                cfg.routes = v;
            }
        }
        cfg.channels.clear();
        cfg
    }

    /// Per-request VCU floor overrides (percent, 1..=100).
    pub fn apply_vcu_targets(&mut self, vcu_target: Option<u8>, vcu_target_bh: Option<u8>) {
        if let Some(target) = vcu_target {
            let min_vcu = f64::from(target.clamp(1, 100)) / 100.0;
            for (truck_type, cap) in self.truck_types.iter_mut() {
                if truck_type.is_nestle() {
                    cap.min_vcu = min_vcu;
                }
            }
        }
        if let Some(target) = vcu_target_bh {
            let min_vcu = f64::from(target.clamp(1, 100)) / 100.0;
            if let Some(cap) = self.truck_types.get_mut(&TruckType::Backhaul) {
                cap.min_vcu = min_vcu;
            }
        }
    }

    pub fn routes_for(&self, route_type: RouteType) -> &[RouteEntry] {
        self.routes
            .get(&route_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn capacity_for(&self, truck_type: TruckType) -> TruckCapacity {
        if let Some(cap) = self.truck_types.get(&truck_type) {
            return *cap;
        }
        self.default_capacity()
    }

    /// Reference capacity: paquetera when configured, else any.
    pub fn default_capacity(&self) -> TruckCapacity {
        if let Some(cap) = self.truck_types.get(&TruckType::Paquetera) {
            return *cap;
        }
        self.truck_types
            .values()
            .next()
            .copied()
            .unwrap_or_default()
    }

    /// Truck types allowed for a route. Exact entry match first, then a
    /// containment match (single-order lookups against wider entries), then
    /// the Nestle default.
    pub fn allowed_trucks_for_route(
        &self,
        cds: &[String],
        ces: &[String],
        route_type: RouteType,
        flow: Option<&str>,
    ) -> Vec<TruckType> {
        let ces_norm: Vec<String> = ces.iter().map(|ce| normalize_ce(ce)).collect();
        let entries = self.routes_for(route_type);

        let exact = entries.iter().find(|e| {
            e.cds == *cds && e.ces == ces_norm && e.matches_flow(flow)
        });
        if let Some(entry) = exact {
            return entry.allowed_trucks.clone();
        }

        let contained = entries.iter().find(|e| {
            cds.iter().all(|cd| e.cds.contains(cd))
                && ces_norm.iter().all(|ce| e.ces.contains(ce))
                && e.matches_flow(flow)
        });
        if let Some(entry) = contained {
            return entry.allowed_trucks.clone();
        }

        vec![TruckType::Paquetera, TruckType::RamplaDirecta]
    }

    /// True when the route admits backhaul and no Nestle type at all.
    pub fn is_backhaul_only_route(&self, cd: &str, ce: &str, flow: Option<&str>) -> bool {
        let allowed = self.allowed_trucks_for_route(
            &[cd.to_string()],
            &[ce.to_string()],
            RouteType::Normal,
            flow,
        );
        allowed.iter().any(|t| t.is_backhaul()) && !allowed.iter().any(|t| t.is_nestle())
    }
}

/// Numeric centre codes are left-padded to four digits ("79" == "0079").
pub fn normalize_ce(ce: &str) -> String {
    let trimmed = ce.trim();
    if !trimmed.is_empty() && trimmed.len() < 4 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        format!("{trimmed:0>4}")
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct UnknownClient(pub String);

impl fmt::Display for UnknownClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cliente desconocido: '{}' (disponibles: cencosud, walmart, smu, disvet)",
            self.0
        )
    }
}

impl std::error::Error for UnknownClient {}

/// Client registry. Configurations are data, rebuilt on demand and read-only
/// afterwards.
pub fn get(name: &str) -> Result<ClientConfig, UnknownClient> {
    match name.trim().to_lowercase().as_str() {
        "cencosud" | "nestle" => Ok(cencosud::config()),
        "walmart" => Ok(walmart::config()),
        "smu" => Ok(smu::config()),
        "disvet" => Ok(disvet::config()),
        other => Err(UnknownClient(other.to_string())),
    }
}
