use serde::{Deserialize, Serialize};

use crate::domain::state::OptimizationState;
use crate::domain::truck::{LayoutInfo, Truck};
use crate::domain::types::{Order, RouteType, TruckCapacity, TruckType};

/// Wire view of one order. Field names keep the upstream spreadsheet-derived
/// contract, upper-case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiOrder {
    #[serde(rename = "PEDIDO")]
    pub pedido: String,
    #[serde(rename = "CD")]
    pub cd: String,
    #[serde(rename = "CE")]
    pub ce: String,
    #[serde(rename = "PO")]
    pub po: String,
    #[serde(rename = "PESO")]
    pub peso: f64,
    #[serde(rename = "VOL")]
    pub vol: f64,
    #[serde(rename = "PALLETS")]
    pub pallets: f64,
    #[serde(rename = "VALOR")]
    pub valor: f64,
    #[serde(rename = "VALOR_CAFE", default)]
    pub valor_cafe: f64,
    #[serde(rename = "VCU_VOL", default)]
    pub vcu_vol: f64,
    #[serde(rename = "VCU_PESO", default)]
    pub vcu_peso: f64,
    #[serde(rename = "CHOCOLATES", default = "no_str")]
    pub chocolates: String,
    #[serde(rename = "VALIOSO", default)]
    pub valioso: u8,
    #[serde(rename = "PDQ", default)]
    pub pdq: u8,
    #[serde(rename = "BAJA_VU", default)]
    pub baja_vu: u8,
    #[serde(rename = "LOTE_DIR", default)]
    pub lote_dir: u8,
    #[serde(rename = "BASE", default)]
    pub base: f64,
    #[serde(rename = "SUPERIOR", default)]
    pub superior: f64,
    #[serde(rename = "FLEXIBLE", default)]
    pub flexible: f64,
    #[serde(rename = "NO_APILABLE", default)]
    pub no_apilable: f64,
    #[serde(rename = "SI_MISMO", default)]
    pub si_mismo: f64,
    #[serde(rename = "OC", default, skip_serializing_if = "Option::is_none")]
    pub oc: Option<String>,
    #[serde(rename = "PALLETS_REAL", default, skip_serializing_if = "Option::is_none")]
    pub pallets_real: Option<f64>,
    #[serde(rename = "CAMION", default, skip_serializing_if = "Option::is_none")]
    pub camion: Option<usize>,
    #[serde(rename = "GRUPO", default, skip_serializing_if = "Option::is_none")]
    pub grupo: Option<String>,
    #[serde(rename = "TIPO_RUTA", default, skip_serializing_if = "Option::is_none")]
    pub tipo_ruta: Option<RouteType>,
    #[serde(rename = "TIPO_CAMION", default, skip_serializing_if = "Option::is_none")]
    pub tipo_camion: Option<TruckType>,
}

fn no_str() -> String {
    "NO".to_string()
}

impl ApiOrder {
    pub fn from_order(order: &Order, reference: &TruckCapacity) -> Self {
        let (vcu_peso, vcu_vol, _) = order.vcu(reference);
        ApiOrder {
            pedido: order.id.clone(),
            cd: order.cd.clone(),
            ce: order.ce.clone(),
            po: order.po.clone(),
            peso: order.weight_kg,
            vol: order.volume_m3,
            pallets: order.pallets,
            valor: order.value,
            valor_cafe: order.coffee_value,
            vcu_vol,
            vcu_peso,
            chocolates: si_no(order.chocolates),
            valioso: order.valuable as u8,
            pdq: order.pdq as u8,
            baja_vu: order.low_turnover as u8,
            lote_dir: order.directed_lot as u8,
            base: order.base,
            superior: order.superior,
            flexible: order.flexible,
            no_apilable: order.no_apilable,
            si_mismo: order.si_mismo,
            oc: order.flow.clone(),
            pallets_real: order.pallets_real,
            camion: order.assignment.as_ref().map(|a| a.truck_number),
            grupo: order.assignment.as_ref().map(|a| a.group.clone()),
            tipo_ruta: order.assignment.as_ref().map(|a| a.route_type),
            tipo_camion: order.assignment.as_ref().map(|a| a.truck_type),
        }
    }

    /// Rebuild the domain order. SKU detail does not travel over the wire;
    /// post-processing works on aggregates only.
    pub fn into_order(self) -> Order {
        Order {
            id: self.pedido,
            po: self.po,
            cd: self.cd,
            ce: self.ce,
            flow: self.oc,
            weight_kg: self.peso,
            volume_m3: self.vol,
            pallets: self.pallets,
            pallets_real: self.pallets_real,
            value: self.valor,
            coffee_value: self.valor_cafe,
            chocolates: self.chocolates == "SI",
            valuable: self.valioso != 0,
            pdq: self.pdq != 0,
            low_turnover: self.baja_vu != 0,
            directed_lot: self.lote_dir != 0,
            base: self.base,
            superior: self.superior,
            flexible: self.flexible,
            no_apilable: self.no_apilable,
            si_mismo: self.si_mismo,
            skus: vec![],
            assignment: None,
        }
    }
}

/// Wire view of a truck.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiTruck {
    pub id: String,
    pub numero: usize,
    pub grupo: String,
    pub tipo_ruta: RouteType,
    pub tipo_camion: TruckType,
    pub cd: Vec<String>,
    pub ce: Vec<String>,
    pub pedidos: Vec<ApiOrder>,
    pub vcu_vol: f64,
    pub vcu_peso: f64,
    pub vcu_max: f64,
    pub pallets_conf: f64,
    pub pos_total: f64,
    pub valor_total: f64,
    pub valor_cafe: f64,
    pub chocolates: String,
    pub skus_valiosos: bool,
    pub pdq: bool,
    pub baja_vu: bool,
    pub lote_dir: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flujo_oc: Option<String>,
    pub can_switch_tipo_camion: bool,
    pub opciones_tipo_camion: Vec<TruckType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_info: Option<LayoutInfo>,
}

impl ApiTruck {
    pub fn from_truck(truck: &Truck) -> Self {
        ApiTruck {
            id: truck.id.clone(),
            numero: truck.number,
            grupo: truck.group.clone(),
            tipo_ruta: truck.route_type,
            tipo_camion: truck.truck_type,
            cd: truck.cd.clone(),
            ce: truck.ce.clone(),
            pedidos: truck
                .orders()
                .iter()
                .map(|o| ApiOrder::from_order(o, &truck.capacity))
                .collect(),
            vcu_vol: truck.vcu_vol(),
            vcu_peso: truck.vcu_peso(),
            vcu_max: truck.vcu_max(),
            pallets_conf: truck.pallets_conf(),
            pos_total: truck.pos_total,
            valor_total: truck.total_value(),
            valor_cafe: truck.coffee_value(),
            chocolates: si_no(truck.has_chocolates()),
            skus_valiosos: truck.has_valuable(),
            pdq: truck.has_pdq(),
            baja_vu: truck.has_low_turnover(),
            lote_dir: truck.has_directed_lot(),
            flujo_oc: truck.flujo_oc(),
            can_switch_tipo_camion: truck.can_switch_truck_type(),
            opciones_tipo_camion: truck.truck_type_options.clone(),
            layout_info: truck.layout_info.clone(),
        }
    }

    /// Rebuild a domain truck against a capacity resolved by the caller.
    pub fn into_truck(self, capacity: TruckCapacity) -> Truck {
        let orders: Vec<Order> = self.pedidos.into_iter().map(ApiOrder::into_order).collect();
        let mut truck = Truck::new(
            &self.id,
            self.tipo_ruta,
            self.tipo_camion,
            self.cd,
            self.ce,
            &self.grupo,
            capacity,
        )
        .with_orders(orders);
        truck.set_number(self.numero);
        truck.pos_total = self.pos_total;
        truck.layout_info = self.layout_info;
        truck.truck_type_options = self.opciones_tipo_camion;
        truck
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationStats {
    pub camiones_validos: usize,
    pub camiones_invalidos: usize,
    pub camiones_no_validados: usize,
    pub tasa_validacion: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    pub cantidad_camiones: usize,
    pub cantidad_camiones_normal: usize,
    pub cantidad_camiones_bh: usize,
    pub cantidad_pedidos_asignados: usize,
    pub total_pedidos: usize,
    pub promedio_vcu: f64,
    pub promedio_vcu_normal: f64,
    pub promedio_vcu_bh: f64,
    pub valorizado: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validacion: Option<ValidationStats>,
}

impl Stats {
    pub fn from_state(state: &OptimizationState) -> Self {
        let valid = state.valid_trucks();
        let invalid = state.invalid_trucks();
        let validacion = if valid > 0 || invalid > 0 {
            Some(ValidationStats {
                camiones_validos: valid,
                camiones_invalidos: invalid,
                camiones_no_validados: state.unvalidated_trucks(),
                tasa_validacion: crate::utils::round2(state.validation_rate()),
            })
        } else {
            None
        };

        Stats {
            cantidad_camiones: state.total_trucks(),
            cantidad_camiones_normal: state.nestle_trucks().count(),
            cantidad_camiones_bh: state.backhaul_trucks().count(),
            cantidad_pedidos_asignados: state.assigned_orders(),
            total_pedidos: state.total_orders(),
            promedio_vcu: state.avg_vcu(),
            promedio_vcu_normal: state.avg_vcu_nestle(),
            promedio_vcu_bh: state.avg_vcu_backhaul(),
            valorizado: state.total_value(),
            validacion,
        }
    }
}

/// One pipeline's result as the front end receives it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResult {
    pub camiones: Vec<ApiTruck>,
    pub pedidos_no_incluidos: Vec<ApiOrder>,
    pub estadisticas: Stats,
}

impl ApiResult {
    pub fn from_state(state: &OptimizationState) -> Self {
        ApiResult {
            camiones: state.trucks.iter().map(ApiTruck::from_truck).collect(),
            pedidos_no_incluidos: state
                .not_included
                .iter()
                .map(|o| ApiOrder::from_order(o, &state.reference_capacity))
                .collect(),
            estadisticas: Stats::from_state(state),
        }
    }
}

/// The two-phase response of the optimization endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeResponse {
    pub vcu: ApiResult,
    pub binpacking: ApiResult,
}

fn si_no(flag: bool) -> String {
    if flag { "SI" } else { "NO" }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::RouteType;
    use crate::fixtures::order_generator::basic_order;

    #[test]
    fn order_round_trips_through_wire_shape() {
        let mut order = basic_order("P1", 1_000.0, 5_000.0, 2.0);
        order.flow = Some("INV".into());
        order.chocolates = true;
        order.pallets_real = Some(3.0);

        let api = ApiOrder::from_order(&order, &TruckCapacity::default());
        assert_eq!(api.chocolates, "SI");
        assert!(api.camion.is_none());

        let back = api.into_order();
        assert_eq!(back.id, order.id);
        assert_eq!(back.flow.as_deref(), Some("INV"));
        assert!(back.chocolates);
        assert_eq!(back.pallets_real, Some(3.0));
    }

    #[test]
    fn truck_serialization_carries_assignment_fields() {
        let truck = Truck::new(
            "T1",
            RouteType::Normal,
            TruckType::Paquetera,
            vec!["CD1".into()],
            vec!["0079".into()],
            "g1",
            TruckCapacity::default(),
        )
        .with_orders(vec![basic_order("P1", 11_500.0, 5_000.0, 2.0)]);

        let api = ApiTruck::from_truck(&truck);
        assert_eq!(api.pedidos.len(), 1);
        assert_eq!(api.pedidos[0].grupo.as_deref(), Some("g1"));
        assert!((api.vcu_max - 0.5).abs() < 1e-9);

        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["tipo_camion"], "paquetera");
        assert_eq!(json["pedidos"][0]["PEDIDO"], "P1");
        assert!(json.get("layout_info").is_none());
    }

    #[test]
    fn stats_emit_validation_block_only_when_validated() {
        let state = OptimizationState::new(vec![], vec![], TruckCapacity::default());
        let stats = Stats::from_state(&state);
        assert!(stats.validacion.is_none());
        assert_eq!(stats.total_pedidos, 0);
    }
}
