use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::types::{ApiOrder, ApiTruck, Stats};
use crate::clients::ClientConfig;
use crate::domain::state::OptimizationState;
use crate::domain::truck::{CapacityOverflow, Truck};
use crate::domain::types::{RouteType, TruckType};
use crate::solver::output::next_truck_id;

/// Front-end-owned state shipped to the post-processing operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostprocessState {
    pub camiones: Vec<ApiTruck>,
    #[serde(default)]
    pub pedidos_no_incluidos: Vec<ApiOrder>,
}

#[derive(Debug)]
pub enum PostprocessError {
    UnknownTruck(String),
    UnknownOrder(String),
    Capacity(CapacityOverflow),
}

impl fmt::Display for PostprocessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostprocessError::UnknownTruck(id) => write!(f, "camión desconocido: {id}"),
            PostprocessError::UnknownOrder(id) => write!(f, "pedido desconocido: {id}"),
            PostprocessError::Capacity(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PostprocessError {}

impl From<CapacityOverflow> for PostprocessError {
    fn from(e: CapacityOverflow) -> Self {
        PostprocessError::Capacity(e)
    }
}

/// Move orders between trucks, or to the not-included pool when no target
/// truck is given. Capacity is re-validated on the receiving truck.
pub fn move_orders(
    state: PostprocessState,
    order_ids: &[String],
    target_truck: Option<&str>,
    cfg: &ClientConfig,
) -> Result<PostprocessState, PostprocessError> {
    let (mut trucks, mut pool) = rebuild(state, cfg);

    let mut moving = vec![];
    for id in order_ids {
        let mut found = None;
        for truck in trucks.iter_mut() {
            if let Some(order) = truck.remove_order(id) {
                found = Some(order);
                break;
            }
        }
        if found.is_none() {
            if let Some(idx) = pool.iter().position(|o| &o.id == id) {
                found = Some(pool.remove(idx));
            }
        }
        match found {
            Some(order) => moving.push(order),
            None => return Err(PostprocessError::UnknownOrder(id.clone())),
        }
    }

    match target_truck {
        Some(truck_id) => {
            let truck = trucks
                .iter_mut()
                .find(|t| t.id == truck_id)
                .ok_or_else(|| PostprocessError::UnknownTruck(truck_id.to_string()))?;
            truck.add_orders(moving)?;
        }
        None => pool.extend(moving),
    }

    debug!(moved = order_ids.len(), target = ?target_truck, "pedidos movidos");
    Ok(serialize(trucks, pool, cfg))
}

/// Append an empty truck of the given type and route.
pub fn add_truck(
    state: PostprocessState,
    truck_type: TruckType,
    route_type: RouteType,
    cd: Vec<String>,
    ce: Vec<String>,
    cfg: &ClientConfig,
) -> Result<PostprocessState, PostprocessError> {
    let (mut trucks, pool) = rebuild(state, cfg);
    let capacity = cfg.capacity_for(truck_type);
    let group = format!("{}__{}__{}", route_type.as_str(), cd.join("-"), ce.join("-"));
    trucks.push(Truck::new(
        &next_truck_id(),
        route_type,
        truck_type,
        cd,
        ce,
        &group,
        capacity,
    ));
    Ok(serialize(trucks, pool, cfg))
}

/// Delete a truck; its orders drop into the not-included pool.
pub fn delete_truck(
    state: PostprocessState,
    truck_id: &str,
    cfg: &ClientConfig,
) -> Result<PostprocessState, PostprocessError> {
    let (mut trucks, mut pool) = rebuild(state, cfg);
    let idx = trucks
        .iter()
        .position(|t| t.id == truck_id)
        .ok_or_else(|| PostprocessError::UnknownTruck(truck_id.to_string()))?;
    let mut removed = trucks.remove(idx);
    pool.extend(removed.remove_all_orders());
    Ok(serialize(trucks, pool, cfg))
}

/// Recompute the statistics block for an externally edited state.
pub fn compute_stats(state: PostprocessState, cfg: &ClientConfig) -> Stats {
    let (trucks, pool) = rebuild(state, cfg);
    let domain_state = OptimizationState::new(trucks, pool, cfg.default_capacity());
    Stats::from_state(&domain_state)
}

fn rebuild(
    state: PostprocessState,
    cfg: &ClientConfig,
) -> (Vec<Truck>, Vec<crate::domain::types::Order>) {
    let trucks: Vec<Truck> = state
        .camiones
        .into_iter()
        .map(|t| {
            let capacity = cfg.capacity_for(t.tipo_camion);
            t.into_truck(capacity)
        })
        .collect();
    let pool = state
        .pedidos_no_incluidos
        .into_iter()
        .map(ApiOrder::into_order)
        .collect();
    (trucks, pool)
}

fn serialize(
    trucks: Vec<Truck>,
    pool: Vec<crate::domain::types::Order>,
    cfg: &ClientConfig,
) -> PostprocessState {
    let state = OptimizationState::new(trucks, pool, cfg.default_capacity());
    PostprocessState {
        camiones: state.trucks.iter().map(ApiTruck::from_truck).collect(),
        pedidos_no_incluidos: state
            .not_included
            .iter()
            .map(|o| ApiOrder::from_order(o, &state.reference_capacity))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients;
    use crate::domain::types::TruckCapacity;
    use crate::fixtures::order_generator::basic_order;

    fn seed_state(cfg: &ClientConfig) -> PostprocessState {
        let truck = Truck::new(
            "T1",
            RouteType::Normal,
            TruckType::Paquetera,
            vec!["N725 Bodega Noviciado".into()],
            vec!["0079".into()],
            "g",
            cfg.capacity_for(TruckType::Paquetera),
        )
        .with_orders(vec![
            basic_order("P1", 5_000.0, 10_000.0, 4.0),
            basic_order("P2", 5_000.0, 10_000.0, 4.0),
        ]);
        serialize(
            vec![truck],
            vec![basic_order("P3", 2_000.0, 3_000.0, 2.0)],
            cfg,
        )
    }

    #[test]
    fn move_order_to_pool_and_back() {
        let cfg = clients::get("cencosud").unwrap();
        let state = seed_state(&cfg);

        let state = move_orders(state, &["P1".to_string()], None, &cfg).unwrap();
        assert_eq!(state.camiones[0].pedidos.len(), 1);
        assert_eq!(state.pedidos_no_incluidos.len(), 2);

        let state = move_orders(state, &["P1".to_string()], Some("T1"), &cfg).unwrap();
        assert_eq!(state.camiones[0].pedidos.len(), 2);
        assert_eq!(state.pedidos_no_incluidos.len(), 1);
    }

    #[test]
    fn move_rejects_capacity_overflow() {
        let cfg = clients::get("cencosud").unwrap();
        let mut state = seed_state(&cfg);
        state
            .pedidos_no_incluidos
            .push(ApiOrder::from_order(
                &basic_order("HUGE", 20_000.0, 1_000.0, 2.0),
                &TruckCapacity::default(),
            ));

        let err = move_orders(state, &["HUGE".to_string()], Some("T1"), &cfg).unwrap_err();
        assert!(matches!(err, PostprocessError::Capacity(_)));
    }

    #[test]
    fn delete_truck_moves_orders_to_pool() {
        let cfg = clients::get("cencosud").unwrap();
        let state = seed_state(&cfg);
        let state = delete_truck(state, "T1", &cfg).unwrap();
        assert!(state.camiones.is_empty());
        assert_eq!(state.pedidos_no_incluidos.len(), 3);
    }

    #[test]
    fn add_truck_then_fill_it() {
        let cfg = clients::get("cencosud").unwrap();
        let state = seed_state(&cfg);
        let state = add_truck(
            state,
            TruckType::Backhaul,
            RouteType::Normal,
            vec!["N725 Bodega Noviciado".into()],
            vec!["0079".into()],
            &cfg,
        )
        .unwrap();
        assert_eq!(state.camiones.len(), 2);
        let new_id = state.camiones[1].id.clone();

        let state = move_orders(state, &["P3".to_string()], Some(&new_id), &cfg).unwrap();
        assert_eq!(state.camiones[1].pedidos.len(), 1);
        assert!(state.pedidos_no_incluidos.is_empty());
    }

    #[test]
    fn stats_reflect_edited_state() {
        let cfg = clients::get("cencosud").unwrap();
        let state = seed_state(&cfg);
        let stats = compute_stats(state, &cfg);
        assert_eq!(stats.cantidad_camiones, 1);
        assert_eq!(stats.cantidad_pedidos_asignados, 2);
        assert_eq!(stats.total_pedidos, 3);
    }
}
