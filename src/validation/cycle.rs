use std::collections::BTreeSet;

use tracing::{debug, info_span};

use crate::clients::ClientConfig;
use crate::config::constant::MAX_RECOVERY_ROUNDS;
use crate::domain::truck::{LayoutInfo, Truck};
use crate::domain::types::Order;
use crate::validation::adjuster::adjust_trucks;
use crate::validation::recovery::recover_orders;
use crate::validation::truck_validator::validate_trucks;
use crate::validation::OptimizeMode;

#[derive(Debug)]
pub struct CycleResult {
    pub trucks: Vec<Truck>,
    pub assigned: BTreeSet<String>,
    pub unrecovered: Vec<Order>,
    pub rounds: usize,
}

/// The validate → adjust → recover loop. Runs until no orders are removed or
/// the recovery-round limit is reached; the assigned set is recomputed from
/// the surviving trucks at the end.
pub fn run_validation_cycle(
    trucks: Vec<Truck>,
    cfg: &ClientConfig,
    mode: OptimizeMode,
    phase: &str,
) -> CycleResult {
    let span = info_span!("ciclo_validacion", phase, trucks = trucks.len());
    let _guard = span.enter();

    if trucks.is_empty() {
        return CycleResult {
            trucks: vec![],
            assigned: BTreeSet::new(),
            unrecovered: vec![],
            rounds: 0,
        };
    }

    if !cfg.validar_altura {
        // Validation disabled: mark everything as skipped-valid.
        let mut trucks = trucks;
        for truck in trucks.iter_mut() {
            truck.layout_info = Some(LayoutInfo {
                altura_validada: true,
                validacion_skipped: true,
                ..LayoutInfo::default()
            });
        }
        let assigned = assigned_ids(&trucks);
        return CycleResult {
            trucks,
            assigned,
            unrecovered: vec![],
            rounds: 0,
        };
    }

    let mut trucks = trucks;
    validate_trucks(&mut trucks, cfg, phase);
    let adjustment = adjust_trucks(trucks, mode, cfg);
    let mut all_trucks = adjustment.valid_trucks;
    let mut removed = adjustment.removed_orders;
    let mut unrecovered_total: Vec<Order> = vec![];

    let mut rounds = 0;
    while !removed.is_empty() && rounds < MAX_RECOVERY_ROUNDS {
        rounds += 1;
        debug!(round = rounds, removed = removed.len(), "ronda de recuperación");

        let (mut recovered, unrecovered) = recover_orders(removed, cfg);
        unrecovered_total.extend(unrecovered);
        if recovered.is_empty() {
            removed = vec![];
            break;
        }

        validate_trucks(&mut recovered, cfg, &format!("{phase}_recuperacion_{rounds}"));
        let adjustment = adjust_trucks(recovered, mode, cfg);
        all_trucks.extend(adjustment.valid_trucks);
        removed = adjustment.removed_orders;
    }
    unrecovered_total.extend(removed);

    let assigned = assigned_ids(&all_trucks);
    debug!(
        trucks = all_trucks.len(),
        assigned = assigned.len(),
        unrecovered = unrecovered_total.len(),
        rounds,
        "ciclo de validación terminado"
    );

    CycleResult {
        trucks: all_trucks,
        assigned,
        unrecovered: unrecovered_total,
        rounds,
    }
}

fn assigned_ids(trucks: &[Truck]) -> BTreeSet<String> {
    trucks
        .iter()
        .flat_map(|t| t.orders().iter().map(|o| o.id.clone()))
        .collect()
}
