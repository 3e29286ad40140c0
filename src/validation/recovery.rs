use std::time::Duration;

use tracing::{debug, info_span};

use crate::clients::ClientConfig;
use crate::config::constant::RECOVERY_TIME_LIMIT_SECS;
use crate::domain::truck::Truck;
use crate::domain::types::{Order, RouteType, TruckType};
use crate::groups::{generate_groups, GroupMode};
use crate::solver::vcu::optimize_group_vcu;

/// Truck family targeted by one recovery sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecoveryFamily {
    Nestle,
    Backhaul,
}

/// Try to pack removed orders into fresh trucks: Nestle-allowed routes
/// first, then backhaul-allowed ones. Returns the new trucks and whatever
/// could not be recovered.
pub fn recover_orders(removed: Vec<Order>, cfg: &ClientConfig) -> (Vec<Truck>, Vec<Order>) {
    if removed.is_empty() {
        return (vec![], vec![]);
    }
    let span = info_span!("recuperacion", orders = removed.len());
    let _guard = span.enter();

    let mut trucks = vec![];
    let mut remaining = removed;

    for family in [RecoveryFamily::Nestle, RecoveryFamily::Backhaul] {
        let (new_trucks, rest) = recover_family(remaining, cfg, family);
        trucks.extend(new_trucks);
        remaining = rest;
        if remaining.is_empty() {
            break;
        }
    }

    debug!(
        recovered_trucks = trucks.len(),
        unrecovered = remaining.len(),
        "recuperación terminada"
    );
    (trucks, remaining)
}

fn recover_family(
    orders: Vec<Order>,
    cfg: &ClientConfig,
    family: RecoveryFamily,
) -> (Vec<Truck>, Vec<Order>) {
    let (eligible, ineligible): (Vec<Order>, Vec<Order>) =
        orders.into_iter().partition(|o| {
            let allowed = cfg.allowed_trucks_for_route(
                &[o.cd.clone()],
                &[o.ce.clone()],
                RouteType::Normal,
                o.flow.as_deref(),
            );
            match family {
                RecoveryFamily::Nestle => allowed.iter().any(|t| t.is_nestle()),
                RecoveryFamily::Backhaul => allowed.iter().any(|t| t.is_backhaul()),
            }
        });
    if eligible.is_empty() {
        return (vec![], ineligible);
    }

    let mut trucks = vec![];
    let mut assigned: std::collections::BTreeSet<String> = Default::default();
    let time_limit = Duration::from_secs(RECOVERY_TIME_LIMIT_SECS);

    for (group, members) in generate_groups(&eligible, cfg, GroupMode::Vcu) {
        let truck_type = match family {
            RecoveryFamily::Backhaul => TruckType::Backhaul,
            RecoveryFamily::Nestle => {
                let allowed = cfg.allowed_trucks_for_route(
                    &group.cd,
                    &group.ce,
                    group.route_type,
                    group.single_flow(),
                );
                match allowed.into_iter().find(|t| t.is_nestle()) {
                    Some(t) => t,
                    None => continue,
                }
            }
        };
        let capacity = cfg.capacity_for(truck_type);

        let outcome =
            optimize_group_vcu(&members, &group, cfg, &capacity, time_limit, truck_type);
        if outcome.is_usable() {
            assigned.extend(outcome.assigned_ids.iter().cloned());
            trucks.extend(outcome.trucks);
        }
    }

    let mut unrecovered = ineligible;
    unrecovered.extend(
        eligible
            .into_iter()
            .filter(|o| !assigned.contains(&o.id)),
    );
    (trucks, unrecovered)
}
