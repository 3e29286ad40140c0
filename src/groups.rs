use std::collections::BTreeSet;

use tracing::debug;

use crate::clients::{normalize_ce, ClientConfig, RouteEntry};
use crate::config::constant::{MIN_GROUP_TIME_SECS, PIPELINE_SETUP_RESERVE_SECS};
use crate::domain::types::{FlowFilter, GroupConfig, Order, RouteType};

/// Which route-type cascade drives the generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMode {
    Vcu,
    Binpacking,
    /// Only groups of one route type (used per sub-phase).
    Single(RouteType),
}

/// Partition orders into disjoint optimization sub-problems.
///
/// Every order lands in at most one group and every returned group is
/// non-empty. Ordering follows the client's route-type precedence.
pub fn generate_groups(
    orders: &[Order],
    cfg: &ClientConfig,
    mode: GroupMode,
) -> Vec<(GroupConfig, Vec<Order>)> {
    let route_types: Vec<RouteType> = match mode {
        GroupMode::Vcu => RouteType::VCU_ORDER.to_vec(),
        GroupMode::Binpacking => cfg.binpacking_route_types.clone(),
        GroupMode::Single(rt) => vec![rt],
    };

    let mut groups = vec![];
    let mut assigned: BTreeSet<String> = BTreeSet::new();

    for route_type in route_types {
        let entries = cfg.routes_for(route_type);
        if entries.is_empty() {
            continue;
        }
        build_groups_for_type(orders, cfg, route_type, entries, &mut assigned, &mut groups);
    }
    groups
}

/// Groups of a single route type over whatever orders are still available.
pub fn generate_groups_for_type(
    orders: &[Order],
    cfg: &ClientConfig,
    route_type: RouteType,
) -> Vec<(GroupConfig, Vec<Order>)> {
    generate_groups(orders, cfg, GroupMode::Single(route_type))
}

fn build_groups_for_type(
    orders: &[Order],
    cfg: &ClientConfig,
    route_type: RouteType,
    entries: &[RouteEntry],
    assigned: &mut BTreeSet<String>,
    groups: &mut Vec<(GroupConfig, Vec<Order>)>,
) {
    for (cds, ces, flow) in route_candidates(orders, cfg, route_type, entries) {
        let ces_norm: Vec<String> = ces.iter().map(|ce| normalize_ce(ce)).collect();
        let members: Vec<Order> = orders
            .iter()
            .filter(|o| {
                !assigned.contains(&o.id)
                    && cds.contains(&o.cd)
                    && ces_norm.contains(&normalize_ce(&o.ce))
                    && flow.matches(o.flow.as_deref())
            })
            .cloned()
            .collect();

        if members.is_empty() {
            continue;
        }
        if !group_complete_for_type(route_type, &members, &cds, &ces_norm) {
            continue;
        }

        assigned.extend(members.iter().map(|o| o.id.clone()));
        let group = GroupConfig::new(route_type, cds, ces_norm, flow);
        debug!(group = %group.id, orders = members.len(), "grupo generado");
        groups.push((group, members));
    }
}

/// Candidate (cds, ces, flow) tuples for a route type, before membership and
/// completeness filtering.
fn route_candidates(
    orders: &[Order],
    cfg: &ClientConfig,
    route_type: RouteType,
    entries: &[RouteEntry],
) -> Vec<(Vec<String>, Vec<String>, FlowFilter)> {
    let mut candidates = vec![];

    for entry in entries {
        match route_type {
            RouteType::Normal => {
                let named = cfg
                    .named_origin
                    .as_deref()
                    .map_or(false, |origin| entry.cds == vec![origin.to_string()]);
                if named {
                    // Named origin: one sub-problem per centre, split by flow.
                    for ce in &entry.ces {
                        let scoped: Vec<&Order> = orders
                            .iter()
                            .filter(|o| {
                                entry.cds.contains(&o.cd) && normalize_ce(&o.ce) == *ce
                            })
                            .collect();
                        push_flow_candidates(
                            cfg,
                            &scoped,
                            entry.cds.clone(),
                            vec![ce.clone()],
                            &mut candidates,
                        );
                    }
                } else {
                    let scoped: Vec<&Order> =
                        orders.iter().filter(|o| entry.matches_order(o)).collect();
                    if cfg.usa_oc {
                        push_per_flow_and_no_flow(
                            &scoped,
                            entry.cds.clone(),
                            entry.ces.clone(),
                            &mut candidates,
                        );
                    } else if !scoped.is_empty() {
                        candidates.push((entry.cds.clone(), entry.ces.clone(), FlowFilter::Any));
                    }
                }
            }
            RouteType::Bh => {
                let scoped: Vec<&Order> =
                    orders.iter().filter(|o| entry.matches_order(o)).collect();
                if cfg.usa_oc {
                    push_per_flow_and_no_flow(
                        &scoped,
                        entry.cds.clone(),
                        entry.ces.clone(),
                        &mut candidates,
                    );
                } else if !scoped.is_empty() {
                    candidates.push((entry.cds.clone(), entry.ces.clone(), FlowFilter::Any));
                }
            }
            RouteType::MultiCe | RouteType::MultiCePrioridad | RouteType::MultiCd => {
                let scoped: Vec<&Order> =
                    orders.iter().filter(|o| entry.matches_order(o)).collect();
                if scoped.is_empty() {
                    continue;
                }
                let named_in = cfg
                    .named_origin
                    .as_deref()
                    .map_or(false, |origin| entry.cds.iter().any(|cd| cd == origin));
                if named_in && cfg.usa_oc {
                    push_per_flow_and_no_flow(
                        &scoped,
                        entry.cds.clone(),
                        entry.ces.clone(),
                        &mut candidates,
                    );
                } else {
                    candidates.push((entry.cds.clone(), entry.ces.clone(), FlowFilter::Any));
                }
            }
        }
    }
    candidates
}

/// Per-flow groups, configured mixed-flow groups, and the no-flow group for
/// a named-origin centre.
fn push_flow_candidates(
    cfg: &ClientConfig,
    scoped: &[&Order],
    cds: Vec<String>,
    ces: Vec<String>,
    out: &mut Vec<(Vec<String>, Vec<String>, FlowFilter)>,
) {
    if !cfg.usa_oc {
        if !scoped.is_empty() {
            out.push((cds, ces, FlowFilter::Any));
        }
        return;
    }

    let flows: BTreeSet<&str> = scoped.iter().filter_map(|o| o.flow.as_deref()).collect();
    for flow in &flows {
        out.push((cds.clone(), ces.clone(), FlowFilter::One(flow.to_string())));
    }
    // Mixed-flow groups only when every configured tag is present.
    for mix in &cfg.mix_grupos {
        if mix.iter().all(|tag| flows.contains(tag.as_str())) {
            out.push((cds.clone(), ces.clone(), FlowFilter::Mix(mix.clone())));
        }
    }
    if scoped.iter().any(|o| o.flow.is_none()) {
        out.push((cds, ces, FlowFilter::NoFlow));
    }
}

fn push_per_flow_and_no_flow(
    scoped: &[&Order],
    cds: Vec<String>,
    ces: Vec<String>,
    out: &mut Vec<(Vec<String>, Vec<String>, FlowFilter)>,
) {
    let flows: BTreeSet<&str> = scoped.iter().filter_map(|o| o.flow.as_deref()).collect();
    for flow in &flows {
        out.push((cds.clone(), ces.clone(), FlowFilter::One(flow.to_string())));
    }
    if scoped.iter().any(|o| o.flow.is_none()) {
        out.push((cds, ces, FlowFilter::NoFlow));
    }
}

/// Multi-route groups must actually cover every listed centre (or origin).
fn group_complete_for_type(
    route_type: RouteType,
    members: &[Order],
    cds: &[String],
    ces: &[String],
) -> bool {
    match route_type {
        RouteType::MultiCe | RouteType::MultiCePrioridad => {
            let present: BTreeSet<String> =
                members.iter().map(|o| normalize_ce(&o.ce)).collect();
            ces.iter().all(|ce| present.contains(ce))
        }
        RouteType::MultiCd => {
            let present: BTreeSet<&str> = members.iter().map(|o| o.cd.as_str()).collect();
            cds.iter().all(|cd| present.contains(cd.as_str()))
        }
        _ => true,
    }
}

// ---------------------------------------------------------------------------
// Time budgeting
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GroupSizeDistribution {
    pub small: usize,
    pub medium: usize,
    pub large: usize,
    pub very_large: usize,
}

impl GroupSizeDistribution {
    fn record(&mut self, n: usize) {
        if n < 5 {
            self.small += 1;
        } else if n <= 20 {
            self.medium += 1;
        } else if n <= 40 {
            self.large += 1;
        } else {
            self.very_large += 1;
        }
    }
}

/// Base per-group solver budget in seconds, adapted to the expected group
/// size distribution.
pub fn base_time_per_group(
    orders: &[Order],
    cfg: &ClientConfig,
    total_timeout: u64,
    max_per_group: u64,
) -> u64 {
    let (num_groups, dist) = estimate_group_count(orders, cfg);
    let available = total_timeout.saturating_sub(PIPELINE_SETUP_RESERVE_SECS).max(1);

    if num_groups == 0 {
        return 5.min(max_per_group);
    }

    let mut tpg = (available / num_groups as u64).clamp(MIN_GROUP_TIME_SECS, max_per_group);

    let heavy = dist.large + dist.very_large;
    let heavy_share = heavy as f64 / num_groups as f64;
    if heavy_share > 0.3 {
        let factor = if heavy_share > 0.5 { 1.2 } else { 1.1 };
        tpg = ((tpg as f64 * factor) as u64).min(max_per_group);
        debug!(heavy_share, factor, "ajuste de presupuesto por grupos grandes");
    }
    if num_groups <= 5 {
        tpg = ((tpg as f64 * 1.5) as u64).min(max_per_group);
    }
    if num_groups > 50 && dist.small > 30 {
        tpg = ((tpg as f64 * 0.9) as u64).max(MIN_GROUP_TIME_SECS);
    }

    debug!(num_groups, tpg, ?dist, "presupuesto base por grupo");
    tpg
}

/// Final budget for one group, scaled by its order count.
pub fn adjust_group_time(base: u64, n_orders: usize) -> u64 {
    let scaled = |factor: f64| (base as f64 * factor) as u64;
    match n_orders {
        n if n < 3 => scaled(0.5).max(2),
        n if n < 5 => scaled(0.7).max(2),
        n if n <= 10 => scaled(0.9).max(3),
        n if n <= 30 => base,
        n if n <= 40 => scaled(2.5).min(50),
        n if n <= 60 => scaled(4.0).min(120),
        _ => scaled(5.0).min(150),
    }
}

/// Estimate how many groups generation will produce, with their sizes.
fn estimate_group_count(orders: &[Order], cfg: &ClientConfig) -> (usize, GroupSizeDistribution) {
    let groups = generate_groups(orders, cfg, GroupMode::Vcu);
    let mut dist = GroupSizeDistribution::default();
    for (_, members) in &groups {
        dist.record(members.len());
    }
    (groups.len(), dist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients;
    use crate::fixtures::order_generator::basic_order;

    fn walmart_order(id: &str, cd: &str, ce: &str, flow: Option<&str>) -> Order {
        let mut o = basic_order(id, 1_000.0, 5_000.0, 2.0);
        o.cd = cd.into();
        o.ce = ce.into();
        o.flow = flow.map(str::to_string);
        o
    }

    #[test]
    fn groups_are_disjoint_and_non_empty() {
        let cfg = clients::get("walmart").unwrap();
        let orders = vec![
            walmart_order("P1", "6009 Lo Aguirre", "0079", Some("INV")),
            walmart_order("P2", "6009 Lo Aguirre", "0079", Some("INV")),
            walmart_order("P3", "6020 Peñón", "0080", Some("CRR")),
            walmart_order("P4", "6020 Peñón", "0080", None),
        ];
        let groups = generate_groups(&orders, &cfg, GroupMode::Vcu);

        assert!(!groups.is_empty());
        let mut seen = BTreeSet::new();
        for (_, members) in &groups {
            assert!(!members.is_empty());
            for o in members {
                assert!(seen.insert(o.id.clone()), "order {} duplicated", o.id);
            }
        }
    }

    #[test]
    fn named_origin_splits_by_flow_and_emits_no_flow_group() {
        let cfg = clients::get("walmart").unwrap();
        let orders = vec![
            walmart_order("P1", "6009 Lo Aguirre", "0079", Some("INV")),
            walmart_order("P2", "6009 Lo Aguirre", "0079", Some("CRR")),
            walmart_order("P3", "6009 Lo Aguirre", "0079", None),
        ];
        let groups = generate_groups_for_type(&orders, &cfg, RouteType::Normal);
        let ids: Vec<&str> = groups.iter().map(|(g, _)| g.id.as_str()).collect();

        assert!(ids.iter().any(|id| id.ends_with("__INV")));
        assert!(ids.iter().any(|id| id.ends_with("__CRR")));
        assert!(ids.iter().any(|id| id.ends_with("__SIN_OC")));
        // INV and CRR both present: the configured mix group fires too, but
        // its members were claimed by the single-flow groups already.
        let total: usize = groups.iter().map(|(_, m)| m.len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn mix_group_fires_when_all_tags_present() {
        let mut cfg = clients::get("walmart").unwrap();
        // Drop the single-flow candidates by checking candidate order: the
        // mix group exists in the candidate list when INV and CRR coexist.
        let orders = vec![
            walmart_order("P1", "6009 Lo Aguirre", "0079", Some("INV")),
            walmart_order("P2", "6009 Lo Aguirre", "0079", Some("CRR")),
        ];
        let entries = cfg.routes_for(RouteType::Normal).to_vec();
        let candidates = route_candidates(&orders, &cfg, RouteType::Normal, &entries);
        assert!(candidates
            .iter()
            .any(|(_, _, f)| matches!(f, FlowFilter::Mix(tags) if tags.len() == 2)));

        // Without all tags present, no mix candidate.
        cfg.mix_grupos = vec![vec!["CRR".into(), "XDOCK".into()]];
        let candidates = route_candidates(&orders, &cfg, RouteType::Normal, &entries);
        assert!(!candidates.iter().any(|(_, _, f)| matches!(f, FlowFilter::Mix(_))));
    }

    #[test]
    fn multi_ce_requires_every_centre_present() {
        let cfg = clients::get("cencosud").unwrap();
        // multi_ce route is (cd, ["0088", "0103"]); only 0088 present.
        let mut o = basic_order("P1", 1_000.0, 5_000.0, 2.0);
        o.cd = "N725 Bodega Noviciado".into();
        o.ce = "0088".into();
        let groups = generate_groups_for_type(&[o], &cfg, RouteType::MultiCe);
        assert!(groups.is_empty());

        let mut o1 = basic_order("P1", 1_000.0, 5_000.0, 2.0);
        o1.cd = "N725 Bodega Noviciado".into();
        o1.ce = "0088".into();
        let mut o2 = basic_order("P2", 1_000.0, 5_000.0, 2.0);
        o2.cd = "N725 Bodega Noviciado".into();
        o2.ce = "0103".into();
        let groups = generate_groups_for_type(&[o1, o2], &cfg, RouteType::MultiCe);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].1.len(), 2);
    }

    #[test]
    fn binpacking_mode_uses_client_route_list() {
        let cfg = clients::get("cencosud").unwrap();
        assert_eq!(cfg.binpacking_route_types, vec![RouteType::Normal]);
        let mut o = basic_order("P1", 1_000.0, 5_000.0, 2.0);
        o.cd = "N725 Bodega Noviciado".into();
        o.ce = "0079".into();
        let groups = generate_groups(&[o], &cfg, GroupMode::Binpacking);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0.route_type, RouteType::Normal);
    }

    #[test]
    fn group_time_scales_with_order_count() {
        assert_eq!(adjust_group_time(10, 1), 5);
        assert_eq!(adjust_group_time(10, 4), 7);
        assert_eq!(adjust_group_time(10, 8), 9);
        assert_eq!(adjust_group_time(10, 20), 10);
        assert_eq!(adjust_group_time(10, 35), 25);
        assert_eq!(adjust_group_time(30, 35), 50, "cap at 50s");
        assert_eq!(adjust_group_time(10, 50), 40);
        assert_eq!(adjust_group_time(40, 50), 120, "cap at 120s");
        assert_eq!(adjust_group_time(10, 100), 50);
        assert_eq!(adjust_group_time(40, 100), 150, "cap at 150s");
    }

    #[test]
    fn base_time_honors_floor_and_cap() {
        let cfg = clients::get("cencosud").unwrap();
        let mut orders = vec![];
        for i in 0..4 {
            let mut o = basic_order(&format!("P{i}"), 1_000.0, 5_000.0, 2.0);
            o.cd = "N725 Bodega Noviciado".into();
            o.ce = "0079".into();
            orders.push(o);
        }
        // One small group, few groups total: 1.5x boost but capped.
        let tpg = base_time_per_group(&orders, &cfg, 150, 30);
        assert!(tpg >= MIN_GROUP_TIME_SECS && tpg <= 30);
    }
}
