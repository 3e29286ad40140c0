use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};

use crate::clients::ClientConfig;
use crate::config;
use crate::domain::truck::Truck;
use crate::domain::types::{GroupConfig, Order, RouteType, TruckCapacity, TruckType};
use crate::groups::{adjust_group_time, generate_groups_for_type};
use crate::pipelines::{filter_available, PhaseContext, PipelineResult};
use crate::solver::vcu::optimize_group_vcu;
use crate::strategies::adherence::apply_backhaul_adherence;
use crate::strategies::reclassifier::reclassify_nestle;
use crate::strategies::truck_selector::{SelectorPhase, SelectorPolicy};
use crate::validation::cycle::run_validation_cycle;
use crate::validation::OptimizeMode;

/// The full VCU cascade: optional backhaul-adherence pre-pass, the Nestle
/// pass, the backhaul pass, then reclassification and adherence.
pub struct VcuPipeline<'a> {
    cfg: &'a ClientConfig,
    selector: SelectorPolicy,
}

/// One group readied for the solver.
struct PreparedGroup {
    group: GroupConfig,
    orders: Vec<Order>,
    capacity: TruckCapacity,
    truck_type: TruckType,
}

impl<'a> VcuPipeline<'a> {
    pub fn new(cfg: &'a ClientConfig) -> Self {
        VcuPipeline {
            selector: SelectorPolicy::for_client(cfg.name),
            cfg,
        }
    }

    pub fn run(&self, orders: &[Order], timeout_secs: u64, tpg: u64) -> PipelineResult {
        let span = info_span!("pipeline_vcu", orders = orders.len(), timeout_secs);
        let _guard = span.enter();
        let started = Instant::now();

        if orders.is_empty() {
            return PipelineResult::default();
        }

        let mut ctx = PhaseContext::new(timeout_secs, tpg);
        let mut result = PipelineResult::default();

        // Phase 0: backhaul adherence pre-pass.
        if let Some(ratio) = self.cfg.adherencia_backhaul.filter(|r| *r > 0.0) {
            debug!(ratio, modo = ?self.cfg.modo_adherencia, "adherencia configurada");
            let phase = self.run_adherence_prepass(orders, &ctx, ratio);
            ctx.assigned.extend(phase.assigned.iter().cloned());
            result.absorb(phase);
            result.phases.push("adherencia");
        }

        // Phase 1: Nestle trucks.
        let available = filter_available(orders, &ctx.assigned);
        if !ctx.near_deadline() && !available.is_empty() {
            let phase = self.run_nestle_phase(&available, &mut ctx);
            ctx.assigned.extend(phase.assigned.iter().cloned());
            result.absorb(phase);
            result.phases.push("nestle");
        }

        // Phase 2: backhaul trucks over the leftovers.
        let available = filter_available(orders, &ctx.assigned);
        if !ctx.near_deadline() && !available.is_empty() {
            let phase = self.run_backhaul_phase(&available, &mut ctx);
            ctx.assigned.extend(phase.assigned.iter().cloned());
            result.absorb(phase);
            result.phases.push("backhaul");
        }

        // Post-processing: reclassify first, adherence second. The order is
        // load-bearing: adherence may convert a freshly downgraded rampla
        // back to backhaul.
        reclassify_nestle(&mut result.trucks, self.cfg);
        if let Some(ratio) = self.cfg.adherencia_backhaul.filter(|r| *r > 0.0) {
            apply_backhaul_adherence(&mut result.trucks, self.cfg, ratio);
        }

        // The trucks are the source of truth for what ended up assigned.
        result.assigned = result
            .trucks
            .iter()
            .flat_map(|t| t.orders().iter().map(|o| o.id.clone()))
            .collect();
        result.not_included = filter_available(orders, &result.assigned);
        result.elapsed_ms = started.elapsed().as_millis();

        info!(
            trucks = result.trucks.len(),
            assigned = result.assigned.len(),
            not_included = result.not_included.len(),
            elapsed_ms = result.elapsed_ms,
            "pipeline VCU terminado"
        );
        result
    }

    /// Phase 0: open backhaul trucks up-front to meet the adherence target.
    fn run_adherence_prepass(
        &self,
        orders: &[Order],
        ctx: &PhaseContext,
        ratio: f64,
    ) -> PipelineResult {
        let span = info_span!("fase_adherencia");
        let _guard = span.enter();

        let Some(bh_capacity) = self.cfg.truck_types.get(&TruckType::Backhaul).copied() else {
            return PipelineResult::default();
        };
        let target = self.estimate_backhaul_target(orders, ratio);

        let allowed_bh: Vec<Order> = orders
            .iter()
            .filter(|o| {
                self.cfg
                    .allowed_trucks_for_route(
                        &[o.cd.clone()],
                        &[o.ce.clone()],
                        RouteType::Normal,
                        o.flow.as_deref(),
                    )
                    .iter()
                    .any(|t| t.is_backhaul())
            })
            .cloned()
            .collect();
        if allowed_bh.is_empty() {
            return PipelineResult::default();
        }

        let mut trucks: Vec<Truck> = vec![];
        let mut assigned = std::collections::BTreeSet::new();
        for (group, members) in
            generate_groups_for_type(&allowed_bh, self.cfg, RouteType::Normal)
        {
            if trucks.len() >= target || ctx.near_deadline() {
                break;
            }
            let members = filter_available(&members, &assigned);
            if members.is_empty() {
                continue;
            }
            let budget = Duration::from_secs(adjust_group_time(ctx.tpg, members.len()));
            let outcome = optimize_group_vcu(
                &members,
                &group,
                self.cfg,
                &bh_capacity,
                budget,
                TruckType::Backhaul,
            );
            if outcome.is_usable() {
                assigned.extend(outcome.assigned_ids.iter().cloned());
                trucks.extend(outcome.trucks);
            }
        }
        trucks.truncate(target);

        let cycle = run_validation_cycle(trucks, self.cfg, OptimizeMode::Vcu, "fase_0_bh");
        PipelineResult {
            trucks: cycle.trucks,
            assigned: cycle.assigned,
            ..PipelineResult::default()
        }
    }

    /// Phase 1: the four Nestle sub-phases in fixed order; "normal" runs its
    /// groups in parallel.
    fn run_nestle_phase(&self, orders: &[Order], ctx: &mut PhaseContext) -> PipelineResult {
        let span = info_span!("fase_nestle");
        let _guard = span.enter();

        // Routes that only admit backhaul sit this phase out.
        let nestle_orders: Vec<Order> = orders
            .iter()
            .filter(|o| {
                !self
                    .cfg
                    .is_backhaul_only_route(&o.cd, &o.ce, o.flow.as_deref())
            })
            .cloned()
            .collect();

        let mut phase_trucks: Vec<Truck> = vec![];
        let mut phase_assigned = std::collections::BTreeSet::new();

        for route_type in RouteType::NESTLE_ORDER {
            if ctx.near_deadline() {
                warn!(route_type = %route_type, "deadline cercano, sub-fase omitida");
                break;
            }
            let available = filter_available(&nestle_orders, &phase_assigned);
            if available.is_empty() {
                break;
            }

            let prepared = self.prepare_groups(&available, route_type, SelectorPhase::Nestle);
            if prepared.is_empty() {
                continue;
            }
            let parallel = route_type == RouteType::Normal;
            let outcome = self.solve_prepared(prepared, ctx, parallel);
            phase_assigned.extend(outcome.assigned.iter().cloned());
            phase_trucks.extend(outcome.trucks);
        }

        if phase_trucks.is_empty() {
            return PipelineResult {
                assigned: phase_assigned,
                ..PipelineResult::default()
            };
        }
        let cycle =
            run_validation_cycle(phase_trucks, self.cfg, OptimizeMode::Vcu, "fase_1_nestle");
        PipelineResult {
            trucks: cycle.trucks,
            assigned: cycle.assigned,
            ..PipelineResult::default()
        }
    }

    /// Phase 2: whatever is left goes against backhaul capacity.
    fn run_backhaul_phase(&self, orders: &[Order], ctx: &mut PhaseContext) -> PipelineResult {
        let span = info_span!("fase_backhaul");
        let _guard = span.enter();

        let Some(bh_capacity) = self.cfg.truck_types.get(&TruckType::Backhaul).copied() else {
            return PipelineResult::default();
        };

        let mut phase_trucks: Vec<Truck> = vec![];
        let mut phase_assigned = std::collections::BTreeSet::new();

        for route_type in RouteType::NESTLE_ORDER {
            if ctx.near_deadline() {
                break;
            }
            let available: Vec<Order> = filter_available(orders, &phase_assigned);
            if available.is_empty() {
                break;
            }

            for (group, members) in generate_groups_for_type(&available, self.cfg, route_type) {
                if ctx.near_deadline() {
                    break;
                }
                let members = filter_available(&members, &phase_assigned);
                if members.is_empty() {
                    continue;
                }
                let allowed = self.cfg.allowed_trucks_for_route(
                    &group.cd,
                    &group.ce,
                    route_type,
                    group.single_flow(),
                );
                if !allowed.iter().any(|t| t.is_backhaul()) {
                    continue;
                }

                let budget = Duration::from_secs(adjust_group_time(ctx.tpg, members.len()));
                let outcome = optimize_group_vcu(
                    &members,
                    &group,
                    self.cfg,
                    &bh_capacity,
                    budget,
                    TruckType::Backhaul,
                );
                if outcome.is_usable() && !outcome.trucks.is_empty() {
                    phase_assigned.extend(outcome.assigned_ids.iter().cloned());
                    phase_trucks.extend(outcome.trucks);
                }
            }
        }

        if phase_trucks.is_empty() {
            return PipelineResult {
                assigned: phase_assigned,
                ..PipelineResult::default()
            };
        }
        let cycle =
            run_validation_cycle(phase_trucks, self.cfg, OptimizeMode::Vcu, "fase_2_bh");
        PipelineResult {
            trucks: cycle.trucks,
            assigned: cycle.assigned,
            ..PipelineResult::default()
        }
    }

    /// Attach capacity and truck type to every group of one route type.
    fn prepare_groups(
        &self,
        orders: &[Order],
        route_type: RouteType,
        phase: SelectorPhase,
    ) -> Vec<PreparedGroup> {
        let mut prepared = vec![];
        for (group, members) in generate_groups_for_type(orders, self.cfg, route_type) {
            let allowed = self.cfg.allowed_trucks_for_route(
                &group.cd,
                &group.ce,
                route_type,
                group.single_flow(),
            );
            let nestle: Vec<TruckType> =
                allowed.into_iter().filter(|t| t.is_nestle()).collect();
            if nestle.is_empty() {
                continue;
            }
            let truck_type = self.selector.select(&group, &nestle, phase);
            let capacity = self.cfg.capacity_for(truck_type);
            prepared.push(PreparedGroup {
                group,
                orders: members,
                capacity,
                truck_type,
            });
        }
        prepared
    }

    /// Solve prepared groups, optionally in parallel. Results merge under
    /// the monotonic assigned set; disjoint groups make the first-claim rule
    /// a belt-and-braces check.
    fn solve_prepared(
        &self,
        mut prepared: Vec<PreparedGroup>,
        ctx: &PhaseContext,
        parallel: bool,
    ) -> PipelineResult {
        // Biggest groups first so the heavy solves start early.
        prepared.sort_by_key(|p| std::cmp::Reverse(p.orders.len()));

        let solve_one = |p: &PreparedGroup| {
            let budget = Duration::from_secs(adjust_group_time(ctx.tpg, p.orders.len()))
                .min(ctx.remaining());
            optimize_group_vcu(
                &p.orders,
                &p.group,
                self.cfg,
                &p.capacity,
                budget,
                p.truck_type,
            )
        };

        let outcomes: Vec<_> = if parallel {
            let workers = config::normal_phase_workers().min(prepared.len().max(1));
            let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build();
            match pool {
                Ok(pool) => pool.install(|| prepared.par_iter().map(solve_one).collect()),
                Err(e) => {
                    warn!(error = %e, "pool paralelo no disponible, resolviendo secuencial");
                    prepared.iter().map(solve_one).collect()
                }
            }
        } else {
            let mut collected = vec![];
            for p in &prepared {
                if ctx.near_deadline() {
                    break;
                }
                collected.push(solve_one(p));
            }
            collected
        };

        let mut result = PipelineResult::default();
        for outcome in outcomes {
            if !outcome.is_usable() || outcome.trucks.is_empty() {
                continue;
            }
            // First claim wins; duplicates cannot occur with disjoint groups.
            if outcome
                .assigned_ids
                .iter()
                .any(|id| result.assigned.contains(id))
            {
                debug!("resultado duplicado descartado");
                continue;
            }
            result.assigned.extend(outcome.assigned_ids.iter().cloned());
            result.trucks.extend(outcome.trucks);
        }
        result
    }

    /// Backhaul trucks needed to meet the ratio, from aggregate totals.
    fn estimate_backhaul_target(&self, orders: &[Order], ratio: f64) -> usize {
        let reference = self.cfg.default_capacity();
        let total_weight: f64 = orders.iter().map(|o| o.weight_kg).sum();
        let total_volume: f64 = orders.iter().map(|o| o.volume_m3).sum();

        let by_weight = total_weight / reference.weight_kg.max(1.0);
        let by_volume = total_volume / reference.volume_m3.max(1.0);
        let estimated = (by_weight.max(by_volume) as usize).saturating_add(2).max(1);
        ((estimated as f64 * ratio) as usize).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients;
    use crate::fixtures::order_generator::{basic_order, basic_sku};

    fn cencosud_order(id: &str, cd: &str, ce: &str, weight: f64, volume: f64) -> Order {
        let mut o = basic_order(id, weight, volume, 10.0);
        o.cd = cd.into();
        o.ce = ce.into();
        o.po = format!("PO_{id}");
        let sku = basic_sku(&o, &format!("SKU_{id}"), 150.0);
        o.skus = vec![sku];
        o
    }

    #[test]
    fn empty_input_gives_empty_result() {
        let cfg = clients::get("cencosud").unwrap().effective(None);
        let result = VcuPipeline::new(&cfg).run(&[], 60, 10);
        assert!(result.trucks.is_empty());
        assert!(result.not_included.is_empty());
    }

    #[test]
    fn partition_property_every_order_exactly_once() {
        let cfg = clients::get("cencosud").unwrap().effective(None);
        let orders: Vec<Order> = (0..8)
            .map(|i| {
                cencosud_order(
                    &format!("P{i}"),
                    "N725 Bodega Noviciado",
                    "0079",
                    9_500.0,
                    28_000.0,
                )
            })
            .collect();

        let result = VcuPipeline::new(&cfg).run(&orders, 60, 5);

        let mut seen = std::collections::BTreeSet::new();
        for t in &result.trucks {
            for o in t.orders() {
                assert!(seen.insert(o.id.clone()));
            }
        }
        for o in &result.not_included {
            assert!(seen.insert(o.id.clone()));
        }
        assert_eq!(seen.len(), orders.len());
    }

    #[test]
    fn trucks_meet_vcu_floor_and_capacity() {
        let cfg = clients::get("cencosud").unwrap().effective(None);
        let orders: Vec<Order> = (0..6)
            .map(|i| {
                cencosud_order(
                    &format!("P{i}"),
                    "N725 Bodega Noviciado",
                    "0079",
                    10_000.0,
                    30_000.0,
                )
            })
            .collect();

        let result = VcuPipeline::new(&cfg).run(&orders, 60, 5);
        for truck in &result.trucks {
            assert!(truck.total_weight() <= truck.capacity.weight_kg + 1e-6);
            assert!(truck.total_volume() <= truck.capacity.volume_m3 + 1e-6);
            assert!(truck.vcu_max() >= truck.capacity.min_vcu - 1e-9);
            assert!(truck.pos_total <= truck.capacity.max_positions as f64 + 1e-6);
        }
    }

    #[test]
    fn overtall_order_lands_in_not_included() {
        let cfg = clients::get("cencosud").unwrap().effective(None);
        let mut bad = cencosud_order("TALL", "N725 Bodega Noviciado", "0079", 20_000.0, 40_000.0);
        bad.skus[0].full_pallet_height_cm = 300.0;

        let result = VcuPipeline::new(&cfg).run(&[bad], 60, 5);
        assert!(result.trucks.is_empty());
        assert_eq!(result.not_included.len(), 1);
        assert_eq!(result.not_included[0].id, "TALL");
    }

    #[test]
    fn adherence_prepass_runs_for_configured_channel() {
        let cfg = clients::get("cencosud").unwrap().effective(Some("Frios"));
        assert_eq!(cfg.adherencia_backhaul, Some(0.4));
        let orders: Vec<Order> = (0..6)
            .map(|i| {
                cencosud_order(
                    &format!("P{i}"),
                    "N725 Bodega Noviciado",
                    "0079",
                    9_500.0,
                    28_000.0,
                )
            })
            .collect();

        let result = VcuPipeline::new(&cfg).run(&orders, 60, 5);
        assert!(result.phases.contains(&"adherencia"));
        // With the pre-pass plus the post-pass, some backhaul presence is
        // expected whenever trucks exist at all.
        if !result.trucks.is_empty() {
            assert!(result
                .trucks
                .iter()
                .any(|t| t.truck_type.is_backhaul()));
        }
    }
}
