use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;
use tracing::{debug, info_span, warn};

use crate::clients::ClientConfig;
use crate::config;
use crate::domain::truck::{LayoutInfo, Truck};
use crate::validation::height_validator::{HeightValidator, ValidationOutcome};

/// Validate a batch of trucks in parallel, writing `layout_info` back onto
/// each. Only trucks carrying SKU detail are validated; the rest stay
/// unvalidated. A panicking worker marks just its own truck invalid.
pub fn validate_trucks(trucks: &mut [Truck], cfg: &ClientConfig, phase: &str) {
    let candidates = trucks
        .iter()
        .filter(|t| !t.is_empty() && t.orders().iter().any(|o| o.has_skus()))
        .count();
    if candidates == 0 {
        return;
    }

    let span = info_span!("validacion_altura", phase, trucks = candidates);
    let _guard = span.enter();

    let workers = config::validation_workers().min(candidates);
    let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build();

    let run = |trucks: &mut [Truck]| {
        trucks.par_iter_mut().for_each(|truck| {
            if truck.is_empty() || !truck.orders().iter().any(|o| o.has_skus()) {
                return;
            }
            validate_single_truck(truck, cfg);
        });
    };

    match pool {
        Ok(pool) => pool.install(|| run(trucks)),
        Err(e) => {
            warn!(error = %e, "pool de validación no disponible, ejecutando en el pool global");
            run(trucks)
        }
    }

    let valid = trucks.iter().filter(|t| t.is_validated()).count();
    debug!(valid, total = candidates, "validación de altura terminada");
}

/// Validate one truck and write the outcome onto it.
pub fn validate_single_truck(truck: &mut Truck, cfg: &ClientConfig) {
    let validator = validator_for(truck, cfg);
    let result = catch_unwind(AssertUnwindSafe(|| validator.validate_truck(truck)));

    match result {
        Ok(outcome) => {
            if let Some(layout) = &outcome.layout {
                truck.pos_total = layout.used_positions() as f64;
            }
            truck.layout_info = Some(layout_info_from(&outcome));
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic en validación".to_string());
            warn!(truck = %truck.id, error = %message, "worker de validación falló");
            truck.layout_info = Some(LayoutInfo {
                altura_validada: false,
                errores_validacion: vec![format!("error en validación: {message}")],
                ..LayoutInfo::default()
            });
        }
    }
}

/// Validator parameterised for this truck: its capacity height (tightened by
/// the Alvi cap when the route is an Alvi one) and the client's
/// consolidation settings.
fn validator_for(truck: &Truck, cfg: &ClientConfig) -> HeightValidator {
    let mut max_height = truck.capacity.height_cm;
    if let Some(cap) = cfg.alvi_altura_max_cm {
        if truck.cd.iter().any(|cd| cd.contains("Alvi")) {
            max_height = max_height.min(cap);
        }
    }
    HeightValidator {
        max_height_cm: max_height,
        levels: truck.capacity.levels,
        permite_consolidacion: cfg.permite_consolidacion,
        max_skus_por_pallet: cfg.max_skus_por_pallet,
        max_picking_stack_cm: cfg.altura_max_picking_apilado_cm,
    }
}

pub fn layout_info_from(outcome: &ValidationOutcome) -> LayoutInfo {
    let mut info = LayoutInfo {
        altura_validada: outcome.fits,
        validacion_skipped: false,
        errores_validacion: outcome.errors.clone(),
        fragmentos_fallidos: outcome.failed_fragments.clone(),
        fragmentos_totales: outcome.total_fragments,
        ..LayoutInfo::default()
    };
    if let Some(layout) = &outcome.layout {
        info.posiciones_usadas = layout.used_positions();
        info.posiciones_disponibles = layout.available_positions();
        info.altura_maxima_cm = layout.max_height_cm;
        info.total_pallets_fisicos = layout.total_pallets();
        info.altura_maxima_usada_cm = crate::utils::round1(layout.max_used_height_cm());
        info.altura_promedio_usada = crate::utils::round1(layout.avg_used_height_cm());
        info.aprovechamiento_altura = crate::utils::round1(layout.height_utilization() * 100.0);
        info.aprovechamiento_posiciones =
            crate::utils::round1(layout.position_utilization() * 100.0);
        info.posiciones = layout.snapshot();
    }
    info
}
