use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{error, info, info_span};

use crate::api::types::{ApiResult, OptimizeResponse};
use crate::clients::{self, UnknownClient};
use crate::config;
use crate::domain::state::OptimizationState;
use crate::domain::types::Order;
use crate::groups::base_time_per_group;
use crate::pipelines::binpacking::BinPackingPipeline;
use crate::pipelines::vcu::VcuPipeline;

#[derive(Debug)]
pub enum OptimizeError {
    UnknownClient(UnknownClient),
    /// The concurrency semaphore could not be acquired in time.
    Busy,
    DeadlineExceeded,
    Internal(String),
}

impl fmt::Display for OptimizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizeError::UnknownClient(e) => write!(f, "{e}"),
            OptimizeError::Busy => write!(f, "servicio ocupado: demasiadas optimizaciones en curso"),
            OptimizeError::DeadlineExceeded => write!(f, "optimización excedió el tiempo máximo"),
            OptimizeError::Internal(msg) => write!(f, "error interno: {msg}"),
        }
    }
}

impl std::error::Error for OptimizeError {}

impl From<UnknownClient> for OptimizeError {
    fn from(e: UnknownClient) -> Self {
        OptimizeError::UnknownClient(e)
    }
}

/// Run both pipelines over one batch. `vcu_target` / `vcu_target_bh` are
/// 1..=100 percent overrides of the configured VCU floors.
pub fn optimize_two_phase(
    client: &str,
    channel: Option<&str>,
    orders: &[Order],
    timeout_secs: u64,
    vcu_target: Option<u8>,
    vcu_target_bh: Option<u8>,
) -> Result<OptimizeResponse, OptimizeError> {
    let span = info_span!("optimizar", client, ?channel, orders = orders.len());
    let _guard = span.enter();

    let mut cfg = clients::get(client)?.effective(channel);
    cfg.apply_vcu_targets(vcu_target, vcu_target_bh);

    let tpg = base_time_per_group(orders, &cfg, timeout_secs, config::max_time_per_group());
    info!(tpg, "presupuesto por grupo calculado");

    let vcu_result = VcuPipeline::new(&cfg).run(orders, timeout_secs, tpg);
    let bp_result = BinPackingPipeline::new(&cfg).run(orders, timeout_secs, tpg);

    let reference = cfg.default_capacity();
    let vcu_state =
        OptimizationState::new(vcu_result.trucks, vcu_result.not_included, reference);
    let bp_state = OptimizationState::new(bp_result.trucks, bp_result.not_included, reference);

    Ok(OptimizeResponse {
        vcu: ApiResult::from_state(&vcu_state),
        binpacking: ApiResult::from_state(&bp_state),
    })
}

/// Entry-point guard: a CPU-bounded semaphore with a 3-second acquire
/// timeout and an overall deadline around the blocking optimization.
pub async fn optimize_guarded(
    semaphore: Arc<Semaphore>,
    client: String,
    channel: Option<String>,
    orders: Vec<Order>,
    timeout_secs: u64,
    vcu_target: Option<u8>,
    vcu_target_bh: Option<u8>,
) -> Result<OptimizeResponse, OptimizeError> {
    let permit = tokio::time::timeout(Duration::from_secs(3), semaphore.acquire_owned())
        .await
        .map_err(|_| OptimizeError::Busy)?
        .map_err(|e| OptimizeError::Internal(e.to_string()))?;

    let handle = tokio::task::spawn_blocking(move || {
        let result = optimize_two_phase(
            &client,
            channel.as_deref(),
            &orders,
            timeout_secs,
            vcu_target,
            vcu_target_bh,
        );
        drop(permit);
        result
    });

    // The pipelines themselves stop at phase boundaries; the outer timeout
    // is the hard stop for a wedged run.
    match tokio::time::timeout(Duration::from_secs(timeout_secs + 10), handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => {
            error!(error = %join_err, "worker de optimización murió");
            Err(OptimizeError::Internal(join_err.to_string()))
        }
        Err(_) => Err(OptimizeError::DeadlineExceeded),
    }
}
