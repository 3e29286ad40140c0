pub mod constant {
    // Solver scaling. These factors are shared between model construction and
    // result decoding; changing one side without the other corrupts pos_total.
    pub(crate) const SCALE_VCU: i64 = 1000;
    pub(crate) const SCALE_PALLETS: i64 = 10;

    // Truck-count upper bound for the assignment search.
    pub(crate) const MAX_TRUCKS_DEFAULT: usize = 20;
    pub(crate) const VCU_TRUCK_SLACK: usize = 1;
    pub(crate) const BINPACKING_TRUCK_SLACK: usize = 5;

    // Objective weights for the VCU model.
    pub(crate) const OBJ_WEIGHT_VCU: i64 = 1000;
    pub(crate) const OBJ_WEIGHT_ORDERS: i64 = 3000;
    pub(crate) const OBJ_WEIGHT_TRUCKS: i64 = 200;

    // Validation cycle limits.
    pub(crate) const MAX_RECOVERY_ROUNDS: usize = 3;
    pub(crate) const MAX_ADJUST_ITERATIONS: usize = 3;
    pub(crate) const MAX_REMOVAL_COMBO: usize = 4;
    pub(crate) const RECOVERY_TIME_LIMIT_SECS: u64 = 30;

    // Pipeline deadline margin checked between phases.
    pub(crate) const DEADLINE_MARGIN_SECS: f64 = 2.0;

    // Height validator.
    pub(crate) const LEGACY_PALLET_HEIGHT_CM: f64 = 150.0;
    pub(crate) const PICKING_RESIDUE_MIN: f64 = 0.01;

    // Capacity comparisons.
    pub(crate) const CAPACITY_EPS: f64 = 1e-6;

    // Group time budgeting.
    pub(crate) const MIN_GROUP_TIME_SECS: u64 = 2;
    pub(crate) const PIPELINE_SETUP_RESERVE_SECS: u64 = 5;
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Upper bound on trucks per solver model (`MAX_CAMIONES_CP_SAT`).
pub fn max_trucks() -> usize {
    env_usize("MAX_CAMIONES_CP_SAT", constant::MAX_TRUCKS_DEFAULT)
}

/// Cap on the per-group solver time budget in seconds (`MAX_TIEMPO_POR_GRUPO`).
pub fn max_time_per_group() -> u64 {
    env_u64("MAX_TIEMPO_POR_GRUPO", 30)
}

/// Worker cap for parallel truck validation (`GROUP_MAX_WORKERS`).
pub fn validation_workers() -> usize {
    env_usize("GROUP_MAX_WORKERS", 8).max(1)
}

/// Worker cap for the parallel "normal" route sub-phase (`THREAD_WORKERS_NORMAL`).
pub fn normal_phase_workers() -> usize {
    env_usize("THREAD_WORKERS_NORMAL", 8).max(1)
}
