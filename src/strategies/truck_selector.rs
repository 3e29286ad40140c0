use crate::domain::types::{GroupConfig, TruckType};

/// Pipeline phase the selection happens in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorPhase {
    Nestle,
    Backhaul,
    Binpacking,
}

/// Per-client truck-type selection policy. One enum with a dispatch table
/// rather than a trait per client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorPolicy {
    /// paquetera > rampla_directa > backhaul.
    Default,
    /// Nestle category first during the Nestle phase, backhaul in the
    /// backhaul phase.
    NestleFamily,
    /// Alvi + CRR prefers the small fleet.
    Smu,
    Walmart,
}

impl SelectorPolicy {
    pub fn for_client(name: &str) -> SelectorPolicy {
        match name.trim().to_lowercase().as_str() {
            "cencosud" | "nestle" => SelectorPolicy::NestleFamily,
            "smu" => SelectorPolicy::Smu,
            "walmart" => SelectorPolicy::Walmart,
            _ => SelectorPolicy::Default,
        }
    }

    pub fn select(
        &self,
        group: &GroupConfig,
        allowed: &[TruckType],
        phase: SelectorPhase,
    ) -> TruckType {
        if allowed.is_empty() {
            return TruckType::Paquetera;
        }
        match self {
            SelectorPolicy::Default | SelectorPolicy::Walmart => first_by_priority(
                allowed,
                &[
                    TruckType::Paquetera,
                    TruckType::RamplaDirecta,
                    TruckType::Backhaul,
                ],
            ),
            SelectorPolicy::NestleFamily => {
                if phase == SelectorPhase::Backhaul
                    && allowed.contains(&TruckType::Backhaul)
                {
                    return TruckType::Backhaul;
                }
                let nestle: Vec<TruckType> =
                    allowed.iter().copied().filter(|t| t.is_nestle()).collect();
                if !nestle.is_empty() {
                    return first_by_priority(
                        &nestle,
                        &[TruckType::Paquetera, TruckType::RamplaDirecta],
                    );
                }
                if allowed.contains(&TruckType::Backhaul) {
                    return TruckType::Backhaul;
                }
                allowed[0]
            }
            SelectorPolicy::Smu => {
                let is_alvi = group.cd.first().map_or(false, |cd| cd.contains("Alvi"));
                let is_crr = group
                    .single_flow()
                    .map_or(false, |f| f.eq_ignore_ascii_case("CRR"));
                if is_alvi && is_crr {
                    if allowed.contains(&TruckType::Pequeno) {
                        return TruckType::Pequeno;
                    }
                    if allowed.contains(&TruckType::Mediano) {
                        return TruckType::Mediano;
                    }
                }
                first_by_priority(
                    allowed,
                    &[
                        TruckType::Paquetera,
                        TruckType::RamplaDirecta,
                        TruckType::Backhaul,
                    ],
                )
            }
        }
    }
}

fn first_by_priority(allowed: &[TruckType], priority: &[TruckType]) -> TruckType {
    priority
        .iter()
        .copied()
        .find(|t| allowed.contains(t))
        .unwrap_or(allowed[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{FlowFilter, RouteType};

    fn group(cd: &str, flow: FlowFilter) -> GroupConfig {
        GroupConfig::new(
            RouteType::Normal,
            vec![cd.to_string()],
            vec!["0079".to_string()],
            flow,
        )
    }

    #[test]
    fn default_prefers_paquetera() {
        let g = group("CD", FlowFilter::Any);
        let allowed = [TruckType::Backhaul, TruckType::RamplaDirecta, TruckType::Paquetera];
        assert_eq!(
            SelectorPolicy::Default.select(&g, &allowed, SelectorPhase::Nestle),
            TruckType::Paquetera
        );
    }

    #[test]
    fn nestle_family_switches_on_phase() {
        let g = group("CD", FlowFilter::Any);
        let allowed = [TruckType::Paquetera, TruckType::Backhaul];
        let policy = SelectorPolicy::NestleFamily;
        assert_eq!(
            policy.select(&g, &allowed, SelectorPhase::Nestle),
            TruckType::Paquetera
        );
        assert_eq!(
            policy.select(&g, &allowed, SelectorPhase::Backhaul),
            TruckType::Backhaul
        );
    }

    #[test]
    fn smu_alvi_crr_prefers_small_trucks() {
        let policy = SelectorPolicy::Smu;
        let allowed = [
            TruckType::Pequeno,
            TruckType::Mediano,
            TruckType::Paquetera,
        ];

        let alvi_crr = group("Alvi Lo Espejo", FlowFilter::One("CRR".into()));
        assert_eq!(
            policy.select(&alvi_crr, &allowed, SelectorPhase::Nestle),
            TruckType::Pequeno
        );

        let alvi_inv = group("Alvi Lo Espejo", FlowFilter::One("INV".into()));
        assert_eq!(
            policy.select(&alvi_inv, &allowed, SelectorPhase::Nestle),
            TruckType::Paquetera
        );

        let rendic_crr = group("Rendic Coquimbo", FlowFilter::One("CRR".into()));
        assert_eq!(
            policy.select(&rendic_crr, &allowed, SelectorPhase::Nestle),
            TruckType::Paquetera
        );
    }

    #[test]
    fn registry_maps_clients_to_policies() {
        assert_eq!(SelectorPolicy::for_client("cencosud"), SelectorPolicy::NestleFamily);
        assert_eq!(SelectorPolicy::for_client("SMU"), SelectorPolicy::Smu);
        assert_eq!(SelectorPolicy::for_client("disvet"), SelectorPolicy::Default);
    }
}
