use serde::{Deserialize, Serialize};

/// Display-only label for how far into a fast the body is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetabolicPhase {
    Digestion,
    EarlyFast,
    FatBurning,
    LightKetosis,
    DeepKetosis,
    Autophagy,
    ExtendedFast,
}

/// Phase start boundaries in whole hours, ascending.
const PHASE_STARTS: [(u64, MetabolicPhase); 7] = [
    (0, MetabolicPhase::Digestion),
    (4, MetabolicPhase::EarlyFast),
    (8, MetabolicPhase::FatBurning),
    (12, MetabolicPhase::LightKetosis),
    (16, MetabolicPhase::DeepKetosis),
    (24, MetabolicPhase::Autophagy),
    (48, MetabolicPhase::ExtendedFast),
];

impl MetabolicPhase {
    pub fn from_elapsed(elapsed_seconds: u64) -> Self {
        let hours = elapsed_seconds / 3600;
        PHASE_STARTS
            .iter()
            .rev()
            .find(|(start, _)| hours >= *start)
            .map(|(_, phase)| *phase)
            .unwrap_or(MetabolicPhase::Digestion)
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetabolicPhase::Digestion => "Digestion",
            MetabolicPhase::EarlyFast => "Early Fast",
            MetabolicPhase::FatBurning => "Fat Burning",
            MetabolicPhase::LightKetosis => "Light Ketosis",
            MetabolicPhase::DeepKetosis => "Deep Ketosis",
            MetabolicPhase::Autophagy => "Autophagy",
            MetabolicPhase::ExtendedFast => "Extended Fast",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MetabolicPhase::Digestion => "Your body is processing its last meal",
            MetabolicPhase::EarlyFast => "Glucose is being used for energy",
            MetabolicPhase::FatBurning => "Your body is starting to burn fat for fuel",
            MetabolicPhase::LightKetosis => "Ketone production is ramping up",
            MetabolicPhase::DeepKetosis => "Peak fat burning and mental clarity",
            MetabolicPhase::Autophagy => "Cells are recycling worn-out components",
            MetabolicPhase::ExtendedFast => "Extended fast; listen to your body",
        }
    }
}
