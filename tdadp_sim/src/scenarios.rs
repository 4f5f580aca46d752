//! Attack scenarios for experiments.

use crate::attack::AttackParams;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// No malicious workers
    Baseline,

    /// One attacker controls 20% of the workers
    Sybil,

    /// Three attackers share 30% of the workers
    Coalition,

    /// Coalition whose workers deviate from the shared label 30% of the time
    NoisyCoalition,

    /// Two attackers control half of the workforce
    Takeover,

    /// Attack strength taken from the command line
    Custom,
}

impl ScenarioId {
    /// Returns every preset scenario (`Custom` excluded).
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Baseline,
            ScenarioId::Sybil,
            ScenarioId::Coalition,
            ScenarioId::NoisyCoalition,
            ScenarioId::Takeover,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "baseline",
            ScenarioId::Sybil => "sybil",
            ScenarioId::Coalition => "coalition",
            ScenarioId::NoisyCoalition => "noisy_coalition",
            ScenarioId::Takeover => "takeover",
            ScenarioId::Custom => "custom",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "Honest crowd, no attackers",
            ScenarioId::Sybil => "Single attacker with 20% sybil workers",
            ScenarioId::Coalition => "Three colluding attackers over 30% of the workers",
            ScenarioId::NoisyCoalition => "Coalition with 30% deviation from the shared label",
            ScenarioId::Takeover => "Two attackers controlling half of the workers",
            ScenarioId::Custom => "Attack strength from --mu, --lambda and --epsilon",
        }
    }

    /// Returns the preset attack, or `None` for `Custom`.
    pub fn attack(&self) -> Option<AttackParams> {
        match self {
            ScenarioId::Baseline => Some(AttackParams::default()),
            ScenarioId::Sybil => Some(AttackParams::new(0.2, 1, 0.0)),
            ScenarioId::Coalition => Some(AttackParams::new(0.3, 3, 0.0)),
            ScenarioId::NoisyCoalition => Some(AttackParams::new(0.3, 3, 0.3)),
            ScenarioId::Takeover => Some(AttackParams::new(0.5, 2, 0.0)),
            ScenarioId::Custom => None,
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "baseline" | "honest" => Ok(ScenarioId::Baseline),
            "sybil" => Ok(ScenarioId::Sybil),
            "coalition" => Ok(ScenarioId::Coalition),
            "noisy_coalition" | "noisycoalition" | "noisy" => Ok(ScenarioId::NoisyCoalition),
            "takeover" => Ok(ScenarioId::Takeover),
            "custom" => Ok(ScenarioId::Custom),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
