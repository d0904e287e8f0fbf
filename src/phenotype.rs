use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::{MarketRegime, ParamValue, StrategyFamily};
use crate::trigger::family::preferred_family;

/// Bounded definition of one gene in a family's parameter space.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamSpec {
    IntRange { min: i64, max: i64 },
    FloatRange { min: f64, max: f64 },
    Choice(&'static [&'static str]),
}

impl ParamSpec {
    /// Widen numeric bounds outward by `factor` (1.25 widens the span 25%).
    /// Choices are unaffected.
    fn widened(&self, factor: f64) -> ParamSpec {
        match self {
            Self::IntRange { min, max } => {
                let span = (*max - *min) as f64;
                let extra = (span * (factor - 1.0) / 2.0).round() as i64;
                Self::IntRange {
                    min: (*min - extra).max(1),
                    max: *max + extra,
                }
            }
            Self::FloatRange { min, max } => {
                let span = *max - *min;
                let extra = span * (factor - 1.0) / 2.0;
                Self::FloatRange {
                    min: (*min - extra).max(0.0),
                    max: *max + extra,
                }
            }
            Self::Choice(choices) => Self::Choice(choices),
        }
    }
}

/// Base parameter space per family.
pub fn family_param_space(family: StrategyFamily) -> Vec<(&'static str, ParamSpec)> {
    match family {
        StrategyFamily::TrendFollowing => vec![
            ("lookback_days", ParamSpec::IntRange { min: 10, max: 60 }),
            ("entry_zscore", ParamSpec::FloatRange { min: 0.5, max: 2.0 }),
            ("stop_loss_pct", ParamSpec::FloatRange { min: 1.0, max: 5.0 }),
            ("smoothing", ParamSpec::Choice(&["ema", "sma", "wma"])),
        ],
        StrategyFamily::MeanReversion => vec![
            ("lookback_days", ParamSpec::IntRange { min: 5, max: 30 }),
            ("band_width", ParamSpec::FloatRange { min: 1.0, max: 3.0 }),
            ("max_hold_days", ParamSpec::IntRange { min: 1, max: 10 }),
            ("stop_loss_pct", ParamSpec::FloatRange { min: 0.5, max: 3.0 }),
        ],
        StrategyFamily::Breakout => vec![
            ("channel_days", ParamSpec::IntRange { min: 10, max: 55 }),
            ("volume_confirm", ParamSpec::FloatRange { min: 1.0, max: 3.0 }),
            ("atr_multiple", ParamSpec::FloatRange { min: 1.5, max: 4.0 }),
            ("entry_style", ParamSpec::Choice(&["close_above", "intraday"])),
        ],
    }
}

/// Regime-specific gene bounds: the regime's preferred family gets its
/// numeric ranges widened so spawns explore more of its space.
pub fn adapted_param_space(
    family: StrategyFamily,
    regime: MarketRegime,
) -> Vec<(&'static str, ParamSpec)> {
    let base = family_param_space(family);
    if preferred_family(regime) != Some(family) {
        return base;
    }
    base.into_iter()
        .map(|(name, spec)| (name, spec.widened(1.25)))
        .collect()
}

/// Produces one concrete parameter set (phenotype) per spawn request.
pub trait PhenotypeGenerator: Send {
    fn generate(
        &mut self,
        family: StrategyFamily,
        regime: MarketRegime,
    ) -> BTreeMap<String, ParamValue>;
}

/// Uniform random sampling within the (regime-adapted) family bounds.
pub struct RandomPhenotypeGenerator {
    rng: StdRng,
}

impl RandomPhenotypeGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPhenotypeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PhenotypeGenerator for RandomPhenotypeGenerator {
    fn generate(
        &mut self,
        family: StrategyFamily,
        regime: MarketRegime,
    ) -> BTreeMap<String, ParamValue> {
        let mut params = BTreeMap::new();
        for (name, spec) in adapted_param_space(family, regime) {
            let value = match spec {
                ParamSpec::IntRange { min, max } => {
                    ParamValue::Int(self.rng.gen_range(min..=max))
                }
                ParamSpec::FloatRange { min, max } => {
                    ParamValue::Float(self.rng.gen_range(min..=max))
                }
                ParamSpec::Choice(choices) => {
                    let idx = self.rng.gen_range(0..choices.len());
                    ParamValue::Choice(choices[idx].to_string())
                }
            };
            params.insert(name.to_string(), value);
        }
        params
    }
}
