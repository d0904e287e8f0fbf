use std::collections::HashMap;

use rand::Rng;

use crate::model::{MarketRegime, StrategyFamily, StrategyRecord};

/// Family the current regime favors, used both for selection weighting and
/// for widening that family's parameter bounds.
pub fn preferred_family(regime: MarketRegime) -> Option<StrategyFamily> {
    match regime {
        MarketRegime::Trending => Some(StrategyFamily::TrendFollowing),
        MarketRegime::Choppy => Some(StrategyFamily::MeanReversion),
        MarketRegime::Volatile => Some(StrategyFamily::Breakout),
        MarketRegime::Unknown => None,
    }
}

/// Picks the family for each spawn, weighting toward families
/// underrepresented in the active roster and toward the regime's preferred
/// family.
#[derive(Debug, Default)]
pub struct FamilyPlanner;

impl FamilyPlanner {
    const PREFERRED_BOOST: f64 = 1.5;

    pub fn select<R: Rng>(
        &self,
        roster: &[StrategyRecord],
        regime: MarketRegime,
        rng: &mut R,
    ) -> StrategyFamily {
        let mut counts: HashMap<StrategyFamily, usize> = HashMap::new();
        for record in roster.iter().filter(|s| s.is_active()) {
            *counts.entry(record.family).or_default() += 1;
        }

        let preferred = preferred_family(regime);
        let weights: Vec<(StrategyFamily, f64)> = StrategyFamily::all()
            .into_iter()
            .map(|family| {
                let count = counts.get(&family).copied().unwrap_or(0);
                let mut weight = 1.0 / (count as f64 + 1.0);
                if preferred == Some(family) {
                    weight *= Self::PREFERRED_BOOST;
                }
                (family, weight)
            })
            .collect();

        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        let mut roll = rng.gen_range(0.0..total);
        for (family, weight) in &weights {
            if roll < *weight {
                return *family;
            }
            roll -= weight;
        }
        // Floating point slop can exhaust the roll; last family wins.
        weights
            .last()
            .map(|(family, _)| *family)
            .unwrap_or(StrategyFamily::TrendFollowing)
    }
}
