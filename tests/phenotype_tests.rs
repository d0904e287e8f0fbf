use quant_arena::model::{MarketRegime, ParamValue, StrategyFamily};
use quant_arena::phenotype::{
    adapted_param_space, family_param_space, ParamSpec, PhenotypeGenerator,
    RandomPhenotypeGenerator,
};

fn assert_within(spec: &ParamSpec, value: &ParamValue, name: &str) {
    match (spec, value) {
        (ParamSpec::IntRange { min, max }, ParamValue::Int(v)) => {
            assert!(v >= min && v <= max, "{name}={v} outside [{min}, {max}]");
        }
        (ParamSpec::FloatRange { min, max }, ParamValue::Float(v)) => {
            assert!(v >= min && v <= max, "{name}={v} outside [{min}, {max}]");
        }
        (ParamSpec::Choice(choices), ParamValue::Choice(v)) => {
            assert!(choices.contains(&v.as_str()), "{name}={v} not a valid choice");
        }
        _ => panic!("{name}: value kind does not match its spec"),
    }
}

#[test]
/// Verifies sampling stays inside the family bounds for every family when
/// no regime preference applies.
fn generated_params_stay_within_family_bounds() {
    let mut generator = RandomPhenotypeGenerator::seeded(1);
    for family in StrategyFamily::all() {
        let space = family_param_space(family);
        for _ in 0..50 {
            let params = generator.generate(family, MarketRegime::Unknown);
            assert_eq!(params.len(), space.len());
            for (name, spec) in &space {
                let value = params.get(*name).expect("missing parameter");
                assert_within(spec, value, name);
            }
        }
    }
}

#[test]
/// Verifies regime adaptation: the preferred family's numeric bounds widen
/// by 25%, choices are untouched, and other families keep their base space.
fn preferred_family_bounds_are_widened() {
    let adapted = adapted_param_space(StrategyFamily::TrendFollowing, MarketRegime::Trending);
    let lookback = &adapted
        .iter()
        .find(|(name, _)| *name == "lookback_days")
        .expect("lookback_days missing")
        .1;
    // Base 10..60: span 50, widened 25% adds 6 on either side.
    assert_eq!(lookback, &ParamSpec::IntRange { min: 4, max: 66 });

    let smoothing = &adapted
        .iter()
        .find(|(name, _)| *name == "smoothing")
        .expect("smoothing missing")
        .1;
    assert_eq!(smoothing, &ParamSpec::Choice(&["ema", "sma", "wma"]));

    // A non-preferred family is unchanged under the same regime.
    assert_eq!(
        adapted_param_space(StrategyFamily::MeanReversion, MarketRegime::Trending),
        family_param_space(StrategyFamily::MeanReversion)
    );
}

#[test]
/// Verifies widened sampling still respects the widened bounds.
fn preferred_family_samples_within_widened_bounds() {
    let mut generator = RandomPhenotypeGenerator::seeded(7);
    let space = adapted_param_space(StrategyFamily::Breakout, MarketRegime::Volatile);
    for _ in 0..50 {
        let params = generator.generate(StrategyFamily::Breakout, MarketRegime::Volatile);
        for (name, spec) in &space {
            let value = params.get(*name).expect("missing parameter");
            assert_within(spec, value, name);
        }
    }
}

#[test]
/// Verifies seeded determinism: two generators with the same seed produce
/// identical phenotypes.
fn seeded_generators_are_deterministic() {
    let mut a = RandomPhenotypeGenerator::seeded(42);
    let mut b = RandomPhenotypeGenerator::seeded(42);
    for family in StrategyFamily::all() {
        assert_eq!(
            a.generate(family, MarketRegime::Choppy),
            b.generate(family, MarketRegime::Choppy)
        );
    }
}

#[test]
/// Verifies numeric widening never produces degenerate bounds.
fn widened_bounds_stay_positive() {
    // Mean reversion's stop loss starts at 0.5; widening must not cross zero.
    let adapted = adapted_param_space(StrategyFamily::MeanReversion, MarketRegime::Choppy);
    for (name, spec) in &adapted {
        match spec {
            ParamSpec::IntRange { min, max } => {
                assert!(*min >= 1, "{name} int min fell below 1");
                assert!(max > min);
            }
            ParamSpec::FloatRange { min, max } => {
                assert!(*min >= 0.0, "{name} float min fell below 0");
                assert!(max > min);
            }
            ParamSpec::Choice(choices) => assert!(!choices.is_empty()),
        }
    }
}
