use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Beta;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::earley::Earley;
use crate::error::Error;
use crate::inside::inside_with;
use crate::nederhof::Nederhof;
use crate::rule::{Derivation, Rule};
use crate::sampler::AncestralSampler;
use crate::slice::SliceVariables;
use crate::symbol::Symbol;
use crate::topsort::top_sort;
use crate::wcfg::Wcfg;
use crate::wfsa::Wfsa;
use crate::Strategy;

/// Knobs for the slice-sampled Markov chain.
///
/// `a` and `b` hold the Beta shape pairs: `.0` applies while no derivation
/// has been accepted yet, `.1` from the first acceptance on. `burn`
/// accepted derivations are dropped from the output but still drive the
/// chain's conditions.
#[derive(Debug, Clone)]
pub struct McmcConfig {
  pub samples: usize,
  pub burn: usize,
  pub max_iterations: usize,
  pub a: (f64, f64),
  pub b: (f64, f64),
  pub strategy: Strategy,
  pub seed: Option<u64>,
}

impl Default for McmcConfig {
  fn default() -> Self {
    Self {
      samples: 100,
      burn: 0,
      max_iterations: 1000,
      a: (0.1, 0.3),
      b: (1.0, 1.0),
      strategy: Strategy::BottomUp,
      seed: None,
    }
  }
}

/// What one chain produced: the accepted derivations in acceptance order,
/// the iterations spent, and how many of them found no parse under their
/// slice. A high failure count means the thresholds fit the grammar's
/// weights poorly.
#[derive(Debug)]
pub struct McmcReport {
  pub samples: Vec<Derivation>,
  pub iterations: usize,
  pub failures: usize,
}

/// Runs the slice-sampled chain until `config.samples` derivations are
/// accepted or `config.max_iterations` iterations have passed.
///
/// Each iteration parses under fresh thresholds, and an accepted
/// derivation's rule weights become the conditions of the next iteration,
/// which guarantees the chain can always re-derive it. Iterations whose
/// slice admits no parse only refresh thresholds and are counted as
/// failures.
pub fn sliced_sampling(
  wcfg: &Wcfg,
  wfsa: &Wfsa,
  root: &Symbol,
  goal: &Symbol,
  config: &McmcConfig,
) -> Result<McmcReport, Error> {
  // the post-acceptance pair is first used mid-chain, so validate it now
  Beta::new(config.a.1, config.b.1).map_err(|_| Error::SliceParameters {
    a: config.a.1,
    b: config.b.1,
  })?;

  let mut rng = match config.seed {
    Some(seed) => StdRng::seed_from_u64(seed),
    None => StdRng::from_os_rng(),
  };
  let slice_rng = StdRng::from_rng(&mut rng);
  let mut slice_vars = SliceVariables::new(FxHashMap::default(), config.a.0, config.b.0, slice_rng)?;

  let mut samples: Vec<Derivation> = Vec::with_capacity(config.samples);
  let mut burn = config.burn;
  let mut failures = 0usize;
  let mut iterations = 0usize;

  while samples.len() < config.samples && iterations < config.max_iterations {
    iterations += 1;
    if iterations % 10 == 0 {
      info!(iterations, samples = samples.len(), "sampling");
    }

    match sliced_sample(wcfg, wfsa, root, goal, config.strategy, &mut slice_vars, &mut rng)? {
      Some(derivation) => {
        let conditions = derivation_conditions(&derivation);
        if burn > 0 {
          burn -= 1;
        } else {
          samples.push(derivation);
        }
        slice_vars.recondition(conditions, config.a.1, config.b.1)?;
      }
      None => {
        failures += 1;
        slice_vars.reset();
      }
    }
  }

  Ok(McmcReport {
    samples,
    iterations,
    failures,
  })
}

/// One chain iteration: parse under the current thresholds, and if a
/// forest comes out, draw one derivation from it under the slice-uniform
/// edge weights. `Ok(None)` means the slice admitted no parse.
pub fn sliced_sample(
  wcfg: &Wcfg,
  wfsa: &Wfsa,
  root: &Symbol,
  goal: &Symbol,
  strategy: Strategy,
  slice_vars: &mut SliceVariables,
  rng: &mut StdRng,
) -> Result<Option<Derivation>, Error> {
  let forest = match strategy {
    Strategy::TopDown => Earley::sliced(wcfg, wfsa, slice_vars).intersect(root, goal)?,
    Strategy::BottomUp => Nederhof::sliced(wcfg, wfsa, slice_vars).intersect(root, goal)?,
  };
  let Some(forest) = forest else {
    debug!("no parse under the current slice");
    return Ok(None);
  };
  debug!(rules = forest.len(), "slice forest");

  let ordered = top_sort(&forest)?;
  debug!(nodes = ordered.len(), "topsorted");
  let weights = inside_with(&forest, &ordered, |rule| {
    edge_slice_weight(rule, goal, slice_vars)
  });
  let mut sampler = AncestralSampler::with_omega(&forest, &weights, |rule| {
    edge_slice_weight(rule, goal, slice_vars)
  });
  Ok(Some(sampler.sample(goal, rng)))
}

/// Maps each span-annotated left-hand side a derivation used to the
/// weight of the rule used there. These become the slice conditions of
/// the next iteration. The goal rule carries no span and is skipped.
pub fn derivation_conditions(derivation: &Derivation) -> FxHashMap<Symbol, f64> {
  derivation
    .iter()
    .filter(|rule| rule.lhs.is_spanned())
    .map(|rule| (rule.lhs.clone(), rule.weight))
    .collect()
}

/// The slice-uniform view of an edge's weight. Goal rules have true
/// weight log(1) and no slice variable, so they pass through unchanged.
fn edge_slice_weight(rule: &Rule, goal: &Symbol, slice_vars: &SliceVariables) -> f64 {
  if rule.lhs == *goal {
    0.0
  } else {
    slice_vars.weight(&rule.lhs, rule.weight)
  }
}
