use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Beta, Distribution};
use rustc_hash::FxHashMap;

use crate::error::Error;
use crate::symbol::Symbol;
use crate::utils::ln_beta_pdf;

/// Per-state random thresholds for slice-sampled parsing.
///
/// Each span-annotated nonterminal gets a lazily drawn log-domain
/// threshold `u`: from `log(Beta(a, b))` when the state is unconditioned,
/// or uniformly below the state's condition (the weight of the rule the
/// previous derivation used there), which guarantees that derivation
/// survives the next slice. Assignments live for one parse and are
/// cleared by [`SliceVariables::reset`]; conditions persist until
/// overwritten.
pub struct SliceVariables {
  assignments: FxHashMap<Symbol, f64>,
  conditions: FxHashMap<Symbol, f64>,
  a: f64,
  b: f64,
  beta: Beta<f64>,
  rng: StdRng,
}

impl SliceVariables {
  pub fn new(
    conditions: FxHashMap<Symbol, f64>,
    a: f64,
    b: f64,
    rng: StdRng,
  ) -> Result<Self, Error> {
    let beta = Beta::new(a, b).map_err(|_| Error::SliceParameters { a, b })?;
    Ok(Self {
      assignments: FxHashMap::default(),
      conditions,
      a,
      b,
      beta,
      rng,
    })
  }

  /// The threshold for `state`, drawing and caching it on first use.
  pub fn get(&mut self, state: &Symbol) -> f64 {
    if let Some(&u) = self.assignments.get(state) {
      return u;
    }
    let u = match self.conditions.get(state) {
      // log(Uniform(0, exp(theta))) drawn without leaving the log domain
      Some(&theta) => theta + self.rng.random::<f64>().ln(),
      None => self.beta.sample(&mut self.rng).ln(),
    };
    self.assignments.insert(state.clone(), u);
    u
  }

  /// The reweighting factor `-log(BetaPDF(exp(u); a, b))` standing in for
  /// a surviving rule's weight.
  ///
  /// Calling this for a state with no assigned threshold, or with a
  /// `theta` at or below the threshold, is an invariant violation in the
  /// engine and panics rather than biasing the chain.
  pub fn weight(&self, state: &Symbol, theta: f64) -> f64 {
    assert!(
      self.assignments.contains_key(state),
      "no threshold assigned for {state}"
    );
    let u = self.assignments[state];
    assert!(
      theta > u,
      "a rule scoring under the threshold survived the slice at {state}"
    );
    -ln_beta_pdf(u.exp(), self.a, self.b)
  }

  /// Clears the thresholds for a fresh iteration. Conditions are kept.
  pub fn reset(&mut self) {
    self.assignments.clear();
  }

  /// Clears the thresholds and overwrites conditions per state with a new
  /// derivation's weights; states the new derivation did not visit keep
  /// their old conditions. Also switches the Beta parameters.
  pub fn recondition(
    &mut self,
    conditions: FxHashMap<Symbol, f64>,
    a: f64,
    b: f64,
  ) -> Result<(), Error> {
    self.assignments.clear();
    self.conditions.extend(conditions);
    if a != self.a || b != self.b {
      self.beta = Beta::new(a, b).map_err(|_| Error::SliceParameters { a, b })?;
      self.a = a;
      self.b = b;
    }
    Ok(())
  }
}
