use std::fmt;

use rustc_hash::FxHashMap;

use crate::symbol::Symbol;

/// Automaton states are dense small integers.
pub type StateId = u32;

/// A weighted finite-state automaton over terminal symbols, with arc weights
/// in the log domain. Nondeterminism is allowed: several arcs may leave the
/// same state over the same symbol.
#[derive(Debug, Clone, Default)]
pub struct Wfsa {
  arcs: FxHashMap<(StateId, Symbol), Vec<(StateId, f64)>>,
  all_arcs: Vec<(StateId, StateId, Symbol, f64)>,
  initial: Vec<StateId>,
  finals: Vec<StateId>,
}

impl Wfsa {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn add_arc(&mut self, sfrom: StateId, sto: StateId, symbol: Symbol, weight: f64) {
    self
      .arcs
      .entry((sfrom, symbol.clone()))
      .or_default()
      .push((sto, weight));
    self.all_arcs.push((sfrom, sto, symbol, weight));
  }

  pub fn make_initial(&mut self, state: StateId) {
    if !self.initial.contains(&state) {
      self.initial.push(state);
    }
  }

  pub fn make_final(&mut self, state: StateId) {
    if !self.finals.contains(&state) {
      self.finals.push(state);
    }
  }

  /// Arcs leaving `origin` over `symbol`: `(destination, weight)` pairs.
  pub fn arcs(&self, origin: StateId, symbol: &Symbol) -> &[(StateId, f64)] {
    self
      .arcs
      .get(&(origin, symbol.clone()))
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  /// All arcs in insertion order, as `(from, to, symbol, weight)`.
  pub fn iter_arcs(&self) -> impl Iterator<Item = &(StateId, StateId, Symbol, f64)> {
    self.all_arcs.iter()
  }

  pub fn initial_states(&self) -> &[StateId] {
    &self.initial
  }

  pub fn final_states(&self) -> &[StateId] {
    &self.finals
  }

  pub fn is_initial(&self, state: StateId) -> bool {
    self.initial.contains(&state)
  }

  pub fn is_final(&self, state: StateId) -> bool {
    self.finals.contains(&state)
  }

  /// Builds the linear-chain automaton for a token sequence: states
  /// `0..=n`, one weight-0 arc per token, state 0 initial and state n final.
  pub fn linear_chain<S: AsRef<str>>(tokens: &[S]) -> Self {
    let mut fsa = Self::new();
    for (i, token) in tokens.iter().enumerate() {
      fsa.add_arc(i as StateId, i as StateId + 1, Symbol::terminal(token.as_ref()), 0.0);
    }
    fsa.make_initial(0);
    fsa.make_final(tokens.len() as StateId);
    fsa
  }
}

impl fmt::Display for Wfsa {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (sfrom, sto, symbol, weight) in self.all_arcs.iter() {
      writeln!(f, "({}, {}, {}, {})", sfrom, symbol, sto, weight)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn linear_chain_shape() {
    let fsa = Wfsa::linear_chain(&["the", "dog", "barks"]);
    assert_eq!(fsa.initial_states(), &[0]);
    assert_eq!(fsa.final_states(), &[3]);
    assert!(fsa.is_initial(0) && fsa.is_final(3));
    assert!(!fsa.is_final(1));
    assert_eq!(fsa.arcs(1, &Symbol::terminal("dog")), &[(2, 0.0)]);
    assert!(fsa.arcs(1, &Symbol::terminal("cat")).is_empty());
    assert_eq!(fsa.iter_arcs().count(), 3);
  }

  #[test]
  fn parallel_arcs_share_a_label() {
    let mut fsa = Wfsa::new();
    fsa.add_arc(0, 1, Symbol::terminal("a"), 0.0);
    fsa.add_arc(0, 2, Symbol::terminal("a"), -0.5);
    assert_eq!(fsa.arcs(0, &Symbol::terminal("a")), &[(1, 0.0), (2, -0.5)]);
  }
}
