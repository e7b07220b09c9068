use rustc_hash::FxHashSet;
use smallvec::smallvec;
use tracing::debug;

use crate::agenda::Agenda;
use crate::error::Error;
use crate::forest::extract_forest;
use crate::item::{InnerStates, Item, ItemArena, ItemIdx};
use crate::slice::SliceVariables;
use crate::symbol::Symbol;
use crate::wcfg::Wcfg;
use crate::wfsa::{StateId, Wfsa};

/// Top-down weighted intersection of a CFG and an FSA.
///
/// Items are predicted from the root down, so the chart only ever holds
/// constituents that are reachable from the start symbol. With a slice
/// table attached, completed items whose rule weight falls below the
/// span's slice threshold are pruned.
pub struct Earley<'a> {
  wcfg: &'a Wcfg,
  wfsa: &'a Wfsa,
  agenda: Agenda,
  items: ItemArena,
  predictions: FxHashSet<(Symbol, StateId)>,
  slice_vars: Option<&'a mut SliceVariables>,
}

impl<'a> Earley<'a> {
  pub fn new(wcfg: &'a Wcfg, wfsa: &'a Wfsa) -> Self {
    Self {
      wcfg,
      wfsa,
      agenda: Agenda::new(),
      items: ItemArena::new(),
      predictions: FxHashSet::default(),
      slice_vars: None,
    }
  }

  /// Like [`Earley::new`], but completions are filtered by `slice_vars`.
  pub fn sliced(wcfg: &'a Wcfg, wfsa: &'a Wfsa, slice_vars: &'a mut SliceVariables) -> Self {
    Self {
      slice_vars: Some(slice_vars),
      ..Self::new(wcfg, wfsa)
    }
  }

  /// Runs the program and extracts the intersection forest rooted at
  /// `root`, wrapped under the synthetic `goal` symbol.
  ///
  /// `Ok(None)` means the automaton's language and the grammar's language
  /// rooted at `root` do not overlap (under the current slice, if any).
  pub fn intersect(mut self, root: &Symbol, goal: &Symbol) -> Result<Option<Wcfg>, Error> {
    if !self.wcfg.can_rewrite(root) {
      return Err(Error::StartSymbol(root.to_string()));
    }

    let wfsa = self.wfsa;
    // axioms: predict the root at every initial state
    for &start in wfsa.initial_states() {
      self.prediction(root, start);
    }

    while let Some(idx) = self.agenda.pop() {
      let item = self.items.get_cloned(idx);

      if item.is_complete() {
        if self.survives_slice(&item) {
          let spans_input =
            item.rule.lhs == *root && wfsa.is_initial(item.start()) && wfsa.is_final(item.dot);
          if spans_input || self.complete_others(&item) {
            self.agenda.make_complete(&item, idx);
          }
          // a complete item that advanced nothing (and does not span the
          // input) is dropped: every predictable span already has its
          // predictor parked in the passive index
        }
      } else {
        let next = item
          .next_symbol()
          .expect("incomplete item must have a next symbol")
          .clone();
        if next.is_terminal() {
          self.scan(&item);
        } else if self.wcfg.can_rewrite(&next) {
          if !self.prediction(&next, item.dot) {
            self.complete_itself(idx, &next, item.dot);
          }
          self.agenda.make_passive(next, item.dot, idx);
        }
        // an unrewritable nonterminal is a dead end, the item is dropped
      }
    }

    debug!(items = self.items.len(), "making forest");
    let forest = extract_forest(&self.agenda, &self.items, wfsa, root, goal);
    if forest.is_empty() {
      Ok(None)
    } else {
      Ok(Some(forest))
    }
  }

  /// Queues one fresh item per rule rewriting `next` at `at`. Returns false
  /// if that prediction had already been made.
  fn prediction(&mut self, next: &Symbol, at: StateId) -> bool {
    if !self.predictions.insert((next.clone(), at)) {
      return false;
    }
    let wcfg = self.wcfg;
    for rule in wcfg.get(next) {
      let fresh = self.items.intern(rule.clone(), at, InnerStates::new());
      self.agenda.add(fresh);
    }
    true
  }

  /// Scans over as many terminals as determinism allows. At a genuine
  /// nondeterminism the walk stops and one item is forked per arc; at a
  /// missing arc the item dies.
  fn scan(&mut self, item: &Item) {
    let wfsa = self.wfsa;
    let mut states: InnerStates = smallvec![item.dot];
    for sym in item.tail_symbols() {
      if !sym.is_terminal() {
        break;
      }
      let arcs = wfsa.arcs(*states.last().expect("states is never empty"), sym);
      match arcs {
        [] => return,
        [(sto, _)] => states.push(*sto),
        _ => {
          for &(sto, _) in arcs {
            let mut inner = item.inner.clone();
            inner.extend_from_slice(&states);
            let forked = self.items.intern(item.rule.clone(), sto, inner);
            self.agenda.add(forked);
          }
          return;
        }
      }
    }
    // a deterministic prefix of at least one terminal was consumed
    let dot = *states.last().expect("states is never empty");
    let mut inner = item.inner.clone();
    inner.extend_from_slice(&states[..states.len() - 1]);
    let scanned = self.items.intern(item.rule.clone(), dot, inner);
    self.agenda.add(scanned);
  }

  /// Advances every passive item waiting for this item's span. Returns
  /// whether anything was (or had previously been) advanced.
  fn complete_others(&mut self, item: &Item) -> bool {
    let lhs = &item.rule.lhs;
    if self.agenda.is_generating(lhs, item.start(), item.dot) {
      // a sibling item already proved this span and advanced the waiters
      return true;
    }
    let waiting: Vec<ItemIdx> = self.agenda.waiting(lhs, item.start()).to_vec();
    for &widx in waiting.iter() {
      let advanced = self.items.advance(widx, item.dot);
      self.agenda.add(advanced);
    }
    !waiting.is_empty()
  }

  /// Merges an incomplete item with spans already proven for the symbol it
  /// waits on.
  fn complete_itself(&mut self, idx: ItemIdx, next: &Symbol, at: StateId) -> bool {
    let completions: Vec<StateId> = self.agenda.completions(next, at).to_vec();
    for &sto in completions.iter() {
      let advanced = self.items.advance(idx, sto);
      self.agenda.add(advanced);
    }
    !completions.is_empty()
  }

  fn survives_slice(&mut self, item: &Item) -> bool {
    match self.slice_vars.as_deref_mut() {
      Some(slice_vars) => {
        let u = slice_vars.get(&item.rule.lhs.spanned(item.start(), item.dot));
        item.rule.weight > u
      }
      None => true,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rule::Rule;

  fn nt(name: &str) -> Symbol {
    Symbol::nonterminal(name)
  }

  fn term(name: &str) -> Symbol {
    Symbol::terminal(name)
  }

  #[test]
  fn multi_terminal_scan_walks_deterministic_arcs() {
    let mut g = Wcfg::new();
    g.add(Rule::new(nt("S"), vec![term("a"), term("b"), term("c")], 0.25f64.ln()));
    let fsa = Wfsa::linear_chain(&["a", "b", "c"]);

    let forest = Earley::new(&g, &fsa)
      .intersect(&nt("S"), &nt("GOAL"))
      .unwrap()
      .expect("the sentence is in the language");

    // one goal rule and the single spanned S rule
    assert_eq!(forest.len(), 2);
    let s_rules = forest.get(&nt("S").spanned(0, 3));
    assert_eq!(s_rules.len(), 1);
    assert_eq!(s_rules[0].rhs, vec![term("a"), term("b"), term("c")]);
    assert_eq!(
      forest.get(&nt("GOAL"))[0].rhs,
      vec![nt("S").spanned(0, 3)]
    );
  }

  #[test]
  fn nondeterministic_scan_forks_one_item_per_arc() {
    let mut g = Wcfg::new();
    g.add(Rule::new(nt("S"), vec![term("a"), term("b")], 0.5f64.ln()));

    // two paths labelled "a b" between state 0 and state 3
    let mut fsa = Wfsa::new();
    fsa.add_arc(0, 1, term("a"), 0.0);
    fsa.add_arc(0, 2, term("a"), 0.0);
    fsa.add_arc(1, 3, term("b"), 0.0);
    fsa.add_arc(2, 3, term("b"), 0.0);
    fsa.make_initial(0);
    fsa.make_final(3);

    let forest = Earley::new(&g, &fsa)
      .intersect(&nt("S"), &nt("GOAL"))
      .unwrap()
      .expect("both paths accept");

    // the same projected rule appears once per automaton path
    assert_eq!(forest.get(&nt("S").spanned(0, 3)).len(), 2);
    assert_eq!(forest.len(), 3);

    // and path multiplicity doubles the goal's inside mass
    let ordered = crate::topsort::top_sort(&forest).unwrap();
    let weights = crate::inside::inside(&forest, &ordered);
    assert!((weights[&nt("GOAL")] - (0.5f64.ln() + 2f64.ln())).abs() < 1e-9);
  }

  #[test]
  fn every_initial_state_seeds_axioms() {
    let mut g = Wcfg::new();
    g.add(Rule::new(nt("S"), vec![term("a")], 0.0));

    let mut fsa = Wfsa::new();
    fsa.add_arc(0, 2, term("a"), 0.0);
    fsa.add_arc(1, 2, term("a"), 0.0);
    fsa.make_initial(0);
    fsa.make_initial(1);
    fsa.make_final(2);

    let forest = Earley::new(&g, &fsa)
      .intersect(&nt("S"), &nt("GOAL"))
      .unwrap()
      .expect("accepted from both initial states");

    assert_eq!(forest.get(&nt("S").spanned(0, 2)).len(), 1);
    assert_eq!(forest.get(&nt("S").spanned(1, 2)).len(), 1);
    assert_eq!(forest.get(&nt("GOAL")).len(), 2);
  }

  #[test]
  fn unparseable_input_yields_none() {
    let mut g = Wcfg::new();
    g.add(Rule::new(nt("S"), vec![term("a")], 0.0));
    let fsa = Wfsa::linear_chain(&["b"]);

    let outcome = Earley::new(&g, &fsa).intersect(&nt("S"), &nt("GOAL")).unwrap();
    assert!(outcome.is_none());
  }

  #[test]
  fn missing_start_symbol_is_an_error() {
    let g = {
      let mut g = Wcfg::new();
      g.add(Rule::new(nt("X"), vec![term("a")], 0.0));
      g
    };
    let fsa = Wfsa::linear_chain(&["a"]);

    let err = Earley::new(&g, &fsa).intersect(&nt("S"), &nt("GOAL")).unwrap_err();
    assert!(matches!(err, Error::StartSymbol(_)));
  }

  #[test]
  fn rhs_nonterminals_are_predicted_and_completed() {
    let mut g = Wcfg::new();
    g.add(Rule::new(nt("S"), vec![nt("X"), nt("X")], 0.5f64.ln()));
    g.add(Rule::new(nt("X"), vec![term("a")], 0.25f64.ln()));
    let fsa = Wfsa::linear_chain(&["a", "a"]);

    let forest = Earley::new(&g, &fsa)
      .intersect(&nt("S"), &nt("GOAL"))
      .unwrap()
      .expect("parses");

    assert_eq!(forest.get(&nt("S").spanned(0, 2)).len(), 1);
    assert_eq!(forest.get(&nt("X").spanned(0, 1)).len(), 1);
    assert_eq!(forest.get(&nt("X").spanned(1, 2)).len(), 1);
    assert_eq!(forest.len(), 4);
  }
}
