use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::Error;
use crate::symbol::Symbol;
use crate::wcfg::Wcfg;

/// Orders every symbol of the forest from leaves to root, so that a symbol
/// appears only after everything any of its rules rewrites it into.
///
/// Kahn-style elimination over a reverse dependency map built in one pass.
/// Intersection forests are acyclic by construction (spans strictly nest),
/// so a cycle here means the forest is malformed and is reported as an
/// error rather than looping forever.
pub fn top_sort(forest: &Wcfg) -> Result<Vec<Symbol>, Error> {
  let mut dependencies: FxHashMap<Symbol, FxHashSet<Symbol>> = FxHashMap::default();
  let mut dependants: FxHashMap<Symbol, Vec<Symbol>> = FxHashMap::default();
  let mut nodes: Vec<Symbol> = Vec::new();
  let mut seen: FxHashSet<Symbol> = FxHashSet::default();

  for rule in forest.iter() {
    if seen.insert(rule.lhs.clone()) {
      nodes.push(rule.lhs.clone());
    }
    for sym in rule.rhs.iter() {
      if seen.insert(sym.clone()) {
        nodes.push(sym.clone());
      }
      if dependencies
        .entry(rule.lhs.clone())
        .or_default()
        .insert(sym.clone())
      {
        dependants.entry(sym.clone()).or_default().push(rule.lhs.clone());
      }
    }
  }

  // leaves are the symbols no rule rewrites: terminals, mostly
  let mut sorting: VecDeque<Symbol> = nodes
    .iter()
    .filter(|sym| !dependencies.contains_key(*sym))
    .cloned()
    .collect();

  let mut ordered: Vec<Symbol> = Vec::with_capacity(nodes.len());
  while let Some(node) = sorting.pop_front() {
    if let Some(parents) = dependants.get(&node) {
      for parent in parents {
        if let Some(deps) = dependencies.get_mut(parent) {
          deps.remove(&node);
          if deps.is_empty() {
            dependencies.remove(parent);
            sorting.push_back(parent.clone());
          }
        }
      }
    }
    ordered.push(node);
  }

  if ordered.len() != nodes.len() {
    return Err(Error::CyclicForest);
  }
  Ok(ordered)
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
  fn leaves_come_first_and_root_last() {
    let mut forest = Wcfg::new();
    forest.add(Rule::new(nt("S"), vec![nt("X"), nt("Y")], 0.0));
    forest.add(Rule::new(nt("X"), vec![term("a")], 0.0));
    forest.add(Rule::new(nt("Y"), vec![term("b")], 0.0));

    let ordered = top_sort(&forest).unwrap();
    assert_eq!(
      ordered,
      vec![term("a"), term("b"), nt("X"), nt("Y"), nt("S")]
    );
  }

  #[test]
  fn every_parent_follows_its_children() {
    let mut forest = Wcfg::new();
    forest.add(Rule::new(nt("GOAL"), vec![nt("S")], 0.0));
    forest.add(Rule::new(nt("S"), vec![nt("X"), nt("X")], 0.5f64.ln()));
    forest.add(Rule::new(nt("X"), vec![term("1")], 0.25f64.ln()));
    forest.add(Rule::new(nt("X"), vec![term("2")], 0.25f64.ln()));

    let ordered = top_sort(&forest).unwrap();
    let position = |sym: &Symbol| ordered.iter().position(|s| s == sym).unwrap();
    for rule in forest.iter() {
      for child in rule.rhs.iter() {
        assert!(position(&rule.lhs) > position(child), "{} before {}", rule.lhs, child);
      }
    }
    assert_eq!(ordered.last(), Some(&nt("GOAL")));
  }

  #[test]
  fn a_cycle_is_reported() {
    let mut forest = Wcfg::new();
    forest.add(Rule::new(nt("X"), vec![nt("X")], 0.0));

    assert!(matches!(top_sort(&forest), Err(Error::CyclicForest)));
  }

  #[test]
  fn empty_forest_sorts_to_nothing() {
    let forest = Wcfg::new();
    assert_eq!(top_sort(&forest).unwrap(), Vec::new());
  }
}
