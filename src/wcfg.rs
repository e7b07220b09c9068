use std::fmt;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::rule::Rule;
use crate::symbol::Symbol;

/// A weighted context-free grammar: an insertion-ordered rule list with an
/// index by left-hand side.
///
/// Rules form a *multiset*: adding the same rule twice keeps both copies.
/// Intersection relies on this, because a projected rule reached through two
/// distinct automaton paths must count twice towards the inside weight.
///
/// Forests are represented with this same type; their symbols just happen to
/// be span-annotated.
#[derive(Debug, Clone, Default)]
pub struct Wcfg {
  rules: Vec<Rc<Rule>>,
  by_lhs: FxHashMap<Symbol, Vec<Rc<Rule>>>,
  terminals: Vec<Symbol>,
  terminal_set: FxHashSet<Symbol>,
}

impl Wcfg {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn add(&mut self, rule: Rule) {
    let rule = Rc::new(rule);
    for sym in rule.rhs.iter() {
      if sym.is_terminal() && self.terminal_set.insert(sym.clone()) {
        self.terminals.push(sym.clone());
      }
    }
    self
      .by_lhs
      .entry(rule.lhs.clone())
      .or_default()
      .push(rule.clone());
    self.rules.push(rule);
  }

  pub fn extend<I: IntoIterator<Item = Rule>>(&mut self, rules: I) {
    for rule in rules {
      self.add(rule);
    }
  }

  /// All rules rewriting `lhs`, or an empty slice if there are none.
  pub fn get(&self, lhs: &Symbol) -> &[Rc<Rule>] {
    self.by_lhs.get(lhs).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn can_rewrite(&self, sym: &Symbol) -> bool {
    self.by_lhs.contains_key(sym)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Rc<Rule>> {
    self.rules.iter()
  }

  pub fn len(&self) -> usize {
    self.rules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rules.is_empty()
  }

  /// Terminal symbols in first-seen order.
  pub fn terminals(&self) -> &[Symbol] {
    &self.terminals
  }

  pub fn has_terminal(&self, sym: &Symbol) -> bool {
    self.terminal_set.contains(sym)
  }
}

impl fmt::Display for Wcfg {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for rule in self.rules.iter() {
      writeln!(f, "{}", rule)?;
    }
    Ok(())
  }
}
