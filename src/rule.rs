use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::symbol::Symbol;

/// A weighted production. The weight lives in the log domain, so a
/// probability-1 rule carries 0.0 and impossible rules carry `-inf`.
#[derive(Debug, Clone)]
pub struct Rule {
  pub lhs: Symbol,
  pub rhs: Vec<Symbol>,
  pub weight: f64,
}

impl Rule {
  pub fn new(lhs: Symbol, rhs: Vec<Symbol>, weight: f64) -> Self {
    assert!(!rhs.is_empty(), "rule with an empty right-hand side");
    Self { lhs, rhs, weight }
  }

  pub fn len(&self) -> usize {
    self.rhs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rhs.is_empty()
  }
}

// Rules key hash tables (item interning, edge-weight caches), so equality
// must cover the weight. f64 is not Eq; compare and hash its bit pattern.
impl PartialEq for Rule {
  fn eq(&self, other: &Self) -> bool {
    self.lhs == other.lhs && self.rhs == other.rhs && self.weight.to_bits() == other.weight.to_bits()
  }
}

impl Eq for Rule {}

impl Hash for Rule {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.lhs.hash(state);
    self.rhs.hash(state);
    self.weight.to_bits().hash(state);
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ->", self.lhs)?;
    for sym in self.rhs.iter() {
      write!(f, " {}", sym)?;
    }
    write!(f, " ({})", self.weight)
  }
}

/// A sampled derivation: the rules of one tree, parent before children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Derivation(Vec<Rc<Rule>>);

impl Derivation {
  pub fn new(rules: Vec<Rc<Rule>>) -> Self {
    Self(rules)
  }

  pub fn rules(&self) -> &[Rc<Rule>] {
    &self.0
  }

  pub fn iter(&self) -> impl Iterator<Item = &Rc<Rule>> {
    self.0.iter()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Sum of the raw rule weights, i.e. the log weight of the tree.
  pub fn score(&self) -> f64 {
    self.0.iter().map(|r| r.weight).sum()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rule(lhs: &str, rhs: &[&str], weight: f64) -> Rule {
    Rule::new(
      Symbol::nonterminal(lhs),
      rhs.iter().map(|s| Symbol::terminal(s)).collect(),
      weight,
    )
  }

  #[test]
  fn equality_covers_the_weight() {
    assert_eq!(rule("X", &["a"], -1.0), rule("X", &["a"], -1.0));
    assert_ne!(rule("X", &["a"], -1.0), rule("X", &["a"], -2.0));
    assert_ne!(rule("X", &["a"], -1.0), rule("Y", &["a"], -1.0));
  }

  #[test]
  fn display_writes_weight() {
    let r = Rule::new(
      Symbol::nonterminal("S"),
      vec![Symbol::nonterminal("X"), Symbol::terminal("b")],
      -0.5,
    );
    assert_eq!(r.to_string(), "[S] -> [X] 'b' (-0.5)");
  }

  #[test]
  fn derivation_score_sums_rule_weights() {
    let d = Derivation::new(vec![
      Rc::new(rule("S", &["a"], -1.0)),
      Rc::new(rule("X", &["b"], -0.25)),
    ]);
    assert!((d.score() + 1.25).abs() < 1e-12);
  }
}
