use std::rc::Rc;

use rand::rngs::StdRng;
use rand::Rng;
use rustc_hash::FxHashMap;

use crate::rule::{Derivation, Rule};
use crate::symbol::Symbol;
use crate::utils::logaddexp;
use crate::wcfg::Wcfg;

/// Draws derivations from a forest ancestrally, each with probability
/// proportional to its total weight under the forest's inside distribution.
///
/// `omega` is the edge weight function shared with the inside pass; it
/// must be the same function the given weights were computed with, or the
/// draw is biased. Per-edge inside contributions are cached, which pays
/// off when many derivations are drawn from one forest.
pub struct AncestralSampler<'a, F>
where
  F: Fn(&Rule) -> f64,
{
  forest: &'a Wcfg,
  inside: &'a FxHashMap<Symbol, f64>,
  edge_inside: FxHashMap<Rc<Rule>, f64>,
  omega: F,
}

impl<'a> AncestralSampler<'a, fn(&Rule) -> f64> {
  pub fn new(forest: &'a Wcfg, inside: &'a FxHashMap<Symbol, f64>) -> Self {
    Self::with_omega(forest, inside, |rule: &Rule| rule.weight)
  }
}

impl<'a, F> AncestralSampler<'a, F>
where
  F: Fn(&Rule) -> f64,
{
  pub fn with_omega(forest: &'a Wcfg, inside: &'a FxHashMap<Symbol, f64>, omega: F) -> Self {
    Self {
      forest,
      inside,
      edge_inside: FxHashMap::default(),
      omega,
    }
  }

  /// Draws one derivation rooted at `goal`. The rules come out in the
  /// order the nodes were expanded, goal rule first.
  pub fn sample(&mut self, goal: &Symbol, rng: &mut StdRng) -> Derivation {
    let mut rules: Vec<Rc<Rule>> = Vec::new();
    let mut queue: Vec<Symbol> = vec![goal.clone()];
    while let Some(parent) = queue.pop() {
      let edge = self.select(&parent, rng);
      for child in edge.rhs.iter() {
        if child.is_nonterminal() {
          queue.push(child.clone());
        }
      }
      rules.push(edge);
    }
    Derivation::new(rules)
  }

  /// The inside weight of one edge: its own weight plus the inside weight
  /// of every child.
  fn edge_inside(&mut self, rule: &Rc<Rule>) -> f64 {
    if let Some(&w) = self.edge_inside.get(rule) {
      return w;
    }
    let inside = self.inside;
    let mut w = (self.omega)(rule);
    for child in rule.rhs.iter() {
      w += inside.get(child).copied().unwrap_or(0.0);
    }
    self.edge_inside.insert(rule.clone(), w);
    w
  }

  /// Picks one incoming edge of `parent` by inverse CDF over the edge
  /// inside distribution: accumulate edges in enumeration order and take
  /// the first whose running total exceeds a uniform threshold under the
  /// node's inside weight.
  fn select(&mut self, parent: &Symbol, rng: &mut StdRng) -> Rc<Rule> {
    let forest = self.forest;
    let incoming = forest.get(parent);
    assert!(
      !incoming.is_empty(),
      "cannot sample an incoming edge to a terminal node: {parent}"
    );

    let ip = *self
      .inside
      .get(parent)
      .expect("inside weight missing for a forest node");
    let threshold = ip + rng.random::<f64>().ln();

    let mut acc = f64::NEG_INFINITY;
    for rule in incoming.iter() {
      acc = logaddexp(acc, self.edge_inside(rule));
      if acc > threshold {
        return rule.clone();
      }
    }
    // rounding can leave the accumulator at or just below the threshold;
    // the closest edge is the last one enumerated
    incoming
      .last()
      .expect("incoming is nonempty")
      .clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::inside::inside;
  use crate::topsort::top_sort;
  use rand::SeedableRng;

  fn nt(name: &str) -> Symbol {
    Symbol::nonterminal(name)
  }

  fn term(name: &str) -> Symbol {
    Symbol::terminal(name)
  }

  #[test]
  fn the_only_derivation_is_always_drawn() {
    let mut forest = Wcfg::new();
    forest.add(Rule::new(nt("GOAL"), vec![nt("S")], 0.0));
    forest.add(Rule::new(nt("S"), vec![nt("X"), nt("Y")], 0.5f64.ln()));
    forest.add(Rule::new(nt("X"), vec![term("a")], 0.5f64.ln()));
    forest.add(Rule::new(nt("Y"), vec![term("b")], 0.5f64.ln()));

    let ordered = top_sort(&forest).unwrap();
    let weights = inside(&forest, &ordered);
    let mut sampler = AncestralSampler::new(&forest, &weights);
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..20 {
      let d = sampler.sample(&nt("GOAL"), &mut rng);
      assert_eq!(d.len(), 4);
      assert_eq!(d.rules()[0].lhs, nt("GOAL"));
      assert!((d.score() - 0.125f64.ln()).abs() < 1e-9);
    }
  }

  #[test]
  fn draw_frequencies_follow_the_weights() {
    // two derivations, one three times as likely as the other
    let mut forest = Wcfg::new();
    forest.add(Rule::new(nt("GOAL"), vec![nt("S")], 0.0));
    forest.add(Rule::new(nt("S"), vec![term("a")], 0.75f64.ln()));
    forest.add(Rule::new(nt("S"), vec![term("b")], 0.25f64.ln()));

    let ordered = top_sort(&forest).unwrap();
    let weights = inside(&forest, &ordered);
    let mut sampler = AncestralSampler::new(&forest, &weights);
    let mut rng = StdRng::seed_from_u64(42);

    let mut heavy = 0usize;
    let draws = 2000usize;
    for _ in 0..draws {
      let d = sampler.sample(&nt("GOAL"), &mut rng);
      if d.rules()[1].rhs == vec![term("a")] {
        heavy += 1;
      }
    }
    let frequency = heavy as f64 / draws as f64;
    assert!((frequency - 0.75).abs() < 0.05, "frequency {frequency}");
  }

  #[test]
  fn omega_reweights_the_draw() {
    // under a uniform omega the raw weights stop mattering
    let mut forest = Wcfg::new();
    forest.add(Rule::new(nt("GOAL"), vec![nt("S")], 0.0));
    forest.add(Rule::new(nt("S"), vec![term("a")], -50.0));
    forest.add(Rule::new(nt("S"), vec![term("b")], -1.0));

    let ordered = top_sort(&forest).unwrap();
    let weights = crate::inside::inside_with(&forest, &ordered, |_| 0.0);
    let mut sampler = AncestralSampler::with_omega(&forest, &weights, |_| 0.0);
    let mut rng = StdRng::seed_from_u64(3);

    let mut first = 0usize;
    let draws = 2000usize;
    for _ in 0..draws {
      let d = sampler.sample(&nt("GOAL"), &mut rng);
      if d.rules()[1].rhs == vec![term("a")] {
        first += 1;
      }
    }
    let frequency = first as f64 / draws as f64;
    assert!((frequency - 0.5).abs() < 0.05, "frequency {frequency}");
  }
}
