use rustc_hash::FxHashMap;

use crate::rule::Rule;
use crate::symbol::Symbol;
use crate::utils::logaddexp;
use crate::wcfg::Wcfg;

/// Inside weights under the default edge weight, a rule's own log-weight.
pub fn inside(forest: &Wcfg, ordered: &[Symbol]) -> FxHashMap<Symbol, f64> {
  inside_with(forest, ordered, |rule| rule.weight)
}

/// Log-semiring inside weights over a sorted forest, with a caller-chosen
/// edge weight function.
///
/// `ordered` must come from [`top_sort`](crate::topsort::top_sort), leaves
/// first, so every child's weight is final before its parents are visited.
/// Leaves carry the multiplicative identity, log(1) = 0. Alternatives are
/// combined with a stable log-sum-exp rather than the naive exponential
/// form.
pub fn inside_with<F>(forest: &Wcfg, ordered: &[Symbol], omega: F) -> FxHashMap<Symbol, f64>
where
  F: Fn(&Rule) -> f64,
{
  let mut weights: FxHashMap<Symbol, f64> = FxHashMap::default();
  for node in ordered {
    let incoming = forest.get(node);
    if incoming.is_empty() {
      weights.insert(node.clone(), 0.0);
      continue;
    }
    let mut total = f64::NEG_INFINITY;
    for rule in incoming {
      let mut k = omega(rule);
      for child in rule.rhs.iter() {
        k += weights.get(child).copied().unwrap_or(0.0);
      }
      total = logaddexp(total, k);
    }
    weights.insert(node.clone(), total);
  }
  weights
}
