#[macro_use]
extern crate lazy_static;

pub mod agenda;
pub mod earley;
pub mod error;
pub mod forest;
pub mod inside;
pub mod item;
pub mod mcmc;
pub mod nederhof;
pub mod parse_grammar;
pub mod rule;
pub mod sampler;
pub mod sentence;
pub mod slice;
pub mod symbol;
pub mod syntree;
pub mod topsort;
pub mod utils;
pub mod wcfg;
pub mod wfsa;

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rustc_hash::FxHashMap;
use tracing::debug;

pub use crate::error::Error;
pub use crate::inside::{inside, inside_with};
pub use crate::mcmc::{derivation_conditions, sliced_sample, sliced_sampling, McmcConfig, McmcReport};
pub use crate::parse_grammar::parse_grammar;
pub use crate::rule::{Derivation, Rule};
pub use crate::sampler::AncestralSampler;
pub use crate::sentence::{make_sentence, Sentence};
pub use crate::slice::SliceVariables;
pub use crate::symbol::Symbol;
pub use crate::syntree::SynTree;
pub use crate::topsort::top_sort;
pub use crate::wcfg::Wcfg;
pub use crate::wfsa::{StateId, Wfsa};

use crate::earley::Earley;
use crate::nederhof::Nederhof;

/// Which engine builds the intersection forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
  /// Top-down, prediction-driven (Earley).
  TopDown,
  /// Bottom-up, arc-driven (Nederhof).
  BottomUp,
}

impl fmt::Display for Strategy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::TopDown => write!(f, "top-down"),
      Self::BottomUp => write!(f, "bottom-up"),
    }
  }
}

impl FromStr for Strategy {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "earley" | "top-down" => Ok(Self::TopDown),
      "nederhof" | "bottom-up" => Ok(Self::BottomUp),
      other => Err(Error::UnknownStrategy(other.to_string())),
    }
  }
}

/// Intersects a weighted grammar with a weighted automaton.
///
/// The result is itself a grammar: its rules are the original rules with
/// every symbol annotated by the automaton states it stretches over, plus
/// one `goal -> root` rule per accepting span. `Ok(None)` means the
/// automaton's language and the grammar's don't overlap.
///
/// The strategies agree on grammars where the root only heads
/// derivations. When the root also recurs inside a right-hand side, the
/// top-down engine can discard a non-accepting root completion before the
/// rule that consumes it has been predicted, and only the bottom-up
/// engine finds those derivations.
pub fn intersect(
  wcfg: &Wcfg,
  wfsa: &Wfsa,
  root: &Symbol,
  goal: &Symbol,
  strategy: Strategy,
) -> Result<Option<Wcfg>, Error> {
  match strategy {
    Strategy::TopDown => Earley::new(wcfg, wfsa).intersect(root, goal),
    Strategy::BottomUp => Nederhof::new(wcfg, wfsa).intersect(root, goal),
  }
}

/// Derivations drawn from the exact distribution, with the normalizer
/// they were drawn under.
pub struct ExactSamples {
  pub samples: Vec<Derivation>,
  /// Inside (log) weight of the goal, i.e. the total weight of the forest.
  pub goal_inside: f64,
}

/// Draws `n` derivations by ancestral sampling over the full forest.
pub fn exact_sample(
  wcfg: &Wcfg,
  wfsa: &Wfsa,
  root: &Symbol,
  goal: &Symbol,
  n: usize,
  strategy: Strategy,
  rng: &mut StdRng,
) -> Result<Option<ExactSamples>, Error> {
  let Some(forest) = intersect(wcfg, wfsa, root, goal, strategy)? else {
    return Ok(None);
  };

  let ordered = top_sort(&forest)?;
  debug!(nodes = ordered.len(), "topsorted");
  let weights = inside(&forest, &ordered);
  let goal_inside = weights.get(goal).copied().unwrap_or(f64::NEG_INFINITY);
  debug!(goal_inside, "inside weights done");

  let mut sampler = AncestralSampler::new(&forest, &weights);
  let mut samples = Vec::with_capacity(n);
  for _ in 0..n {
    samples.push(sampler.sample(goal, rng));
  }

  Ok(Some(ExactSamples {
    samples,
    goal_inside,
  }))
}

/// Counts repeated derivations, most frequent first. Ties keep the order
/// in which the derivations were first drawn.
pub fn tally(samples: &[Derivation]) -> Vec<(&Derivation, usize)> {
  let mut counts: FxHashMap<&Derivation, usize> = FxHashMap::default();
  let mut order: Vec<&Derivation> = Vec::new();
  for d in samples.iter() {
    let slot = counts.entry(d).or_insert(0);
    if *slot == 0 {
      order.push(d);
    }
    *slot += 1;
  }

  let mut tallied: Vec<(&Derivation, usize)> = order.into_iter().map(|d| (d, counts[d])).collect();
  tallied.sort_by(|x, y| y.1.cmp(&x.1));
  tallied
}

#[cfg(test)]
fn ambiguous_grammar() -> Wcfg {
  parse_grammar(
    "[S] ||| [X] ||| 1.0\n\
     [X] ||| [X] [X] ||| 0.5\n\
     [X] ||| '1' ||| 0.25\n\
     [X] ||| '2' ||| 0.25\n",
    true,
  )
  .unwrap()
}

#[test]
fn strategy_names_round_trip() {
  assert_eq!("earley".parse::<Strategy>().unwrap(), Strategy::TopDown);
  assert_eq!("top-down".parse::<Strategy>().unwrap(), Strategy::TopDown);
  assert_eq!("nederhof".parse::<Strategy>().unwrap(), Strategy::BottomUp);
  assert_eq!("bottom-up".parse::<Strategy>().unwrap(), Strategy::BottomUp);
  assert!(matches!(
    "cyk".parse::<Strategy>(),
    Err(Error::UnknownStrategy(_))
  ));
  assert_eq!(Strategy::TopDown.to_string(), "top-down");
  assert_eq!(Strategy::BottomUp.to_string(), "bottom-up");
}

#[test]
fn both_engines_build_the_same_forest() {
  let goal = Symbol::nonterminal("GOAL");
  let chain_grammar = {
    let mut g = Wcfg::new();
    g.add(Rule::new(
      Symbol::nonterminal("S"),
      vec![
        Symbol::terminal("a"),
        Symbol::terminal("b"),
        Symbol::terminal("c"),
      ],
      0.25f64.ln(),
    ));
    g
  };
  let cases = [
    (ambiguous_grammar(), vec!["1", "2", "1"]),
    (chain_grammar, vec!["a", "b", "c"]),
  ];

  for (g, tokens) in cases {
    let fsa = Wfsa::linear_chain(&tokens);
    let mut forests = Vec::new();
    for strategy in [Strategy::TopDown, Strategy::BottomUp] {
      let forest = intersect(&g, &fsa, &Symbol::nonterminal("S"), &goal, strategy)
        .unwrap()
        .unwrap();
      forests.push(forest);
    }

    let sorted_rules = |f: &Wcfg| {
      let mut rules: Vec<String> = f.iter().map(|r| r.to_string()).collect();
      rules.sort();
      rules
    };
    assert_eq!(sorted_rules(&forests[0]), sorted_rules(&forests[1]));

    let weights: Vec<FxHashMap<Symbol, f64>> = forests
      .iter()
      .map(|f| {
        let ordered = top_sort(f).unwrap();
        inside(f, &ordered)
      })
      .collect();
    assert_eq!(weights[0].len(), weights[1].len());
    for (sym, w) in weights[0].iter() {
      assert!((w - weights[1][sym]).abs() < 1e-9, "{sym}");
    }
  }
}

#[test]
fn a_root_inside_a_rhs_splits_the_engines() {
  // the root completes over (0,1) before [X]'s rule goes passive; a
  // non-accepting root completion with no waiters is dropped
  let mut g = Wcfg::new();
  g.add(Rule::new(
    Symbol::nonterminal("S"),
    vec![Symbol::terminal("a")],
    0.5f64.ln(),
  ));
  g.add(Rule::new(
    Symbol::nonterminal("S"),
    vec![Symbol::nonterminal("X")],
    0.5f64.ln(),
  ));
  g.add(Rule::new(
    Symbol::nonterminal("X"),
    vec![Symbol::nonterminal("S"), Symbol::terminal("b")],
    0.0,
  ));
  let fsa = Wfsa::linear_chain(&["a", "b"]);
  let goal = Symbol::nonterminal("GOAL");

  let top_down = intersect(&g, &fsa, &Symbol::nonterminal("S"), &goal, Strategy::TopDown).unwrap();
  assert!(top_down.is_none());

  let forest = intersect(&g, &fsa, &Symbol::nonterminal("S"), &goal, Strategy::BottomUp)
    .unwrap()
    .expect("arc-driven completion reaches the nested root");
  let ordered = top_sort(&forest).unwrap();
  let weights = inside(&forest, &ordered);
  assert!((weights[&goal] - 0.25f64.ln()).abs() < 1e-9);
}

#[test]
fn the_goal_inside_weight_matches_the_ambiguity() {
  let g = ambiguous_grammar();
  let goal = Symbol::nonterminal("GOAL");

  // "1 2" has a single bracketing, so the goal's inside weight is exactly
  // that derivation's score
  let fsa = Wfsa::linear_chain(&["1", "2"]);
  let forest = intersect(&g, &fsa, &Symbol::nonterminal("S"), &goal, Strategy::BottomUp)
    .unwrap()
    .unwrap();
  assert_eq!(forest.len(), 5);
  assert_eq!(forest.get(&goal).len(), 1);
  let ordered = top_sort(&forest).unwrap();
  let weights = inside(&forest, &ordered);
  let single = 0.5f64.ln() + 0.25f64.ln() + 0.25f64.ln();
  assert!((weights[&goal] - single).abs() < 1e-9);

  // "1 2 1" has two bracketings of equal weight
  let fsa = Wfsa::linear_chain(&["1", "2", "1"]);
  let forest = intersect(&g, &fsa, &Symbol::nonterminal("S"), &goal, Strategy::BottomUp)
    .unwrap()
    .unwrap();
  let ordered = top_sort(&forest).unwrap();
  let weights = inside(&forest, &ordered);
  let expected = (2.0 * 0.5f64.powi(2) * 0.25f64.powi(3)).ln();
  assert!((weights[&goal] - expected).abs() < 1e-9);
}

#[test]
fn exact_sampling_finds_every_bracketing() {
  use rand::SeedableRng;

  let g = ambiguous_grammar();
  let fsa = Wfsa::linear_chain(&["1", "2", "1"]);
  let mut rng = StdRng::seed_from_u64(7);

  let exact = exact_sample(
    &g,
    &fsa,
    &Symbol::nonterminal("S"),
    &Symbol::nonterminal("GOAL"),
    200,
    Strategy::BottomUp,
    &mut rng,
  )
  .unwrap()
  .unwrap();

  let tallied = tally(&exact.samples);
  assert_eq!(tallied.len(), 2, "expected exactly two bracketings");
  assert_eq!(tallied.iter().map(|(_, n)| n).sum::<usize>(), 200);
  // equally weighted, so neither bracketing should dominate
  assert!(tallied[0].1 < 140, "counts: {:?}", tallied[0].1);

  let per_derivation = (0.5f64.powi(2) * 0.25f64.powi(3)).ln();
  for (d, _) in &tallied {
    assert!((d.score() - per_derivation).abs() < 1e-9);
  }
  assert!((exact.goal_inside - (per_derivation + 2.0f64.ln())).abs() < 1e-9);
}

#[test]
fn unparseable_input_is_not_an_error() {
  use rand::SeedableRng;

  let g = ambiguous_grammar();
  let fsa = Wfsa::linear_chain(&["3"]);
  let mut rng = StdRng::seed_from_u64(0);

  let exact = exact_sample(
    &g,
    &fsa,
    &Symbol::nonterminal("S"),
    &Symbol::nonterminal("GOAL"),
    10,
    Strategy::TopDown,
    &mut rng,
  )
  .unwrap();
  assert!(exact.is_none());
}

#[test]
fn missing_start_symbol_is_reported() {
  let g = ambiguous_grammar();
  let fsa = Wfsa::linear_chain(&["1"]);
  let err = intersect(
    &g,
    &fsa,
    &Symbol::nonterminal("NP"),
    &Symbol::nonterminal("GOAL"),
    Strategy::BottomUp,
  )
  .unwrap_err();
  assert!(matches!(err, Error::StartSymbol(_)));
}

#[test]
fn tally_is_stable_for_ties() {
  let a = Derivation::new(vec![std::rc::Rc::new(Rule::new(
    Symbol::nonterminal("S"),
    vec![Symbol::terminal("a")],
    0.0,
  ))]);
  let b = Derivation::new(vec![std::rc::Rc::new(Rule::new(
    Symbol::nonterminal("S"),
    vec![Symbol::terminal("b")],
    0.0,
  ))]);

  let samples = vec![a.clone(), b.clone(), b.clone(), a.clone(), a.clone()];
  let tallied = tally(&samples);
  assert_eq!(tallied, vec![(&a, 3), (&b, 2)]);

  let tied = vec![b.clone(), a.clone()];
  assert_eq!(tally(&tied), vec![(&b, 1), (&a, 1)]);
}
