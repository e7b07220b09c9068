use std::fmt;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::rule::Rule;
use crate::symbol::Symbol;
use crate::wcfg::Wcfg;
use crate::wfsa::Wfsa;

/// A tokenized input sentence together with its linear-chain acceptor.
pub struct Sentence {
  words: Vec<String>,
  fsa: Wfsa,
}

impl Sentence {
  pub fn words(&self) -> &[String] {
    &self.words
  }

  pub fn fsa(&self) -> &Wfsa {
    &self.fsa
  }

  pub fn len(&self) -> usize {
    self.words.len()
  }

  pub fn is_empty(&self) -> bool {
    self.words.is_empty()
  }
}

impl fmt::Display for Sentence {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.words.join(" "))
  }
}

/// Tokenizes `input` on whitespace and builds its chain acceptor.
///
/// With `passthrough` set, each word the grammar's lexicon does not cover
/// gets one extra rule `[default] -> 'word'` with weight log(1), so
/// out-of-vocabulary input still parses. The extra rules are returned for
/// the caller to add to its grammar.
pub fn make_sentence(input: &str, grammar: &Wcfg, passthrough: Option<&str>) -> (Sentence, Vec<Rule>) {
  let words: Vec<String> = input.split_whitespace().map(str::to_owned).collect();

  let mut extra_rules: Vec<Rule> = Vec::new();
  if let Some(default_symbol) = passthrough {
    let lhs = Symbol::nonterminal(default_symbol);
    let mut covered: FxHashSet<&str> = FxHashSet::default();
    for word in words.iter() {
      let terminal = Symbol::terminal(word);
      if !grammar.has_terminal(&terminal) && covered.insert(word.as_str()) {
        debug!(%word, "passthrough rule");
        extra_rules.push(Rule::new(lhs.clone(), vec![terminal], 0.0));
      }
    }
  }

  let fsa = Wfsa::linear_chain(&words);
  (Sentence { words, fsa }, extra_rules)
}
