use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::rule::{Derivation, Rule};
use crate::symbol::Symbol;

/// A syntax tree read off a sampled derivation.
#[derive(Debug, PartialEq, Clone)]
pub enum SynTree {
  Branch(Symbol, Vec<SynTree>),
  Leaf(Symbol),
}

impl SynTree {
  pub fn is_leaf(&self) -> bool {
    match self {
      Self::Leaf(_) => true,
      _ => false,
    }
  }

  pub fn label(&self) -> &Symbol {
    match self {
      Self::Branch(sym, _) => sym,
      Self::Leaf(sym) => sym,
    }
  }

  /// Rebuilds the tree of a derivation. The first rule expands the root;
  /// every other rule expands the nonterminal it is keyed on. Symbols no
  /// rule expands (terminals, chiefly) become leaves.
  pub fn from_derivation(derivation: &Derivation) -> Self {
    assert!(
      !derivation.is_empty(),
      "cannot build a tree from an empty derivation"
    );
    let mut expansions: FxHashMap<&Symbol, &Rc<Rule>> = FxHashMap::default();
    for rule in derivation.iter() {
      expansions.insert(&rule.lhs, rule);
    }
    Self::build(&derivation.rules()[0].lhs, &expansions)
  }

  fn build(label: &Symbol, expansions: &FxHashMap<&Symbol, &Rc<Rule>>) -> Self {
    match expansions.get(label) {
      Some(rule) => {
        let children = rule.rhs.iter().map(|child| Self::build(child, expansions)).collect();
        Self::Branch(label.clone(), children)
      }
      None => Self::Leaf(label.clone()),
    }
  }
}

impl fmt::Display for SynTree {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Leaf(sym) => write!(f, "{}", sym),
      Self::Branch(sym, children) => {
        write!(f, "({}", sym)?;
        for child in children.iter() {
          write!(f, " {}", child)?;
        }
        write!(f, ")")
      }
    }
  }
}
