use std::fmt;
use std::rc::Rc;

use crate::wfsa::StateId;

/// A grammar symbol. Intersection rewrites plain nonterminals into
/// span-annotated ones (`[X]` becomes `[X,0-2]`); terminals are never
/// annotated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
  Terminal(Rc<str>),
  Nonterminal(Rc<str>),
  Spanned(Rc<str>, StateId, StateId),
}

impl Symbol {
  pub fn terminal(name: &str) -> Self {
    Self::Terminal(name.into())
  }

  pub fn nonterminal(name: &str) -> Self {
    Self::Nonterminal(name.into())
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Terminal(_))
  }

  pub fn is_nonterminal(&self) -> bool {
    !self.is_terminal()
  }

  pub fn is_spanned(&self) -> bool {
    matches!(self, Self::Spanned(..))
  }

  pub fn name(&self) -> &str {
    match self {
      Self::Terminal(name) | Self::Nonterminal(name) | Self::Spanned(name, _, _) => name,
    }
  }

  /// Annotates a nonterminal with the automaton states it spans.
  /// Terminals pass through unchanged.
  pub fn spanned(&self, start: StateId, end: StateId) -> Self {
    match self {
      Self::Nonterminal(name) => Self::Spanned(name.clone(), start, end),
      Self::Terminal(_) => self.clone(),
      Self::Spanned(..) => panic!("symbol is already annotated: {}", self),
    }
  }

  /// Strips the span annotation, if any.
  pub fn base(&self) -> Self {
    match self {
      Self::Spanned(name, _, _) => Self::Nonterminal(name.clone()),
      _ => self.clone(),
    }
  }

  pub fn span(&self) -> Option<(StateId, StateId)> {
    match self {
      Self::Spanned(_, start, end) => Some((*start, *end)),
      _ => None,
    }
  }
}

impl fmt::Display for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Terminal(name) => write!(f, "'{}'", name),
      Self::Nonterminal(name) => write!(f, "[{}]", name),
      Self::Spanned(name, start, end) => write!(f, "[{},{}-{}]", name, start, end),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display() {
    assert_eq!(Symbol::terminal("dog").to_string(), "'dog'");
    assert_eq!(Symbol::nonterminal("NP").to_string(), "[NP]");
    assert_eq!(Symbol::nonterminal("NP").spanned(0, 2).to_string(), "[NP,0-2]");
  }

  #[test]
  fn span_round_trip() {
    let np = Symbol::nonterminal("NP");
    let annotated = np.spanned(1, 3);
    assert_eq!(annotated.span(), Some((1, 3)));
    assert_eq!(annotated.base(), np);
    assert!(annotated.is_nonterminal());
    assert!(annotated.is_spanned());
  }

  #[test]
  fn terminals_are_never_annotated() {
    let dog = Symbol::terminal("dog");
    assert_eq!(dog.spanned(0, 1), dog);
    assert_eq!(dog.span(), None);
  }
}
