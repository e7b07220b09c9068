use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::rule::Rule;
use crate::symbol::Symbol;
use crate::wfsa::StateId;

/// Automaton states walked by an item before its dot. Rules are short, so
/// these almost always fit inline.
pub type InnerStates = SmallVec<[StateId; 4]>;

/// A dotted rule paired with the automaton path taken so far.
///
/// `inner` holds the states visited before each consumed right-hand-side
/// symbol and `dot` is the state the item currently sits in, so the item
/// spans `start()..dot` and the dot position within the rule is
/// `inner.len()`. Items are immutable once created: advancing the dot
/// produces a different item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Item {
  pub rule: Rc<Rule>,
  pub dot: StateId,
  pub inner: InnerStates,
}

impl Item {
  pub fn start(&self) -> StateId {
    self.inner.first().copied().unwrap_or(self.dot)
  }

  /// The symbol right of the dot, or None if the item is complete.
  pub fn next_symbol(&self) -> Option<&Symbol> {
    self.rule.rhs.get(self.inner.len())
  }

  /// Everything right of the dot.
  pub fn tail_symbols(&self) -> &[Symbol] {
    &self.rule.rhs[self.inner.len()..]
  }

  pub fn is_complete(&self) -> bool {
    self.inner.len() == self.rule.rhs.len()
  }
}

impl fmt::Display for Item {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ~ {:?} {}", self.rule, self.inner.as_slice(), self.dot)
  }
}

/// Index type for the item arena.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ItemIdx(pub u32);

/// An arena that hash-conses items: one `(rule, dot, inner)` combination
/// maps to exactly one index, so indices double as item identity throughout
/// the agenda.
#[derive(Debug, Default)]
pub struct ItemArena {
  items: Vec<Item>,
  index: FxHashMap<(Rc<Rule>, StateId, InnerStates), ItemIdx>,
}

impl ItemArena {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn get(&self, idx: ItemIdx) -> &Item {
    &self.items[idx.0 as usize]
  }

  /// Get an owned item so that passing around &mut arena stays ergonomic.
  /// The clone is cheap: an Rc, a state and a (usually inline) state list.
  pub fn get_cloned(&self, idx: ItemIdx) -> Item {
    self.items[idx.0 as usize].clone()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn intern(&mut self, rule: Rc<Rule>, dot: StateId, inner: InnerStates) -> ItemIdx {
    if let Some(&idx) = self.index.get(&(rule.clone(), dot, inner.clone())) {
      return idx;
    }
    let idx = ItemIdx(self.items.len() as u32);
    self.index.insert((rule.clone(), dot, inner.clone()), idx);
    self.items.push(Item { rule, dot, inner });
    idx
  }

  /// Returns the item for `idx` with its dot advanced to `dot`, interning it
  /// if it has never been seen.
  pub fn advance(&mut self, idx: ItemIdx, dot: StateId) -> ItemIdx {
    let (rule, old_dot, mut inner) = {
      let item = self.get(idx);
      (item.rule.clone(), item.dot, item.inner.clone())
    };
    inner.push(old_dot);
    self.intern(rule, dot, inner)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use smallvec::smallvec;

  fn rule() -> Rc<Rule> {
    Rc::new(Rule::new(
      Symbol::nonterminal("S"),
      vec![Symbol::nonterminal("X"), Symbol::terminal("b")],
      -1.0,
    ))
  }

  #[test]
  fn interning_is_idempotent() {
    let mut arena = ItemArena::new();
    let a = arena.intern(rule(), 0, SmallVec::new());
    let b = arena.intern(rule(), 0, SmallVec::new());
    assert_eq!(a, b);
    assert_eq!(arena.len(), 1);

    let c = arena.intern(rule(), 1, SmallVec::new());
    assert_ne!(a, c);
    assert_eq!(arena.len(), 2);
  }

  #[test]
  fn advance_extends_the_inner_path() {
    let mut arena = ItemArena::new();
    let fresh = arena.intern(rule(), 0, SmallVec::new());
    assert_eq!(arena.get(fresh).start(), 0);
    assert_eq!(arena.get(fresh).next_symbol(), Some(&Symbol::nonterminal("X")));
    assert!(!arena.get(fresh).is_complete());

    let one = arena.advance(fresh, 2);
    let walked: InnerStates = smallvec![0];
    assert_eq!(arena.get(one).inner, walked);
    assert_eq!(arena.get(one).dot, 2);
    assert_eq!(arena.get(one).start(), 0);
    assert_eq!(arena.get(one).next_symbol(), Some(&Symbol::terminal("b")));

    let two = arena.advance(one, 3);
    assert!(arena.get(two).is_complete());
    assert_eq!(arena.get(two).next_symbol(), None);
    assert_eq!(arena.get(two).start(), 0);
    assert_eq!(arena.get(two).dot, 3);

    // advancing the same item again lands on the same index
    assert_eq!(arena.advance(one, 3), two);
  }
}
