use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::item::{Item, ItemIdx};
use crate::symbol::Symbol;
use crate::wfsa::StateId;

/// FIFO worklist of active items. An item enters the queue at most once,
/// ever; re-adding an item that was already queued (or already processed)
/// is a no-op.
#[derive(Debug, Default)]
pub struct ActiveQueue {
  queue: VecDeque<ItemIdx>,
  seen: FxHashSet<ItemIdx>,
}

impl ActiveQueue {
  pub fn add(&mut self, item: ItemIdx) -> bool {
    if self.seen.insert(item) {
      self.queue.push_back(item);
      true
    } else {
      false
    }
  }

  pub fn pop(&mut self) -> Option<ItemIdx> {
    self.queue.pop_front()
  }

  pub fn len(&self) -> usize {
    self.queue.len()
  }

  pub fn is_empty(&self) -> bool {
    self.queue.is_empty()
  }
}

/// The chart of the intersection programs: the active queue plus three
/// passive indices.
///
/// * `passive` parks incomplete items under the symbol and state they wait
///   at, so a later completion can advance them.
/// * `complete` stores finished items by their spanned left-hand side; the
///   forest is read off this index.
/// * `generating` records which spans each symbol has been proven over, and
///   doubles as the completion lookup for passive items.
#[derive(Debug, Default)]
pub struct Agenda {
  active: ActiveQueue,
  passive: FxHashMap<(Symbol, StateId), Vec<ItemIdx>>,
  complete: FxHashMap<(Symbol, StateId, StateId), Vec<ItemIdx>>,
  generating: FxHashMap<Symbol, FxHashMap<StateId, Vec<StateId>>>,
}

impl Agenda {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn add(&mut self, item: ItemIdx) -> bool {
    self.active.add(item)
  }

  pub fn extend<I: IntoIterator<Item = ItemIdx>>(&mut self, items: I) {
    for item in items {
      self.add(item);
    }
  }

  /// Next active item, or None once the program has converged.
  pub fn pop(&mut self) -> Option<ItemIdx> {
    self.active.pop()
  }

  /// Parks an incomplete item that waits for `symbol` at state `at`.
  pub fn make_passive(&mut self, symbol: Symbol, at: StateId, item: ItemIdx) {
    self.passive.entry((symbol, at)).or_default().push(item);
  }

  /// Stores a complete item and marks its span as generating.
  pub fn make_complete(&mut self, item: &Item, idx: ItemIdx) {
    assert!(item.is_complete(), "tried to store an incomplete item");
    self
      .complete
      .entry((item.rule.lhs.clone(), item.start(), item.dot))
      .or_default()
      .push(idx);
    self.add_generating(item.rule.lhs.clone(), item.start(), item.dot);
  }

  /// Tries to record that `sym` generates the span `sfrom..sto`.
  /// Returns false if that span was already known.
  pub fn add_generating(&mut self, sym: Symbol, sfrom: StateId, sto: StateId) -> bool {
    let ends = self.generating.entry(sym).or_default().entry(sfrom).or_default();
    if ends.contains(&sto) {
      false
    } else {
      ends.push(sto);
      true
    }
  }

  pub fn is_generating(&self, sym: &Symbol, sfrom: StateId, sto: StateId) -> bool {
    self
      .generating
      .get(sym)
      .and_then(|starts| starts.get(&sfrom))
      .is_some_and(|ends| ends.contains(&sto))
  }

  /// Items waiting for `sym` at state `start`.
  pub fn waiting(&self, sym: &Symbol, start: StateId) -> &[ItemIdx] {
    self
      .passive
      .get(&(sym.clone(), start))
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  /// End states `sym` is known to reach from `start`, in discovery order.
  pub fn completions(&self, sym: &Symbol, start: StateId) -> &[StateId] {
    self
      .generating
      .get(sym)
      .and_then(|starts| starts.get(&start))
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  /// Complete items whose annotated left-hand side is `(sym, start, end)`.
  pub fn complete_items(&self, sym: &Symbol, start: StateId, end: StateId) -> &[ItemIdx] {
    self
      .complete
      .get(&(sym.clone(), start, end))
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  /// `(start, ends)` span groups proven for `sym`.
  pub fn generating_spans(&self, sym: &Symbol) -> impl Iterator<Item = (StateId, &[StateId])> {
    self
      .generating
      .get(sym)
      .into_iter()
      .flat_map(|starts| starts.iter().map(|(&s, ends)| (s, ends.as_slice())))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn active_queue_is_fifo_and_deduplicates() {
    let mut q = ActiveQueue::default();
    assert!(q.add(ItemIdx(0)));
    assert!(q.add(ItemIdx(1)));
    assert!(!q.add(ItemIdx(0)), "re-adding a queued item must be refused");
    assert_eq!(q.len(), 2);

    assert_eq!(q.pop(), Some(ItemIdx(0)));
    assert!(!q.add(ItemIdx(0)), "re-adding a processed item must be refused");
    assert_eq!(q.pop(), Some(ItemIdx(1)));
    assert_eq!(q.pop(), None);
  }

  #[test]
  fn generating_index() {
    let mut agenda = Agenda::new();
    let x = Symbol::nonterminal("X");

    assert!(agenda.add_generating(x.clone(), 0, 2));
    assert!(!agenda.add_generating(x.clone(), 0, 2));
    assert!(agenda.add_generating(x.clone(), 0, 3));

    assert!(agenda.is_generating(&x, 0, 2));
    assert!(!agenda.is_generating(&x, 1, 2));
    assert_eq!(agenda.completions(&x, 0), &[2, 3]);
    assert!(agenda.completions(&x, 1).is_empty());

    let spans: Vec<_> = agenda.generating_spans(&x).collect();
    assert_eq!(spans, vec![(0, &[2u32, 3u32][..])]);
  }

  #[test]
  fn waiting_items_group_by_symbol_and_state() {
    let mut agenda = Agenda::new();
    let x = Symbol::nonterminal("X");
    agenda.make_passive(x.clone(), 1, ItemIdx(7));
    agenda.make_passive(x.clone(), 1, ItemIdx(9));
    agenda.make_passive(x.clone(), 2, ItemIdx(11));

    assert_eq!(agenda.waiting(&x, 1), &[ItemIdx(7), ItemIdx(9)]);
    assert_eq!(agenda.waiting(&x, 2), &[ItemIdx(11)]);
    assert!(agenda.waiting(&Symbol::nonterminal("Y"), 1).is_empty());
  }
}
