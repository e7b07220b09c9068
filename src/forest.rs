use rustc_hash::FxHashSet;

use crate::agenda::Agenda;
use crate::item::{Item, ItemArena};
use crate::rule::Rule;
use crate::symbol::Symbol;
use crate::wcfg::Wcfg;
use crate::wfsa::{StateId, Wfsa};

/// Projects a complete item onto a rule over span-annotated symbols.
///
/// The item's inner states plus its dot give the automaton path through
/// the rule, so right-hand-side symbol `i` spans `positions[i]` to
/// `positions[i + 1]`. Terminals stay unannotated.
fn intersected_rule(item: &Item) -> Rule {
  let mut positions: Vec<StateId> = Vec::with_capacity(item.inner.len() + 1);
  positions.extend_from_slice(&item.inner);
  positions.push(item.dot);

  let lhs = item.rule.lhs.spanned(item.start(), item.dot);
  let rhs = item
    .rule
    .rhs
    .iter()
    .enumerate()
    .map(|(i, sym)| sym.spanned(positions[i], positions[i + 1]))
    .collect();
  Rule::new(lhs, rhs, item.rule.weight)
}

struct ForestBuilder<'a> {
  agenda: &'a Agenda,
  items: &'a ItemArena,
  forest: Wcfg,
  processed: FxHashSet<(Symbol, StateId, StateId)>,
}

impl<'a> ForestBuilder<'a> {
  /// Visits complete items top-down from `(lhs, start, end)`, adding one
  /// projected rule per item. The descent doubles as a reachability test:
  /// spans no derivation uses from the root never make it into the forest,
  /// which matters for the bottom-up program since it proves plenty of
  /// useless spans.
  fn make_rules(&mut self, lhs: &Symbol, start: StateId, end: StateId) {
    if !self.processed.insert((lhs.clone(), start, end)) {
      return;
    }
    let agenda = self.agenda;
    let items = self.items;
    for &idx in agenda.complete_items(lhs, start, end) {
      let item = items.get(idx);
      self.forest.add(intersected_rule(item));

      let mut positions: Vec<StateId> = Vec::with_capacity(item.inner.len() + 1);
      positions.extend_from_slice(&item.inner);
      positions.push(item.dot);
      for (i, sym) in item.rule.rhs.iter().enumerate() {
        if !sym.is_nonterminal() {
          continue;
        }
        let (sfrom, sto) = (positions[i], positions[i + 1]);
        if !self.processed.contains(&(sym.clone(), sfrom, sto)) {
          self.make_rules(sym, sfrom, sto);
        }
      }
    }
  }
}

/// Builds the intersection grammar from the chart left behind by one of
/// the deduction programs.
///
/// One goal rule with weight zero is added per accepting span of `root`,
/// so the forest re-roots every accepted path under the single unannotated
/// `goal` symbol. Accepting spans are visited in sorted order, which keeps
/// the forest's rule order reproducible.
pub fn extract_forest(
  agenda: &Agenda,
  items: &ItemArena,
  wfsa: &Wfsa,
  root: &Symbol,
  goal: &Symbol,
) -> Wcfg {
  let mut builder = ForestBuilder {
    agenda,
    items,
    forest: Wcfg::new(),
    processed: FxHashSet::default(),
  };

  let mut accepting: Vec<(StateId, StateId)> = Vec::new();
  for (start, ends) in agenda.generating_spans(root) {
    if !wfsa.is_initial(start) {
      continue;
    }
    for &end in ends {
      if wfsa.is_final(end) {
        accepting.push((start, end));
      }
    }
  }
  accepting.sort_unstable();

  for (start, end) in accepting {
    builder.make_rules(root, start, end);
    builder
      .forest
      .add(Rule::new(goal.clone(), vec![root.spanned(start, end)], 0.0));
  }

  builder.forest
}
