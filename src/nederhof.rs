use std::rc::Rc;

use rustc_hash::FxHashMap;
use smallvec::smallvec;
use tracing::debug;

use crate::agenda::Agenda;
use crate::error::Error;
use crate::forest::extract_forest;
use crate::item::{Item, ItemArena, ItemIdx};
use crate::rule::Rule;
use crate::slice::SliceVariables;
use crate::symbol::Symbol;
use crate::wcfg::Wcfg;
use crate::wfsa::{StateId, Wfsa};

/// Bottom-up weighted intersection in the style of Nederhof and Satta
/// (2008).
///
/// Axioms come from the automaton's arcs rather than from the grammar:
/// every arc proves its terminal over a span, and rules fire lazily once
/// their first right-hand side symbol has been proven somewhere. With a
/// slice table attached, completed items whose rule weight falls below
/// the span's slice threshold are pruned.
pub struct Nederhof<'a> {
  wcfg: &'a Wcfg,
  wfsa: &'a Wfsa,
  agenda: Agenda,
  items: ItemArena,
  firstsym: FxHashMap<Symbol, Vec<Rc<Rule>>>,
  slice_vars: Option<&'a mut SliceVariables>,
}

impl<'a> Nederhof<'a> {
  pub fn new(wcfg: &'a Wcfg, wfsa: &'a Wfsa) -> Self {
    let mut firstsym: FxHashMap<Symbol, Vec<Rc<Rule>>> = FxHashMap::default();
    for rule in wcfg.iter() {
      firstsym.entry(rule.rhs[0].clone()).or_default().push(rule.clone());
    }
    Self {
      wcfg,
      wfsa,
      agenda: Agenda::new(),
      items: ItemArena::new(),
      firstsym,
      slice_vars: None,
    }
  }

  /// Like [`Nederhof::new`], but completions are filtered by `slice_vars`.
  pub fn sliced(wcfg: &'a Wcfg, wfsa: &'a Wfsa, slice_vars: &'a mut SliceVariables) -> Self {
    Self {
      slice_vars: Some(slice_vars),
      ..Self::new(wcfg, wfsa)
    }
  }

  /// Runs the program and extracts the intersection forest rooted at
  /// `root`, wrapped under the synthetic `goal` symbol.
  ///
  /// `Ok(None)` means the automaton's language and the grammar's language
  /// rooted at `root` do not overlap (under the current slice, if any).
  pub fn intersect(mut self, root: &Symbol, goal: &Symbol) -> Result<Option<Wcfg>, Error> {
    if !self.wcfg.can_rewrite(root) {
      return Err(Error::StartSymbol(root.to_string()));
    }

    // axioms: every arc proves its terminal over the arc's span
    let wfsa = self.wfsa;
    for (sfrom, sto, sym, _weight) in wfsa.iter_arcs() {
      self.add_symbol(sym, *sfrom, *sto);
    }

    while let Some(idx) = self.agenda.pop() {
      let item = self.items.get_cloned(idx);

      if item.is_complete() {
        if self.survives_slice(&item) {
          self.add_symbol(&item.rule.lhs, item.start(), item.dot);
          self.agenda.make_complete(&item, idx);
        }
      } else {
        let next = item
          .next_symbol()
          .expect("incomplete item must have a next symbol")
          .clone();
        self.agenda.make_passive(next.clone(), item.dot, idx);
        let completions: Vec<StateId> = self.agenda.completions(&next, item.dot).to_vec();
        for &sto in completions.iter() {
          let advanced = self.items.advance(idx, sto);
          self.agenda.add(advanced);
        }
      }
    }

    debug!(items = self.items.len(), "making forest");
    let forest = extract_forest(&self.agenda, &self.items, wfsa, root, goal);
    if forest.is_empty() {
      Ok(None)
    } else {
      Ok(Some(forest))
    }
  }

  /// Proves `sym` over the span `sfrom-sto`: advances every item waiting
  /// for it and instantiates the delayed axioms of rules whose right-hand
  /// side starts with it. Returns false if the span had already been
  /// proven.
  fn add_symbol(&mut self, sym: &Symbol, sfrom: StateId, sto: StateId) -> bool {
    if !self.agenda.add_generating(sym.clone(), sfrom, sto) {
      return false;
    }

    let waiting: Vec<ItemIdx> = self.agenda.waiting(sym, sfrom).to_vec();
    for &widx in waiting.iter() {
      let advanced = self.items.advance(widx, sto);
      self.agenda.add(advanced);
    }

    let delayed: Vec<Rc<Rule>> = self.firstsym.get(sym).map(|v| v.to_vec()).unwrap_or_default();
    for rule in delayed {
      let fresh = self.items.intern(rule, sto, smallvec![sfrom]);
      self.agenda.add(fresh);
    }

    true
  }

  fn survives_slice(&mut self, item: &Item) -> bool {
    match self.slice_vars.as_deref_mut() {
      Some(slice_vars) => {
        let u = slice_vars.get(&item.rule.lhs.spanned(item.start(), item.dot));
        item.rule.weight > u
      }
      None => true,
    }
  }
}
