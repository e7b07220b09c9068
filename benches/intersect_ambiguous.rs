use criterion::{black_box, criterion_group, criterion_main, Criterion};

use coppice::{intersect, parse_grammar, Strategy, Symbol, Wcfg, Wfsa};

const GRAMMAR_SRC: &str = "[S] ||| [X] ||| 1.0
[X] ||| [X] [X] ||| 0.5
[X] ||| '1' ||| 0.25
[X] ||| '2' ||| 0.25
";

fn forest_size(wcfg: &Wcfg, wfsa: &Wfsa, strategy: Strategy) -> usize {
  intersect(
    wcfg,
    wfsa,
    &Symbol::nonterminal("S"),
    &Symbol::nonterminal("GOAL"),
    strategy,
  )
  .unwrap()
  .map(|f| f.len())
  .unwrap_or(0)
}

fn criterion_benchmark(c: &mut Criterion) {
  let grammar = parse_grammar(GRAMMAR_SRC, true).unwrap();
  let tokens = "1 2 1 2 1 2".split(' ').collect::<Vec<_>>();
  let fsa = Wfsa::linear_chain(&tokens);

  c.bench_function("intersect top-down", |b| {
    b.iter(|| forest_size(black_box(&grammar), black_box(&fsa), Strategy::TopDown))
  });

  c.bench_function("intersect bottom-up", |b| {
    b.iter(|| forest_size(black_box(&grammar), black_box(&fsa), Strategy::BottomUp))
  });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
