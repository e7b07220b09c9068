use std::env;
use std::fs;
use std::io;
use std::io::Write;
use std::process;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use coppice::{
  exact_sample, make_sentence, parse_grammar, sliced_sampling, tally, McmcConfig, Strategy, Symbol,
  SynTree, Wcfg,
};

fn usage(prog_name: &str) -> String {
  format!(
    r"Usage: {} GRAMMAR [options]

Reads one sentence per line from stdin and samples derivations for each.

Options:
  -h, --help            Print this message
  --exact               Sample from the full forest instead of running MCMC
  --top-down            Intersect with the top-down (Earley) engine
  --bottom-up           Intersect with the bottom-up (Nederhof) engine (default)
  --log                 Grammar weights are probabilities; take their logs
  --samples N           Number of samples to draw (default 100)
  --burn N              Initial accepted samples to discard (default 0)
  --max-iterations N    Iteration cap for the MCMC sampler (default 1000)
  --seed N              Seed the random number generator
  -a BEFORE AFTER       First Beta parameter, before and after the first parse
  -b BEFORE AFTER       Second Beta parameter, before and after the first parse
  --start NAME          Start symbol (default S)
  --goal NAME           Goal symbol of the intersection (default GOAL)
  --default-symbol NAME Rewrite unknown words with [NAME] pass-through rules",
    prog_name
  )
}

struct Args {
  filename: String,
  exact: bool,
  strategy: Strategy,
  log_transform: bool,
  samples: usize,
  burn: usize,
  max_iterations: usize,
  seed: Option<u64>,
  a: (f64, f64),
  b: (f64, f64),
  start: String,
  goal: String,
  default_symbol: Option<String>,
}

impl Args {
  fn make_error_message(msg: &str, prog_name: impl AsRef<str>) -> String {
    format!("argument error: {}.\n\n{}", msg, usage(prog_name.as_ref()))
  }

  fn value(opt: Option<String>, flag: &str, prog_name: &str) -> Result<String, String> {
    opt.ok_or_else(|| Self::make_error_message(&format!("{} needs a value", flag), prog_name))
  }

  fn number<T: FromStr>(opt: Option<String>, flag: &str, prog_name: &str) -> Result<T, String> {
    let raw = Self::value(opt, flag, prog_name)?;
    raw.parse().map_err(|_| {
      Self::make_error_message(&format!("{} is not a valid value for {}", raw, flag), prog_name)
    })
  }

  fn parse(v: Vec<String>) -> Result<Self, String> {
    if v.is_empty() {
      return Err(Self::make_error_message("bad argument vector", "coppice"));
    }

    let args_len = v.len();
    let mut iter = v.into_iter();
    let prog_name = iter.next().unwrap();

    if args_len < 2 {
      return Err(Self::make_error_message("not enough arguments", prog_name));
    }

    let mut filename: Option<String> = None;
    let mut exact = false;
    let mut strategy = Strategy::BottomUp;
    let mut log_transform = false;
    let mut samples = 100;
    let mut burn = 0;
    let mut max_iterations = 1000;
    let mut seed = None;
    let mut a = (0.1, 0.3);
    let mut b = (1.0, 1.0);
    let mut start = "S".to_string();
    let mut goal = "GOAL".to_string();
    let mut default_symbol: Option<String> = None;

    while let Some(o) = iter.next() {
      if o == "-h" || o == "--help" {
        println!("{}", usage(&prog_name));
        process::exit(0);
      } else if o == "--exact" {
        exact = true;
      } else if o == "--top-down" {
        strategy = Strategy::TopDown;
      } else if o == "--bottom-up" {
        strategy = Strategy::BottomUp;
      } else if o == "--log" {
        log_transform = true;
      } else if o == "--samples" {
        samples = Self::number(iter.next(), &o, &prog_name)?;
      } else if o == "--burn" {
        burn = Self::number(iter.next(), &o, &prog_name)?;
      } else if o == "--max-iterations" {
        max_iterations = Self::number(iter.next(), &o, &prog_name)?;
      } else if o == "--seed" {
        seed = Some(Self::number(iter.next(), &o, &prog_name)?);
      } else if o == "-a" {
        a = (
          Self::number(iter.next(), &o, &prog_name)?,
          Self::number(iter.next(), &o, &prog_name)?,
        );
      } else if o == "-b" {
        b = (
          Self::number(iter.next(), &o, &prog_name)?,
          Self::number(iter.next(), &o, &prog_name)?,
        );
      } else if o == "--start" {
        start = Self::value(iter.next(), &o, &prog_name)?;
      } else if o == "--goal" {
        goal = Self::value(iter.next(), &o, &prog_name)?;
      } else if o == "--default-symbol" {
        default_symbol = Some(Self::value(iter.next(), &o, &prog_name)?);
      } else if filename.is_none() {
        filename = Some(o);
      } else {
        return Err(Self::make_error_message("invalid arguments", prog_name));
      }
    }

    if let Some(filename) = filename {
      Ok(Self {
        filename,
        exact,
        strategy,
        log_transform,
        samples,
        burn,
        max_iterations,
        seed,
        a,
        b,
        start,
        goal,
        default_symbol,
      })
    } else {
      Err(Self::make_error_message("missing grammar file", prog_name))
    }
  }
}

fn process(line: &str, grammar: &Wcfg, opts: &Args, rng: &mut StdRng) -> Result<(), coppice::Error> {
  let (sentence, extra_rules) = make_sentence(line, grammar, opts.default_symbol.as_deref());
  let mut grammar = grammar.clone();
  grammar.extend(extra_rules);

  let root = Symbol::nonterminal(&opts.start);
  let goal = Symbol::nonterminal(&opts.goal);

  // exact sampling knows the forest's total weight, so it can report each
  // derivation's true probability next to the empirical estimate
  let (samples, normalizer) = if opts.exact {
    match exact_sample(
      &grammar,
      sentence.fsa(),
      &root,
      &goal,
      opts.samples,
      opts.strategy,
      rng,
    )? {
      Some(exact) => (exact.samples, Some(exact.goal_inside)),
      None => (Vec::new(), None),
    }
  } else {
    let config = McmcConfig {
      samples: opts.samples,
      burn: opts.burn,
      max_iterations: opts.max_iterations,
      a: opts.a,
      b: opts.b,
      strategy: opts.strategy,
      seed: opts.seed,
    };
    let report = sliced_sampling(&grammar, sentence.fsa(), &root, &goal, &config)?;
    (report.samples, None)
  };

  if samples.is_empty() {
    println!("NO PARSE FOUND");
    return Ok(());
  }

  for (d, n) in tally(&samples) {
    let estimate = n as f64 / samples.len() as f64;
    match normalizer {
      Some(z) => println!(
        "# n={} estimate={} prob={} score={}",
        n,
        estimate,
        (d.score() - z).exp(),
        d.score()
      ),
      None => println!("# n={} estimate={} score={}", n, estimate, d.score()),
    }
    println!("{}\n", SynTree::from_derivation(d));
  }

  Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let opts = match Args::parse(env::args().collect()) {
    Ok(opts) => opts,
    Err(msg) => {
      eprintln!("{}", msg);
      process::exit(255);
    }
  };

  let src = fs::read_to_string(&opts.filename)?;
  let grammar = parse_grammar(&src, opts.log_transform)?;

  let mut rng = match opts.seed {
    Some(seed) => StdRng::seed_from_u64(seed),
    None => StdRng::from_os_rng(),
  };

  let mut input = String::new();
  loop {
    print!("> ");
    io::stdout().flush()?;

    match io::stdin().read_line(&mut input) {
      Ok(_) => {
        if input.is_empty() {
          // ctrl+d
          return Ok(());
        }
        let line = input.trim();
        if !line.is_empty() {
          process(line, &grammar, &opts, &mut rng)?;
        }
        input.clear();
      }
      Err(error) => return Err(error.into()),
    }
  }
}
