use regex::Regex;
/// Line-oriented parsing of bar-separated grammar files
use std::str::FromStr;

use tracing::debug;

use crate::error::Error;
use crate::rule::Rule;
use crate::symbol::Symbol;
use crate::wcfg::Wcfg;

/// Parses a grammar in the bar format, one rule per line:
///
/// ```text
/// [S] ||| [X]
/// [X] ||| [X] [X] ||| 0.5
/// [X] ||| '1' ||| 0.25
/// [X] ||| '2' ||| 0.25
/// ```
///
/// A missing weight section means probability 1. With `log_transform` the
/// weights are read as probabilities and mapped into the log domain;
/// without it they are taken as already being log-weights.
pub fn parse_grammar(src: &str, log_transform: bool) -> Result<Wcfg, Error> {
  let mut grammar = Wcfg::new();
  for (lineno, line) in src.lines().enumerate() {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    let rule = parse_rule_line(line, log_transform)
      .map_err(|msg| Error::Grammar(format!("line {}: {}", lineno + 1, msg)))?;
    grammar.add(rule);
  }
  if grammar.is_empty() {
    return Err(Error::Grammar("empty ruleset".into()));
  }
  debug!(rules = grammar.len(), "grammar parsed");
  Ok(grammar)
}

/// The bar format carries probabilities, so this applies the log
/// transform.
impl FromStr for Wcfg {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    parse_grammar(s, true)
  }
}

type Infallible<'a, T> = (T, &'a str);

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

/// Try to consume a regex at the start of the input, returning None if it
/// doesn't match there
fn optional_re<'a>(re: &'static Regex, s: &'a str) -> Infallible<'a, Option<&'a str>> {
  if let Some(caps) = re.captures(s) {
    let m = caps.get(0).unwrap();
    if m.start() > 0 {
      return (None, s);
    }
    let (_, rest) = s.split_at(m.end());
    (Some(m.as_str()), rest)
  } else {
    (None, s)
  }
}

/// Try to consume a regex, failing if it doesn't match
fn needed_re<'a>(re: &'static Regex, s: &'a str) -> Result<(&'a str, &'a str), String> {
  if let (Some(c), rest) = optional_re(re, s) {
    Ok((c, rest))
  } else {
    Err(format!("couldn't match {} at {:?}", re, s))
  }
}

fn skip_spaces(s: &str) -> &str {
  regex_static!(SPACES, r"[ \t]+");
  optional_re(&SPACES, s).1
}

fn parse_rule_line(line: &str, log_transform: bool) -> Result<Rule, String> {
  regex_static!(NONTERMINAL, r"\[([^ \[\]]+)\]");
  regex_static!(TERMINAL, r"'([^ ']*)'");
  regex_static!(BAR, r"\|{3}");
  regex_static!(WEIGHT, r"[-+]?(\d+(\.\d*)?|\.\d+)([eE][-+]?\d+)?");

  let (lhs, s) = needed_re(&NONTERMINAL, line).map_err(|e| format!("rule symbol: {}", e))?;
  let s = skip_spaces(s);
  let (_, s) = needed_re(&BAR, s).map_err(|e| format!("rule separator: {}", e))?;

  let mut rhs: Vec<Symbol> = Vec::new();
  let mut weight = 1.0f64;
  let mut rem = skip_spaces(s);
  loop {
    if rem.is_empty() {
      break;
    }
    if let (Some(_), s) = optional_re(&BAR, rem) {
      let s = skip_spaces(s);
      let (prob, s) = needed_re(&WEIGHT, s).map_err(|e| format!("rule weight: {}", e))?;
      weight = prob
        .parse()
        .expect("the weight regex only matches valid floats");
      let s = skip_spaces(s);
      if !s.is_empty() {
        return Err(format!("trailing input after the weight: {:?}", s));
      }
      break;
    }
    if let (Some(m), s) = optional_re(&NONTERMINAL, rem) {
      rhs.push(Symbol::nonterminal(&m[1..m.len() - 1]));
      rem = skip_spaces(s);
      continue;
    }
    if let (Some(m), s) = optional_re(&TERMINAL, rem) {
      rhs.push(Symbol::terminal(&m[1..m.len() - 1]));
      rem = skip_spaces(s);
      continue;
    }
    return Err(format!("expected a symbol at {:?}", rem));
  }

  if rhs.is_empty() {
    return Err("a rule needs at least one right-hand side symbol".into());
  }
  let weight = if log_transform {
    if weight < 0.0 {
      return Err(format!("negative probability {} cannot be log-transformed", weight));
    }
    weight.ln()
  } else {
    weight
  };
  Ok(Rule::new(
    Symbol::nonterminal(&lhs[1..lhs.len() - 1]),
    rhs,
    weight,
  ))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_the_bar_format() {
    let g: Wcfg = "[S] ||| [X]\n\
                   [X] ||| [X] [X] ||| 0.5\n\
                   [X] ||| '1' ||| 0.25\n\
                   [X] ||| '2' ||| 0.25\n"
      .parse()
      .unwrap();

    assert_eq!(g.len(), 4);
    let s_rules = g.get(&Symbol::nonterminal("S"));
    assert_eq!(s_rules[0].rhs, vec![Symbol::nonterminal("X")]);
    assert_eq!(s_rules[0].weight, 0.0);

    let x_rules = g.get(&Symbol::nonterminal("X"));
    assert!((x_rules[0].weight - 0.5f64.ln()).abs() < 1e-12);
    assert_eq!(x_rules[2].rhs, vec![Symbol::terminal("2")]);
    assert_eq!(g.terminals().len(), 2);
  }

  #[test]
  fn missing_weight_means_probability_one() {
    let g = parse_grammar("[S] ||| 'a' 'b'", true).unwrap();
    let rule = &g.get(&Symbol::nonterminal("S"))[0];
    assert_eq!(rule.weight, 0.0);
    assert_eq!(rule.rhs.len(), 2);
  }

  #[test]
  fn weights_can_be_read_as_log_domain_directly() {
    let g = parse_grammar("[S] ||| 'a' ||| -1.5", false).unwrap();
    assert_eq!(g.get(&Symbol::nonterminal("S"))[0].weight, -1.5);
  }

  #[test]
  fn scientific_notation_weights_parse() {
    let g = parse_grammar("[S] ||| 'a' ||| 2.5e-1", true).unwrap();
    assert!((g.get(&Symbol::nonterminal("S"))[0].weight - 0.25f64.ln()).abs() < 1e-12);
  }

  #[test]
  fn blank_lines_are_skipped() {
    let g = parse_grammar("\n[S] ||| 'a'\n\n[S] ||| 'b'\n", true).unwrap();
    assert_eq!(g.len(), 2);
  }

  #[test]
  fn errors_name_the_offending_line() {
    let err = parse_grammar("[S] ||| 'a'\nnot a rule\n", true).unwrap_err();
    assert!(err.to_string().contains("line 2"), "{err}");
  }

  #[test]
  fn empty_input_is_an_error() {
    assert!(parse_grammar("\n\n", true).is_err());
  }

  #[test]
  fn a_rule_with_no_rhs_is_an_error() {
    assert!(parse_grammar("[S] |||", true).is_err());
    assert!(parse_grammar("[S] ||| ||| 0.5", true).is_err());
  }

  #[test]
  fn negative_probabilities_do_not_log_transform() {
    assert!(parse_grammar("[S] ||| 'a' ||| -0.5", true).is_err());
    assert!(parse_grammar("[S] ||| 'a' ||| -0.5", false).is_ok());
  }
}
