use thiserror::Error;

/// Things that can go wrong before or during intersection.
///
/// An input the grammar doesn't cover is *not* an error: the engines signal
/// that by returning `Ok(None)`.
#[derive(Error, Debug)]
pub enum Error {
  #[error("no rule for the start symbol {0}")]
  StartSymbol(String),

  #[error("unknown intersection strategy: {0}")]
  UnknownStrategy(String),

  #[error("forest contains a cycle")]
  CyclicForest,

  #[error("grammar: {0}")]
  Grammar(String),

  #[error("invalid Beta parameters: a={a}, b={b}")]
  SliceParameters { a: f64, b: f64 },
}
