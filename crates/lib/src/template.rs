//! Template parsing for metadata documents.
//!
//! A template is YAML text containing helper calls wrapped in `$(` and `)`.
//! Parsing turns the text into a flat list of [`Segment`]s: literal text that
//! is copied verbatim, and [`Helper`] calls that the interpolator evaluates.
//!
//! # Call Syntax
//!
//! - `$( variable "key" )` - helper name followed by whitespace-separated arguments
//! - `$( release("name") )` - the same call with parenthesized arguments
//! - `$( stemcell )` - helpers without arguments
//!
//! Arguments are double-quoted strings supporting `\"`, `\\`, `\n` and `\t`.
//!
//! # Escaping
//!
//! Use `$$(` to produce a literal `$(` in the output. A `$` that is not
//! followed by `(` passes through unchanged.
//!
//! # Example
//!
//! ```
//! use tilebake_lib::template::{parse, Helper, Segment};
//!
//! let segments = parse("name: $( variable \"product\" )").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Literal("name: ".to_string()),
//!     Segment::Call(Helper::Variable("product".to_string())),
//! ]);
//! ```

use std::fmt;

use thiserror::Error;

use crate::consts::{ACTION_CLOSE, ACTION_OPEN};

/// A parsed helper invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Helper {
  /// `variable "key"` - plain string from the variable table
  Variable(String),

  /// `release "name"` - release record for a release name
  Release(String),

  /// `stemcell` or `stemcell "os"` - stemcell criteria
  Stemcell(Option<String>),

  /// `form "key"` - form type fragment
  Form(String),

  /// `instance_group "name"` - job type fragment
  InstanceGroup(String),

  /// `job "name"` - job template fragment
  Job(String),

  /// `icon` - base64-encoded icon image
  Icon,

  /// `version` - the tile version
  Version,
}

impl Helper {
  /// The helper name as written in templates.
  pub fn name(&self) -> &'static str {
    match self {
      Helper::Variable(_) => "variable",
      Helper::Release(_) => "release",
      Helper::Stemcell(_) => "stemcell",
      Helper::Form(_) => "form",
      Helper::InstanceGroup(_) => "instance_group",
      Helper::Job(_) => "job",
      Helper::Icon => "icon",
      Helper::Version => "version",
    }
  }

  /// The lookup key passed to the helper, if any.
  pub fn key(&self) -> Option<&str> {
    match self {
      Helper::Variable(key)
      | Helper::Release(key)
      | Helper::Form(key)
      | Helper::InstanceGroup(key)
      | Helper::Job(key) => Some(key),
      Helper::Stemcell(os) => os.as_deref(),
      Helper::Icon | Helper::Version => None,
    }
  }
}

impl fmt::Display for Helper {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.key() {
      Some(key) => write!(f, "{} {:?}", self.name(), key),
      None => f.write_str(self.name()),
    }
  }
}

/// A segment of parsed template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no helper calls)
  Literal(String),

  /// A helper call to be evaluated
  Call(Helper),
}

/// Errors that can occur while parsing a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("unclosed action at position {0}")]
  Unclosed(usize),

  #[error("unterminated string at position {0}")]
  UnterminatedString(usize),

  #[error("function \"{name}\" not defined (position {pos})")]
  UnknownHelper { name: String, pos: usize },

  #[error("wrong number of args for {name}: want {expected} got {got} (position {pos})")]
  Arity {
    name: String,
    expected: &'static str,
    got: usize,
    pos: usize,
  },

  #[error("malformed action at position {pos}: {message}")]
  Malformed { pos: usize, message: String },
}

/// Parse a template into segments.
///
/// # Errors
///
/// Returns an error if an action is unclosed, names an unknown helper, passes
/// the wrong number of arguments, or is otherwise malformed.
pub fn parse(input: &str) -> Result<Vec<Segment>, TemplateError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut rest = 0;

  while let Some(found) = input[rest..].find(ACTION_OPEN) {
    let start = rest + found;

    // "$$(" is the escape for a literal "$("
    if start > rest && input[..start].ends_with('$') {
      literal.push_str(&input[rest..start - 1]);
      literal.push_str(ACTION_OPEN);
      rest = start + ACTION_OPEN.len();
      continue;
    }

    literal.push_str(&input[rest..start]);
    if !literal.is_empty() {
      segments.push(Segment::Literal(std::mem::take(&mut literal)));
    }

    let mut cursor = Cursor::new(input, start + ACTION_OPEN.len());
    let helper = parse_action(&mut cursor, start)?;
    segments.push(Segment::Call(helper));
    rest = cursor.pos;
  }

  literal.push_str(&input[rest..]);
  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

struct Cursor<'a> {
  src: &'a str,
  pos: usize,
}

impl<'a> Cursor<'a> {
  fn new(src: &'a str, pos: usize) -> Self {
    Self { src, pos }
  }

  fn peek(&self) -> Option<char> {
    self.src[self.pos..].chars().next()
  }

  fn bump(&mut self) -> Option<char> {
    let ch = self.peek()?;
    self.pos += ch.len_utf8();
    Some(ch)
  }

  fn skip_whitespace(&mut self) {
    while self.peek().is_some_and(char::is_whitespace) {
      self.bump();
    }
  }

  fn ident(&mut self) -> &'a str {
    let start = self.pos;
    while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
      self.bump();
    }
    &self.src[start..self.pos]
  }

  fn string(&mut self) -> Result<String, TemplateError> {
    let start = self.pos;
    self.bump(); // opening quote

    let mut value = String::new();
    loop {
      match self.bump() {
        None => return Err(TemplateError::UnterminatedString(start)),
        Some('"') => return Ok(value),
        Some('\\') => match self.bump() {
          Some('"') => value.push('"'),
          Some('\\') => value.push('\\'),
          Some('n') => value.push('\n'),
          Some('t') => value.push('\t'),
          Some(other) => {
            return Err(TemplateError::Malformed {
              pos: self.pos - other.len_utf8() - 1,
              message: format!("unknown escape sequence '\\{other}'"),
            });
          }
          None => return Err(TemplateError::UnterminatedString(start)),
        },
        Some(c) => value.push(c),
      }
    }
  }
}

/// Parse everything after `$(` up to and including the closing `)`.
fn parse_action(cursor: &mut Cursor<'_>, start: usize) -> Result<Helper, TemplateError> {
  cursor.skip_whitespace();
  let name_pos = cursor.pos;
  let name = cursor.ident();

  if name.is_empty() {
    return match cursor.peek() {
      None => Err(TemplateError::Unclosed(start)),
      Some(c) => Err(TemplateError::Malformed {
        pos: cursor.pos,
        message: format!("expected helper name, found '{c}'"),
      }),
    };
  }

  cursor.skip_whitespace();
  let args = if cursor.peek() == Some('(') {
    cursor.bump();
    let args = parse_args(cursor, start, ')', true)?;
    cursor.skip_whitespace();
    match cursor.bump() {
      Some(ACTION_CLOSE) => args,
      Some(c) => {
        return Err(TemplateError::Malformed {
          pos: cursor.pos - c.len_utf8(),
          message: format!("expected ')' to close action, found '{c}'"),
        });
      }
      None => return Err(TemplateError::Unclosed(start)),
    }
  } else {
    parse_args(cursor, start, ACTION_CLOSE, false)?
  };

  build_helper(name, args, name_pos)
}

/// Parse string arguments up to `close`, consuming it.
fn parse_args(cursor: &mut Cursor<'_>, start: usize, close: char, commas: bool) -> Result<Vec<String>, TemplateError> {
  let mut args = Vec::new();

  loop {
    cursor.skip_whitespace();
    match cursor.peek() {
      None => return Err(TemplateError::Unclosed(start)),
      Some(c) if c == close => {
        cursor.bump();
        return Ok(args);
      }
      Some(',') if commas && !args.is_empty() => {
        cursor.bump();
        cursor.skip_whitespace();
        if cursor.peek() != Some('"') {
          return Err(TemplateError::Malformed {
            pos: cursor.pos,
            message: "expected string argument after ','".to_string(),
          });
        }
      }
      Some('"') => args.push(cursor.string()?),
      Some(c) => {
        return Err(TemplateError::Malformed {
          pos: cursor.pos,
          message: format!("unexpected '{c}' in arguments"),
        });
      }
    }
  }
}

fn build_helper(name: &str, mut args: Vec<String>, pos: usize) -> Result<Helper, TemplateError> {
  let got = args.len();
  let arity = |expected: &'static str| TemplateError::Arity {
    name: name.to_string(),
    expected,
    got,
    pos,
  };

  let helper = match (name, got) {
    ("variable", 1) => Helper::Variable(args.remove(0)),
    ("release", 1) => Helper::Release(args.remove(0)),
    ("form", 1) => Helper::Form(args.remove(0)),
    ("instance_group", 1) => Helper::InstanceGroup(args.remove(0)),
    ("job", 1) => Helper::Job(args.remove(0)),
    ("stemcell", 0) => Helper::Stemcell(None),
    ("stemcell", 1) => Helper::Stemcell(args.pop()),
    ("icon", 0) => Helper::Icon,
    ("version", 0) => Helper::Version,
    ("variable" | "release" | "form" | "instance_group" | "job", _) => return Err(arity("1")),
    ("stemcell", _) => return Err(arity("0 or 1")),
    ("icon" | "version", _) => return Err(arity("0")),
    _ => {
      return Err(TemplateError::UnknownHelper {
        name: name.to_string(),
        pos,
      });
    }
  };

  Ok(helper)
}
