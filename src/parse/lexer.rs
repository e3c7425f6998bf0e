//! Tokenizer for the loom module surface

use std::fmt;
use std::sync::Arc;

use intern_all::{Tok, i};
use ordered_float::NotNan;

use crate::error::{ProjectError, ProjectResult};
use crate::location::{Origin, SourceSpan};

/// A unit of syntax
#[derive(Clone, Debug, PartialEq)]
pub enum Lexeme {
  /// An identifier or backtick-quoted name
  Name(Tok<String>),
  /// A string literal
  Str(Arc<String>),
  /// A numeric literal
  Num(NotNan<f64>),
  /// `nil`
  Nil,
  /// `true`
  True,
  /// `false`
  False,
  /// `import`
  Import,
  /// `alias`
  Alias,
  /// `export`
  Export,
  /// `library`
  Library,
  /// `native`
  Native,
  /// `as`
  As,
  /// `from`
  From,
  /// `global`
  Global,
  /// `module`
  Module,
  /// `{`
  LBrace,
  /// `}`
  RBrace,
  /// `:`
  Colon,
  /// `::`
  ColonColon,
  /// `;`
  Semi,
  /// `,`
  Comma,
  /// `.`
  Dot,
  /// `*`
  Star,
}
impl fmt::Display for Lexeme {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Name(n) => write!(f, "`{n}`"),
      Self::Str(s) => write!(f, "{s:?}"),
      Self::Num(n) => write!(f, "{n}"),
      Self::Nil => write!(f, "nil"),
      Self::True => write!(f, "true"),
      Self::False => write!(f, "false"),
      Self::Import => write!(f, "import"),
      Self::Alias => write!(f, "alias"),
      Self::Export => write!(f, "export"),
      Self::Library => write!(f, "library"),
      Self::Native => write!(f, "native"),
      Self::As => write!(f, "as"),
      Self::From => write!(f, "from"),
      Self::Global => write!(f, "global"),
      Self::Module => write!(f, "module"),
      Self::LBrace => write!(f, "{{"),
      Self::RBrace => write!(f, "}}"),
      Self::Colon => write!(f, ":"),
      Self::ColonColon => write!(f, "::"),
      Self::Semi => write!(f, ";"),
      Self::Comma => write!(f, ","),
      Self::Dot => write!(f, "."),
      Self::Star => write!(f, "*"),
    }
  }
}

/// A lexeme and the position it was read from
#[derive(Clone, Debug)]
pub struct Entry {
  /// The lexeme
  pub lexeme: Lexeme,
  /// Where it begins in the source
  pub span: SourceSpan,
}

/// A character the tokenizer has no rule for
pub struct UnexpectedChar {
  c: char,
  span: SourceSpan,
}
impl ProjectError for UnexpectedChar {
  const DESCRIPTION: &'static str = "Character not allowed here";
  fn message(&self) -> String { format!("{:?} is not allowed here", self.c) }
  fn one_position(&self) -> Origin { Origin::Source(self.span.clone()) }
}

/// A string or backtick-quoted name that is still open at end of line or
/// end of input
pub struct UnterminatedToken {
  kind: &'static str,
  span: SourceSpan,
}
impl ProjectError for UnterminatedToken {
  const DESCRIPTION: &'static str = "Unterminated token";
  fn message(&self) -> String { format!("this {} is never closed", self.kind) }
  fn one_position(&self) -> Origin { Origin::Source(self.span.clone()) }
}

/// An escape sequence the tokenizer does not recognize
pub struct BadEscape {
  c: Option<char>,
  span: SourceSpan,
}
impl ProjectError for BadEscape {
  const DESCRIPTION: &'static str = "Unrecognized escape sequence";
  fn message(&self) -> String {
    match self.c {
      Some(c) => format!("\\{c} is not a recognized escape sequence"),
      None => "escape at end of input".to_string(),
    }
  }
  fn one_position(&self) -> Origin { Origin::Source(self.span.clone()) }
}

/// A numeric literal that does not parse as a number
pub struct BadNumber {
  text: String,
  span: SourceSpan,
}
impl ProjectError for BadNumber {
  const DESCRIPTION: &'static str = "Invalid numeric literal";
  fn message(&self) -> String { format!("{} is not a valid number", self.text) }
  fn one_position(&self) -> Origin { Origin::Source(self.span.clone()) }
}

struct Reader<'a> {
  chars: std::iter::Peekable<std::str::Chars<'a>>,
  unit: Tok<String>,
  line: u32,
  col: u32,
}
impl<'a> Reader<'a> {
  fn new(unit: Tok<String>, source: &'a str) -> Self {
    Self { chars: source.chars().peekable(), unit, line: 1, col: 1 }
  }
  fn peek(&mut self) -> Option<char> { self.chars.peek().copied() }
  fn bump(&mut self) -> Option<char> {
    let c = self.chars.next()?;
    if c == '\n' {
      self.line += 1;
      self.col = 1;
    } else {
      self.col += 1;
    }
    Some(c)
  }
  fn here(&self) -> SourceSpan {
    SourceSpan { unit: self.unit.clone(), line: self.line, col: self.col }
  }
}

fn is_name_start(c: char) -> bool { c.is_alphabetic() || c == '_' }
fn is_name_char(c: char) -> bool { c.is_alphanumeric() || c == '_' }

fn keyword(word: &str) -> Option<Lexeme> {
  Some(match word {
    "nil" => Lexeme::Nil,
    "true" => Lexeme::True,
    "false" => Lexeme::False,
    "import" => Lexeme::Import,
    "alias" => Lexeme::Alias,
    "export" => Lexeme::Export,
    "library" => Lexeme::Library,
    "native" => Lexeme::Native,
    "as" => Lexeme::As,
    "from" => Lexeme::From,
    "global" => Lexeme::Global,
    "module" => Lexeme::Module,
    _ => return None,
  })
}

fn read_string(r: &mut Reader, span: SourceSpan) -> ProjectResult<Lexeme> {
  let mut text = String::new();
  loop {
    match r.bump() {
      None => return Err(UnterminatedToken { kind: "string", span }.pack()),
      Some('"') => return Ok(Lexeme::Str(Arc::new(text))),
      Some('\\') => {
        let esc_span = r.here();
        match r.bump() {
          Some('n') => text.push('\n'),
          Some('t') => text.push('\t'),
          Some('r') => text.push('\r'),
          Some('\\') => text.push('\\'),
          Some('"') => text.push('"'),
          c => return Err(BadEscape { c, span: esc_span }.pack()),
        }
      },
      Some(c) => text.push(c),
    }
  }
}

fn read_number(r: &mut Reader, first: char, span: SourceSpan) -> ProjectResult<Lexeme> {
  let mut text = String::from(first);
  while let Some(c) = r.peek() {
    if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' {
      text.push(c);
      r.bump();
    } else if (c == '+' || c == '-') && matches!(text.chars().last(), Some('e' | 'E')) {
      text.push(c);
      r.bump();
    } else {
      break;
    }
  }
  let parsed = (text.parse::<f64>().ok())
    .and_then(|v| NotNan::new(v).ok())
    .ok_or_else(|| BadNumber { text, span: span.clone() }.pack())?;
  Ok(Lexeme::Num(parsed))
}

/// Tokenize a source unit
pub fn lex(unit: Tok<String>, source: &str) -> ProjectResult<Vec<Entry>> {
  let mut r = Reader::new(unit, source);
  let mut tokens = Vec::new();
  loop {
    let span = r.here();
    let c = match r.bump() {
      None => return Ok(tokens),
      Some(c) => c,
    };
    let lexeme = match c {
      c if c.is_whitespace() => continue,
      '#' => {
        while r.peek().is_some_and(|c| c != '\n') {
          r.bump();
        }
        continue;
      },
      '{' => Lexeme::LBrace,
      '}' => Lexeme::RBrace,
      ';' => Lexeme::Semi,
      ',' => Lexeme::Comma,
      '.' => Lexeme::Dot,
      '*' => Lexeme::Star,
      ':' => match r.peek() {
        Some(':') => {
          r.bump();
          Lexeme::ColonColon
        },
        _ => Lexeme::Colon,
      },
      '"' => read_string(&mut r, span.clone())?,
      '`' => {
        let mut text = String::new();
        loop {
          match r.bump() {
            None | Some('\n') =>
              return Err(UnterminatedToken { kind: "quoted name", span }.pack()),
            Some('`') => break,
            Some(c) => text.push(c),
          }
        }
        Lexeme::Name(i(&text))
      },
      c if c.is_ascii_digit() => read_number(&mut r, c, span.clone())?,
      c if is_name_start(c) => {
        let mut word = String::from(c);
        while r.peek().is_some_and(is_name_char) {
          word.push(r.bump().expect("peeked"));
        }
        keyword(&word).unwrap_or_else(|| Lexeme::Name(i(&word)))
      },
      c => return Err(UnexpectedChar { c, span }.pack()),
    };
    tokens.push(Entry { lexeme, span });
  }
}
