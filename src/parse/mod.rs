//! Parser for loom source units.
//!
//! Three entry points: [parse_unit] for a full tree, [parse_module_head]
//! for the import section only (what concurrent discovery runs), and both
//! in recovery mode where statement-level errors are collected and skipped
//! instead of aborting the parse.

pub mod lexer;
pub mod parsed;

use std::time::{Duration, Instant};

use intern_all::Tok;
use once_cell::sync::OnceCell;

use self::lexer::{Entry, Lexeme, lex};
use self::parsed::{
  AliasNode, Anchor, ExportNode, ExprKind, ExprNode, ImportMember, ImportNode, LibraryNode,
  Literal, ModuleNode, Reference, VarNode,
};
use crate::error::{ProjectError, ProjectErrorObj, ProjectResult};
use crate::location::{Origin, SourceSpan};

/// The result of parsing one unit
#[derive(Debug)]
pub struct ParseReport {
  /// The parse tree. Partial if errors were recovered.
  pub module: ModuleNode,
  /// Wall-clock time spent lexing and parsing
  pub duration: Duration,
  /// Errors skipped over in recovery mode, empty otherwise
  pub recovered: Vec<ProjectErrorObj>,
}

/// The import section of a unit
#[derive(Debug)]
pub struct HeadReport {
  /// Import statements up to the first non-import token
  pub imports: Vec<ImportNode>,
  /// Errors skipped over in recovery mode, empty otherwise
  pub recovered: Vec<ProjectErrorObj>,
}

/// A token that does not fit the grammar at this point
pub struct SyntaxError {
  expected: &'static str,
  found: Option<Lexeme>,
  span: SourceSpan,
}
impl ProjectError for SyntaxError {
  const DESCRIPTION: &'static str = "Syntax error";
  fn message(&self) -> String {
    match &self.found {
      Some(lexeme) => format!("expected {}, found {lexeme}", self.expected),
      None => format!("expected {}, found end of input", self.expected),
    }
  }
  fn one_position(&self) -> Origin { Origin::Source(self.span.clone()) }
}

/// Parse a full source unit
pub fn parse_unit(path: Tok<String>, source: &str, recovery: bool) -> ProjectResult<ParseReport> {
  let start = Instant::now();
  let head = SourceSpan::head(path.clone());
  let tokens = match lex(path.clone(), source) {
    Ok(tokens) => tokens,
    Err(e) if recovery =>
      return Ok(ParseReport {
        module: ModuleNode::empty(head),
        duration: start.elapsed(),
        recovered: vec![e],
      }),
    Err(e) => return Err(e),
  };
  let mut p = Parser::new(path, &tokens, recovery);
  let module = p.module()?;
  Ok(ParseReport { module, duration: start.elapsed(), recovered: p.errors })
}

/// Parse only the leading import statements of a unit
pub fn parse_module_head(
  path: Tok<String>,
  source: &str,
  recovery: bool,
) -> ProjectResult<HeadReport> {
  let tokens = match lex(path.clone(), source) {
    Ok(tokens) => tokens,
    Err(e) if recovery => return Ok(HeadReport { imports: Vec::new(), recovered: vec![e] }),
    Err(e) => return Err(e),
  };
  let mut p = Parser::new(path, &tokens, recovery);
  let imports = p.module_head()?;
  Ok(HeadReport { imports, recovered: p.errors })
}

struct Parser<'a> {
  tokens: &'a [Entry],
  pos: usize,
  unit: Tok<String>,
  recovery: bool,
  errors: Vec<ProjectErrorObj>,
}
impl<'a> Parser<'a> {
  fn new(unit: Tok<String>, tokens: &'a [Entry], recovery: bool) -> Self {
    Self { tokens, pos: 0, unit, recovery, errors: Vec::new() }
  }

  fn peek(&self) -> Option<&Lexeme> { self.tokens.get(self.pos).map(|e| &e.lexeme) }
  fn bump(&mut self) -> Option<&Entry> {
    let entry = self.tokens.get(self.pos)?;
    self.pos += 1;
    Some(entry)
  }
  /// Position of the upcoming token, or of the end of input
  fn here(&self) -> SourceSpan {
    (self.tokens.get(self.pos).or_else(|| self.tokens.last()))
      .map_or_else(|| SourceSpan::head(self.unit.clone()), |e| e.span.clone())
  }
  fn fail<T>(&self, expected: &'static str) -> ProjectResult<T> {
    let found = self.peek().cloned();
    Err(SyntaxError { expected, found, span: self.here() }.pack())
  }
  fn expect(&mut self, lexeme: Lexeme, expected: &'static str) -> ProjectResult<SourceSpan> {
    if self.peek() == Some(&lexeme) {
      Ok(self.bump().expect("peeked").span.clone())
    } else {
      self.fail(expected)
    }
  }
  fn name(&mut self, expected: &'static str) -> ProjectResult<(Tok<String>, SourceSpan)> {
    match self.peek() {
      Some(Lexeme::Name(_)) => {
        let entry = self.bump().expect("peeked");
        match &entry.lexeme {
          Lexeme::Name(n) => Ok((n.clone(), entry.span.clone())),
          _ => unreachable!("matched above"),
        }
      },
      _ => self.fail(expected),
    }
  }

  /// Skip to the start of the next statement after a recovered error
  fn synchronize(&mut self) {
    let mut depth = 0usize;
    while let Some(lexeme) = self.peek() {
      match lexeme {
        Lexeme::LBrace => depth += 1,
        Lexeme::RBrace => {
          self.bump();
          depth = depth.saturating_sub(1);
          if depth == 0 {
            return;
          }
          continue;
        },
        Lexeme::Semi if depth == 0 => {
          self.bump();
          return;
        },
        Lexeme::Import | Lexeme::Alias | Lexeme::Export | Lexeme::Library if depth == 0 => return,
        _ => (),
      }
      self.bump();
    }
  }

  fn module(&mut self) -> ProjectResult<ModuleNode> {
    let span = (self.tokens.first())
      .map_or_else(|| SourceSpan::head(self.unit.clone()), |e| e.span.clone());
    let mut module = ModuleNode::empty(span);
    while self.peek().is_some() {
      match self.statement(&mut module) {
        Ok(()) => (),
        Err(e) if self.recovery => {
          self.errors.push(e);
          self.synchronize();
        },
        Err(e) => return Err(e),
      }
    }
    Ok(module)
  }

  fn module_head(&mut self) -> ProjectResult<Vec<ImportNode>> {
    let mut imports = Vec::new();
    while self.peek() == Some(&Lexeme::Import) {
      match self.import() {
        Ok(import) => imports.push(import),
        Err(e) if self.recovery => {
          self.errors.push(e);
          self.synchronize();
        },
        Err(e) => return Err(e),
      }
    }
    Ok(imports)
  }

  fn statement(&mut self, module: &mut ModuleNode) -> ProjectResult<()> {
    match self.peek() {
      Some(Lexeme::Import) => module.imports.push(self.import()?),
      Some(Lexeme::Alias) => module.aliases.push(self.alias()?),
      Some(Lexeme::Library) => {
        self.bump();
        module.libraries.push(self.library(false)?);
      },
      Some(Lexeme::Export) => {
        let span = self.bump().expect("peeked").span.clone();
        if self.peek() == Some(&Lexeme::Library) {
          self.bump();
          module.libraries.push(self.library(true)?);
        } else {
          module.exports.push(self.export(span)?);
        }
      },
      _ => return self.fail("a statement (import, alias, export or library)"),
    }
    Ok(())
  }

  fn import(&mut self) -> ProjectResult<ImportNode> {
    let span = self.expect(Lexeme::Import, "import")?;
    let mut members = Vec::new();
    if self.peek() == Some(&Lexeme::Star) {
      self.bump();
      self.expect(Lexeme::As, "`as`")?;
      let (name, mspan) = self.name("a module name")?;
      members.push(ImportMember::Module { name, span: mspan });
    } else {
      loop {
        let (export_name, mspan) = self.name("an imported name")?;
        let local_name = match self.peek() {
          Some(Lexeme::As) => {
            self.bump();
            self.name("a local name")?.0
          },
          _ => export_name.clone(),
        };
        members.push(ImportMember::Name { export_name, local_name, span: mspan });
        match self.peek() {
          Some(Lexeme::Comma) => {
            self.bump();
          },
          _ => break,
        }
      }
    }
    self.expect(Lexeme::From, "`from`")?;
    let path = self.expr()?;
    self.expect(Lexeme::Semi, "`;`")?;
    Ok(ImportNode { span, path, members, target: OnceCell::new() })
  }

  fn alias(&mut self) -> ProjectResult<AliasNode> {
    let span = self.expect(Lexeme::Alias, "alias")?;
    let source = self.reference()?;
    self.expect(Lexeme::As, "`as`")?;
    let (name, _) = self.name("an alias name")?;
    self.expect(Lexeme::Semi, "`;`")?;
    Ok(AliasNode { span, source, name })
  }

  fn export(&mut self, span: SourceSpan) -> ProjectResult<ExportNode> {
    let source = self.reference()?;
    let name = match self.peek() {
      Some(Lexeme::As) => {
        self.bump();
        self.name("an export name")?.0
      },
      _ => source.parts.last().expect("references have at least one part").clone(),
    };
    self.expect(Lexeme::Semi, "`;`")?;
    Ok(ExportNode { span, source, name })
  }

  fn library(&mut self, exported: bool) -> ProjectResult<LibraryNode> {
    let (name, span) = self.name("a library name")?;
    self.expect(Lexeme::LBrace, "`{`")?;
    let mut vars = Vec::new();
    while self.peek() != Some(&Lexeme::RBrace) {
      let (var_name, var_span) = self.name("a var name or `}`")?;
      self.expect(Lexeme::Colon, "`:`")?;
      let value = self.expr()?;
      self.expect(Lexeme::Semi, "`;`")?;
      vars.push(VarNode { span: var_span, name: var_name, value });
    }
    self.expect(Lexeme::RBrace, "`}`")?;
    Ok(LibraryNode { span, exported, name, vars })
  }

  fn expr(&mut self) -> ProjectResult<ExprNode> {
    let span = self.here();
    let kind = match self.peek() {
      Some(Lexeme::Nil) => {
        self.bump();
        ExprKind::Literal(Literal::Nil)
      },
      Some(Lexeme::True) => {
        self.bump();
        ExprKind::Literal(Literal::Bool(true))
      },
      Some(Lexeme::False) => {
        self.bump();
        ExprKind::Literal(Literal::Bool(false))
      },
      Some(Lexeme::Num(n)) => {
        let kind = ExprKind::Literal(Literal::Num(*n));
        self.bump();
        kind
      },
      Some(Lexeme::Str(s)) => {
        let kind = ExprKind::Literal(Literal::Str(s.clone()));
        self.bump();
        kind
      },
      Some(Lexeme::Native) => {
        self.bump();
        match self.peek() {
          Some(Lexeme::Str(id)) => {
            let kind = ExprKind::Native(id.clone());
            self.bump();
            kind
          },
          _ => return self.fail("a string naming the native function"),
        }
      },
      Some(Lexeme::Name(_) | Lexeme::Global | Lexeme::Module | Lexeme::Library) =>
        ExprKind::Reference(self.reference()?),
      _ => return self.fail("an expression"),
    };
    Ok(ExprNode { kind, span })
  }

  fn reference(&mut self) -> ProjectResult<Reference> {
    let span = self.here();
    let anchor = match self.peek() {
      Some(Lexeme::Global) => Anchor::Global,
      Some(Lexeme::Module) => Anchor::Module,
      Some(Lexeme::Library) => Anchor::Library,
      _ => Anchor::Local,
    };
    if anchor != Anchor::Local {
      self.bump();
      self.expect(Lexeme::ColonColon, "`::`")?;
    }
    let mut parts = vec![self.name("a name")?.0];
    while self.peek() == Some(&Lexeme::Dot) {
      self.bump();
      parts.push(self.name("a name after `.`")?.0);
    }
    Ok(Reference { anchor, parts, span })
  }
}
