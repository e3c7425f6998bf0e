//! Error types and the error trait hierarchy used across the pipeline

use std::cell::RefCell;
use std::fmt::{Debug, Display};
use std::sync::Arc;

use crate::location::Origin;

/// A point of interest in resolving the error, such as the reference that
/// did not resolve or the import that pulled in a missing module
pub struct ErrorPosition {
  /// The suspected origin
  pub origin: Origin,
  /// Any information about the role of this origin
  pub message: Option<String>,
}
impl From<Origin> for ErrorPosition {
  fn from(origin: Origin) -> Self { Self { origin, message: None } }
}

/// Errors addressed to the language embedder or module author, to be
/// resolved with code changes
pub trait ProjectError: Sized + Send + Sync + 'static {
  /// A general description of this type of error
  const DESCRIPTION: &'static str;
  /// A formatted message that includes specific parameters
  fn message(&self) -> String { Self::DESCRIPTION.to_string() }
  /// Code positions relevant to this error. If you don't implement this, you
  /// must implement [ProjectError::one_position]
  fn positions(&self) -> impl IntoIterator<Item = ErrorPosition> {
    [ErrorPosition { origin: self.one_position(), message: None }]
  }
  /// Short way to provide a single origin. If you don't implement this, you
  /// must implement [ProjectError::positions]
  fn one_position(&self) -> Origin { Origin::Unknown }
  /// Convert the error into a shared trait object to handle various errors
  /// together
  fn pack(self) -> ProjectErrorObj { Arc::new(self) }
}

/// Object-safe view of a [ProjectError]. Don't implement this directly, it
/// is covered by a blanket impl.
pub trait DynProjectError: Send + Sync {
  /// A general description of this type of error
  fn description(&self) -> &str;
  /// A formatted message that includes specific parameters
  fn message(&self) -> String;
  /// Code positions relevant to this error
  fn positions(&self) -> Vec<ErrorPosition>;
}
impl<T: ProjectError> DynProjectError for T {
  fn description(&self) -> &str { T::DESCRIPTION }
  fn message(&self) -> String { ProjectError::message(self) }
  fn positions(&self) -> Vec<ErrorPosition> { ProjectError::positions(self).into_iter().collect() }
}

impl Display for dyn DynProjectError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let description = self.description();
    let message = self.message();
    writeln!(f, "Project error: {description}\n{message}")?;
    for ErrorPosition { origin, message } in self.positions() {
      match message {
        None => writeln!(f, "@{origin}")?,
        Some(msg) => writeln!(f, "@{origin}: {msg}")?,
      }
    }
    Ok(())
  }
}
impl Debug for dyn DynProjectError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{self}") }
}

/// Shared error trait object. [Arc] because errors cross thread boundaries
/// in the concurrent loader.
pub type ProjectErrorObj = Arc<dyn DynProjectError>;

/// Alias for a result with a [ProjectErrorObj] error. This is the type of
/// result most commonly returned by pre-run operations.
pub type ProjectResult<T> = Result<T, ProjectErrorObj>;

/// A variant of [ProjectError] for errors raised in a context that doesn't
/// know where (or on whose behalf) the failing operation ran. The position
/// is attached at the callsite with [ErrorSansOrigin::bundle].
pub trait ErrorSansOrigin: Clone + Sized + Send + Sync + 'static {
  /// A general description of this type of error
  const DESCRIPTION: &'static str;
  /// A formatted message that includes specific parameters
  fn message(&self) -> String { Self::DESCRIPTION.to_string() }
  /// Attach an origin and upgrade to a full [ProjectErrorObj]
  fn bundle(self, origin: &Origin) -> ProjectErrorObj {
    Arc::new(OriginBundle(origin.clone(), self))
  }
  /// Convert into a shared trait object
  fn pack(self) -> ErrorSansOriginObj { Arc::new(self) }
}

/// Object-safe view of an [ErrorSansOrigin]. Covered by a blanket impl.
pub trait DynErrorSansOrigin: Send + Sync {
  /// A general description of this type of error
  fn description(&self) -> &str;
  /// A formatted message that includes specific parameters
  fn message(&self) -> String;
  /// Attach an origin and upgrade to a full [ProjectErrorObj]
  fn bundle(&self, origin: &Origin) -> ProjectErrorObj;
}
impl<T: ErrorSansOrigin> DynErrorSansOrigin for T {
  fn description(&self) -> &str { T::DESCRIPTION }
  fn message(&self) -> String { ErrorSansOrigin::message(self) }
  fn bundle(&self, origin: &Origin) -> ProjectErrorObj {
    ErrorSansOrigin::bundle(self.clone(), origin)
  }
}

impl Display for dyn DynErrorSansOrigin {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}: {}", self.description(), self.message())
  }
}
impl Debug for dyn DynErrorSansOrigin {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{self}") }
}

/// Shared origin-less error trait object
pub type ErrorSansOriginObj = Arc<dyn DynErrorSansOrigin>;

/// Alias for a result with an [ErrorSansOriginObj] error
pub type ResultSansOrigin<T> = Result<T, ErrorSansOriginObj>;

struct OriginBundle<T: ErrorSansOrigin>(Origin, T);
impl<T: ErrorSansOrigin> DynProjectError for OriginBundle<T> {
  fn description(&self) -> &str { T::DESCRIPTION }
  fn message(&self) -> String { self.1.message() }
  fn positions(&self) -> Vec<ErrorPosition> {
    vec![ErrorPosition { origin: self.0.clone(), message: None }]
  }
}

/// Failed expectation about the pipeline's own bookkeeping. Unlike every
/// other error in this module it does not indicate a problem with the
/// loaded code; if one of these surfaces, report it as a loomlang bug.
pub struct InternalConsistency {
  /// What was expected and not found
  pub context: String,
  /// Where the surrounding operation was working
  pub origin: Origin,
}
impl ProjectError for InternalConsistency {
  const DESCRIPTION: &'static str = "Internal consistency error, please report this as a bug";
  fn message(&self) -> String { self.context.clone() }
  fn one_position(&self) -> Origin { self.origin.clone() }
}

/// A buffer errors can be collected into without aborting the surrounding
/// operation. Phases that can continue past an error take one of these
/// instead of returning a result.
pub struct Reporter(RefCell<Vec<ProjectErrorObj>>);
impl Reporter {
  /// Create a new error buffer
  pub fn new() -> Self { Self(RefCell::new(Vec::new())) }
  /// Add an error to the buffer
  pub fn report(&self, error: ProjectErrorObj) { self.0.borrow_mut().push(error) }
  /// Whether any errors were reported so far
  pub fn failing(&self) -> bool { !self.0.borrow().is_empty() }
  /// Return the value if no errors were reported, otherwise the first error
  pub fn bind<T>(self, value: T) -> ProjectResult<T> {
    match self.0.into_inner().into_iter().next() {
      None => Ok(value),
      Some(err) => Err(err),
    }
  }
  /// All errors reported so far
  pub fn into_errors(self) -> Vec<ProjectErrorObj> { self.0.into_inner() }
}
impl Default for Reporter {
  fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod test {
  use intern_all::i;

  use super::*;
  use crate::location::SourceSpan;

  #[derive(Clone)]
  struct NotFoundHere(String);
  impl ErrorSansOrigin for NotFoundHere {
    const DESCRIPTION: &'static str = "A thing was not found";
    fn message(&self) -> String { format!("{} was not found", self.0) }
  }

  #[test]
  fn bundle_keeps_message_and_origin() {
    let origin = Origin::Source(SourceSpan { unit: i("x.loom"), line: 2, col: 5 });
    let err = NotFoundHere("widget".to_string()).bundle(&origin);
    assert_eq!(err.message(), "widget was not found");
    assert_eq!(err.positions().len(), 1);
    assert!(err.to_string().contains("x.loom:2:5"));
  }

  #[test]
  fn origin_less_errors_format_standalone() {
    let err = NotFoundHere("gadget".to_string()).pack();
    assert_eq!(err.to_string(), "A thing was not found: gadget was not found");
    assert_eq!(format!("{err:?}"), err.to_string());
  }

  #[test]
  fn reporter_returns_first_error() {
    let reporter = Reporter::new();
    assert!(!reporter.failing());
    reporter.report(NotFoundHere("a".to_string()).bundle(&Origin::Unknown));
    reporter.report(NotFoundHere("b".to_string()).bundle(&Origin::Unknown));
    assert!(reporter.failing());
    let err = reporter.bind(()).unwrap_err();
    assert_eq!(err.message(), "a was not found");
  }
}
