use std::fmt;
use std::path::PathBuf;

use codespan_reporting::diagnostic::{self, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};

use crate::span::Span;

/// Fatal error aborting the current run.
#[derive(Debug)]
pub enum Error {
    /// Two generics in the same store share a name.
    DuplicateGeneric { name: String },
    /// A placeholder occurs more than once in a generic's name.
    RepeatedVar { name: String, var: String },
    /// A generic declares more placeholders than the canonical variable set.
    TooManyVars { name: String, count: usize },
    /// A `needs`, `embeds` or `required-vars` entry references a placeholder
    /// that is not declared in the generic's name.
    UnknownVar {
        name: String,
        clause: &'static str,
        var: String,
    },
    /// The compiled signature does not match the generic's own name.
    BadSignature { name: String },
    /// A matched capture tuple differs in length from the generic's vars.
    ArityMismatch { signature: String, generic: String },
    /// A `{{.Var}}` template failed to compile.
    Template { template: String, detail: String },
    /// A template referenced a variable absent from the substitution map.
    Render { template: String, var: String },
    Io {
        path: PathBuf,
        error: std::io::Error,
    },
    /// The external type-checker could not be invoked.
    Checker(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DuplicateGeneric { name } => write!(f, "duplicate generic {name:?}"),
            Error::RepeatedVar { name, var } => {
                write!(f, "generic {name:?} repeats placeholder <{var}>")
            }
            Error::TooManyVars { name, count } => {
                write!(f, "generic {name:?} declares {count} placeholders (limit is 7)")
            }
            Error::UnknownVar { name, clause, var } => {
                write!(f, "generic {name:?}: {clause} references unknown placeholder <{var}>")
            }
            Error::BadSignature { name } => {
                write!(f, "generic {name:?}: compiled signature does not match its own name")
            }
            Error::ArityMismatch { signature, generic } => {
                write!(f, "signature {signature:?} does not match generic {generic:?}")
            }
            Error::Template { template, detail } => {
                write!(f, "template {template:?}: {detail}")
            }
            Error::Render { template, var } => {
                write!(f, "template {template:?} references undefined variable {var:?}")
            }
            Error::Io { path, error } => {
                write!(f, "cannot access '{}': {error}", path.display())
            }
            Error::Checker(detail) => write!(f, "type-checker failed: {detail}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Non-fatal pragma diagnostic. The directive is ignored and the run
/// continues.
#[derive(Debug, Clone)]
pub struct PragmaError {
    pub kind: PragmaErrorKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum PragmaErrorKind {
    UnknownDirective(String),
    MissingPayload(String),
    MalformedType(String),
    BadFileTemplate(String),
}

impl fmt::Display for PragmaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PragmaErrorKind::UnknownDirective(d) => write!(f, "unknown pragma directive: {d}"),
            PragmaErrorKind::MissingPayload(d) => write!(f, "pragma {d} requires a payload"),
            PragmaErrorKind::MalformedType(payload) => {
                write!(f, "pragma type expects two identifiers, got {payload:?}")
            }
            PragmaErrorKind::BadFileTemplate(detail) => {
                write!(f, "ignoring pragma file: {detail}")
            }
        }
    }
}

/// Renders pragma diagnostics to stderr.
pub struct ErrorReporter {
    files: SimpleFiles<String, String>,
    file_id: usize,
}

impl ErrorReporter {
    pub fn new(filename: String, source: String) -> Self {
        let mut files = SimpleFiles::new();
        let file_id = files.add(filename, source);
        Self { files, file_id }
    }

    pub fn report_pragma_error(&self, err: &PragmaError) {
        let diag = diagnostic::Diagnostic::warning()
            .with_message(err.to_string())
            .with_labels(vec![Label::primary(
                self.file_id,
                err.span.start..err.span.end,
            )]);
        self.emit(&diag);
    }

    fn emit(&self, diag: &diagnostic::Diagnostic<usize>) {
        let writer = StandardStream::stderr(ColorChoice::Auto);
        let config = term::Config::default();
        let _ = term::emit(&mut writer.lock(), &config, &self.files, diag);
    }
}
