use std::io;
use std::path::PathBuf;

/// Failure to store one classified field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("malformed {key} value {value:?}: {reason}")]
    MalformedField {
        key: String,
        value: String,
        reason: String,
    },

    #[error("duplicate key {0}")]
    DuplicateField(String),
}

/// Grammar failure for a single log line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Field(#[from] FieldError),

    #[error("unparsed data left: {0}")]
    UnparsedToken(String),

    #[error("unbalanced closing bracket in {0:?}")]
    UnbalancedBracket(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{line}: {source}")]
    Line {
        line: String,
        #[source]
        source: ParseError,
    },

    #[error("no such field: {0}")]
    NoSuchField(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// The parse failure behind this error, if it is one
    pub fn parse_error(&self) -> Option<&ParseError> {
        match self {
            Self::Line { source, .. } => Some(source),
            Self::File { source, .. } => source.parse_error(),
            _ => None,
        }
    }

    pub(crate) fn in_file(self, path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
