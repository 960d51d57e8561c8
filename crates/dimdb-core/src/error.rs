use crate::obs;
use std::{fmt, io, path::PathBuf};
use thiserror::Error as ThisError;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

///
/// Error
///
/// Flat error taxonomy for the whole runtime. Variants carry enough
/// context to render one single-line diagnostic; callers that need a
/// stable classification independent of message text use [`Error::kind`].
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("size overflow while {0}")]
    Alloc(&'static str),

    #[error("{0}")]
    InvalidArg(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    TypeMismatch(String),

    #[error("{0}")]
    ShapeMismatch(String),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Format(String),

    #[error("driver '{driver}' does not support {op}")]
    UnsupportedOp { driver: String, op: &'static str },

    #[error("cannot find storage plugin for driver '{driver}' in search path: {}", format_paths(.searched))]
    PluginMissing {
        driver: String,
        searched: Vec<PathBuf>,
    },

    #[error("invalid uuid: '{0}'")]
    UuidInvalid(String),
}

impl Error {
    pub(crate) fn unsupported(driver: &str, op: &'static str) -> Self {
        Self::UnsupportedOp {
            driver: driver.to_string(),
            op,
        }
    }

    /// Return the stable error kind independent of message text.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Alloc(_) => ErrorKind::Alloc,
            Self::InvalidArg(_) => ErrorKind::InvalidArg,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::TypeMismatch(_) => ErrorKind::TypeMismatch,
            Self::ShapeMismatch(_) => ErrorKind::ShapeMismatch,
            Self::Io(_) => ErrorKind::Io,
            Self::Format(_) => ErrorKind::Format,
            Self::UnsupportedOp { .. } => ErrorKind::UnsupportedOp,
            Self::PluginMissing { .. } => ErrorKind::PluginMissing,
            Self::UuidInvalid(_) => ErrorKind::UuidInvalid,
        }
    }

    /// Route one diagnostic line for this error through the active sink,
    /// then hand the error back for propagation with `?`.
    #[must_use]
    pub fn emit(self) -> Self {
        obs::diag(&self.to_string());
        self
    }
}

fn format_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "(empty)".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

///
/// ErrorKind
///
/// Stable classification of runtime failures.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Alloc,
    InvalidArg,
    NotFound,
    TypeMismatch,
    ShapeMismatch,
    Io,
    Format,
    UnsupportedOp,
    PluginMissing,
    UuidInvalid,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alloc => "alloc",
            Self::InvalidArg => "invalid_arg",
            Self::NotFound => "not_found",
            Self::TypeMismatch => "type_mismatch",
            Self::ShapeMismatch => "shape_mismatch",
            Self::Io => "io",
            Self::Format => "format",
            Self::UnsupportedOp => "unsupported_op",
            Self::PluginMissing => "plugin_missing",
            Self::UuidInvalid => "uuid_invalid",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_have_stable_labels() {
        assert_eq!(ErrorKind::Alloc.as_str(), "alloc");
        assert_eq!(ErrorKind::UnsupportedOp.as_str(), "unsupported_op");
        assert_eq!(ErrorKind::PluginMissing.as_str(), "plugin_missing");
    }

    #[test]
    fn unsupported_names_the_driver() {
        let err = Error::unsupported("json", "set_entity");
        assert_eq!(err.kind(), ErrorKind::UnsupportedOp);
        assert!(err.to_string().contains("json"));
        assert!(err.to_string().contains("set_entity"));
    }
}
