use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the generator library.
#[derive(Error, Debug)]
pub enum Error {
    /// A package (module path) could not be located by the schema provider.
    #[error("package {0} cannot be located")]
    UnresolvedPackage(String),

    /// A named type is not declared in its package.
    #[error("type {0} cannot be resolved")]
    UnresolvedType(String),

    /// Conversions are generated for structs with named fields only.
    #[error("type {0} is not a record type")]
    NotARecord(String),

    /// A field type the matcher has no classification for.
    #[error("type {0} is not supported for conversion")]
    Unsupported(String),

    /// Enumerations are remapped by constant name, both sides must declare the same set.
    #[error("enum constant {from}::{constant} has no counterpart in {to}")]
    EnumMismatch {
        from: String,
        to: String,
        constant: String,
    },

    /// An enum paired with a non-enum type and no conversion function.
    #[error("enum {enum_name} has no structurally compatible counterpart in {other}")]
    EnumCounterpart { enum_name: String, other: String },

    #[error("match descriptor {0} has no reflected counterpart")]
    Unreflectable(String),

    #[error("invalid type locator {0:?}, <package-location>:<TypeName> required")]
    InvalidLocator(String),

    #[error("{reason}: {locator}")]
    LocatorRejected { locator: String, reason: String },

    #[error("parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: syn::Error,
    },

    #[error("manifest {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Wraps an inner error with the operation it happened in ("field X", "branch Y of oneof Z").
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

/// A specialized `Result` type for generator operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    /// Innermost error, skipping every context layer.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Attaches operation context to library results.
pub trait ResultExt<T> {
    fn context_with(self, context: impl FnOnce() -> String) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context_with(self, context: impl FnOnce() -> String) -> Result<T> {
        self.map_err(|source| Error::Context {
            context: context(),
            source: Box::new(source),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_layers_render_outermost_first() {
        let res: Result<()> = Err(Error::Unsupported("(i32, i32)".into()));
        let err = res
            .context_with(|| "field pair".into())
            .context_with(|| "branch Pair of oneof shape".into())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "branch Pair of oneof shape: field pair: type (i32, i32) is not supported for conversion"
        );
        assert!(matches!(err.root(), Error::Unsupported(_)));
    }
}
