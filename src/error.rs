//! The single error type every library function in this crate returns.
//!
//! Each variant carries the context needed to render a one-line diagnostic
//! naming the offending recipe, file, or path, per the error kinds in the
//! error handling design. `main` is the only place that downgrades a
//! `Result` to a process exit code.

use std::path::PathBuf;
use thiserror::Error;

use crate::recipe::Namespace;

#[derive(Error, Debug)]
pub enum ChariotError {
    #[error("{file}:{line}: parse error: {message}")]
    Parse {
        file: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{referrer}: unresolved dependency {namespace}/{name}")]
    Resolve {
        referrer: String,
        namespace: Namespace,
        name: String,
    },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{namespace}/{name}: container command failed with status {status:?}: {command}")]
    ContainerExec {
        namespace: Namespace,
        name: String,
        command: String,
        status: Option<i32>,
    },

    #[error("{namespace}/{name}: checksum verification failed for {url}")]
    Verification {
        namespace: Namespace,
        name: String,
        url: String,
    },

    #[error("unknown variable @({name}) in: {text}")]
    EmbedUnknownVariable { name: String, text: String },

    #[error("{namespace}/{name}: missing required field `{field}`")]
    MissingRequiredField {
        namespace: Namespace,
        name: String,
        field: &'static str,
    },

    #[error("{namespace}/{name}: field `{a}` and `{b}` are mutually exclusive")]
    ForbiddenFieldCombination {
        namespace: Namespace,
        name: String,
        a: &'static str,
        b: &'static str,
    },

    #[error("{namespace}/{name}: patch file not found: {path}")]
    MissingPatchFile {
        namespace: Namespace,
        name: String,
        path: PathBuf,
    },

    #[error("cache root {path} is already locked by another chariot invocation")]
    LockContention { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, ChariotError>;

impl ChariotError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ChariotError::Io {
            path: path.into(),
            source,
        }
    }
}
