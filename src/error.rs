use std::error::Error as StdError;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// Use of Internal is never a guarantee the error is not, for example,
    /// due to a user error - merely that it cannot be confidently
    /// determined by the code.
    Internal,

    /// The user provided invalid input or requested an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The input path does not exist (or was not given at all).
    InputMissing,
    /// The input path exists but is neither a regular file nor a directory.
    InputInvalid,
    /// A directory input was paired with an output that names a file.
    OutputConflict,
    /// The two password entries differ.
    PasswordMismatch,
    /// An output directory could not be created.
    DirectoryCreate,
    /// An output file could not be created or opened for writing.
    FileWrite,
    /// The cipher service failed to encrypt a file.
    EncryptFailed,
    /// The cipher service failed to decrypt a file.
    DecryptFailed,
    /// Password could not be obtained from the configured reader.
    PassphraseUnavailable,
    /// Deriving key material from the password failed.
    KeyDerivation,
    /// A computed output filename is not a single path segment.
    InvalidName,
    /// Cipher backend configuration is unusable.
    Config,
    /// Enumerating a directory tree failed.
    Walk,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

impl ErrorKind {
    /// Process exit status reported by the command line tool for this kind.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::InputMissing => 2,
            ErrorKind::InputInvalid => 3,
            ErrorKind::OutputConflict => 4,
            ErrorKind::PasswordMismatch => 5,
            _ => 1,
        }
    }
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct SymcryptError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    /// The file or directory the failure is about, when there is one.
    pub path: Option<PathBuf>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl SymcryptError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            path: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            path: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that retains the originating source error.
    pub fn with_source(
        category: ErrorCategory,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: None,
            path: None,
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            path: None,
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Attaches the offending path.
    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Whether this error is tagged with `kind`.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == Some(kind)
    }

    /// Process exit status for this error; untagged errors map to 1.
    pub fn exit_code(&self) -> i32 {
        self.kind.map_or(1, ErrorKind::exit_code)
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        let path = self.path.clone();
        Self {
            category,
            kind,
            path,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SymcryptError>;
