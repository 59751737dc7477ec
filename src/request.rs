//! Per-invocation request, per-file tasks, and per-file outcomes.

use crate::error::{ErrorCategory, ErrorKind, Result, SymcryptError};
use crate::kdf::DerivedKey;
use std::fs;
use std::io;
use std::path::{Path, PathBuf, is_separator};

/// What the input path turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    File,
    Directory,
}

/// Everything one encrypt or decrypt invocation needs. Immutable once built.
#[derive(Debug)]
pub struct ProcessingRequest {
    input: PathBuf,
    input_kind: InputKind,
    output_dir: PathBuf,
    output_name: Option<String>,
    randomize: bool,
    keep_decrypted: bool,
    recursive: bool,
    key: DerivedKey,
}

impl ProcessingRequest {
    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn input_kind(&self) -> InputKind {
        self.input_kind
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Explicit output filename, only ever set for single-file input.
    pub fn output_name(&self) -> Option<&str> {
        self.output_name.as_deref()
    }

    pub fn randomize(&self) -> bool {
        self.randomize
    }

    pub fn keep_decrypted(&self) -> bool {
        self.keep_decrypted
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    pub fn key(&self) -> &DerivedKey {
        &self.key
    }
}

/// Collects command options and validates them into a [`ProcessingRequest`].
///
/// [`RequestBuilder::check`] performs every configuration check that does
/// not need key material, so callers can fail before prompting for a
/// password.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    randomize: bool,
    keep_decrypted: bool,
    recursive: bool,
}

impl RequestBuilder {
    pub fn new(input: Option<PathBuf>) -> Self {
        Self {
            input,
            output: None,
            randomize: false,
            keep_decrypted: true,
            recursive: false,
        }
    }

    pub fn output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    pub fn randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }

    pub fn keep_decrypted(mut self, keep: bool) -> Self {
        self.keep_decrypted = keep;
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Validates input and output without building.
    pub fn check(&self) -> Result<()> {
        let (_, kind) = self.classified_input()?;
        split_output(kind, self.output.as_deref())?;
        Ok(())
    }

    pub fn build(self, key: DerivedKey) -> Result<ProcessingRequest> {
        let (input, input_kind) = self.classified_input()?;
        let (output_dir, output_name) = split_output(input_kind, self.output.as_deref())?;
        Ok(ProcessingRequest {
            input: input.to_path_buf(),
            input_kind,
            output_dir,
            output_name,
            randomize: self.randomize,
            keep_decrypted: self.keep_decrypted,
            recursive: self.recursive,
            key,
        })
    }

    fn classified_input(&self) -> Result<(&Path, InputKind)> {
        let input = self.input.as_deref().ok_or_else(|| {
            SymcryptError::with_kind(
                ErrorCategory::User,
                ErrorKind::InputMissing,
                "no input given",
            )
        })?;
        let kind = classify_input(input)?;
        Ok((input, kind))
    }
}

/// Determines whether `input` is a regular file or a directory.
pub fn classify_input(input: &Path) -> Result<InputKind> {
    let meta = fs::metadata(input).map_err(|e| {
        let kind = if e.kind() == io::ErrorKind::NotFound {
            ErrorKind::InputMissing
        } else {
            ErrorKind::Io
        };
        SymcryptError::with_kind_and_source(
            ErrorCategory::User,
            kind,
            format!("cannot access input {}", input.display()),
            e,
        )
        .with_path(input)
    })?;

    if meta.is_file() {
        Ok(InputKind::File)
    } else if meta.is_dir() {
        Ok(InputKind::Directory)
    } else {
        Err(SymcryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::InputInvalid,
            format!("input {} is not a file or directory", input.display()),
        )
        .with_path(input))
    }
}

/// Whether a path is written in directory form, i.e. ends with a separator.
pub fn has_trailing_separator(path: &Path) -> bool {
    path.as_os_str()
        .to_string_lossy()
        .chars()
        .last()
        .is_some_and(is_separator)
}

/// Splits the `-o` argument into an output directory and an optional
/// explicit filename.
fn split_output(kind: InputKind, output: Option<&Path>) -> Result<(PathBuf, Option<String>)> {
    let Some(output) = output else {
        return Ok((PathBuf::from("."), None));
    };

    if has_trailing_separator(output) || output.is_dir() {
        return Ok((output.to_path_buf(), None));
    }

    match kind {
        InputKind::Directory => {
            if output.exists() {
                return Err(SymcryptError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::OutputConflict,
                    format!(
                        "cannot write a directory input to the file {}",
                        output.display()
                    ),
                )
                .with_path(output));
            }
            Ok((output.to_path_buf(), None))
        }
        InputKind::File => {
            let name = output
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    SymcryptError::with_kind(
                        ErrorCategory::User,
                        ErrorKind::InvalidName,
                        format!("output {} has no usable filename", output.display()),
                    )
                    .with_path(output)
                })?;
            let dir = match output.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            Ok((dir, Some(name.to_string())))
        }
    }
}

/// One file to process, produced by enumeration.
#[derive(Debug, Clone)]
pub struct FileTask<'r> {
    pub request: &'r ProcessingRequest,
    pub source: PathBuf,
    /// Subdirectory of the input the file was found in; empty at top level.
    pub relative_dir: PathBuf,
    /// Whether the file was found below the top level of the input directory.
    pub nested: bool,
}

impl FileTask<'_> {
    /// Directory this task's output goes to.
    pub fn output_dir(&self) -> PathBuf {
        if self.relative_dir.as_os_str().is_empty() {
            self.request.output_dir.clone()
        } else {
            self.request.output_dir.join(&self.relative_dir)
        }
    }
}

/// Result of processing one [`FileTask`].
#[derive(Debug)]
pub enum OutcomeRecord {
    /// Output was written to a file.
    Written { source: PathBuf, output: PathBuf },
    /// Plaintext went to the output stream; nothing was persisted.
    Streamed { source: PathBuf },
    /// Processing failed; the batch halted here.
    Failed {
        source: PathBuf,
        error: SymcryptError,
    },
}

impl OutcomeRecord {
    pub fn source(&self) -> &Path {
        match self {
            OutcomeRecord::Written { source, .. }
            | OutcomeRecord::Streamed { source }
            | OutcomeRecord::Failed { source, .. } => source,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, OutcomeRecord::Failed { .. })
    }
}

/// Ordered outcomes of a batch, up to and including the first failure.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub records: Vec<OutcomeRecord>,
}

impl BatchReport {
    /// True when every enumerated file was processed successfully.
    pub fn is_complete(&self) -> bool {
        !self.records.iter().any(OutcomeRecord::is_failure)
    }

    /// The failing file and its error, if the batch halted.
    pub fn failure(&self) -> Option<(&Path, &SymcryptError)> {
        self.records.iter().find_map(|r| match r {
            OutcomeRecord::Failed { source, error } => Some((source.as_path(), error)),
            _ => None,
        })
    }

    /// Output paths of all files written.
    pub fn outputs(&self) -> impl Iterator<Item = &Path> {
        self.records.iter().filter_map(|r| match r {
            OutcomeRecord::Written { output, .. } => Some(output.as_path()),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
