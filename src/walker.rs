//! Batch enumeration and execution.
//!
//! A batch is every file named by one input: the file itself, the direct
//! file children of a directory, or every file below a directory when
//! recursing. Symlinks to files count as files; symlinks to directories are
//! not followed. Files are processed in enumeration order and the batch
//! halts at the first failing file.

use crate::error::{ErrorCategory, ErrorKind, Result, SymcryptError};
use crate::request::{BatchReport, FileTask, InputKind, OutcomeRecord, ProcessingRequest};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Lists the files a request covers, in filesystem order.
///
/// Enumeration completes before any file is processed, so outputs written
/// into the input tree are never picked up by the same batch.
pub fn enumerate(request: &ProcessingRequest) -> Result<Vec<FileTask<'_>>> {
    let input = request.input();
    if request.input_kind() == InputKind::File {
        return Ok(vec![FileTask {
            request,
            source: input.to_path_buf(),
            relative_dir: PathBuf::new(),
            nested: false,
        }]);
    }

    let mut walk = WalkDir::new(input).min_depth(1);
    if !request.recursive() {
        walk = walk.max_depth(1);
    }

    let mut tasks = Vec::new();
    for entry in walk {
        let entry = entry.map_err(|e| walk_error(input, e))?;
        if entry.file_type().is_dir() {
            continue;
        }
        if !is_file_entry(&entry) {
            debug!(path = %entry.path().display(), "skipping entry that is not a file");
            continue;
        }
        let relative_dir = entry
            .path()
            .parent()
            .and_then(|p| p.strip_prefix(input).ok())
            .map(Path::to_path_buf)
            .unwrap_or_default();
        tasks.push(FileTask {
            request,
            source: entry.path().to_path_buf(),
            nested: entry.depth() > 1,
            relative_dir,
        });
    }
    debug!(
        input = %input.display(),
        count = tasks.len(),
        recursive = request.recursive(),
        "enumerated batch"
    );
    Ok(tasks)
}

/// Runs `op` over `tasks` in order, halting after the first failure.
///
/// `op` returns the written output path, or `None` when the result was
/// streamed rather than persisted.
pub fn run<'r, I, F>(tasks: I, mut op: F) -> BatchReport
where
    I: IntoIterator<Item = FileTask<'r>>,
    F: FnMut(&FileTask<'r>) -> Result<Option<PathBuf>>,
{
    let mut report = BatchReport::default();
    for task in tasks {
        let outcome = op(&task);
        let source = task.source;
        let record = match outcome {
            Ok(Some(output)) => OutcomeRecord::Written { source, output },
            Ok(None) => OutcomeRecord::Streamed { source },
            Err(error) => {
                warn!(file = %source.display(), error = %error, "halting batch");
                OutcomeRecord::Failed { source, error }
            }
        };
        let halt = record.is_failure();
        report.records.push(record);
        if halt {
            break;
        }
    }
    report
}

/// Regular files, and symlinks that resolve to one.
fn is_file_entry(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())
}

fn walk_error(input: &Path, e: walkdir::Error) -> SymcryptError {
    let path = e.path().unwrap_or(input).to_path_buf();
    SymcryptError::with_kind_and_source(
        ErrorCategory::Internal,
        ErrorKind::Walk,
        format!("failed to traverse {}", path.display()),
        e,
    )
    .with_path(path)
}
