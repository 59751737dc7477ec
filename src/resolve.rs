//! Output location resolution
//!
//! Before any ciphertext or plaintext is written, the output location is
//! made to exist: missing directories are created and an empty placeholder
//! file reserves the target name. When the placeholder cannot be created,
//! directories created by the same call are removed again.

use crate::error::{ErrorCategory, ErrorKind, Result, SymcryptError};
use crate::request::has_trailing_separator;
use std::fs::{self, OpenOptions};
use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use tracing::{debug, warn};

/// A directory, kept in directory form, plus a single-segment filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputPath {
    dir: PathBuf,
    name: String,
}

impl ResolvedOutputPath {
    /// Fails with `InvalidName` unless `name` is one non-empty path
    /// segment other than `.` or `..`.
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', MAIN_SEPARATOR])
        {
            return Err(SymcryptError::with_kind(
                ErrorCategory::User,
                ErrorKind::InvalidName,
                format!("{:?} is not a valid output filename", name),
            ));
        }
        let dir: PathBuf = dir.into();
        Ok(Self {
            dir: as_dir_path(&dir),
            name,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }
}

/// Returns `dir` in directory form, with a trailing separator.
pub fn as_dir_path(dir: &Path) -> PathBuf {
    if has_trailing_separator(dir) {
        dir.to_path_buf()
    } else {
        let mut s = dir.as_os_str().to_os_string();
        s.push(MAIN_SEPARATOR.to_string());
        PathBuf::from(s)
    }
}

/// Makes `path` a writable output location and returns it.
///
/// A path in directory form (trailing separator) only has its directory
/// created. Otherwise the parent directory is created as needed and an
/// empty file is created (or truncated) at `path`.
pub fn ensure_writable(path: &Path) -> Result<PathBuf> {
    if is_writable(path) {
        debug!(path = %path.display(), "output location already writable");
        return Ok(path.to_path_buf());
    }

    let (dir, has_file) = if has_trailing_separator(path) {
        (path.to_path_buf(), false)
    } else {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        (dir, path.file_name().is_some())
    };

    let created = first_missing_ancestor(&dir);
    if !dir.is_dir() {
        fs::create_dir_all(&dir).map_err(|e| {
            SymcryptError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::DirectoryCreate,
                format!("failed to create directory {}", dir.display()),
                e,
            )
            .with_path(&dir)
        })?;
        debug!(dir = %dir.display(), "created output directory");
    }

    if has_file {
        if let Err(e) = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
        {
            if let Some(top) = created {
                remove_created_dirs(&dir, &top);
            }
            return Err(SymcryptError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::FileWrite,
                format!("failed to create {}", path.display()),
                e,
            )
            .with_path(path));
        }
        debug!(path = %path.display(), "reserved output file");
    }

    Ok(path.to_path_buf())
}

/// Existing files must open for writing; existing directories must
/// accept a new file.
fn is_writable(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => tempfile::tempfile_in(path).is_ok(),
        Ok(meta) if meta.is_file() => OpenOptions::new().write(true).open(path).is_ok(),
        _ => false,
    }
}

/// The outermost ancestor of `dir` (or `dir` itself) that does not exist yet.
fn first_missing_ancestor(dir: &Path) -> Option<PathBuf> {
    let mut missing = None;
    for ancestor in dir.ancestors() {
        if ancestor.as_os_str().is_empty() || ancestor.exists() {
            break;
        }
        missing = Some(ancestor.to_path_buf());
    }
    missing
}

/// Removes `dir` and its parents up to and including `top`, innermost first.
/// Stops at the first directory that cannot be removed, e.g. because
/// something else was put in it meanwhile.
fn remove_created_dirs(dir: &Path, top: &Path) {
    for ancestor in dir.ancestors() {
        if let Err(e) = fs::remove_dir(ancestor) {
            warn!(dir = %ancestor.display(), error = %e, "failed to remove created directory");
            return;
        }
        if ancestor == top {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_existing_file_returned_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.gpg");
        fs::write(&path, b"keep me").unwrap();

        assert_eq!(ensure_writable(&path).unwrap(), path);
        assert_eq!(fs::read(&path).unwrap(), b"keep me");
    }

    #[test]
    fn test_existing_directory_returned_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(ensure_writable(temp_dir.path()).unwrap(), temp_dir.path());
    }

    #[test]
    fn test_creates_parents_and_placeholder() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a").join("b").join("out.txt");

        ensure_writable(&path).unwrap();
        assert!(temp_dir.path().join("a").join("b").is_dir());
        assert_eq!(fs::read(&path).unwrap(), b"");
    }

    #[test]
    fn test_directory_form_creates_no_file() {
        let temp_dir = TempDir::new().unwrap();
        let dir = as_dir_path(&temp_dir.path().join("x").join("y"));

        ensure_writable(&dir).unwrap();
        let created = temp_dir.path().join("x").join("y");
        assert!(created.is_dir());
        assert_eq!(fs::read_dir(&created).unwrap().count(), 0);
    }

    #[test]
    fn test_directory_create_failure() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();
        let path = blocker.join("sub").join("out.txt");

        let err = ensure_writable(&path).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::DirectoryCreate));
        assert_eq!(err.path.as_deref(), Some(blocker.join("sub").as_path()));
        assert!(!path.exists());
    }

    #[test]
    fn test_file_write_failure_removes_created_directories() {
        let temp_dir = TempDir::new().unwrap();
        let fresh = temp_dir.path().join("fresh");
        // Longer than any common filesystem's NAME_MAX.
        let path = fresh.join("nested").join("n".repeat(300));

        let err = ensure_writable(&path).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::FileWrite));
        assert!(!fresh.exists());
    }

    #[test]
    fn test_file_write_failure_keeps_existing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("n".repeat(300));

        let err = ensure_writable(&path).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::FileWrite));
        assert!(temp_dir.path().is_dir());
    }

    #[test]
    fn test_resolved_output_path_rejects_separators() {
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            let err = ResolvedOutputPath::new("/tmp", bad).unwrap_err();
            assert_eq!(err.kind, Some(ErrorKind::InvalidName), "{:?}", bad);
        }
        let ok = ResolvedOutputPath::new("/tmp", "report.txt").unwrap();
        assert_eq!(ok.path(), PathBuf::from("/tmp/report.txt"));
    }

    #[test]
    fn test_resolved_output_path_dir_has_trailing_separator() {
        let resolved = ResolvedOutputPath::new("out", "a.gpg").unwrap();
        assert!(has_trailing_separator(resolved.dir()));
        assert_eq!(resolved.name(), "a.gpg");
        assert_eq!(resolved.path(), Path::new("out").join("a.gpg"));

        let already = ResolvedOutputPath::new(as_dir_path(Path::new("out")), "a.gpg");
        assert_eq!(already.unwrap().dir(), resolved.dir());
    }

    #[test]
    fn test_as_dir_path() {
        let p = as_dir_path(Path::new("out"));
        assert!(has_trailing_separator(&p));
        assert_eq!(as_dir_path(&p), p);
    }
}
