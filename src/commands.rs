//! Encrypt and decrypt entry points.
//!
//! Each command makes sure the output directory can exist, enumerates the
//! batch, and runs the per-file pipeline: choose a name, reserve the output
//! location, invoke the cipher.

use crate::cipher::CipherGateway;
use crate::error::{Result, SymcryptError};
use crate::naming;
use crate::request::{BatchReport, FileTask, ProcessingRequest};
use crate::resolve::{self, ResolvedOutputPath};
use crate::walker;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Encrypts every file covered by `request`.
///
/// `Err` means nothing was processed; per-file failures are in the report.
pub fn encrypt_command(
    request: &ProcessingRequest,
    cipher: &dyn CipherGateway,
) -> Result<BatchReport> {
    prepare_output_dir(request)?;
    let tasks = walker::enumerate(request)?;
    info!(input = %request.input().display(), files = tasks.len(), "encrypting");

    let mut rng = rand::rng();
    let report = walker::run(tasks, |task| {
        let dest = encrypt_one(task, cipher, &mut rng)?;
        Ok(Some(dest))
    });
    Ok(report)
}

/// Decrypts every file covered by `request`.
///
/// When the request does not keep decrypted output, plaintext is written
/// to `stream` and nothing is persisted.
pub fn decrypt_command(
    request: &ProcessingRequest,
    cipher: &dyn CipherGateway,
    stream: &mut dyn Write,
) -> Result<BatchReport> {
    if request.keep_decrypted() {
        prepare_output_dir(request)?;
    }
    let tasks = walker::enumerate(request)?;
    info!(
        input = %request.input().display(),
        files = tasks.len(),
        keep = request.keep_decrypted(),
        "decrypting"
    );

    let report = walker::run(tasks, |task| {
        if request.keep_decrypted() {
            decrypt_one(task, cipher).map(Some)
        } else {
            cipher
                .decrypt_to_writer(&task.source, request.key(), &mut *stream)
                .map(|_| None)
        }
    });
    Ok(report)
}

fn prepare_output_dir(request: &ProcessingRequest) -> Result<()> {
    resolve::ensure_writable(&resolve::as_dir_path(request.output_dir()))?;
    Ok(())
}

fn encrypt_one<R: rand::Rng>(
    task: &FileTask<'_>,
    cipher: &dyn CipherGateway,
    rng: &mut R,
) -> Result<PathBuf> {
    let request = task.request;
    let out_dir = task.output_dir();
    let name = naming::name_for_encrypt(
        &task.source,
        request.output_name(),
        request.randomize(),
        &out_dir,
        rng,
    )?;
    let resolved = ResolvedOutputPath::new(out_dir, name)?;
    let dest = resolve::ensure_writable(&resolved.path())?;

    let embedded = task.source.to_string_lossy();
    cipher
        .encrypt_file(&task.source, request.key(), &dest, &embedded)
        .map_err(|e| tag_file(e, &task.source))?;
    Ok(dest)
}

fn decrypt_one(task: &FileTask<'_>, cipher: &dyn CipherGateway) -> Result<PathBuf> {
    let request = task.request;
    let out_dir = task.output_dir();
    let name = naming::name_for_decrypt(
        &task.source,
        request.output_name(),
        |source| cipher.extract_embedded_name(source, request.key()),
        &out_dir,
    )?;
    let resolved = ResolvedOutputPath::new(out_dir, name)?;
    let dest = resolve::ensure_writable(&resolved.path())?;

    cipher
        .decrypt_file(&task.source, request.key(), &dest)
        .map_err(|e| tag_file(e, &task.source))?;
    Ok(dest)
}

/// Makes sure a cipher failure names the source file.
fn tag_file(e: SymcryptError, source: &Path) -> SymcryptError {
    if e.path.is_some() {
        e
    } else {
        e.with_path(source)
    }
}
