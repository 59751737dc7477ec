//! Output filename policy for both directions.
//!
//! Encrypt: random name, else explicit name, else `<basename>.gpg`.
//!
//! Decrypt: explicit name, else the filename embedded in the ciphertext,
//! else the source basename with `.gpg`/`.enc` suffixes stripped. Only the
//! last case is renamed to `<stem>-decrypted.<ext>` when it would collide
//! with an existing entry in the output directory.

use crate::error::{ErrorCategory, ErrorKind, Result, SymcryptError};
use rand::Rng;
use rand::distr::Alphanumeric;
use std::path::Path;
use tracing::debug;

/// Suffix appended to encrypted outputs.
pub const ENCRYPTED_SUFFIX: &str = ".gpg";

/// Suffixes recognized as "this file is ciphertext".
pub const CIPHER_SUFFIXES: [&str; 2] = [".enc", ".gpg"];

/// Marker inserted into a decrypted name that would collide.
pub const DECRYPTED_MARKER: &str = "-decrypted";

/// Length of generated random names.
pub const RANDOM_NAME_LEN: usize = 8;

/// Chooses the output filename for encrypting `source` into `out_dir`.
///
/// Fails with `InvalidName` when `source` has no filename or one that is
/// not valid UTF-8, whichever naming mode is in effect.
pub fn name_for_encrypt<R: Rng>(
    source: &Path,
    explicit: Option<&str>,
    randomize: bool,
    out_dir: &Path,
    rng: &mut R,
) -> Result<String> {
    let base = basename(source)?;
    if randomize {
        let name = random_name(out_dir, rng);
        debug!(source = %source.display(), name = %name, "chose random output name");
        return Ok(name);
    }
    if let Some(name) = explicit {
        return Ok(name.to_string());
    }
    Ok(format!("{}{}", base, ENCRYPTED_SUFFIX))
}

/// An alphanumeric name of [`RANDOM_NAME_LEN`] characters that names no
/// entry of `out_dir` at the time of the call.
pub fn random_name<R: Rng>(out_dir: &Path, rng: &mut R) -> String {
    loop {
        let name: String = (0..RANDOM_NAME_LEN)
            .map(|_| char::from(rng.sample(Alphanumeric)))
            .collect();
        if !entry_exists(out_dir, &name) {
            return name;
        }
        debug!(name = %name, "random name collides, re-rolling");
    }
}

/// Chooses the output filename for decrypting `source` into `out_dir`.
///
/// `embedded` is only consulted when no explicit name is given. It
/// returns the raw filename stored in the ciphertext, if any.
pub fn name_for_decrypt<F>(
    source: &Path,
    explicit: Option<&str>,
    embedded: F,
    out_dir: &Path,
) -> Result<String>
where
    F: FnOnce(&Path) -> Option<String>,
{
    if let Some(name) = explicit {
        return Ok(name.to_string());
    }

    if let Some(raw) = embedded(source) {
        if let Some(name) = flatten_embedded_name(&raw) {
            debug!(source = %source.display(), name = %name, "using embedded filename");
            return Ok(name);
        }
    }

    let name = strip_cipher_suffixes(basename(source)?).to_string();
    if entry_exists(out_dir, &name) {
        let renamed = decrypted_variant(&name);
        debug!(name = %name, renamed = %renamed, "decrypted name collides");
        return Ok(renamed);
    }
    Ok(name)
}

/// Reduces an embedded filename to a bare name.
///
/// Both `/` and `\` count as separators regardless of platform; only the
/// final segment is kept. Returns `None` when nothing usable remains.
pub fn flatten_embedded_name(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    match last {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

/// Strips trailing `.gpg`/`.enc` suffixes until none remain. A name that
/// consists only of such a suffix is left as is.
pub fn strip_cipher_suffixes(name: &str) -> &str {
    let mut current = name;
    loop {
        let stripped = CIPHER_SUFFIXES
            .iter()
            .find_map(|suffix| current.strip_suffix(suffix));
        match stripped {
            Some(rest) if !rest.is_empty() => current = rest,
            _ => return current,
        }
    }
}

/// `archive.tar` becomes `archive-decrypted.tar`; `README` becomes
/// `README-decrypted`. A leading dot does not start an extension.
pub fn decrypted_variant(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx > 0 => format!("{}{}{}", &name[..idx], DECRYPTED_MARKER, &name[idx..]),
        _ => format!("{}{}", name, DECRYPTED_MARKER),
    }
}

/// The final component of `source`.
///
/// Names that are not valid UTF-8 are rejected, since a lossy conversion
/// would map distinct files onto the same output name.
fn basename(source: &Path) -> Result<&str> {
    match source.file_name().map(|n| n.to_str()) {
        Some(Some(name)) => Ok(name),
        Some(None) => Err(invalid_name(source, "has a non-UTF-8 filename")),
        None => Err(invalid_name(source, "has no filename")),
    }
}

fn invalid_name(source: &Path, problem: &str) -> SymcryptError {
    SymcryptError::with_kind(
        ErrorCategory::User,
        ErrorKind::InvalidName,
        format!("{} {}", source.display(), problem),
    )
    .with_path(source)
}

/// Whether `name` exists in `dir` as any kind of entry, including a
/// dangling symlink.
fn entry_exists(dir: &Path, name: &str) -> bool {
    dir.join(name).symlink_metadata().is_ok()
}
