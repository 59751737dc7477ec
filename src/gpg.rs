//! [`CipherGateway`] backed by the `gpg` executable.
//!
//! Every invocation runs non-interactively: the derived key is written to
//! gpg's stdin (`--passphrase-fd 0`) with loopback pinentry, and the
//! agent's symmetric key cache is bypassed so a wrong key can never be
//! rescued by a cached one.

use crate::cipher::{CipherGateway, decode_name_token, encode_bounded_name_token};
use crate::config::Config;
use crate::error::{ErrorCategory, ErrorKind, Result, SymcryptError};
use crate::kdf::DerivedKey;
use std::ffi::OsStr;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use tracing::{debug, error, info};

pub struct GpgCipher {
    config: Config,
}

impl GpgCipher {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Whether the configured executable can be run at all.
    pub fn is_available(&self) -> bool {
        Command::new(&self.config.gpg_program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.config.gpg_program);
        if let Some(home) = &self.config.home_dir {
            cmd.arg("--homedir").arg(home);
        }
        cmd.args([
            "--batch",
            "--yes",
            "--quiet",
            "--no-tty",
            "--pinentry-mode",
            "loopback",
            "--passphrase-fd",
            "0",
            "--no-symkey-cache",
        ]);
        cmd.args(args);
        cmd
    }

    /// Spawns `cmd` with piped stdio and feeds it the key.
    fn spawn_with_key(&self, mut cmd: Command, key: &DerivedKey) -> io::Result<Child> {
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            // gpg reads a single line from the passphrase fd.
            let fed = stdin
                .write_all(key.expose().as_bytes())
                .and_then(|()| stdin.write_all(b"\n"));
            // gpg may exit before reading; its exit status reports why.
            if let Err(e) = fed {
                if e.kind() != io::ErrorKind::BrokenPipe {
                    return Err(e);
                }
            }
        }
        Ok(child)
    }

    fn run_with_key(&self, cmd: Command, key: &DerivedKey) -> io::Result<Output> {
        self.spawn_with_key(cmd, key)?.wait_with_output()
    }
}

impl CipherGateway for GpgCipher {
    fn encrypt_file(
        &self,
        source: &Path,
        key: &DerivedKey,
        dest: &Path,
        embedded_name: &str,
    ) -> Result<()> {
        debug!(file = %source.display(), output = %dest.display(), "invoking gpg --symmetric");
        let token = encode_bounded_name_token(embedded_name);
        let mut cmd = self.command([
            "--symmetric",
            "--cipher-algo",
            self.config.cipher_algo.as_str(),
            "--set-filename",
            token.as_str(),
            "--output",
        ]);
        cmd.arg(dest).arg(source);

        let output = self
            .run_with_key(cmd, key)
            .map_err(|e| spawn_error(ErrorKind::EncryptFailed, &self.config, e))?;
        check_status(&output, ErrorKind::EncryptFailed, "encryption", source)?;
        info!(file = %source.display(), output = %dest.display(), "file encrypted");
        Ok(())
    }

    fn extract_embedded_name(&self, source: &Path, key: &DerivedKey) -> Option<String> {
        let mut cmd = self.command(["--list-packets"]);
        cmd.arg(source);

        let output = match self.run_with_key(cmd, key) {
            Ok(output) => output,
            Err(e) => {
                debug!(file = %source.display(), error = %e, "gpg --list-packets failed to run");
                return None;
            }
        };
        let listing = String::from_utf8_lossy(&output.stdout);
        let name = parse_literal_name(&listing).map(|t| decode_name_token(&t));
        debug!(file = %source.display(), name = ?name, "embedded filename lookup");
        name
    }

    fn decrypt_file(&self, source: &Path, key: &DerivedKey, dest: &Path) -> Result<()> {
        debug!(file = %source.display(), output = %dest.display(), "invoking gpg --decrypt");
        let mut cmd = self.command(["--output"]);
        cmd.arg(dest).arg("--decrypt").arg(source);

        let output = self
            .run_with_key(cmd, key)
            .map_err(|e| spawn_error(ErrorKind::DecryptFailed, &self.config, e))?;
        check_status(&output, ErrorKind::DecryptFailed, "decryption", source)?;
        info!(file = %source.display(), output = %dest.display(), "file decrypted");
        Ok(())
    }

    fn decrypt_to_writer(
        &self,
        source: &Path,
        key: &DerivedKey,
        out: &mut dyn Write,
    ) -> Result<u64> {
        debug!(file = %source.display(), "invoking gpg --decrypt to stream");
        let mut cmd = self.command(["--decrypt"]);
        cmd.arg(source);

        let mut child = self
            .spawn_with_key(cmd, key)
            .map_err(|e| spawn_error(ErrorKind::DecryptFailed, &self.config, e))?;

        let copied = match child.stdout.take() {
            Some(mut stdout) => io::copy(&mut stdout, out),
            None => Ok(0),
        };
        let mut stderr = Vec::new();
        if let Some(mut pipe) = child.stderr.take() {
            // Best effort; only used to enrich the error message.
            let _ = pipe.read_to_end(&mut stderr);
        }
        let status = child
            .wait()
            .map_err(|e| spawn_error(ErrorKind::DecryptFailed, &self.config, e))?;

        let bytes = copied.map_err(|e| {
            SymcryptError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write plaintext of {}", source.display()),
                e,
            )
            .with_path(source)
        })?;
        check_status(
            &Output {
                status,
                stdout: Vec::new(),
                stderr,
            },
            ErrorKind::DecryptFailed,
            "decryption",
            source,
        )?;
        info!(file = %source.display(), bytes, "file decrypted to stream");
        out.flush().map_err(|e| {
            SymcryptError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to flush plaintext output",
                e,
            )
        })?;
        Ok(bytes)
    }
}

fn spawn_error(kind: ErrorKind, config: &Config, e: io::Error) -> SymcryptError {
    SymcryptError::with_kind_and_source(
        ErrorCategory::Internal,
        kind,
        format!("failed to run {}: {}", config.gpg_program.display(), e),
        e,
    )
}

fn check_status(output: &Output, kind: ErrorKind, what: &str, source: &Path) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = stderr.trim();
    error!(
        file = %source.display(),
        status = ?output.status.code(),
        stderr = %detail,
        "gpg {} failed",
        what
    );
    let file = source.display();
    let msg = if detail.is_empty() {
        format!("{} of {} failed ({})", what, file, output.status)
    } else {
        format!("{} of {} failed: {}", what, file, detail)
    };
    let err = SymcryptError::with_kind(ErrorCategory::User, kind, msg);
    Err(err.with_path(source))
}

/// Finds `name="..."` in the first literal data packet of a
/// `--list-packets` listing and undoes gpg's escaping.
fn parse_literal_name(listing: &str) -> Option<String> {
    let mut in_literal = false;
    for line in listing.lines() {
        if line.starts_with(":literal data packet:") {
            in_literal = true;
            continue;
        }
        if !in_literal {
            continue;
        }
        if line.starts_with(':') || line.starts_with('#') {
            return None;
        }
        let start = line.find("name=\"")? + "name=\"".len();
        let raw = unescape_listing(&line[start..])?;
        return (!raw.is_empty()).then_some(raw);
    }
    None
}

/// Reads up to the closing quote, resolving `\xHH` and `\\`-style escapes.
fn unescape_listing(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => return Some(String::from_utf8_lossy(&out).into_owned()),
            b'\\' if i + 1 < bytes.len() => {
                match bytes[i + 1] {
                    b'x' if i + 3 < bytes.len() => {
                        let hex = std::str::from_utf8(&bytes[i + 2..i + 4]).ok()?;
                        out.push(u8::from_str_radix(hex, 16).ok()?);
                        i += 4;
                        continue;
                    }
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'0' => out.push(0),
                    other => out.push(other),
                }
                i += 2;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    None
}
