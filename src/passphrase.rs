//! Password reading functionality

use crate::error::{ErrorCategory, ErrorKind, Result, SymcryptError};
use std::io::{BufRead, BufReader, Read};
use zeroize::Zeroizing;

/// Prompt shown for the first password entry.
pub const PROMPT: &str = "Password: ";

/// Prompt shown for the confirmation entry.
pub const CONFIRM_PROMPT: &str = "Confirm password: ";

/// Trait for reading passwords from various sources
pub trait PassphraseReader {
    /// Read one password entry.
    ///
    /// Returns the password wrapped in `Zeroizing` so it is wiped from
    /// memory when dropped. `prompt` is advisory; non-interactive readers
    /// ignore it.
    fn read_passphrase(&mut self, prompt: &str) -> Result<Zeroizing<Vec<u8>>>;
}

/// Returns a fixed password (for testing)
pub struct ConstantPassphraseReader {
    passphrase: Zeroizing<Vec<u8>>,
}

impl ConstantPassphraseReader {
    pub fn new(passphrase: Vec<u8>) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase),
        }
    }
}

impl PassphraseReader for ConstantPassphraseReader {
    fn read_passphrase(&mut self, _prompt: &str) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new((*self.passphrase).clone()))
    }
}

/// Reads one password per line from any io::Read source.
///
/// A trailing `\n` (and a `\r` before it) is stripped. End of input
/// before any byte is read is an error, so a confirmation read against
/// an exhausted source fails rather than comparing against "".
pub struct ReaderPassphraseReader {
    reader: BufReader<Box<dyn Read>>,
}

impl ReaderPassphraseReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }
}

impl PassphraseReader for ReaderPassphraseReader {
    fn read_passphrase(&mut self, _prompt: &str) -> Result<Zeroizing<Vec<u8>>> {
        let mut line = Zeroizing::new(Vec::new());
        let n = self.reader.read_until(b'\n', &mut line).map_err(|e| {
            SymcryptError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("error reading password: {}", e),
                e,
            )
        })?;
        if n == 0 {
            return Err(SymcryptError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "no password available on input",
            ));
        }
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Ok(line)
    }
}

/// Reads passwords from the controlling terminal with no echo.
///
/// The terminal is opened directly, so redirected stdin is never consulted.
pub struct TerminalPassphraseReader;

impl TerminalPassphraseReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalPassphraseReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PassphraseReader for TerminalPassphraseReader {
    /// Note: terminal input is limited to UTF-8 due to rpassword library constraints.
    fn read_passphrase(&mut self, prompt: &str) -> Result<Zeroizing<Vec<u8>>> {
        let passphrase = rpassword::prompt_password(prompt).map_err(|e| {
            SymcryptError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                format!("failure reading password from terminal: {}", e),
                e,
            )
        })?;
        Ok(Zeroizing::new(passphrase.into_bytes()))
    }
}

/// Reads the password twice and requires both entries to match exactly.
pub fn read_confirmed(reader: &mut dyn PassphraseReader) -> Result<Zeroizing<Vec<u8>>> {
    let first = reader.read_passphrase(PROMPT)?;
    if first.is_empty() {
        return Err(SymcryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::PassphraseUnavailable,
            "password must not be empty",
        ));
    }
    let second = reader.read_passphrase(CONFIRM_PROMPT)?;
    if *first != *second {
        return Err(SymcryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::PasswordMismatch,
            "passwords do not match",
        ));
    }
    Ok(first)
}
