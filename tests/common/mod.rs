//! Test support: an in-process cipher with the same contract as gpg.

#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use symcrypt::cipher::{CipherGateway, decode_name_token, encode_name_token};
use symcrypt::kdf::DerivedKey;
use symcrypt::{ErrorCategory, ErrorKind, Result, SymcryptError};

const MAGIC: &[u8] = b"FAKEPGP1\n";

/// Header lines: magic, key, name token. Body: plaintext xor 0x5a.
#[derive(Default)]
pub struct FakeCipher {
    /// 1-based attempt number at which `encrypt_file`/`decrypt_file` fail.
    pub fail_at: Option<usize>,
    pub attempts: RefCell<Vec<PathBuf>>,
}

impl FakeCipher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(n: usize) -> Self {
        Self {
            fail_at: Some(n),
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> Vec<PathBuf> {
        self.attempts.borrow().clone()
    }

    fn attempt(&self, source: &Path, kind: ErrorKind) -> Result<()> {
        let mut attempts = self.attempts.borrow_mut();
        attempts.push(source.to_path_buf());
        if self.fail_at == Some(attempts.len()) {
            return Err(SymcryptError::with_kind(
                ErrorCategory::User,
                kind,
                format!("simulated failure on {}", source.display()),
            ));
        }
        Ok(())
    }

    fn open(&self, source: &Path, key: &DerivedKey) -> Result<Vec<u8>> {
        let data = fs::read(source).map_err(|e| io_err(ErrorKind::DecryptFailed, "read", e))?;
        let (stored_key, _, body) = parse(&data).ok_or_else(|| rejected("not fake ciphertext"))?;
        if stored_key != key.expose() {
            return Err(rejected("bad key"));
        }
        Ok(body.iter().map(|b| b ^ 0x5a).collect())
    }
}

/// Writes fake ciphertext directly, for fixtures with a chosen embedded name.
pub fn seal(dest: &Path, key: &DerivedKey, embedded_name: &str, plaintext: &[u8]) {
    let mut out = MAGIC.to_vec();
    out.extend_from_slice(key.expose().as_bytes());
    out.push(b'\n');
    out.extend_from_slice(encode_name_token(embedded_name).as_bytes());
    out.push(b'\n');
    out.extend(plaintext.iter().map(|b| b ^ 0x5a));
    fs::write(dest, out).unwrap();
}

fn rejected(msg: &str) -> SymcryptError {
    SymcryptError::with_kind(ErrorCategory::User, ErrorKind::DecryptFailed, msg)
}

fn io_err(kind: ErrorKind, what: &str, e: io::Error) -> SymcryptError {
    SymcryptError::with_kind_and_source(ErrorCategory::User, kind, what, e)
}

fn parse(data: &[u8]) -> Option<(String, String, &[u8])> {
    let rest = data.strip_prefix(MAGIC)?;
    let key_end = rest.iter().position(|&b| b == b'\n')?;
    let key = String::from_utf8(rest[..key_end].to_vec()).ok()?;
    let rest = &rest[key_end + 1..];
    let token_end = rest.iter().position(|&b| b == b'\n')?;
    let token = String::from_utf8(rest[..token_end].to_vec()).ok()?;
    Some((key, token, &rest[token_end + 1..]))
}

impl CipherGateway for FakeCipher {
    fn encrypt_file(
        &self,
        source: &Path,
        key: &DerivedKey,
        dest: &Path,
        embedded_name: &str,
    ) -> Result<()> {
        self.attempt(source, ErrorKind::EncryptFailed)?;
        let plaintext = fs::read(source).map_err(|e| io_err(ErrorKind::EncryptFailed, "read", e))?;
        seal(dest, key, embedded_name, &plaintext);
        Ok(())
    }

    fn extract_embedded_name(&self, source: &Path, _key: &DerivedKey) -> Option<String> {
        let data = fs::read(source).ok()?;
        let (_, token, _) = parse(&data)?;
        (!token.is_empty()).then(|| decode_name_token(&token))
    }

    fn decrypt_file(&self, source: &Path, key: &DerivedKey, dest: &Path) -> Result<()> {
        self.attempt(source, ErrorKind::DecryptFailed)?;
        let plaintext = self.open(source, key)?;
        fs::write(dest, plaintext).map_err(|e| io_err(ErrorKind::DecryptFailed, "write", e))
    }

    fn decrypt_to_writer(
        &self,
        source: &Path,
        key: &DerivedKey,
        out: &mut dyn Write,
    ) -> Result<u64> {
        self.attempt(source, ErrorKind::DecryptFailed)?;
        let plaintext = self.open(source, key)?;
        out.write_all(&plaintext)
            .map_err(|e| io_err(ErrorKind::Io, "write", e))?;
        Ok(plaintext.len() as u64)
    }
}

pub fn key(s: &str) -> DerivedKey {
    DerivedKey::from_armored(s)
}
