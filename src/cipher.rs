//! Boundary to the symmetric cipher service.
//!
//! The service encrypts one file into one ciphertext file and stores an
//! original-filename field alongside it. That field travels as an opaque
//! token; [`encode_name_token`] and [`decode_name_token`] are the only
//! places that know its escaping.

use crate::error::Result;
use crate::kdf::DerivedKey;
use std::io::Write;
use std::path::Path;

/// Upper bound of the OpenPGP literal-data filename field, in bytes.
pub const MAX_NAME_TOKEN_LEN: usize = 255;

/// Call-through to an external symmetric cipher.
///
/// Implementations overwrite `dest` when it exists and never prompt.
pub trait CipherGateway {
    /// Encrypts `source` into `dest`, embedding `embedded_name` as the
    /// ciphertext's filename metadata. Fails with `EncryptFailed`.
    fn encrypt_file(
        &self,
        source: &Path,
        key: &DerivedKey,
        dest: &Path,
        embedded_name: &str,
    ) -> Result<()>;

    /// The filename stored in `source`'s metadata, decoded. `None` when
    /// absent or unreadable. Writes no output.
    fn extract_embedded_name(&self, source: &Path, key: &DerivedKey) -> Option<String>;

    /// Decrypts `source` into `dest`. Fails with `DecryptFailed`.
    fn decrypt_file(&self, source: &Path, key: &DerivedKey, dest: &Path) -> Result<()>;

    /// Decrypts `source` into `out` without creating any file. Returns
    /// the number of plaintext bytes written. Fails with `DecryptFailed`.
    fn decrypt_to_writer(
        &self,
        source: &Path,
        key: &DerivedKey,
        out: &mut dyn Write,
    ) -> Result<u64>;
}

/// Escapes a filename so it is a single token: no path separators, no
/// whitespace, no control characters.
pub fn encode_name_token(name: &str) -> String {
    let mut token = String::with_capacity(name.len());
    for c in name.chars() {
        push_encoded(&mut token, c);
    }
    token
}

/// Like [`encode_name_token`], but never longer than
/// [`MAX_NAME_TOKEN_LEN`] bytes.
///
/// Leading path segments are dropped whole until the token fits, so the
/// final segment always survives. A final segment that is too long on its
/// own keeps its tail, which is where the extension is.
pub fn encode_bounded_name_token(name: &str) -> String {
    let mut rest = name;
    loop {
        let token = encode_name_token(rest);
        if token.len() <= MAX_NAME_TOKEN_LEN {
            return token;
        }
        match rest.find(['/', '\\']) {
            Some(idx) => rest = &rest[idx + 1..],
            None => return encode_tail(rest),
        }
    }
}

/// Reverses [`encode_name_token`]. Malformed escapes are kept literally.
pub fn decode_name_token(token: &str) -> String {
    let bytes = token.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Some(b) = hex_pair(bytes[i + 1], bytes[i + 2]) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Encodes the longest suffix of `name` whose encoding fits.
fn encode_tail(name: &str) -> String {
    let mut pieces = Vec::new();
    let mut len = 0;
    for c in name.chars().rev() {
        let mut piece = String::new();
        push_encoded(&mut piece, c);
        if len + piece.len() > MAX_NAME_TOKEN_LEN {
            break;
        }
        len += piece.len();
        pieces.push(piece);
    }
    pieces.iter().rev().map(String::as_str).collect()
}

fn push_encoded(token: &mut String, c: char) {
    match c {
        '%' | '/' | '\\' => push_escaped(token, c),
        c if c.is_whitespace() || c.is_control() => push_escaped(token, c),
        c => token.push(c),
    }
}

fn push_escaped(token: &mut String, c: char) {
    let mut buf = [0u8; 4];
    for b in c.encode_utf8(&mut buf).bytes() {
        token.push_str(&format!("%{:02X}", b));
    }
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}
