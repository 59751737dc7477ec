//! symcrypt - password-based symmetric OpenPGP encryption of files and
//! directory trees.
//!
//! The cipher itself is delegated to `gpg`; this crate decides what every
//! output file is called, where it goes, and how a batch of files is
//! walked and stopped.

#![forbid(unsafe_code)]

pub mod cipher;
pub mod commands;
pub mod config;
pub mod error;
pub mod gpg;
pub mod kdf;
pub mod naming;
pub mod passphrase;
pub mod request;
pub mod resolve;
pub mod walker;

pub use error::{ErrorCategory, ErrorKind, Result, SymcryptError};
