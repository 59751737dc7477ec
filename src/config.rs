//! Cipher backend configuration with environment variable support.
//!
//! ## Environment Variables
//!
//! - `SYMCRYPT_GPG`: path or name of the gpg executable
//! - `SYMCRYPT_CIPHER_ALGO`: symmetric cipher passed to `--cipher-algo`
//! - `SYMCRYPT_GNUPGHOME`: gpg home directory passed to `--homedir`

use crate::error::{ErrorCategory, ErrorKind, Result, SymcryptError};
use std::env;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Environment variable names for configuration overrides
pub const ENV_GPG_PROGRAM: &str = "SYMCRYPT_GPG";
pub const ENV_CIPHER_ALGO: &str = "SYMCRYPT_CIPHER_ALGO";
pub const ENV_HOME_DIR: &str = "SYMCRYPT_GNUPGHOME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub gpg_program: PathBuf,
    pub cipher_algo: String,
    pub home_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gpg_program: PathBuf::from("gpg"),
            cipher_algo: "AES256".to_string(),
            home_dir: None,
        }
    }
}

impl Config {
    /// Defaults with environment overrides applied, validated.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(program) = env::var_os(ENV_GPG_PROGRAM) {
            debug!(program = ?program, "overriding gpg_program from environment");
            self.gpg_program = PathBuf::from(program);
        }

        if let Ok(algo) = env::var(ENV_CIPHER_ALGO) {
            debug!(algo = %algo, "overriding cipher_algo from environment");
            self.cipher_algo = algo;
        }

        if let Some(home) = env::var_os(ENV_HOME_DIR) {
            debug!(home = ?home, "overriding home_dir from environment");
            self.home_dir = Some(PathBuf::from(home));
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.gpg_program.as_os_str().is_empty() {
            return Err(config_error("gpg_program cannot be empty"));
        }

        let algo = &self.cipher_algo;
        if algo.is_empty() || !algo.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(config_error(format!(
                "cipher_algo {:?} is not a valid cipher name",
                algo
            )));
        }

        if let Some(home) = &self.home_dir {
            if !home.is_dir() {
                warn!(home = %home.display(), "gpg home directory does not exist");
            }
        }

        Ok(())
    }

    pub fn with_home_dir(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(home.into());
        self
    }
}

fn config_error(msg: impl Into<String>) -> SymcryptError {
    SymcryptError::with_kind(ErrorCategory::User, ErrorKind::Config, msg)
}
