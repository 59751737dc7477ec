//! symcrypt CLI - password-based file and directory encryption
//!
//! Encrypts or decrypts a file, the files of a directory, or a whole
//! directory tree with a symmetric OpenPGP cipher (via gpg), using a key
//! derived from a password entered twice.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::error::Error as _;
use std::io;
use std::path::PathBuf;
use std::process;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use symcrypt::Result;
use symcrypt::commands;
use symcrypt::config::Config;
use symcrypt::gpg::GpgCipher;
use symcrypt::kdf::{self, DerivedKey};
use symcrypt::passphrase::{
    self, PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader,
};
use symcrypt::request::{BatchReport, OutcomeRecord, RequestBuilder};

#[derive(Parser)]
#[command(name = "symcrypt")]
#[command(version)]
#[command(about = "Password-based encryption of files and directories.")]
#[command(long_about = None)]
struct Cli {
    /// Read the password and its confirmation (one per line) from stdin
    /// instead of from the terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// Log progress to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Descend into subdirectories of a directory input
    #[arg(short, long)]
    recursive: bool,

    /// Output directory, or output file when INPUT is a single file
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// File or directory to process
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file or directory
    #[command(alias = "e")]
    Encrypt {
        #[command(flatten)]
        common: CommonArgs,

        /// Give each output a random 8-character alphanumeric name
        #[arg(short = 'z', long)]
        randomize: bool,
    },

    /// Decrypt a file or directory
    #[command(alias = "d")]
    Decrypt {
        #[command(flatten)]
        common: CommonArgs,

        /// Write decrypted files; with `false` plaintext goes to stdout
        #[arg(
            short = 'k',
            long = "keep",
            value_name = "BOOL",
            default_value_t = true,
            action = ArgAction::Set
        )]
        keep: bool,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            process::exit(code);
        }
    };

    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        let mut msg = format!("Error: {}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            msg.push_str(&format!(": {}", cause));
            source = cause.source();
        }
        eprintln!("{}", msg);
        process::exit(e.exit_code());
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // Diagnostics never share stdout with streamed plaintext.
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Encrypt { common, randomize } => {
            let builder = RequestBuilder::new(common.input)
                .output(common.output)
                .recursive(common.recursive)
                .randomize(randomize);
            builder.check()?;
            let cipher = GpgCipher::new(Config::from_env()?);
            let request = builder.build(read_key(cli.passphrase_stdin)?)?;

            info!(input = %request.input().display(), "starting encrypt");
            let report = commands::encrypt_command(&request, &cipher)?;
            finish(report)
        }
        Commands::Decrypt { common, keep } => {
            let builder = RequestBuilder::new(common.input)
                .output(common.output)
                .recursive(common.recursive)
                .keep_decrypted(keep);
            builder.check()?;
            let cipher = GpgCipher::new(Config::from_env()?);
            let request = builder.build(read_key(cli.passphrase_stdin)?)?;

            info!(input = %request.input().display(), "starting decrypt");
            let stdout = io::stdout();
            let mut stream = stdout.lock();
            let report = commands::decrypt_command(&request, &cipher, &mut stream)?;
            finish(report)
        }
    }
}

fn read_key(use_stdin: bool) -> Result<DerivedKey> {
    let mut reader = get_passphrase_reader(use_stdin);
    let password = passphrase::read_confirmed(&mut *reader)?;
    kdf::derive_key(&password)
}

fn get_passphrase_reader(use_stdin: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(io::stdin())))
    } else {
        Box::new(TerminalPassphraseReader)
    }
}

/// Reports each outcome; the first failure becomes the command's error.
fn finish(report: BatchReport) -> Result<()> {
    for record in report.records {
        match record {
            OutcomeRecord::Written { source, output } => {
                eprintln!("{} -> {}", source.display(), output.display());
            }
            OutcomeRecord::Streamed { .. } => {}
            OutcomeRecord::Failed { source, error } => {
                let context = format!("failed to process {}", source.display());
                return Err(error.with_context(context));
            }
        }
    }
    Ok(())
}
