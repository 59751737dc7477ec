//! CLI integration tests
//!
//! Runs the symcrypt binary end-to-end and checks exit codes and outputs.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Get path to the symcrypt binary
fn symcrypt_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_symcrypt"))
}

/// Run symcrypt reading the password and its confirmation from stdin.
fn run_symcrypt(args: &[&str], stdin: &str, envs: &[(&str, &Path)]) -> Output {
    let mut cmd = Command::new(symcrypt_bin());
    cmd.arg("--passphrase-stdin")
        .args(args)
        .env_remove("SYMCRYPT_GPG")
        .env_remove("SYMCRYPT_GNUPGHOME")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (name, value) in envs {
        cmd.env(name, value);
    }
    let mut child = cmd.spawn().unwrap();

    {
        let stdin_pipe = child.stdin.as_mut().unwrap();
        // The command may exit before reading stdin.
        let _ = stdin_pipe.write_all(stdin.as_bytes());
    }

    child.wait_with_output().unwrap()
}

fn gpg_available() -> bool {
    Command::new("gpg")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_help_exits_zero() {
    let output = Command::new(symcrypt_bin()).arg("--help").output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("encrypt"));
    assert!(stdout.contains("decrypt"));
}

#[test]
fn test_unknown_command_exits_one() {
    let output = run_symcrypt(&["frobnicate"], "", &[]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_missing_input_exits_two() {
    let output = run_symcrypt(&["encrypt"], "pw\npw\n", &[]);
    assert_eq!(output.status.code(), Some(2), "{}", stderr_of(&output));
}

#[test]
fn test_nonexistent_input_exits_two() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.txt");
    let output = run_symcrypt(&["decrypt", arg(&missing)], "pw\npw\n", &[]);
    assert_eq!(output.status.code(), Some(2), "{}", stderr_of(&output));
    assert!(stderr_of(&output).contains("nope.txt"));
}

#[cfg(unix)]
#[test]
fn test_special_file_input_exits_three() {
    let output = run_symcrypt(&["encrypt", "/dev/null"], "pw\npw\n", &[]);
    assert_eq!(output.status.code(), Some(3), "{}", stderr_of(&output));
}

#[test]
fn test_directory_input_with_file_output_exits_four() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("in");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("a.txt"), b"a").unwrap();
    let target = temp_dir.path().join("taken");
    fs::write(&target, b"already here").unwrap();

    let output = run_symcrypt(
        &["encrypt", arg(&input), "-o", arg(&target)],
        "pw\npw\n",
        &[],
    );
    assert_eq!(output.status.code(), Some(4), "{}", stderr_of(&output));
    assert_eq!(fs::read(&target).unwrap(), b"already here");
}

#[test]
fn test_password_mismatch_exits_five() {
    let temp_dir = TempDir::new().unwrap();
    let plain = temp_dir.path().join("a.txt");
    fs::write(&plain, b"a").unwrap();

    let output = run_symcrypt(
        &["encrypt", arg(&plain), "-o", arg(temp_dir.path())],
        "first\nsecond\n",
        &[],
    );
    assert_eq!(output.status.code(), Some(5), "{}", stderr_of(&output));
    assert!(!temp_dir.path().join("a.txt.gpg").exists());
}

#[test]
fn test_unrunnable_gpg_fails_with_exit_one() {
    let temp_dir = TempDir::new().unwrap();
    let plain = temp_dir.path().join("a.txt");
    fs::write(&plain, b"a").unwrap();
    let bogus = temp_dir.path().join("no-such-gpg");

    let output = run_symcrypt(
        &["encrypt", arg(&plain), "-o", arg(temp_dir.path())],
        "pw\npw\n",
        &[("SYMCRYPT_GPG", bogus.as_path())],
    );
    assert_eq!(output.status.code(), Some(1), "{}", stderr_of(&output));
    assert!(stderr_of(&output).contains("a.txt"));
}

#[test]
fn test_gpg_roundtrip_through_cli() {
    if !gpg_available() {
        eprintln!("gpg not installed, skipping");
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let home = temp_dir.path().join("gnupg");
    fs::create_dir_all(&home).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&home, fs::Permissions::from_mode(0o700)).unwrap();
    }
    let input = temp_dir.path().join("in");
    let enc = temp_dir.path().join("enc");
    let dec = temp_dir.path().join("dec");
    fs::create_dir_all(input.join("sub")).unwrap();
    fs::write(input.join("top.txt"), b"top level").unwrap();
    fs::write(input.join("sub").join("inner.txt"), b"nested").unwrap();
    let envs = [("SYMCRYPT_GNUPGHOME", home.as_path())];

    let output = run_symcrypt(
        &["encrypt", "-r", arg(&input), "-o", arg(&enc)],
        "pw\npw\n",
        &envs,
    );
    assert!(output.status.success(), "{}", stderr_of(&output));
    assert!(enc.join("top.txt.gpg").is_file());
    assert!(enc.join("sub").join("inner.txt.gpg").is_file());

    let output = run_symcrypt(
        &["decrypt", "-r", arg(&enc), "-o", arg(&dec)],
        "pw\npw\n",
        &envs,
    );
    assert!(output.status.success(), "{}", stderr_of(&output));
    assert_eq!(fs::read(dec.join("top.txt")).unwrap(), b"top level");
    assert_eq!(
        fs::read(dec.join("sub").join("inner.txt")).unwrap(),
        b"nested"
    );

    // Streaming mode writes plaintext to stdout only.
    let top = enc.join("top.txt.gpg");
    let output = run_symcrypt(&["decrypt", "-k", "false", arg(&top)], "pw\npw\n", &envs);
    assert!(output.status.success(), "{}", stderr_of(&output));
    assert_eq!(output.stdout, b"top level");

    let output = run_symcrypt(
        &["decrypt", arg(&top), "-o", arg(&dec)],
        "wrong\nwrong\n",
        &envs,
    );
    assert_eq!(output.status.code(), Some(1), "{}", stderr_of(&output));
}
