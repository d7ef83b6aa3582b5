//! Command line tool for managing the MedRemind PIN credential.
//!
//! The PIN is read from stdin so it never appears in the process list or
//! shell history. Exit codes follow the `verify` convention: 0 on success,
//! 1 on a rejected PIN, 2 on any other error.

use clap::{Parser, Subcommand};
use medremind_core::{
    AuthCapability, AuthConfig, CapabilityProbe, FileCredentialStore, FprintdPlatform, PinBuffer,
    PinCredential, PinOutcome, PinVerifier,
};
use serde::Serialize;
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    process,
    sync::Arc,
};
use zeroize::Zeroizing;

/// Command line interface definition
#[derive(Debug, Parser)]
#[command(
    name = "medremind-pin",
    version,
    about = "Set, verify, clear or inspect the MedRemind unlock PIN"
)]
struct Cli {
    /// Credential file to use instead of the configured one
    #[arg(long, global = true, value_name = "PATH")]
    store: Option<PathBuf>,

    /// Log progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
enum Command {
    /// Read a new 4-digit PIN twice from stdin and store its hash
    Set,
    /// Read a PIN from stdin; exit 0 if it matches, 1 if not, 2 on error
    Verify,
    /// Remove the stored PIN
    Clear,
    /// Show whether a PIN is set and what fingerprint unlock can do
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Output of `status`.
#[derive(Debug, Serialize)]
struct StatusReport {
    credential_path: PathBuf,
    pin_configured: bool,
    pin_updated_at: Option<String>,
    config_path: Option<PathBuf>,
    fingerprint: AuthCapability,
}

/// Strip the line ending and parse a complete PIN.
fn parse_pin_line(line: &str) -> io::Result<PinBuffer> {
    let trimmed = line.trim_end_matches(|c| c == '\n' || c == '\r');
    let pin = PinBuffer::parse(trimmed)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    pin.ensure_complete()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    Ok(pin)
}

/// Prompt on stderr and read one PIN line from stdin.
fn read_pin(prompt: &str) -> io::Result<PinBuffer> {
    eprint!("{}: ", prompt);
    io::stderr().flush()?;

    let mut line = Zeroizing::new(String::new());
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "no PIN on stdin",
        ));
    }
    parse_pin_line(&line)
}

/// Print an error and exit with the given status.
fn fail(message: impl std::fmt::Display, code: i32) -> ! {
    eprintln!("Error: {}", message);
    process::exit(code);
}

fn open_store(cli_store: Option<PathBuf>, config: &AuthConfig) -> FileCredentialStore {
    match cli_store {
        Some(path) => FileCredentialStore::new(path),
        None => FileCredentialStore::from_config(config).unwrap_or_else(|e| fail(e, 2)),
    }
}

fn set_pin(store: &FileCredentialStore) {
    let first = read_pin("New PIN").unwrap_or_else(|e| fail(e, 2));
    let second = read_pin("Repeat PIN").unwrap_or_else(|e| fail(e, 2));
    if first.as_bytes() != second.as_bytes() {
        fail("PINs do not match", 1);
    }

    let credential = PinCredential::hash_pin(&first).unwrap_or_else(|e| fail(e, 2));
    match store.save(&credential) {
        Ok(()) => println!("Success: PIN stored at {}", store.path().display()),
        Err(e) => fail(e, 2),
    }
}

fn verify_pin(store: FileCredentialStore) {
    let candidate = read_pin("PIN").unwrap_or_else(|e| fail(e, 2));
    let verifier = PinVerifier::new(Arc::new(store));

    match verifier.verify(&candidate) {
        Ok(PinOutcome::Success) => {
            println!("match");
            process::exit(0);
        }
        Ok(PinOutcome::Failure(failure)) => {
            println!("no-match: {:?}", failure);
            process::exit(1);
        }
        Err(e) => fail(e, 2),
    }
}

fn clear_pin(store: &FileCredentialStore) {
    match store.clear() {
        Ok(true) => println!("Success: removed {}", store.path().display()),
        Ok(false) => println!("No PIN stored at {}", store.path().display()),
        Err(e) => fail(e, 2),
    }
}

fn probe_fingerprint() -> AuthCapability {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| fail(format!("failed to start async runtime: {}", e), 2));
    let probe = CapabilityProbe::new(Arc::new(FprintdPlatform::new()));
    rt.block_on(probe.probe())
}

fn show_status(store: &FileCredentialStore, json: bool) {
    let report = StatusReport {
        credential_path: store.path().to_path_buf(),
        pin_configured: store.is_configured(),
        pin_updated_at: store
            .updated_at()
            .unwrap_or_else(|e| fail(e, 2))
            .map(|at| at.to_rfc3339()),
        config_path: AuthConfig::config_file_path(),
        fingerprint: probe_fingerprint(),
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => fail(e, 2),
        }
        return;
    }

    println!("credential: {}", report.credential_path.display());
    match &report.pin_updated_at {
        Some(at) if report.pin_configured => println!("pin: set ({})", at),
        _ => println!("pin: not set"),
    }
    println!(
        "fingerprint: hardware={} enrolled={} ready={}",
        report.fingerprint.has_hardware,
        report.fingerprint.is_enrolled,
        report.fingerprint.biometric_ready()
    );
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        if let Err(e) = simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Info)
            .init()
        {
            eprintln!("Failed to initialize logger: {}", e);
        }
    }

    let config = AuthConfig::load();
    let store = open_store(cli.store, &config);

    match cli.cmd {
        Command::Set => set_pin(&store),
        Command::Verify => verify_pin(store),
        Command::Clear => clear_pin(&store),
        Command::Status { json } => show_status(&store, json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_line_endings_are_stripped() {
        assert_eq!(parse_pin_line("1234\n").unwrap().as_str(), "1234");
        assert_eq!(parse_pin_line("1234\r\n").unwrap().as_str(), "1234");
    }

    #[test]
    fn malformed_pin_lines_are_invalid_input() {
        for line in ["12\n", "12a4\n", "12345\n", "\n"] {
            let err = parse_pin_line(line).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{:?}", line);
        }
    }

    #[test]
    fn status_report_serializes_capability() {
        let report = StatusReport {
            credential_path: PathBuf::from("/tmp/pin.json"),
            pin_configured: false,
            pin_updated_at: None,
            config_path: None,
            fingerprint: AuthCapability::default(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["pin_configured"], false);
        assert_eq!(json["fingerprint"]["has_hardware"], false);
    }
}
