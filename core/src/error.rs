//! Error types shared across the unlock flow.

use thiserror::Error;

/// Why a presented credential was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Fingerprint did not match an enrolled print.
    BiometricMismatch,
    /// User dismissed the fingerprint prompt.
    Cancelled,
    /// PIN did not match the stored credential.
    IncorrectPin,
    /// No PIN credential has been stored yet.
    PinNotConfigured,
}

impl Rejection {
    /// Message shown inline under the retry control.
    pub fn message(self) -> &'static str {
        match self {
            Rejection::BiometricMismatch => "Authentication failed. Try again.",
            Rejection::Cancelled => "Authentication cancelled.",
            Rejection::IncorrectPin => "Incorrect PIN",
            Rejection::PinNotConfigured => "No PIN has been set up. Run `medremind-pin set`.",
        }
    }
}

/// Failure kinds surfaced by the gate. `Display` is the user-facing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No sensor or nothing enrolled. Routes to PIN, never shown as a banner.
    #[error("Fingerprint unlock is not available on this device")]
    HardwareUnavailable,
    #[error("{}", .0.message())]
    VerificationFailed(Rejection),
    /// Details stay in the log; the user only sees a generic message.
    #[error("Something went wrong. Try again.")]
    PlatformError,
}

impl AuthError {
    /// Whether the screen should render an inline error for this failure.
    pub fn is_visible(&self) -> bool {
        !matches!(self, AuthError::HardwareUnavailable)
    }
}

/// Errors raised by the biometric platform boundary.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("D-Bus error: {0}")]
    DBus(#[from] zbus::Error),
    #[error("No fingerprint devices available")]
    NoDeviceAvailable,
    #[error("Failed to claim device: {0}")]
    ClaimFailed(String),
    #[error("Device reported {0}")]
    Device(String),
    #[error("Verification timed out after {0} seconds")]
    Timeout(u64),
    #[error("Platform call panicked")]
    Panicked,
}

/// Errors from the PIN credential store.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Credential store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Credential store is corrupt: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Failed to hash PIN: {0}")]
    Hash(String),
    #[error("Stored credential is not a valid hash: {0}")]
    InvalidHash(String),
    #[error("No configuration directory available")]
    NoConfigDir,
    #[error("PIN verification task failed: {0}")]
    Task(String),
}

/// Problems with the raw PIN input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PinInputError {
    #[error("PIN must contain only digits")]
    NotADigit,
    #[error("PIN is limited to {0} digits")]
    TooLong(usize),
    #[error("PIN must be exactly {0} digits")]
    Incomplete(usize),
}

/// Commands the gate refused in its current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("An authentication attempt is already in progress")]
    Busy,
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
    #[error("PIN must be exactly {0} digits")]
    IncompletePin(usize),
    #[error("Result belongs to an abandoned attempt")]
    Stale,
}
