//! Core of the MedRemind unlock flow.
//!
//! The pieces, leaf first:
//! - `capability`: fail-closed probe for fingerprint hardware and enrollment
//! - `pin`: PIN input buffer, credential store and verifier
//! - `gate`: the authentication state machine
//! - `controller`: async task that owns the gate and runs platform calls
//! - `view`: what the screens show for a given gate snapshot
//! - `platform` / `fprintd` / `device`: the fprintd D-Bus backend

pub mod capability;
pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod fprintd;
pub mod gate;
pub mod pin;
pub mod platform;
pub mod view;

// Re-export commonly used items
pub use capability::{AuthCapability, CapabilityProbe};
pub use config::AuthConfig;
pub use controller::{GateCommand, GateController, GateHandle, GateSnapshot};
pub use error::{AuthError, CredentialError, GateError, PlatformError, Rejection};
pub use gate::{AuthAttempt, AuthGate, AuthMethod, GateState, PinReason, Ticket};
pub use pin::{
    CredentialSource, FileCredentialStore, PinBuffer, PinCredential, PinOutcome, PinVerifier,
    PIN_LENGTH,
};
pub use platform::{BiometricOutcome, BiometricPlatform, FprintdPlatform, PromptConfig};
pub use view::{error_dismissed, AuthView, Navigation, PinView, Screen};
