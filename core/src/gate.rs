//! Authentication gate state machine.
//!
//! The gate is synchronous and owns no platform handles. Callers ask it for
//! a [`Ticket`], run the matching platform call, and hand the result back
//! with the same ticket. A result whose ticket no longer matches the
//! in-flight attempt is rejected as stale, so an abandoned call can never
//! move the state.

use chrono::{DateTime, Utc};
use log::{error, info, warn};

use crate::capability::AuthCapability;
use crate::error::{AuthError, CredentialError, GateError, PlatformError, Rejection};
use crate::pin::{PinBuffer, PinFailure, PinOutcome, PIN_LENGTH};
use crate::platform::BiometricOutcome;

/// How an attempt presents a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Biometric,
    Pin,
}

/// Why the gate is asking for a PIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinReason {
    /// No sensor or nothing enrolled.
    HardwareUnavailable,
    /// User picked the PIN route.
    UserChoice,
    /// A previous attempt failed.
    AfterFailure,
}

/// Where the gate is in the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Checking,
    AwaitingBiometric,
    AwaitingPin { reason: PinReason, verifying: bool },
    Unlocked { method: AuthMethod },
    Failed { error: AuthError, method: AuthMethod },
}

impl GateState {
    /// A platform call or PIN verification is running.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            GateState::Checking
                | GateState::AwaitingBiometric
                | GateState::AwaitingPin {
                    verifying: true,
                    ..
                }
        )
    }

    /// Short name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            GateState::Idle => "idle",
            GateState::Checking => "checking capabilities",
            GateState::AwaitingBiometric => "awaiting fingerprint",
            GateState::AwaitingPin {
                verifying: true, ..
            } => "verifying PIN",
            GateState::AwaitingPin { .. } => "awaiting PIN",
            GateState::Unlocked { .. } => "unlocked",
            GateState::Failed { .. } => "failed",
        }
    }
}

/// Identifies the single platform call the gate is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub session: u64,
    pub attempt: u64,
    /// `None` for the capability probe.
    pub method: Option<AuthMethod>,
}

/// What happened in one completed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthAttempt {
    pub method: AuthMethod,
    pub outcome: Result<(), AuthError>,
    pub timestamp: DateTime<Utc>,
}

impl AuthAttempt {
    fn new(method: AuthMethod, outcome: Result<(), AuthError>) -> Self {
        Self {
            method,
            outcome,
            timestamp: Utc::now(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Next step after the capability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Run biometric verification under this ticket.
    Biometric(Ticket),
    /// Wait for the user to enter a PIN.
    Pin,
}

/// The unlock state machine for one screen instance.
#[derive(Debug)]
pub struct AuthGate {
    state: GateState,
    session: u64,
    attempt: u64,
    in_flight: Option<Ticket>,
    capability: Option<AuthCapability>,
}

impl Default for AuthGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Idle,
            session: 1,
            attempt: 0,
            in_flight: None,
            capability: None,
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    /// Last probe result, if any.
    pub fn capability(&self) -> Option<AuthCapability> {
        self.capability
    }

    /// Record a probe result as a display hint without starting an attempt.
    pub fn set_capability_hint(&mut self, capability: AuthCapability) {
        self.capability = Some(capability);
    }

    /// Retry control must be disabled while this is true.
    pub fn is_authenticating(&self) -> bool {
        self.state.is_in_flight()
    }

    /// Start an attempt: `Idle -> Checking`.
    pub fn begin(&mut self) -> Result<Ticket, GateError> {
        self.ensure_not_busy()?;
        match self.state {
            GateState::Idle => {
                let ticket = self.issue(None);
                self.transition(GateState::Checking);
                Ok(ticket)
            }
            _ => Err(self.invalid("start authentication")),
        }
    }

    /// Apply the capability probe result.
    pub fn on_capability(
        &mut self,
        ticket: Ticket,
        capability: AuthCapability,
    ) -> Result<Route, GateError> {
        self.accept(ticket)?;
        self.capability = Some(capability);

        if capability.biometric_ready() {
            let ticket = self.issue(Some(AuthMethod::Biometric));
            self.transition(GateState::AwaitingBiometric);
            Ok(Route::Biometric(ticket))
        } else {
            info!(
                "{} (hardware={}, enrolled={}), routing to PIN entry",
                AuthError::HardwareUnavailable,
                capability.has_hardware,
                capability.is_enrolled
            );
            self.transition(GateState::AwaitingPin {
                reason: PinReason::HardwareUnavailable,
                verifying: false,
            });
            Ok(Route::Pin)
        }
    }

    /// Apply the outcome of the biometric prompt.
    pub fn on_biometric(
        &mut self,
        ticket: Ticket,
        result: Result<BiometricOutcome, PlatformError>,
    ) -> Result<AuthAttempt, GateError> {
        self.accept(ticket)?;

        let outcome = match result {
            Ok(BiometricOutcome::Success) => Ok(()),
            Ok(BiometricOutcome::Cancelled) => {
                Err(AuthError::VerificationFailed(Rejection::Cancelled))
            }
            Ok(BiometricOutcome::Failed(reason)) => {
                info!("Fingerprint rejected: {}", reason);
                Err(AuthError::VerificationFailed(Rejection::BiometricMismatch))
            }
            Err(e) => {
                error!("Biometric platform error: {}", e);
                Err(AuthError::PlatformError)
            }
        };

        Ok(self.complete(AuthMethod::Biometric, outcome))
    }

    /// Switch to PIN entry without touching the fingerprint reader.
    pub fn use_pin(&mut self) -> Result<(), GateError> {
        self.ensure_not_busy()?;
        let reason = match &self.state {
            GateState::Idle => PinReason::UserChoice,
            GateState::Failed { .. } => PinReason::AfterFailure,
            GateState::AwaitingPin { reason, .. } => *reason,
            _ => return Err(self.invalid("switch to PIN")),
        };
        self.transition(GateState::AwaitingPin {
            reason,
            verifying: false,
        });
        Ok(())
    }

    /// Leave a failed attempt. A failed fingerprint falls through to PIN.
    pub fn retry(&mut self) -> Result<(), GateError> {
        self.ensure_not_busy()?;
        match self.state {
            GateState::Failed { .. } => {
                self.transition(GateState::AwaitingPin {
                    reason: PinReason::AfterFailure,
                    verifying: false,
                });
                Ok(())
            }
            _ => Err(self.invalid("retry")),
        }
    }

    /// Hand a complete PIN to the verifier.
    pub fn submit_pin(&mut self, candidate: &PinBuffer) -> Result<Ticket, GateError> {
        self.ensure_not_busy()?;
        let reason = match &self.state {
            GateState::AwaitingPin { reason, .. } => *reason,
            GateState::Failed { .. } => PinReason::AfterFailure,
            _ => return Err(self.invalid("submit a PIN")),
        };

        if !candidate.is_complete() {
            return Err(GateError::IncompletePin(PIN_LENGTH));
        }

        let ticket = self.issue(Some(AuthMethod::Pin));
        self.transition(GateState::AwaitingPin {
            reason,
            verifying: true,
        });
        Ok(ticket)
    }

    /// Apply the PIN verifier's answer.
    pub fn on_pin(
        &mut self,
        ticket: Ticket,
        result: Result<PinOutcome, CredentialError>,
    ) -> Result<AuthAttempt, GateError> {
        self.accept(ticket)?;

        let outcome = match result {
            Ok(PinOutcome::Success) => Ok(()),
            Ok(PinOutcome::Failure(PinFailure::Mismatch)) => {
                Err(AuthError::VerificationFailed(Rejection::IncorrectPin))
            }
            Ok(PinOutcome::Failure(PinFailure::NotConfigured)) => {
                Err(AuthError::VerificationFailed(Rejection::PinNotConfigured))
            }
            Err(e) => {
                error!("PIN credential store error: {}", e);
                Err(AuthError::PlatformError)
            }
        };

        Ok(self.complete(AuthMethod::Pin, outcome))
    }

    /// Abandon the in-flight call. Its eventual result will be stale.
    pub fn cancel(&mut self) -> Option<AuthAttempt> {
        let ticket = self.in_flight.take()?;
        info!("Cancelling attempt {} ({})", ticket.attempt, self.state.name());

        match self.state.clone() {
            GateState::Checking => {
                self.transition(GateState::Idle);
                None
            }
            GateState::AwaitingBiometric => Some(self.complete(
                AuthMethod::Biometric,
                Err(AuthError::VerificationFailed(Rejection::Cancelled)),
            )),
            GateState::AwaitingPin { reason, .. } => {
                self.transition(GateState::AwaitingPin {
                    reason,
                    verifying: false,
                });
                None
            }
            _ => None,
        }
    }

    /// Start a fresh session from `Idle`. Anything in flight becomes stale.
    pub fn reset(&mut self) {
        if self.in_flight.take().is_some() {
            warn!("Resetting gate with an attempt still in flight");
        }
        self.session += 1;
        self.attempt = 0;
        info!("Starting session {}", self.session);
        self.transition(GateState::Idle);
    }

    fn issue(&mut self, method: Option<AuthMethod>) -> Ticket {
        self.attempt += 1;
        let ticket = Ticket {
            session: self.session,
            attempt: self.attempt,
            method,
        };
        self.in_flight = Some(ticket);
        ticket
    }

    fn accept(&mut self, ticket: Ticket) -> Result<(), GateError> {
        if self.in_flight != Some(ticket) {
            warn!(
                "Ignoring stale result for session {} attempt {}",
                ticket.session, ticket.attempt
            );
            return Err(GateError::Stale);
        }
        self.in_flight = None;
        Ok(())
    }

    fn complete(&mut self, method: AuthMethod, outcome: Result<(), AuthError>) -> AuthAttempt {
        let attempt = AuthAttempt::new(method, outcome);
        match attempt.outcome {
            Ok(()) => {
                info!("{:?} authentication succeeded", method);
                self.transition(GateState::Unlocked { method });
            }
            Err(error) => {
                info!("{:?} authentication failed: {:?}", method, error);
                self.transition(GateState::Failed { error, method });
            }
        }
        attempt
    }

    fn ensure_not_busy(&self) -> Result<(), GateError> {
        if self.is_authenticating() {
            Err(GateError::Busy)
        } else {
            Ok(())
        }
    }

    fn invalid(&self, action: &'static str) -> GateError {
        GateError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }

    fn transition(&mut self, next: GateState) {
        info!("Gate: {} -> {}", self.state.name(), next.name());
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const READY: AuthCapability = AuthCapability {
        has_hardware: true,
        is_enrolled: true,
    };

    fn pin(text: &str) -> PinBuffer {
        PinBuffer::parse(text).unwrap()
    }

    fn biometric_ticket(gate: &mut AuthGate) -> Ticket {
        let probe = gate.begin().unwrap();
        match gate.on_capability(probe, READY).unwrap() {
            Route::Biometric(ticket) => ticket,
            Route::Pin => panic!("expected biometric route"),
        }
    }

    #[test]
    fn missing_capability_routes_to_pin() {
        for (has_hardware, is_enrolled) in [(false, false), (false, true), (true, false)] {
            let mut gate = AuthGate::new();
            let probe = gate.begin().unwrap();
            let cap = AuthCapability {
                has_hardware,
                is_enrolled,
            };
            assert_eq!(gate.on_capability(probe, cap).unwrap(), Route::Pin);
            assert_eq!(
                gate.state(),
                &GateState::AwaitingPin {
                    reason: PinReason::HardwareUnavailable,
                    verifying: false
                }
            );
        }
    }

    #[test]
    fn biometric_success_unlocks() {
        let mut gate = AuthGate::new();
        let ticket = biometric_ticket(&mut gate);
        assert_eq!(ticket.method, Some(AuthMethod::Biometric));
        assert!(gate.is_authenticating());

        let attempt = gate
            .on_biometric(ticket, Ok(BiometricOutcome::Success))
            .unwrap();
        assert!(attempt.succeeded());
        assert_eq!(attempt.method, AuthMethod::Biometric);
        assert_eq!(
            gate.state(),
            &GateState::Unlocked {
                method: AuthMethod::Biometric
            }
        );
        assert!(!gate.is_authenticating());
    }

    #[test]
    fn unlocked_needs_reset_before_checking_again() {
        let mut gate = AuthGate::new();
        let ticket = biometric_ticket(&mut gate);
        gate.on_biometric(ticket, Ok(BiometricOutcome::Success))
            .unwrap();

        assert!(matches!(
            gate.begin(),
            Err(GateError::InvalidTransition { .. })
        ));

        let session = gate.session();
        gate.reset();
        assert_eq!(gate.session(), session + 1);
        assert_eq!(gate.state(), &GateState::Idle);
        assert!(gate.begin().is_ok());
    }

    #[test]
    fn platform_error_fails_and_falls_back_to_pin() {
        let mut gate = AuthGate::new();
        let ticket = biometric_ticket(&mut gate);
        let attempt = gate
            .on_biometric(ticket, Err(PlatformError::Device("verify-disconnected".into())))
            .unwrap();

        assert_eq!(attempt.outcome, Err(AuthError::PlatformError));
        assert!(!gate.is_authenticating());

        gate.retry().unwrap();
        assert_eq!(
            gate.state(),
            &GateState::AwaitingPin {
                reason: PinReason::AfterFailure,
                verifying: false
            }
        );
    }

    #[test]
    fn busy_gate_rejects_new_attempts() {
        let mut gate = AuthGate::new();
        gate.begin().unwrap();
        assert_eq!(gate.begin(), Err(GateError::Busy));
        assert_eq!(gate.use_pin(), Err(GateError::Busy));
        assert_eq!(gate.submit_pin(&pin("1234")), Err(GateError::Busy));
    }

    #[test]
    fn stale_results_are_ignored() {
        let mut gate = AuthGate::new();
        let old = biometric_ticket(&mut gate);
        gate.reset();

        assert_eq!(
            gate.on_biometric(old, Ok(BiometricOutcome::Success)),
            Err(GateError::Stale)
        );
        assert_eq!(gate.state(), &GateState::Idle);
    }

    #[test]
    fn pin_flow_after_failure() {
        let mut gate = AuthGate::new();
        gate.use_pin().unwrap();

        assert_eq!(
            gate.submit_pin(&pin("12")),
            Err(GateError::IncompletePin(PIN_LENGTH))
        );

        let ticket = gate.submit_pin(&pin("0000")).unwrap();
        assert!(gate.is_authenticating());
        let attempt = gate
            .on_pin(ticket, Ok(PinOutcome::Failure(PinFailure::Mismatch)))
            .unwrap();
        assert_eq!(
            attempt.outcome,
            Err(AuthError::VerificationFailed(Rejection::IncorrectPin))
        );

        // Submitting straight from Failed is a retry.
        let ticket = gate.submit_pin(&pin("1234")).unwrap();
        gate.on_pin(ticket, Ok(PinOutcome::Success)).unwrap();
        assert_eq!(
            gate.state(),
            &GateState::Unlocked {
                method: AuthMethod::Pin
            }
        );
    }

    #[test]
    fn store_error_is_a_platform_error() {
        let mut gate = AuthGate::new();
        gate.use_pin().unwrap();
        let ticket = gate.submit_pin(&pin("1234")).unwrap();
        let attempt = gate
            .on_pin(ticket, Err(CredentialError::NoConfigDir))
            .unwrap();
        assert_eq!(attempt.outcome, Err(AuthError::PlatformError));
    }

    #[test]
    fn cancel_biometric_fails_attempt() {
        let mut gate = AuthGate::new();
        let ticket = biometric_ticket(&mut gate);
        let attempt = gate.cancel().unwrap();
        assert_eq!(
            attempt.outcome,
            Err(AuthError::VerificationFailed(Rejection::Cancelled))
        );
        assert!(!gate.is_authenticating());
        assert_eq!(
            gate.on_biometric(ticket, Ok(BiometricOutcome::Success)),
            Err(GateError::Stale)
        );
    }

    #[test]
    fn cancel_pin_verification_returns_to_entry() {
        let mut gate = AuthGate::new();
        gate.use_pin().unwrap();
        let ticket = gate.submit_pin(&pin("1234")).unwrap();

        assert!(gate.cancel().is_none());
        assert_eq!(
            gate.state(),
            &GateState::AwaitingPin {
                reason: PinReason::UserChoice,
                verifying: false
            }
        );
        assert!(!gate.is_authenticating());
        assert_eq!(
            gate.on_pin(ticket, Ok(PinOutcome::Success)),
            Err(GateError::Stale)
        );
    }

    #[test]
    fn cancel_while_checking_returns_to_idle() {
        let mut gate = AuthGate::new();
        let probe = gate.begin().unwrap();
        assert!(gate.cancel().is_none());
        assert_eq!(gate.state(), &GateState::Idle);
        assert_eq!(gate.on_capability(probe, READY), Err(GateError::Stale));
    }
}
