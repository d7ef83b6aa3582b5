//! What the unlock screens show for a given snapshot.

use crate::controller::GateSnapshot;
use crate::gate::{AuthAttempt, AuthMethod, GateState};

/// Icon shown on the authenticate button when a fingerprint can be used.
pub const ICON_FINGERPRINT: &str = "auth-fingerprint-symbolic";

/// Icon shown on the authenticate button for PIN entry.
pub const ICON_KEY: &str = "dialog-password-symbolic";

/// Page the navigation layer should display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Auth,
    Pin,
    Protected,
}

impl Screen {
    pub fn for_state(state: &GateState) -> Self {
        match state {
            GateState::Idle
            | GateState::Checking
            | GateState::AwaitingBiometric
            | GateState::Failed {
                method: AuthMethod::Biometric,
                ..
            } => Screen::Auth,
            GateState::AwaitingPin { .. }
            | GateState::Failed {
                method: AuthMethod::Pin,
                ..
            } => Screen::Pin,
            GateState::Unlocked { .. } => Screen::Protected,
        }
    }

    /// Stack page name.
    pub fn page_name(self) -> &'static str {
        match self {
            Screen::Auth => "auth",
            Screen::Pin => "pin",
            Screen::Protected => "home",
        }
    }
}

/// Signal handed to the navigation layer when the screen changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    RouteToPin,
    ProceedToProtected,
    ReturnToAuth,
}

impl Navigation {
    /// Signal for moving from `from` to `to`, if they differ.
    pub fn between(from: Screen, to: Screen) -> Option<Self> {
        if from == to {
            return None;
        }
        Some(match to {
            Screen::Auth => Navigation::ReturnToAuth,
            Screen::Pin => Navigation::RouteToPin,
            Screen::Protected => Navigation::ProceedToProtected,
        })
    }
}

/// Everything the authentication page renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthView {
    pub instruction: &'static str,
    pub button_label: &'static str,
    pub button_icon: &'static str,
    pub button_sensitive: bool,
    /// Shown while the fingerprint reader waits.
    pub prompt: Option<String>,
    pub cancel_label: Option<String>,
    pub show_use_pin: bool,
    pub error: Option<String>,
}

impl AuthView {
    pub fn from_snapshot(snapshot: &GateSnapshot) -> Self {
        let biometric = snapshot.biometric_ready();
        let authenticating = snapshot.is_authenticating();
        let awaiting_biometric = matches!(snapshot.state, GateState::AwaitingBiometric);

        let instruction = if biometric {
            "Use your fingerprint or PIN to access your medications"
        } else {
            "Enter your PIN to access your medications"
        };

        // A failed attempt always continues with PIN.
        let offers_biometric = biometric && matches!(snapshot.state, GateState::Idle);
        let button_label = if authenticating {
            "Verifying..."
        } else if offers_biometric {
            "Authenticate"
        } else {
            "Enter PIN"
        };
        let button_icon = if offers_biometric || awaiting_biometric {
            ICON_FINGERPRINT
        } else {
            ICON_KEY
        };

        Self {
            instruction,
            button_label,
            button_icon,
            button_sensitive: !authenticating,
            prompt: awaiting_biometric.then(|| snapshot.prompt.prompt_message.clone()),
            cancel_label: awaiting_biometric.then(|| snapshot.prompt.cancel_label.clone()),
            show_use_pin: awaiting_biometric && snapshot.prompt.allow_device_fallback,
            error: error_text(&snapshot.state),
        }
    }
}

/// Everything the PIN page renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinView {
    pub title: &'static str,
    pub submit_label: &'static str,
    pub entry_sensitive: bool,
    pub error: Option<String>,
}

impl PinView {
    pub fn from_snapshot(snapshot: &GateSnapshot) -> Self {
        let verifying = snapshot.is_authenticating();
        Self {
            title: "Enter your PIN",
            submit_label: if verifying { "Verifying..." } else { "Submit" },
            entry_sensitive: !verifying,
            error: error_text(&snapshot.state),
        }
    }

    /// Submit is enabled only with a full PIN and nothing in flight.
    pub fn can_submit(&self, digits: usize) -> bool {
        self.entry_sensitive && digits == crate::pin::PIN_LENGTH
    }
}

/// Whether the user already dismissed the error for the snapshot's last attempt.
///
/// Errors belong to attempts, so a dismissed one stays hidden across later
/// snapshots until a new attempt fails.
pub fn error_dismissed(snapshot: &GateSnapshot, dismissed: Option<&AuthAttempt>) -> bool {
    match (&snapshot.last_attempt, dismissed) {
        (Some(last), Some(dismissed)) => last == dismissed,
        _ => false,
    }
}

fn error_text(state: &GateState) -> Option<String> {
    match state {
        GateState::Failed { error, .. } if error.is_visible() => Some(error.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::AuthCapability;
    use crate::error::{AuthError, Rejection};
    use crate::gate::PinReason;
    use crate::platform::PromptConfig;

    fn snapshot(state: GateState, ready: bool) -> GateSnapshot {
        GateSnapshot {
            session: 1,
            state,
            capability: Some(AuthCapability {
                has_hardware: ready,
                is_enrolled: ready,
            }),
            last_attempt: None,
            rejected: None,
            prompt: PromptConfig::default(),
        }
    }

    #[test]
    fn idle_labels_follow_capability() {
        let view = AuthView::from_snapshot(&snapshot(GateState::Idle, true));
        assert_eq!(view.button_label, "Authenticate");
        assert_eq!(view.button_icon, ICON_FINGERPRINT);
        assert!(view.instruction.contains("fingerprint"));

        let view = AuthView::from_snapshot(&snapshot(GateState::Idle, false));
        assert_eq!(view.button_label, "Enter PIN");
        assert_eq!(view.button_icon, ICON_KEY);
        assert_eq!(view.instruction, "Enter your PIN to access your medications");
    }

    #[test]
    fn in_flight_disables_button() {
        for state in [GateState::Checking, GateState::AwaitingBiometric] {
            let view = AuthView::from_snapshot(&snapshot(state, true));
            assert_eq!(view.button_label, "Verifying...");
            assert!(!view.button_sensitive);
        }
    }

    #[test]
    fn prompt_shown_while_awaiting_fingerprint() {
        let view = AuthView::from_snapshot(&snapshot(GateState::AwaitingBiometric, true));
        assert_eq!(view.prompt.as_deref(), Some("Use biometric or PIN"));
        assert_eq!(view.cancel_label.as_deref(), Some("Cancel"));
        assert!(view.show_use_pin);

        let view = AuthView::from_snapshot(&snapshot(GateState::Idle, true));
        assert!(view.prompt.is_none());
        assert!(!view.show_use_pin);
    }

    #[test]
    fn failures_render_inline_errors() {
        let failed = GateState::Failed {
            error: AuthError::VerificationFailed(Rejection::BiometricMismatch),
            method: AuthMethod::Biometric,
        };
        let view = AuthView::from_snapshot(&snapshot(failed, true));
        assert_eq!(view.error.as_deref(), Some("Authentication failed. Try again."));
        assert_eq!(view.button_label, "Enter PIN");
        assert!(view.button_sensitive);

        let failed = GateState::Failed {
            error: AuthError::PlatformError,
            method: AuthMethod::Biometric,
        };
        let view = AuthView::from_snapshot(&snapshot(failed, true));
        assert_eq!(view.error.as_deref(), Some("Something went wrong. Try again."));
    }

    #[test]
    fn screens_follow_state() {
        assert_eq!(Screen::for_state(&GateState::Idle), Screen::Auth);
        assert_eq!(
            Screen::for_state(&GateState::AwaitingPin {
                reason: PinReason::HardwareUnavailable,
                verifying: false
            }),
            Screen::Pin
        );
        assert_eq!(
            Screen::for_state(&GateState::Failed {
                error: AuthError::VerificationFailed(Rejection::IncorrectPin),
                method: AuthMethod::Pin
            }),
            Screen::Pin
        );
        assert_eq!(
            Screen::for_state(&GateState::Unlocked {
                method: AuthMethod::Pin
            }),
            Screen::Protected
        );
    }

    #[test]
    fn navigation_signals() {
        assert_eq!(Navigation::between(Screen::Auth, Screen::Auth), None);
        assert_eq!(
            Navigation::between(Screen::Auth, Screen::Pin),
            Some(Navigation::RouteToPin)
        );
        assert_eq!(
            Navigation::between(Screen::Pin, Screen::Protected),
            Some(Navigation::ProceedToProtected)
        );
        assert_eq!(
            Navigation::between(Screen::Protected, Screen::Auth),
            Some(Navigation::ReturnToAuth)
        );
    }

    #[test]
    fn dismissed_error_stays_hidden_until_next_attempt() {
        let failed = GateState::Failed {
            error: AuthError::VerificationFailed(Rejection::IncorrectPin),
            method: AuthMethod::Pin,
        };
        let mut snap = snapshot(failed, false);
        let first = AuthAttempt {
            method: AuthMethod::Pin,
            outcome: Err(AuthError::VerificationFailed(Rejection::IncorrectPin)),
            timestamp: chrono::Utc::now(),
        };
        snap.last_attempt = Some(first.clone());

        assert!(!error_dismissed(&snap, None));
        assert!(error_dismissed(&snap, Some(&first)));

        // A later snapshot for the same attempt, e.g. a capability hint.
        let mut later = snap.clone();
        later.capability = None;
        assert!(error_dismissed(&later, Some(&first)));

        let mut retried = snap.clone();
        retried.last_attempt = Some(AuthAttempt {
            timestamp: first.timestamp + chrono::Duration::seconds(1),
            ..first.clone()
        });
        assert!(!error_dismissed(&retried, Some(&first)));
    }

    #[test]
    fn pin_view_submit_rules() {
        let view = PinView::from_snapshot(&snapshot(
            GateState::AwaitingPin {
                reason: PinReason::UserChoice,
                verifying: false,
            },
            false,
        ));
        assert!(view.can_submit(4));
        assert!(!view.can_submit(3));

        let view = PinView::from_snapshot(&snapshot(
            GateState::AwaitingPin {
                reason: PinReason::UserChoice,
                verifying: true,
            },
            false,
        ));
        assert_eq!(view.submit_label, "Verifying...");
        assert!(!view.can_submit(4));
    }
}
