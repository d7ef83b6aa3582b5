use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use medremind_core::{
    AuthConfig, AuthError, AuthMethod, BiometricOutcome, BiometricPlatform, GateController,
    GateError, GateHandle, GateSnapshot, GateState, PinBuffer, PinCredential, PinReason,
    PinVerifier, PlatformError, PromptConfig, Rejection,
};

#[derive(Clone, Copy)]
enum Verdict {
    Accept,
    Reject,
    Error,
    Panic,
    Hang,
}

struct FakeReader {
    hardware: bool,
    enrolled: bool,
    verdict: Verdict,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl BiometricPlatform for FakeReader {
    async fn has_hardware(&self) -> Result<bool, PlatformError> {
        Ok(self.hardware)
    }

    async fn is_enrolled(&self) -> Result<bool, PlatformError> {
        Ok(self.enrolled)
    }

    async fn authenticate(&self, _: &PromptConfig) -> Result<BiometricOutcome, PlatformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.verdict {
            Verdict::Accept => Ok(BiometricOutcome::Success),
            Verdict::Reject => Ok(BiometricOutcome::Failed("verify-no-match".to_string())),
            Verdict::Error => Err(PlatformError::Device("verify-disconnected".to_string())),
            Verdict::Panic => panic!("reader exploded"),
            Verdict::Hang => std::future::pending().await,
        }
    }
}

fn verifier() -> PinVerifier {
    let pin = PinBuffer::parse("1234").unwrap();
    PinVerifier::new(Arc::new(PinCredential::hash_pin(&pin).unwrap()))
}

fn start_with(
    hardware: bool,
    enrolled: bool,
    verdict: Verdict,
    config: AuthConfig,
) -> (GateHandle, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let reader = FakeReader {
        hardware,
        enrolled,
        verdict,
        calls: Arc::clone(&calls),
    };
    let (controller, handle) = GateController::new(reader, verifier(), &config);
    tokio::spawn(controller.run());
    (handle, calls)
}

fn start(hardware: bool, enrolled: bool, verdict: Verdict) -> (GateHandle, Arc<AtomicUsize>) {
    start_with(hardware, enrolled, verdict, AuthConfig::default())
}

async fn settled(handle: &mut GateHandle) -> GateSnapshot {
    handle
        .wait_for(|s| {
            matches!(
                s.state,
                GateState::Unlocked { .. }
                    | GateState::Failed { .. }
                    | GateState::AwaitingPin {
                        verifying: false,
                        ..
                    }
            )
        })
        .await
        .expect("controller stopped")
}

#[tokio::test]
async fn not_enrolled_routes_to_pin_without_prompting() {
    let (mut handle, calls) = start(true, false, Verdict::Accept);
    assert!(handle.begin());

    let snapshot = settled(&mut handle).await;
    assert_eq!(
        snapshot.state,
        GateState::AwaitingPin {
            reason: PinReason::HardwareUnavailable,
            verifying: false
        }
    );
    assert!(!snapshot.biometric_ready());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn fingerprint_match_unlocks() {
    let (mut handle, calls) = start(true, true, Verdict::Accept);
    handle.begin();

    let snapshot = settled(&mut handle).await;
    assert_eq!(
        snapshot.state,
        GateState::Unlocked {
            method: AuthMethod::Biometric
        }
    );
    assert!(snapshot.last_attempt.unwrap().succeeded());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn mismatch_then_pin_unlocks() {
    let (mut handle, _) = start(true, true, Verdict::Reject);
    handle.begin();

    let snapshot = settled(&mut handle).await;
    assert_eq!(
        snapshot.state,
        GateState::Failed {
            error: AuthError::VerificationFailed(Rejection::BiometricMismatch),
            method: AuthMethod::Biometric
        }
    );

    handle.retry();
    handle.submit_pin(PinBuffer::parse("1234").unwrap());
    let snapshot = handle
        .wait_for(|s| matches!(s.state, GateState::Unlocked { .. }))
        .await
        .unwrap();
    assert_eq!(snapshot.last_attempt.unwrap().method, AuthMethod::Pin);
}

#[tokio::test]
async fn platform_failures_end_the_attempt() {
    for verdict in [Verdict::Error, Verdict::Panic] {
        let (mut handle, _) = start(true, true, verdict);
        handle.begin();

        let snapshot = settled(&mut handle).await;
        assert_eq!(
            snapshot.state,
            GateState::Failed {
                error: AuthError::PlatformError,
                method: AuthMethod::Biometric
            }
        );
        assert!(!snapshot.is_authenticating());
    }
}

#[tokio::test]
async fn hung_reader_times_out() {
    let config = AuthConfig {
        verify_timeout_secs: 1,
        ..AuthConfig::default()
    };
    let (mut handle, _) = start_with(true, true, Verdict::Hang, config);
    handle.begin();

    let snapshot = settled(&mut handle).await;
    assert!(matches!(
        snapshot.state,
        GateState::Failed {
            error: AuthError::PlatformError,
            ..
        }
    ));
}

#[tokio::test]
async fn use_pin_abandons_pending_prompt() {
    let (mut handle, _) = start(true, true, Verdict::Hang);
    handle.begin();
    handle
        .wait_for(|s| s.state == GateState::AwaitingBiometric)
        .await
        .unwrap();

    handle.use_pin();
    let snapshot = settled(&mut handle).await;
    assert_eq!(
        snapshot.state,
        GateState::AwaitingPin {
            reason: PinReason::AfterFailure,
            verifying: false
        }
    );
    assert_eq!(
        snapshot.last_attempt.unwrap().outcome,
        Err(AuthError::VerificationFailed(Rejection::Cancelled))
    );
}

#[tokio::test]
async fn use_pin_is_refused_without_device_fallback() {
    let config = AuthConfig {
        allow_device_fallback: false,
        ..AuthConfig::default()
    };
    let (mut handle, _) = start_with(true, true, Verdict::Hang, config);
    handle.begin();
    handle
        .wait_for(|s| s.state == GateState::AwaitingBiometric)
        .await
        .unwrap();

    handle.use_pin();
    let snapshot = handle
        .wait_for(|s| s.rejected.is_some())
        .await
        .unwrap();
    assert_eq!(snapshot.rejected, Some(GateError::Busy));
    assert_eq!(snapshot.state, GateState::AwaitingBiometric);

    handle.cancel();
    let snapshot = settled(&mut handle).await;
    assert_eq!(
        snapshot.state,
        GateState::Failed {
            error: AuthError::VerificationFailed(Rejection::Cancelled),
            method: AuthMethod::Biometric
        }
    );
}

#[tokio::test]
async fn wrong_pin_fails_and_allows_another_try() {
    let (mut handle, _) = start(false, false, Verdict::Accept);
    handle.use_pin();
    handle.submit_pin(PinBuffer::parse("0000").unwrap());

    let snapshot = handle
        .wait_for(|s| matches!(s.state, GateState::Failed { .. }))
        .await
        .unwrap();
    assert_eq!(
        snapshot.state,
        GateState::Failed {
            error: AuthError::VerificationFailed(Rejection::IncorrectPin),
            method: AuthMethod::Pin
        }
    );

    handle.submit_pin(PinBuffer::parse("1234").unwrap());
    let snapshot = handle
        .wait_for(|s| matches!(s.state, GateState::Unlocked { .. }))
        .await
        .unwrap();
    assert_eq!(
        snapshot.state,
        GateState::Unlocked {
            method: AuthMethod::Pin
        }
    );
}

#[tokio::test]
async fn reset_after_unlock_starts_new_session() {
    let (mut handle, calls) = start(true, true, Verdict::Accept);
    handle.begin();
    let first = settled(&mut handle).await;
    assert!(matches!(first.state, GateState::Unlocked { .. }));

    handle.reset();
    let snapshot = handle
        .wait_for(|s| s.session > first.session)
        .await
        .unwrap();
    assert_eq!(snapshot.state, GateState::Idle);
    assert!(snapshot.last_attempt.is_none());

    handle.begin();
    settled(&mut handle).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cancel_while_idle_keeps_capability_hint() {
    let (mut handle, calls) = start(true, true, Verdict::Accept);
    handle.cancel();

    let snapshot = handle
        .wait_for(|s| s.capability.is_some())
        .await
        .unwrap();
    assert!(snapshot.biometric_ready());
    assert_eq!(snapshot.state, GateState::Idle);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn dropping_every_handle_stops_the_controller() {
    let reader = FakeReader {
        hardware: true,
        enrolled: true,
        verdict: Verdict::Hang,
        calls: Arc::new(AtomicUsize::new(0)),
    };
    let (controller, handle) = GateController::new(reader, verifier(), &AuthConfig::default());
    let task = tokio::spawn(controller.run());

    handle.begin();
    drop(handle);
    task.await.unwrap();
}
