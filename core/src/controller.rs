//! Async task that owns the gate and runs the platform calls.
//!
//! The UI sends [`GateCommand`]s and watches [`GateSnapshot`]s. The task
//! keeps at most one platform future alive; dropping it (cancel, reset or
//! teardown) abandons the call, and its ticket goes stale.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};

use crate::capability::{AuthCapability, CapabilityProbe};
use crate::config::AuthConfig;
use crate::error::{CredentialError, GateError, PlatformError};
use crate::gate::{AuthAttempt, AuthGate, GateState, Route, Ticket};
use crate::pin::{PinBuffer, PinOutcome, PinVerifier};
use crate::platform::{BiometricOutcome, BiometricPlatform, PromptConfig};

/// Requests from the UI.
#[derive(Debug)]
pub enum GateCommand {
    /// Probe capabilities and authenticate with the best method.
    Begin,
    /// Go to PIN entry; abandons a pending fingerprint prompt when allowed.
    UsePin,
    SubmitPin(PinBuffer),
    Retry,
    Cancel,
    /// Start a fresh session.
    Reset,
}

/// What the UI renders from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateSnapshot {
    pub session: u64,
    pub state: GateState,
    /// Last probe result, used for labels before the user acts.
    pub capability: Option<AuthCapability>,
    pub last_attempt: Option<AuthAttempt>,
    /// Last command the gate refused, cleared by the next accepted one.
    pub rejected: Option<GateError>,
    pub prompt: PromptConfig,
}

impl GateSnapshot {
    pub fn is_authenticating(&self) -> bool {
        self.state.is_in_flight()
    }

    pub fn biometric_ready(&self) -> bool {
        self.capability.is_some_and(|c| c.biometric_ready())
    }
}

/// Cloneable handle for sending commands and reading snapshots.
#[derive(Clone)]
pub struct GateHandle {
    commands: mpsc::UnboundedSender<GateCommand>,
    snapshots: watch::Receiver<GateSnapshot>,
}

impl GateHandle {
    /// Queue a command. Returns false if the controller has stopped.
    pub fn send(&self, command: GateCommand) -> bool {
        match self.commands.send(command) {
            Ok(()) => true,
            Err(e) => {
                warn!("Gate controller is gone, dropping {:?}", e.0);
                false
            }
        }
    }

    pub fn begin(&self) -> bool {
        self.send(GateCommand::Begin)
    }

    pub fn use_pin(&self) -> bool {
        self.send(GateCommand::UsePin)
    }

    pub fn submit_pin(&self, pin: PinBuffer) -> bool {
        self.send(GateCommand::SubmitPin(pin))
    }

    pub fn retry(&self) -> bool {
        self.send(GateCommand::Retry)
    }

    pub fn cancel(&self) -> bool {
        self.send(GateCommand::Cancel)
    }

    pub fn reset(&self) -> bool {
        self.send(GateCommand::Reset)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> GateSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Independent receiver for change polling.
    pub fn subscribe(&self) -> watch::Receiver<GateSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a snapshot satisfies `predicate`. `None` once the controller stops.
    pub async fn wait_for<F>(&mut self, predicate: F) -> Option<GateSnapshot>
    where
        F: FnMut(&GateSnapshot) -> bool,
    {
        self.snapshots
            .wait_for(predicate)
            .await
            .ok()
            .map(|snapshot| snapshot.clone())
    }
}

/// Finished platform work.
enum Completion {
    Hint(AuthCapability),
    Capability(Ticket, AuthCapability),
    Biometric(Ticket, Result<BiometricOutcome, PlatformError>),
    Pin(Ticket, Result<PinOutcome, CredentialError>),
}

type Pending = Option<BoxFuture<'static, Completion>>;

enum Step {
    Command(GateCommand),
    Done(Completion),
}

/// Owns the [`AuthGate`] for one screen instance.
pub struct GateController<P> {
    gate: AuthGate,
    platform: Arc<P>,
    probe: CapabilityProbe<P>,
    verifier: PinVerifier,
    prompt: PromptConfig,
    verify_timeout: Duration,
    commands: mpsc::UnboundedReceiver<GateCommand>,
    snapshots: watch::Sender<GateSnapshot>,
    last_attempt: Option<AuthAttempt>,
    rejected: Option<GateError>,
}

impl<P: BiometricPlatform + 'static> GateController<P> {
    pub fn new(platform: P, verifier: PinVerifier, config: &AuthConfig) -> (Self, GateHandle) {
        let platform = Arc::new(platform);
        let gate = AuthGate::new();
        let prompt = config.prompt();

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(GateSnapshot {
            session: gate.session(),
            state: gate.state().clone(),
            capability: None,
            last_attempt: None,
            rejected: None,
            prompt: prompt.clone(),
        });

        let controller = Self {
            gate,
            probe: CapabilityProbe::new(Arc::clone(&platform)),
            platform,
            verifier,
            prompt,
            verify_timeout: config.verify_timeout(),
            commands: command_rx,
            snapshots: snapshot_tx,
            last_attempt: None,
            rejected: None,
        };
        let handle = GateHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        };
        (controller, handle)
    }

    /// Process commands until every [`GateHandle`] is dropped.
    pub async fn run(mut self) {
        info!("Gate controller started");
        let mut pending: Pending = Some(self.hint_future());

        loop {
            let step = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => break,
                },
                done = next_completion(&mut pending), if pending.is_some() => Step::Done(done),
            };

            match step {
                Step::Command(command) => self.handle(command, &mut pending),
                Step::Done(done) => {
                    pending = None;
                    self.complete(done, &mut pending);
                }
            }
            self.publish();
        }

        if pending.is_some() {
            info!("Gate controller stopping; abandoning in-flight platform call");
        } else {
            info!("Gate controller stopped");
        }
    }

    fn handle(&mut self, command: GateCommand, pending: &mut Pending) {
        debug!("Gate command: {:?}", command);
        let result = match command {
            GateCommand::Begin => self.gate.begin().map(|ticket| {
                *pending = Some(self.probe_future(ticket));
            }),
            GateCommand::UsePin => {
                if matches!(self.gate.state(), GateState::AwaitingBiometric)
                    && self.prompt.allow_device_fallback
                {
                    info!("User chose PIN while fingerprint prompt was pending");
                    self.abandon(pending);
                }
                self.gate.use_pin()
            }
            GateCommand::SubmitPin(candidate) => self.gate.submit_pin(&candidate).map(|ticket| {
                *pending = Some(self.pin_future(ticket, candidate));
            }),
            GateCommand::Retry => self.gate.retry(),
            GateCommand::Cancel => {
                // Idle work such as the capability hint keeps running.
                if self.gate.is_authenticating() {
                    self.abandon(pending);
                } else {
                    debug!("Nothing to cancel while {}", self.gate.state().name());
                }
                Ok(())
            }
            GateCommand::Reset => {
                *pending = None;
                self.gate.reset();
                self.last_attempt = None;
                *pending = Some(self.hint_future());
                Ok(())
            }
        };

        match result {
            Ok(()) => self.rejected = None,
            Err(e) => {
                info!("Gate refused command: {}", e);
                self.rejected = Some(e);
            }
        }
    }

    fn abandon(&mut self, pending: &mut Pending) {
        *pending = None;
        if let Some(attempt) = self.gate.cancel() {
            self.last_attempt = Some(attempt);
        }
    }

    fn complete(&mut self, completion: Completion, pending: &mut Pending) {
        match completion {
            Completion::Hint(capability) => self.gate.set_capability_hint(capability),
            Completion::Capability(ticket, capability) => {
                match self.gate.on_capability(ticket, capability) {
                    Ok(Route::Biometric(ticket)) => {
                        *pending = Some(self.biometric_future(ticket));
                    }
                    Ok(Route::Pin) => {}
                    Err(e) => debug!("Dropped capability result: {}", e),
                }
            }
            Completion::Biometric(ticket, result) => {
                let attempt = self.gate.on_biometric(ticket, result);
                self.record(attempt);
            }
            Completion::Pin(ticket, result) => {
                let attempt = self.gate.on_pin(ticket, result);
                self.record(attempt);
            }
        }
    }

    fn record(&mut self, attempt: Result<AuthAttempt, GateError>) {
        match attempt {
            Ok(attempt) => {
                info!(
                    "Attempt finished: method={:?}, success={}, at {}",
                    attempt.method,
                    attempt.succeeded(),
                    attempt.timestamp.to_rfc3339()
                );
                self.last_attempt = Some(attempt);
            }
            Err(e) => debug!("Dropped attempt result: {}", e),
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(GateSnapshot {
            session: self.gate.session(),
            state: self.gate.state().clone(),
            capability: self.gate.capability(),
            last_attempt: self.last_attempt.clone(),
            rejected: self.rejected.clone(),
            prompt: self.prompt.clone(),
        });
    }

    fn hint_future(&self) -> BoxFuture<'static, Completion> {
        let probe = self.probe.clone();
        async move { Completion::Hint(guarded_probe(&probe).await) }.boxed()
    }

    fn probe_future(&self, ticket: Ticket) -> BoxFuture<'static, Completion> {
        let probe = self.probe.clone();
        async move { Completion::Capability(ticket, guarded_probe(&probe).await) }.boxed()
    }

    fn biometric_future(&self, ticket: Ticket) -> BoxFuture<'static, Completion> {
        let platform = Arc::clone(&self.platform);
        let prompt = self.prompt.clone();
        let timeout = self.verify_timeout;

        async move {
            let call = AssertUnwindSafe(platform.authenticate(&prompt)).catch_unwind();
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => {
                    error!("Biometric platform call panicked");
                    Err(PlatformError::Panicked)
                }
                Err(_) => Err(PlatformError::Timeout(timeout.as_secs())),
            };
            Completion::Biometric(ticket, result)
        }
        .boxed()
    }

    fn pin_future(&self, ticket: Ticket, candidate: PinBuffer) -> BoxFuture<'static, Completion> {
        let verifier = self.verifier.clone();

        async move {
            let result = match tokio::task::spawn_blocking(move || verifier.verify(&candidate)).await
            {
                Ok(result) => result,
                Err(e) => Err(CredentialError::Task(e.to_string())),
            };
            Completion::Pin(ticket, result)
        }
        .boxed()
    }
}

/// Probe that also fails closed if the platform panics.
async fn guarded_probe<P: BiometricPlatform>(probe: &CapabilityProbe<P>) -> AuthCapability {
    match AssertUnwindSafe(probe.probe()).catch_unwind().await {
        Ok(capability) => capability,
        Err(_) => {
            error!("Capability probe panicked, falling back to PIN");
            AuthCapability::default()
        }
    }
}

async fn next_completion(pending: &mut Pending) -> Completion {
    match pending {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}
