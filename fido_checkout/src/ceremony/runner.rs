use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::Instrument;
use uuid::Uuid;

use crate::checkout::{ConfirmationHandoff, TransactionContext};

use super::config::CeremonySettings;
use super::errors::{AssertionError, CeremonyError, RegistrationError};
use super::machine::{CeremonyEvent, CeremonyMachine, Effect};
use super::main::{authenticate_and_authorize, register_credential};
use super::ports::{CredentialProvider, RandomSource, SystemRandomSource};
use super::probe::probe_support;
use super::progress::{ProgressMeter, ProgressTicker, next_tick};
use super::types::{CeremonyStep, FailureKind, HeldCredential, TROUBLESHOOTING};

const COMMAND_BUFFER: usize = 8;

/// External capabilities a ceremony runs against.
#[derive(Clone)]
pub struct CeremonyPorts {
    pub provider: Arc<dyn CredentialProvider>,
    pub random: Arc<dyn RandomSource>,
}

impl CeremonyPorts {
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
        Self {
            provider,
            random: Arc::new(SystemRandomSource),
        }
    }

    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }
}

/// Snapshot of everything a presentation layer needs to render the ceremony.
#[derive(Debug, Clone, PartialEq)]
pub struct CeremonyView {
    pub ceremony_id: String,
    pub step: CeremonyStep,
    pub progress: f64,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub failure: Option<FailureKind>,
    pub credential: Option<HeldCredential>,
    pub can_retry: bool,
    pub can_bypass: bool,
    /// Non-empty exactly when a blocking error is shown.
    pub troubleshooting: Vec<&'static str>,
    pub transaction: TransactionContext,
    pub bypassed: bool,
    /// The ceremony begins the next attempt itself; callers should wait.
    pub advancing: bool,
    /// Set once the ceremony has handed off to the confirmation view.
    pub completion: Option<ConfirmationHandoff>,
}

enum Command {
    Action {
        event: CeremonyEvent,
        reply: oneshot::Sender<Result<(), CeremonyError>>,
    },
    Cancel,
}

enum Outcome {
    Event(CeremonyEvent),
    Complete,
}

/// Starts a ceremony for `transaction` on the current tokio runtime.
///
/// The ceremony probes the provider right away and then waits in
/// `awaiting-registration` for [`CeremonyHandle::register`]. Dropping every
/// handle (or calling [`CeremonyHandle::cancel`]) stops all timers and
/// abandons any pending provider request.
pub fn start_ceremony(
    transaction: TransactionContext,
    ports: CeremonyPorts,
    settings: CeremonySettings,
) -> CeremonyHandle {
    let ceremony_id = Uuid::new_v4().to_string();
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (milestone_tx, milestone_rx) = mpsc::unbounded_channel();

    let settings = Arc::new(settings);
    let actor = CeremonyActor {
        id: ceremony_id.clone(),
        machine: CeremonyMachine::new(settings.as_ref().clone()),
        meter: ProgressMeter::new(settings.progress_ceiling, settings.progress_max_step),
        ticker: None,
        tasks: JoinSet::new(),
        milestones: milestone_tx,
        completion: None,
        done: false,
        view: watch::Sender::new(initial_view(&ceremony_id, &transaction)),
        transaction,
        ports,
        settings,
    };
    let view_rx = actor.view.subscribe();

    tracing::info!(
        "Starting FIDO ceremony {} for transaction {}",
        ceremony_id,
        actor.transaction.transaction_id()
    );
    let span = tracing::info_span!("ceremony", id = %ceremony_id);
    tokio::spawn(actor.run(command_rx, milestone_rx).instrument(span));

    CeremonyHandle {
        commands: command_tx,
        view: view_rx,
    }
}

fn initial_view(ceremony_id: &str, transaction: &TransactionContext) -> CeremonyView {
    CeremonyView {
        ceremony_id: ceremony_id.to_string(),
        step: CeremonyStep::Initializing,
        progress: 0.0,
        error: None,
        notice: None,
        failure: None,
        credential: None,
        can_retry: false,
        can_bypass: false,
        troubleshooting: Vec::new(),
        transaction: transaction.clone(),
        bypassed: false,
        advancing: false,
        completion: None,
    }
}

/// Client side of a running ceremony.
#[derive(Clone)]
pub struct CeremonyHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<CeremonyView>,
}

impl CeremonyHandle {
    /// Begin registration. Only accepted in `awaiting-registration`.
    ///
    /// While [`CeremonyView::advancing`] is set the ceremony will begin on its
    /// own; calling this earlier takes over and the scheduled begin is dropped.
    pub async fn register(&self) -> Result<(), CeremonyError> {
        self.send(CeremonyEvent::BeginRegistration).await
    }

    /// Begin the assertion. Only accepted in `awaiting-assertion`.
    pub async fn authenticate(&self) -> Result<(), CeremonyError> {
        self.send(CeremonyEvent::BeginAssertion).await
    }

    /// Starts a new attempt from `failed`, resuming at the assertion when a
    /// credential is held. The attempt is in flight once this returns.
    pub async fn retry(&self) -> Result<(), CeremonyError> {
        self.send(CeremonyEvent::Retry).await
    }

    /// Demo bypass: complete the ceremony despite a failure.
    pub async fn bypass(&self) -> Result<(), CeremonyError> {
        self.send(CeremonyEvent::Bypass).await
    }

    pub async fn cancel(&self) {
        if self.commands.send(Command::Cancel).await.is_err() {
            tracing::debug!("Ceremony already stopped");
        }
    }

    pub fn view(&self) -> CeremonyView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CeremonyView> {
        self.view.clone()
    }

    /// Waits until the ceremony reaches `step`.
    pub async fn wait_for_step(&self, step: CeremonyStep) -> Result<CeremonyView, CeremonyError> {
        self.wait_until(|view| view.step == step).await
    }

    /// Waits for the confirmation hand-off.
    pub async fn completion(&self) -> Result<ConfirmationHandoff, CeremonyError> {
        let view = self.wait_until(|view| view.completion.is_some()).await?;
        view.completion.ok_or(CeremonyError::Closed)
    }

    async fn wait_until(
        &self,
        condition: impl FnMut(&CeremonyView) -> bool,
    ) -> Result<CeremonyView, CeremonyError> {
        let mut rx = self.view.clone();
        let view = rx
            .wait_for(condition)
            .await
            .map_err(|_| CeremonyError::Closed)?;
        Ok(view.clone())
    }

    async fn send(&self, event: CeremonyEvent) -> Result<(), CeremonyError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Action { event, reply })
            .await
            .map_err(|_| CeremonyError::Closed)?;
        response.await.map_err(|_| CeremonyError::Closed)?
    }
}

/// Owns the machine and every timer or request started on its behalf.
///
/// Results and scheduled events are tagged with the machine epoch at the time
/// they were started; anything arriving for an older epoch is dropped.
struct CeremonyActor {
    id: String,
    machine: CeremonyMachine,
    transaction: TransactionContext,
    ports: CeremonyPorts,
    settings: Arc<CeremonySettings>,
    meter: ProgressMeter,
    ticker: Option<ProgressTicker>,
    tasks: JoinSet<(u64, Outcome)>,
    milestones: mpsc::UnboundedSender<(u64, f64)>,
    view: watch::Sender<CeremonyView>,
    completion: Option<ConfirmationHandoff>,
    done: bool,
}

impl CeremonyActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut milestones: mpsc::UnboundedReceiver<(u64, f64)>,
    ) {
        self.probe();

        while !self.done {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Action { event, reply }) => {
                        let result = self.dispatch(event);
                        if reply.send(result).is_err() {
                            tracing::debug!("Caller went away before the reply");
                        }
                    }
                    Some(Command::Cancel) | None => {
                        tracing::info!("Ceremony {} cancelled", self.id);
                        break;
                    }
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.on_task_finished(joined);
                }
                Some((epoch, value)) = milestones.recv() => self.on_milestone(epoch, value),
                _ = next_tick(&mut self.ticker) => self.on_tick(),
            }
        }

        self.tasks.abort_all();
        self.ticker = None;
        tracing::debug!("Ceremony {} stopped", self.id);
    }

    fn probe(&mut self) {
        if probe_support(self.ports.provider.as_ref()) {
            self.perform(Effect::Schedule {
                after: self.settings.pauses.probe,
                event: CeremonyEvent::ProbeCompleted { supported: true },
            });
        } else if let Err(e) = self.dispatch(CeremonyEvent::ProbeCompleted { supported: false }) {
            tracing::error!("Failed to record probe result: {}", e);
        }
    }

    fn dispatch(&mut self, event: CeremonyEvent) -> Result<(), CeremonyError> {
        let was_in_flight = self.machine.step().is_in_flight();
        let effects = self.machine.apply(event).inspect_err(|e| {
            tracing::warn!("Rejected ceremony event: {}", e);
        })?;

        let step = self.machine.step();
        if step.is_in_flight() {
            self.meter.reset();
            self.ticker = Some(ProgressTicker::start(self.settings.progress_interval));
        } else if was_in_flight {
            self.ticker = None;
            self.meter.complete();
        }

        for effect in effects {
            self.perform(effect);
        }
        self.publish();
        Ok(())
    }

    fn perform(&mut self, effect: Effect) {
        let epoch = self.machine.epoch();
        match effect {
            Effect::RunRegistration => {
                let provider = Arc::clone(&self.ports.provider);
                let random = Arc::clone(&self.ports.random);
                let settings = Arc::clone(&self.settings);
                let milestones = self.milestones.clone();
                self.tasks.spawn(async move {
                    let progress = move |value: f64| {
                        let _ = milestones.send((epoch, value));
                    };
                    let event = match register_credential(
                        provider.as_ref(),
                        random.as_ref(),
                        &settings,
                        &progress,
                    )
                    .await
                    {
                        Ok(credential_id) => CeremonyEvent::RegistrationSucceeded(credential_id),
                        Err(e) => CeremonyEvent::RegistrationFailed(e),
                    };
                    (epoch, Outcome::Event(event))
                });
            }
            Effect::RunAssertion(held) => {
                let provider = Arc::clone(&self.ports.provider);
                let random = Arc::clone(&self.ports.random);
                let settings = Arc::clone(&self.settings);
                let milestones = self.milestones.clone();
                let transaction = self.transaction.clone();
                self.tasks.spawn(async move {
                    let progress = move |value: f64| {
                        let _ = milestones.send((epoch, value));
                    };
                    let event = match authenticate_and_authorize(
                        provider.as_ref(),
                        random.as_ref(),
                        &settings,
                        held.as_ref(),
                        &transaction,
                        &progress,
                    )
                    .await
                    {
                        Ok(()) => CeremonyEvent::AssertionSucceeded,
                        Err(e) => CeremonyEvent::AssertionFailed(e),
                    };
                    (epoch, Outcome::Event(event))
                });
            }
            Effect::Schedule { after, event } => {
                self.tasks.spawn(async move {
                    tokio::time::sleep(after).await;
                    (epoch, Outcome::Event(event))
                });
            }
            Effect::Complete { after } => {
                self.tasks.spawn(async move {
                    tokio::time::sleep(after).await;
                    (epoch, Outcome::Complete)
                });
            }
        }
    }

    fn on_task_finished(&mut self, joined: Result<(u64, Outcome), JoinError>) {
        match joined {
            Ok((epoch, _)) if epoch != self.machine.epoch() => {
                tracing::debug!(
                    "Discarding result from epoch {} (now {})",
                    epoch,
                    self.machine.epoch()
                );
            }
            Ok((_, Outcome::Event(event))) => {
                if let Err(e) = self.dispatch(event) {
                    tracing::error!("Ceremony could not apply its own event: {}", e);
                }
            }
            Ok((_, Outcome::Complete)) => self.complete(),
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                tracing::error!("Ceremony task failed: {}", e);
                // Turn a crashed attempt into an ordinary failure instead of hanging
                let event = match self.machine.step() {
                    CeremonyStep::Registering => {
                        CeremonyEvent::RegistrationFailed(RegistrationError::other("internal error"))
                    }
                    CeremonyStep::Authenticating => {
                        CeremonyEvent::AssertionFailed(AssertionError::other("internal error"))
                    }
                    _ => return,
                };
                if let Err(e) = self.dispatch(event) {
                    tracing::error!("Failed to record crashed attempt: {}", e);
                }
            }
        }
    }

    fn on_milestone(&mut self, epoch: u64, value: f64) {
        if epoch == self.machine.epoch() && self.machine.step().is_in_flight() {
            self.meter.raise_to(value);
            self.publish();
        }
    }

    fn on_tick(&mut self) {
        let entropy = self
            .ports
            .random
            .random_bytes(1)
            .ok()
            .and_then(|bytes| bytes.first().copied())
            .unwrap_or(u8::MAX / 2);
        self.meter.tick(entropy);
        self.publish();
    }

    fn complete(&mut self) {
        let handoff = self.transaction.confirmation();
        tracing::info!(
            "FIDO ceremony {} complete, continuing to {}",
            self.id,
            handoff.to_url()
        );
        self.completion = Some(handoff);
        self.done = true;
        self.publish();
    }

    fn publish(&self) {
        let state = self.machine.state();
        let view = CeremonyView {
            ceremony_id: self.id.clone(),
            step: state.step,
            progress: self.meter.value(),
            error: state.error.clone(),
            notice: state.notice.clone(),
            failure: state.failure,
            credential: state.credential.clone(),
            can_retry: state.can_retry(),
            can_bypass: state.can_bypass(self.machine.settings()),
            troubleshooting: if state.error.is_some() {
                TROUBLESHOOTING.to_vec()
            } else {
                Vec::new()
            },
            transaction: self.transaction.clone(),
            bypassed: state.bypassed,
            advancing: state.advancing,
            completion: self.completion.clone(),
        };
        self.view.send_replace(view);
    }
}
