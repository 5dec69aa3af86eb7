use std::time::Duration;

use super::config::CeremonySettings;
use super::errors::{
    AssertionError, AssertionErrorKind, CeremonyError, RegistrationError, RegistrationErrorKind,
};
use super::probe::UNSUPPORTED_MESSAGE;
use super::types::{CeremonyStep, CredentialId, FailureKind, HeldCredential};

/// Everything that can happen to a ceremony: user actions, flow results and
/// the ceremony's own scheduled auto-advances.
#[derive(Debug, Clone, PartialEq)]
pub enum CeremonyEvent {
    ProbeCompleted { supported: bool },
    BeginRegistration,
    RegistrationSucceeded(CredentialId),
    RegistrationFailed(RegistrationError),
    BeginAssertion,
    AssertionSucceeded,
    AssertionFailed(AssertionError),
    Retry,
    Bypass,
}

impl CeremonyEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProbeCompleted { .. } => "probe-completed",
            Self::BeginRegistration => "begin-registration",
            Self::RegistrationSucceeded(_) => "registration-succeeded",
            Self::RegistrationFailed(_) => "registration-failed",
            Self::BeginAssertion => "begin-assertion",
            Self::AssertionSucceeded => "assertion-succeeded",
            Self::AssertionFailed(_) => "assertion-failed",
            Self::Retry => "retry",
            Self::Bypass => "bypass",
        }
    }
}

/// Side effects requested by a transition, performed by the runner.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    RunRegistration,
    RunAssertion(Option<HeldCredential>),
    /// Feed `event` back in after `after`, unless the ceremony moved on.
    Schedule {
        after: Duration,
        event: CeremonyEvent,
    },
    /// Hand the transaction off to the confirmation view after `after`.
    Complete { after: Duration },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CeremonyState {
    pub step: CeremonyStep,
    pub credential: Option<HeldCredential>,
    /// Blocking error shown with retry/bypass affordances.
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
    /// Non-blocking message for automatically recovered failures.
    pub notice: Option<String>,
    /// Set when `succeeded` was reached through the demo bypass.
    pub bypassed: bool,
    /// The ceremony will begin the next attempt on its own after a pause.
    pub advancing: bool,
}

impl Default for CeremonyState {
    fn default() -> Self {
        Self {
            step: CeremonyStep::Initializing,
            credential: None,
            error: None,
            failure: None,
            notice: None,
            bypassed: false,
            advancing: false,
        }
    }
}

impl CeremonyState {
    fn at(&self, step: CeremonyStep) -> Self {
        Self {
            step,
            credential: self.credential.clone(),
            error: None,
            failure: None,
            notice: None,
            bypassed: false,
            advancing: false,
        }
    }

    /// Moves to `step` and schedules `begin` after `after`.
    fn advancing_to(
        &self,
        step: CeremonyStep,
        after: Duration,
        begin: CeremonyEvent,
    ) -> (Self, Vec<Effect>) {
        let mut next = self.at(step);
        next.advancing = true;
        (next, vec![Effect::Schedule { after, event: begin }])
    }

    fn failed(&self, step: CeremonyStep, failure: FailureKind, message: String) -> Self {
        Self {
            error: Some(message),
            failure: Some(failure),
            ..self.at(step)
        }
    }

    /// Retry is offered from `failed` only; `probing-failed` is environmental.
    pub fn can_retry(&self) -> bool {
        self.step == CeremonyStep::Failed
    }

    pub fn can_bypass(&self, settings: &CeremonySettings) -> bool {
        settings.allow_bypass
            && matches!(self.step, CeremonyStep::Failed | CeremonyStep::ProbingFailed)
    }
}

/// Pure transition function of the ceremony.
///
/// Returns the next state and the effects to perform, or
/// `CeremonyError::InvalidTransition` for any event the current step does not
/// define. In particular no `Begin*` event is accepted while an attempt is in
/// flight, which keeps at most one attempt outstanding.
pub fn transition(
    state: &CeremonyState,
    event: CeremonyEvent,
    settings: &CeremonySettings,
) -> Result<(CeremonyState, Vec<Effect>), CeremonyError> {
    use CeremonyStep as S;

    let pauses = &settings.pauses;
    let next = match (state.step, event) {
        (S::Initializing, CeremonyEvent::ProbeCompleted { supported: true }) => {
            // Always start from registration so the full ceremony is shown
            let mut next = state.at(S::AwaitingRegistration);
            next.credential = None;
            (next, vec![])
        }
        (S::Initializing, CeremonyEvent::ProbeCompleted { supported: false }) => (
            state.failed(
                S::ProbingFailed,
                FailureKind::Unsupported,
                UNSUPPORTED_MESSAGE.to_string(),
            ),
            vec![],
        ),

        (S::AwaitingRegistration, CeremonyEvent::BeginRegistration) => {
            (state.at(S::Registering), vec![Effect::RunRegistration])
        }
        (S::Registering, CeremonyEvent::RegistrationSucceeded(credential_id)) => {
            let (mut next, effects) = state.advancing_to(
                S::AwaitingAssertion,
                pauses.advance_to_assertion,
                CeremonyEvent::BeginAssertion,
            );
            next.credential = Some(HeldCredential::Registered(credential_id));
            (next, effects)
        }
        (S::Registering, CeremonyEvent::RegistrationFailed(err))
            if err.kind == RegistrationErrorKind::AlreadyExists =>
        {
            let (mut next, effects) = state.advancing_to(
                S::AwaitingAssertion,
                pauses.already_exists,
                CeremonyEvent::BeginAssertion,
            );
            next.credential = Some(HeldCredential::AssumedExisting);
            next.notice = Some(err.message);
            (next, effects)
        }
        (S::Registering, CeremonyEvent::RegistrationFailed(err)) => (
            state.failed(S::Failed, FailureKind::Registration(err.kind), err.message),
            vec![],
        ),

        (S::AwaitingAssertion, CeremonyEvent::BeginAssertion) => (
            state.at(S::Authenticating),
            vec![Effect::RunAssertion(state.credential.clone())],
        ),
        (S::Authenticating, CeremonyEvent::AssertionSucceeded) => (
            state.at(S::Succeeded),
            vec![Effect::Complete {
                after: pauses.completion,
            }],
        ),
        (S::Authenticating, CeremonyEvent::AssertionFailed(err))
            if err.kind == AssertionErrorKind::NoCredentials =>
        {
            let (mut next, effects) = state.advancing_to(
                S::AwaitingRegistration,
                pauses.no_credentials,
                CeremonyEvent::BeginRegistration,
            );
            next.credential = None;
            next.notice = Some(err.message);
            (next, effects)
        }
        (S::Authenticating, CeremonyEvent::AssertionFailed(err)) => (
            state.failed(S::Failed, FailureKind::Assertion(err.kind), err.message),
            vec![],
        ),

        (S::Failed, CeremonyEvent::Retry) => {
            // Resume where the held credential allows and begin in the same step,
            // so no caller ever observes the intermediate awaiting state
            let (step, begin) = match state.credential {
                Some(_) => (S::AwaitingAssertion, CeremonyEvent::BeginAssertion),
                None => (S::AwaitingRegistration, CeremonyEvent::BeginRegistration),
            };
            return transition(&state.at(step), begin, settings);
        }
        (S::Failed | S::ProbingFailed, CeremonyEvent::Bypass) => {
            if !settings.allow_bypass {
                return Err(CeremonyError::BypassDisabled);
            }
            let mut next = state.at(S::Succeeded);
            next.bypassed = true;
            (
                next,
                vec![Effect::Complete {
                    after: pauses.completion,
                }],
            )
        }

        (step, event) => {
            return Err(CeremonyError::InvalidTransition {
                step,
                event: event.name().to_string(),
            });
        }
    };

    Ok(next)
}

/// Owns the current state and counts accepted transitions.
///
/// The epoch lets the runner discard results and scheduled events that were
/// produced for a state the ceremony has already left.
#[derive(Debug, Clone)]
pub struct CeremonyMachine {
    state: CeremonyState,
    epoch: u64,
    settings: CeremonySettings,
}

impl CeremonyMachine {
    pub fn new(settings: CeremonySettings) -> Self {
        Self {
            state: CeremonyState::default(),
            epoch: 0,
            settings,
        }
    }

    pub fn state(&self) -> &CeremonyState {
        &self.state
    }

    pub fn step(&self) -> CeremonyStep {
        self.state.step
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn settings(&self) -> &CeremonySettings {
        &self.settings
    }

    pub fn apply(&mut self, event: CeremonyEvent) -> Result<Vec<Effect>, CeremonyError> {
        let event_name = event.name();
        let (next, effects) = transition(&self.state, event, &self.settings)?;
        tracing::info!(
            "Ceremony step {} -> {} on {}",
            self.state.step,
            next.step,
            event_name
        );
        self.state = next;
        self.epoch += 1;
        Ok(effects)
    }
}
