mod config;
mod errors;
mod machine;
mod main;
mod ports;
mod probe;
mod progress;
mod runner;
mod types;

pub use config::{CeremonyPauses, CeremonySettings};

pub use errors::{
    AssertionError, AssertionErrorKind, CeremonyError, CredentialError, CredentialErrorKind,
    RegistrationError, RegistrationErrorKind,
};

pub use machine::{CeremonyEvent, CeremonyMachine, CeremonyState, Effect, transition};

pub use main::{CHALLENGE_LEN, USER_HANDLE_LEN};

pub use ports::{Clock, CredentialProvider, RandomSource, SystemClock, SystemRandomSource};

pub use probe::probe_support;

pub use progress::{PROGRESS_COMPLETE, ProgressMeter};

pub use runner::{CeremonyHandle, CeremonyPorts, CeremonyView, start_ceremony};

pub use types::{
    AllowCredential, Assertion, AssertionPayload, AuthenticationOptions,
    AuthenticatorAssertionResponse, AuthenticatorAttestationResponse, AuthenticatorSelection,
    CeremonyStep, Credential, CredentialId, FailureKind, HeldCredential, PubKeyCredParam,
    PublicKeyCredentialUserEntity, RegistrationOptions, RelyingParty, TROUBLESHOOTING,
};
