//! Shared fakes for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::ceremony::{
    Assertion, AuthenticationOptions, AuthenticatorAssertionResponse,
    AuthenticatorAttestationResponse, CeremonySettings, Clock, Credential, CredentialError,
    CredentialProvider, RandomSource, RegistrationOptions,
};
use crate::utils::{UtilError, base64url_encode};

pub(crate) fn test_settings() -> CeremonySettings {
    CeremonySettings::for_localhost()
}

/// Credential provider that replays queued results, then succeeds.
pub(crate) struct ScriptedProvider {
    supported: bool,
    registrations: Mutex<VecDeque<Result<Option<Credential>, CredentialError>>>,
    assertions: Mutex<VecDeque<Result<Option<Assertion>, CredentialError>>>,
    registration_calls: Mutex<usize>,
    assertion_options: Mutex<Vec<AuthenticationOptions>>,
}

impl ScriptedProvider {
    pub(crate) fn new() -> Self {
        Self {
            supported: true,
            registrations: Mutex::new(VecDeque::new()),
            assertions: Mutex::new(VecDeque::new()),
            registration_calls: Mutex::new(0),
            assertion_options: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    pub(crate) fn push_registration(&self, result: Result<Option<Credential>, CredentialError>) {
        self.registrations.lock().unwrap().push_back(result);
    }

    pub(crate) fn push_assertion(&self, result: Result<Option<Assertion>, CredentialError>) {
        self.assertions.lock().unwrap().push_back(result);
    }

    pub(crate) fn registration_calls(&self) -> usize {
        *self.registration_calls.lock().unwrap()
    }

    pub(crate) fn assertion_calls(&self) -> usize {
        self.assertion_options.lock().unwrap().len()
    }

    pub(crate) fn last_assertion_options(&self) -> Option<AuthenticationOptions> {
        self.assertion_options.lock().unwrap().last().cloned()
    }
}

fn default_credential() -> Credential {
    let raw_id = b"abc123".to_vec();
    Credential {
        id: base64url_encode(&raw_id),
        raw_id,
        type_: "public-key".to_string(),
        response: AuthenticatorAttestationResponse {
            client_data_json: br#"{"type":"webauthn.create"}"#.to_vec(),
            attestation_object: vec![0xa0],
        },
    }
}

fn default_assertion() -> Assertion {
    let raw_id = b"abc123".to_vec();
    Assertion {
        id: base64url_encode(&raw_id),
        raw_id,
        type_: "public-key".to_string(),
        response: AuthenticatorAssertionResponse {
            authenticator_data: vec![0; 37],
            client_data_json: br#"{"type":"webauthn.get"}"#.to_vec(),
            signature: vec![1; 70],
            user_handle: None,
        },
    }
}

#[async_trait]
impl CredentialProvider for ScriptedProvider {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn create_credential(
        &self,
        _options: &RegistrationOptions,
    ) -> Result<Option<Credential>, CredentialError> {
        *self.registration_calls.lock().unwrap() += 1;
        let next = self.registrations.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Some(default_credential())))
    }

    async fn get_assertion(
        &self,
        options: &AuthenticationOptions,
    ) -> Result<Option<Assertion>, CredentialError> {
        self.assertion_options.lock().unwrap().push(options.clone());
        let next = self.assertions.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Some(default_assertion())))
    }
}

/// Random source that repeats one byte.
pub(crate) struct FixedRandom(pub u8);

impl RandomSource for FixedRandom {
    fn random_bytes(&self, len: usize) -> Result<Vec<u8>, UtilError> {
        Ok(vec![self.0; len])
    }
}

/// Environment without a secure random source.
pub(crate) struct FailingRandom;

impl RandomSource for FailingRandom {
    fn random_bytes(&self, _len: usize) -> Result<Vec<u8>, UtilError> {
        Err(UtilError::Crypto("no secure random source".to_string()))
    }
}

pub(crate) struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub(crate) fn at_millis(millis: i64) -> Self {
        Self(
            Utc.timestamp_millis_opt(millis)
                .single()
                .expect("valid test timestamp"),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
