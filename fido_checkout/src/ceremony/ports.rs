use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::utils::{UtilError, gen_random_bytes};

use super::errors::CredentialError;
use super::types::{Assertion, AuthenticationOptions, Credential, RegistrationOptions};

/// Source of unpredictable bytes for challenges and user handles.
pub trait RandomSource: Send + Sync + 'static {
    /// Returns exactly `len` bytes, or an error if no secure source exists.
    fn random_bytes(&self, len: usize) -> Result<Vec<u8>, UtilError>;
}

/// Wall-clock time, injected so transaction ids and timestamps are testable.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// The host's strong-authentication credential subsystem.
///
/// `create_credential` and `get_assertion` may resolve to `Ok(None)` when the
/// platform returns nothing without raising an error; the flows treat that as
/// a generic failure.
#[async_trait]
pub trait CredentialProvider: Send + Sync + 'static {
    /// Whether the subsystem exists at all. Must be side-effect free.
    fn is_supported(&self) -> bool;

    async fn create_credential(
        &self,
        options: &RegistrationOptions,
    ) -> Result<Option<Credential>, CredentialError>;

    async fn get_assertion(
        &self,
        options: &AuthenticationOptions,
    ) -> Result<Option<Assertion>, CredentialError>;
}

/// [`RandomSource`] backed by `ring`'s system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRandomSource;

impl RandomSource for SystemRandomSource {
    fn random_bytes(&self, len: usize) -> Result<Vec<u8>, UtilError> {
        gen_random_bytes(len)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
