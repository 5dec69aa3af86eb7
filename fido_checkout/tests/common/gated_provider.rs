use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;

use fido_checkout::{
    Assertion, AuthenticationOptions, Credential, CredentialError, CredentialProvider,
    RegistrationOptions,
};

/// Wraps a provider, counts calls, and can hold registrations until released.
pub struct GatedProvider {
    inner: Arc<dyn CredentialProvider>,
    hold_registration: AtomicBool,
    release: Notify,
    registration_calls: AtomicUsize,
    assertion_calls: AtomicUsize,
}

impl GatedProvider {
    pub fn new(inner: Arc<dyn CredentialProvider>) -> Self {
        Self {
            inner,
            hold_registration: AtomicBool::new(false),
            release: Notify::new(),
            registration_calls: AtomicUsize::new(0),
            assertion_calls: AtomicUsize::new(0),
        }
    }

    pub fn holding_registration(self) -> Self {
        self.hold_registration.store(true, Ordering::SeqCst);
        self
    }

    pub fn release(&self) {
        self.hold_registration.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }

    pub fn registration_calls(&self) -> usize {
        self.registration_calls.load(Ordering::SeqCst)
    }

    pub fn assertion_calls(&self) -> usize {
        self.assertion_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for GatedProvider {
    fn is_supported(&self) -> bool {
        self.inner.is_supported()
    }

    async fn create_credential(
        &self,
        options: &RegistrationOptions,
    ) -> Result<Option<Credential>, CredentialError> {
        self.registration_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_registration.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        self.inner.create_credential(options).await
    }

    async fn get_assertion(
        &self,
        options: &AuthenticationOptions,
    ) -> Result<Option<Assertion>, CredentialError> {
        self.assertion_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_assertion(options).await
    }
}
