use std::sync::Arc;
use std::time::Duration;

use fido_checkout::{
    Amount, CeremonyHandle, CeremonyPorts, CeremonySettings, CeremonyStep, CeremonyView,
    CredentialProvider, SoftwareAuthenticator, TransactionContext, start_ceremony,
};

pub const TEST_ORIGIN: &str = "http://localhost:3000";
pub const TEST_TRANSACTION_ID: &str = "TX-1700000000000";

/// Upper bound for any single wait; scenarios normally take a few milliseconds.
pub const WAIT: Duration = Duration::from_secs(5);

pub fn test_settings() -> CeremonySettings {
    CeremonySettings::for_localhost()
}

pub fn test_transaction() -> TransactionContext {
    TransactionContext::new(TEST_TRANSACTION_ID, Amount::new(1563.84).unwrap())
}

pub fn software_authenticator() -> Arc<SoftwareAuthenticator> {
    Arc::new(SoftwareAuthenticator::new(TEST_ORIGIN))
}

pub fn start_with(provider: Arc<dyn CredentialProvider>, settings: CeremonySettings) -> CeremonyHandle {
    start_ceremony(test_transaction(), CeremonyPorts::new(provider), settings)
}

/// Waits for `step`, failing the test instead of hanging.
pub async fn reach(handle: &CeremonyHandle, step: CeremonyStep) -> CeremonyView {
    tokio::time::timeout(WAIT, handle.wait_for_step(step))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {step}, last view: {:?}", handle.view()))
        .unwrap_or_else(|e| panic!("ceremony stopped before {step}: {e}"))
}

/// Starts a ceremony and begins registration once the probe has passed.
pub async fn start_and_register(
    provider: Arc<dyn CredentialProvider>,
    settings: CeremonySettings,
) -> CeremonyHandle {
    let handle = start_with(provider, settings);
    reach(&handle, CeremonyStep::AwaitingRegistration).await;
    handle.register().await.expect("registration should start");
    handle
}
