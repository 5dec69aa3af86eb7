use super::ProgressFn;
use super::challenge::{CHALLENGE_LEN, fresh_random};

use crate::ceremony::config::CeremonySettings;
use crate::ceremony::errors::AssertionError;
use crate::ceremony::ports::{CredentialProvider, RandomSource};
use crate::ceremony::types::{
    AllowCredential, AssertionPayload, AuthenticationOptions, HeldCredential,
};
use crate::checkout::TransactionContext;

/// Proves possession of the held credential and authorizes the transaction.
///
/// With a concrete identifier the authenticator is restricted to that one
/// credential; with the sentinel (or nothing held) any credential may answer.
/// Authorization is simulated: the payload is serialized, logged and dropped.
pub(crate) async fn authenticate_and_authorize(
    provider: &dyn CredentialProvider,
    random: &dyn RandomSource,
    settings: &CeremonySettings,
    held: Option<&HeldCredential>,
    transaction: &TransactionContext,
    progress: &ProgressFn<'_>,
) -> Result<(), AssertionError> {
    progress(20.0);

    let options = create_authentication_options(random, settings, held)?;
    tracing::debug!("Auth options: {:?}", options);
    progress(40.0);

    tracing::info!("Starting FIDO authentication");
    let assertion = provider
        .get_assertion(&options)
        .await
        .map_err(|e| {
            tracing::error!("FIDO authentication error: {:?}", e);
            AssertionError::from(e)
        })?
        .ok_or_else(|| {
            tracing::error!("Credential provider returned no assertion");
            AssertionError::other("no assertion returned")
        })?;

    tracing::info!("FIDO authentication successful");
    progress(70.0);

    authorize_transaction(AssertionPayload::from(assertion), transaction, settings).await
}

fn create_authentication_options(
    random: &dyn RandomSource,
    settings: &CeremonySettings,
    held: Option<&HeldCredential>,
) -> Result<AuthenticationOptions, AssertionError> {
    let allow_credentials = match held.and_then(HeldCredential::concrete) {
        Some(credential_id) => {
            let id = credential_id.to_raw().map_err(|e| {
                tracing::error!("Held credential id {} is not decodable: {}", credential_id, e);
                AssertionError::other("stored credential identifier is corrupt")
            })?;
            vec![AllowCredential {
                type_: "public-key".to_string(),
                id,
            }]
        }
        None => Vec::new(),
    };

    let challenge = fresh_random(random, CHALLENGE_LEN).map_err(|e| {
        tracing::error!("Could not generate assertion challenge: {}", e);
        AssertionError::other(&e.to_string())
    })?;

    Ok(AuthenticationOptions {
        challenge,
        timeout: settings.timeout_ms,
        rp_id: settings.rp_id.clone(),
        allow_credentials,
        user_verification: settings.user_verification.clone(),
    })
}

/// Simulated 3-D Secure authorization of the assertion.
async fn authorize_transaction(
    payload: AssertionPayload,
    transaction: &TransactionContext,
    settings: &CeremonySettings,
) -> Result<(), AssertionError> {
    let serialized = serde_json::to_string(&payload).map_err(|e| {
        tracing::error!("Failed to serialize assertion payload: {}", e);
        AssertionError::other(&e.to_string())
    })?;

    tracing::info!(
        "Processing 3DS transaction {} ({}) with FIDO assertion",
        transaction.transaction_id(),
        transaction.amount()
    );
    tracing::debug!("Assertion payload: {}", serialized);

    tokio::time::sleep(settings.pauses.authorization).await;
    Ok(())
}
