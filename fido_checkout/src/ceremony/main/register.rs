use super::ProgressFn;
use super::challenge::{CHALLENGE_LEN, USER_HANDLE_LEN, fresh_random};

use crate::ceremony::config::CeremonySettings;
use crate::ceremony::errors::RegistrationError;
use crate::ceremony::ports::{CredentialProvider, RandomSource};
use crate::ceremony::types::{
    AuthenticatorSelection, CredentialId, PubKeyCredParam, PublicKeyCredentialUserEntity,
    RegistrationOptions, RelyingParty,
};
use crate::utils::UtilError;

/// COSE algorithm identifiers accepted for the new key pair.
const COSE_ALG_ES256: i32 = -7;
const COSE_ALG_RS256: i32 = -257;

/// Creates a new credential bound to this relying party and a synthetic user.
///
/// Returns the text-encoded identifier of the new credential. A credential
/// that already exists surfaces as `RegistrationErrorKind::AlreadyExists`;
/// the state machine decides what that means.
pub(crate) async fn register_credential(
    provider: &dyn CredentialProvider,
    random: &dyn RandomSource,
    settings: &CeremonySettings,
    progress: &ProgressFn<'_>,
) -> Result<CredentialId, RegistrationError> {
    let options = create_registration_options(random, settings).map_err(|e| {
        tracing::error!("Could not build registration options: {}", e);
        RegistrationError::other(&e.to_string())
    })?;

    tracing::debug!("Registration options: {:?}", options);
    progress(30.0);

    tracing::info!("Starting FIDO registration");
    let credential = provider
        .create_credential(&options)
        .await
        .map_err(|e| {
            tracing::error!("FIDO registration error: {:?}", e);
            RegistrationError::from(e)
        })?
        .ok_or_else(|| {
            tracing::error!("Credential provider returned no credential");
            RegistrationError::other("Failed to create credential")
        })?;

    tracing::info!("FIDO credential created successfully");
    progress(70.0);

    let credential_id = CredentialId::from_raw(&credential.raw_id);
    tracing::debug!("New credential id: {}", credential_id);

    // Stands in for posting the credential to a registration endpoint
    tokio::time::sleep(settings.pauses.registration_sync).await;

    Ok(credential_id)
}

fn create_registration_options(
    random: &dyn RandomSource,
    settings: &CeremonySettings,
) -> Result<RegistrationOptions, UtilError> {
    let challenge = fresh_random(random, CHALLENGE_LEN)?;
    let user_handle = fresh_random(random, USER_HANDLE_LEN)?;

    Ok(RegistrationOptions {
        challenge,
        rp: RelyingParty {
            name: settings.rp_name.clone(),
            id: settings.rp_id.clone(),
        },
        user: PublicKeyCredentialUserEntity {
            id: user_handle,
            name: settings.user_name.clone(),
            display_name: settings.user_display_name.clone(),
        },
        pub_key_cred_params: vec![
            PubKeyCredParam {
                type_: "public-key".to_string(),
                alg: COSE_ALG_ES256,
            },
            PubKeyCredParam {
                type_: "public-key".to_string(),
                alg: COSE_ALG_RS256,
            },
        ],
        authenticator_selection: AuthenticatorSelection {
            resident_key: settings.resident_key.clone(),
            user_verification: settings.user_verification.clone(),
        },
        timeout: settings.timeout_ms,
        attestation: settings.attestation.clone(),
    })
}
