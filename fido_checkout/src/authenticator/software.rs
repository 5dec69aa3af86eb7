use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use ciborium::value::Value as CborValue;
use ring::rand::SystemRandom;
use ring::signature::{ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair, KeyPair};
use sha2::{Digest, Sha256};

use crate::ceremony::{
    Assertion, AuthenticationOptions, AuthenticatorAssertionResponse,
    AuthenticatorAttestationResponse, Credential, CredentialError, CredentialErrorKind,
    CredentialProvider, RegistrationOptions,
};
use crate::utils::{base64url_encode, gen_random_bytes};

const COSE_ALG_ES256: i32 = -7;
const CREDENTIAL_ID_LEN: usize = 32;

const FLAG_UP: u8 = 0x01;
const FLAG_UV: u8 = 0x04;
const FLAG_AT: u8 = 0x40;

/// Identifies this authenticator model in attested credential data.
const AAGUID: [u8; 16] = *b"fido-checkout-sw";

struct StoredCredential {
    id: Vec<u8>,
    rp_id: String,
    user_handle: Vec<u8>,
    key_pair: EcdsaKeyPair,
    sign_count: u32,
}

/// In-memory P-256 authenticator that answers credential requests locally.
///
/// Produces `none` attestation objects and real ECDSA signatures over
/// `authenticatorData || SHA-256(clientDataJSON)`, so its output can be fed to
/// an ordinary WebAuthn verifier. Failures can be queued to exercise the
/// ceremony's error paths.
pub struct SoftwareAuthenticator {
    origin: String,
    supported: bool,
    reject_duplicates: bool,
    rng: SystemRandom,
    credentials: Mutex<Vec<StoredCredential>>,
    registration_failures: Mutex<VecDeque<CredentialError>>,
    assertion_failures: Mutex<VecDeque<CredentialError>>,
}

impl SoftwareAuthenticator {
    /// Authenticator for a client running at `origin`.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            supported: true,
            reject_duplicates: false,
            rng: SystemRandom::new(),
            credentials: Mutex::new(Vec::new()),
            registration_failures: Mutex::new(VecDeque::new()),
            assertion_failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Reports the credential subsystem as absent.
    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    /// Refuse to create a second credential for a relying party, the way
    /// platform authenticators do for an excluded credential.
    pub fn rejecting_duplicates(mut self) -> Self {
        self.reject_duplicates = true;
        self
    }

    /// Makes the next `create_credential` call fail with `kind`.
    pub fn fail_next_registration(&self, kind: CredentialErrorKind, message: &str) {
        if let Ok(mut queue) = self.registration_failures.lock() {
            queue.push_back(CredentialError::new(kind, message));
        }
    }

    /// Makes the next `get_assertion` call fail with `kind`.
    pub fn fail_next_assertion(&self, kind: CredentialErrorKind, message: &str) {
        if let Ok(mut queue) = self.assertion_failures.lock() {
            queue.push_back(CredentialError::new(kind, message));
        }
    }

    pub fn credential_count(&self) -> usize {
        self.credentials.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn next_failure(queue: &Mutex<VecDeque<CredentialError>>) -> Option<CredentialError> {
        queue.lock().ok().and_then(|mut q| q.pop_front())
    }

    fn client_data(&self, type_: &str, challenge: &[u8]) -> Result<Vec<u8>, CredentialError> {
        let client_data = serde_json::json!({
            "type": type_,
            "challenge": base64url_encode(challenge),
            "origin": self.origin,
            "crossOrigin": false,
        });
        serde_json::to_vec(&client_data)
            .map_err(|e| CredentialError::new(CredentialErrorKind::Other, e.to_string()))
    }

    fn generate_key_pair(&self) -> Result<EcdsaKeyPair, CredentialError> {
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &self.rng)
            .map_err(|_| other("key generation failed"))?;
        EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref(), &self.rng)
            .map_err(|e| other(&format!("key rejected: {e}")))
    }
}

fn other(message: &str) -> CredentialError {
    CredentialError::new(CredentialErrorKind::Other, message)
}

fn rp_id_hash(rp_id: &str) -> [u8; 32] {
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&Sha256::digest(rp_id.as_bytes()));
    hash
}

/// COSE_Key map for an uncompressed SEC1 P-256 point (kty=EC2, alg=ES256, crv=P-256).
fn encode_cose_key(public_key: &[u8]) -> Result<Vec<u8>, CredentialError> {
    let (x, y) = match public_key {
        [0x04, rest @ ..] if rest.len() == 64 => rest.split_at(32),
        _ => return Err(other("unexpected public key encoding")),
    };
    let map = CborValue::Map(vec![
        (CborValue::Integer(1i64.into()), CborValue::Integer(2i64.into())),
        (
            CborValue::Integer(3i64.into()),
            CborValue::Integer(i64::from(COSE_ALG_ES256).into()),
        ),
        (CborValue::Integer((-1i64).into()), CborValue::Integer(1i64.into())),
        (CborValue::Integer((-2i64).into()), CborValue::Bytes(x.to_vec())),
        (CborValue::Integer((-3i64).into()), CborValue::Bytes(y.to_vec())),
    ]);
    let mut buf = Vec::new();
    ciborium::ser::into_writer(&map, &mut buf)
        .map_err(|e| other(&format!("COSE key encoding failed: {e}")))?;
    Ok(buf)
}

fn make_credential_auth_data(
    rp_id: &str,
    credential_id: &[u8],
    public_key: &[u8],
) -> Result<Vec<u8>, CredentialError> {
    let cose_key = encode_cose_key(public_key)?;
    let id_len = u16::try_from(credential_id.len()).map_err(|_| other("credential id too long"))?;

    let mut data = Vec::with_capacity(37 + 16 + 2 + credential_id.len() + cose_key.len());
    data.extend_from_slice(&rp_id_hash(rp_id));
    data.push(FLAG_UP | FLAG_UV | FLAG_AT);
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(&AAGUID);
    data.extend_from_slice(&id_len.to_be_bytes());
    data.extend_from_slice(credential_id);
    data.extend_from_slice(&cose_key);
    Ok(data)
}

fn get_assertion_auth_data(rp_id: &str, sign_count: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(37);
    data.extend_from_slice(&rp_id_hash(rp_id));
    data.push(FLAG_UP | FLAG_UV);
    data.extend_from_slice(&sign_count.to_be_bytes());
    data
}

fn none_attestation_object(auth_data: Vec<u8>) -> Result<Vec<u8>, CredentialError> {
    let object = CborValue::Map(vec![
        (
            CborValue::Text("fmt".to_string()),
            CborValue::Text("none".to_string()),
        ),
        (CborValue::Text("attStmt".to_string()), CborValue::Map(vec![])),
        (CborValue::Text("authData".to_string()), CborValue::Bytes(auth_data)),
    ]);
    let mut buf = Vec::new();
    ciborium::ser::into_writer(&object, &mut buf)
        .map_err(|e| other(&format!("attestation encoding failed: {e}")))?;
    Ok(buf)
}

#[async_trait]
impl CredentialProvider for SoftwareAuthenticator {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn create_credential(
        &self,
        options: &RegistrationOptions,
    ) -> Result<Option<Credential>, CredentialError> {
        if let Some(failure) = Self::next_failure(&self.registration_failures) {
            tracing::debug!("Injected registration failure: {:?}", failure.kind);
            return Err(failure);
        }
        if !options
            .pub_key_cred_params
            .iter()
            .any(|p| p.type_ == "public-key" && p.alg == COSE_ALG_ES256)
        {
            return Err(CredentialError::new(
                CredentialErrorKind::NotSupported,
                "no supported public key algorithm requested",
            ));
        }

        let rp_id = options.rp.id.as_str();
        if self.reject_duplicates {
            let credentials = self
                .credentials
                .lock()
                .map_err(|_| other("credential store poisoned"))?;
            if credentials.iter().any(|c| c.rp_id == rp_id) {
                return Err(CredentialError::new(
                    CredentialErrorKind::InvalidState,
                    "the authenticator already contains a credential for this relying party",
                ));
            }
        }

        let credential_id =
            gen_random_bytes(CREDENTIAL_ID_LEN).map_err(|e| other(&e.to_string()))?;
        let key_pair = self.generate_key_pair()?;
        let auth_data =
            make_credential_auth_data(rp_id, &credential_id, key_pair.public_key().as_ref())?;
        let attestation_object = none_attestation_object(auth_data)?;
        let client_data_json = self.client_data("webauthn.create", &options.challenge)?;

        self.credentials
            .lock()
            .map_err(|_| other("credential store poisoned"))?
            .push(StoredCredential {
                id: credential_id.clone(),
                rp_id: rp_id.to_string(),
                user_handle: options.user.id.clone(),
                key_pair,
                sign_count: 0,
            });
        tracing::debug!("Software authenticator created credential for {}", rp_id);

        Ok(Some(Credential {
            id: base64url_encode(&credential_id),
            raw_id: credential_id,
            type_: "public-key".to_string(),
            response: AuthenticatorAttestationResponse {
                client_data_json,
                attestation_object,
            },
        }))
    }

    async fn get_assertion(
        &self,
        options: &AuthenticationOptions,
    ) -> Result<Option<Assertion>, CredentialError> {
        if let Some(failure) = Self::next_failure(&self.assertion_failures) {
            tracing::debug!("Injected assertion failure: {:?}", failure.kind);
            return Err(failure);
        }

        let client_data_json = self.client_data("webauthn.get", &options.challenge)?;
        let client_data_hash = Sha256::digest(&client_data_json);

        let mut credentials = self
            .credentials
            .lock()
            .map_err(|_| other("credential store poisoned"))?;
        let credential = credentials
            .iter_mut()
            .filter(|c| c.rp_id == options.rp_id)
            .find(|c| {
                options.allow_credentials.is_empty()
                    || options.allow_credentials.iter().any(|a| a.id == c.id)
            })
            .ok_or_else(|| {
                CredentialError::new(
                    CredentialErrorKind::InvalidState,
                    "no matching credential on this authenticator",
                )
            })?;

        credential.sign_count = credential.sign_count.wrapping_add(1);
        let authenticator_data = get_assertion_auth_data(&credential.rp_id, credential.sign_count);

        let mut signed_data = authenticator_data.clone();
        signed_data.extend_from_slice(&client_data_hash);
        let signature = credential
            .key_pair
            .sign(&self.rng, &signed_data)
            .map_err(|_| other("signing failed"))?;

        Ok(Some(Assertion {
            id: base64url_encode(&credential.id),
            raw_id: credential.id.clone(),
            type_: "public-key".to_string(),
            response: AuthenticatorAssertionResponse {
                authenticator_data,
                client_data_json,
                signature: signature.as_ref().to_vec(),
                user_handle: Some(credential.user_handle.clone()),
            },
        }))
    }
}
