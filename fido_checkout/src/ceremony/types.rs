use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::{
    UtilError, base64url_bytes, base64url_bytes_opt, base64url_decode, base64url_encode,
};

use super::errors::{AssertionErrorKind, RegistrationErrorKind};

/// The step a ceremony is currently in. Exactly one is current at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CeremonyStep {
    Initializing,
    ProbingFailed,
    AwaitingRegistration,
    Registering,
    AwaitingAssertion,
    Authenticating,
    Succeeded,
    Failed,
}

impl CeremonyStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::ProbingFailed => "probing-failed",
            Self::AwaitingRegistration => "awaiting-registration",
            Self::Registering => "registering",
            Self::AwaitingAssertion => "awaiting-assertion",
            Self::Authenticating => "authenticating",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Steps during which an attempt is in flight and the progress bar runs.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Registering | Self::Authenticating)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing 3D Secure",
            Self::AwaitingRegistration | Self::Registering => "Register Security Key",
            Self::AwaitingAssertion | Self::Authenticating => "Authenticate Payment",
            Self::Succeeded => "Authentication Successful!",
            Self::ProbingFailed | Self::Failed => "Authentication Failed",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Initializing => "Preparing FIDO authentication for your transaction...",
            Self::AwaitingRegistration | Self::Registering => {
                "Set up FIDO authentication for enhanced security"
            }
            Self::AwaitingAssertion | Self::Authenticating => {
                "Use your FIDO security key to authorize this transaction"
            }
            Self::Succeeded => "Your payment has been securely authenticated",
            Self::ProbingFailed | Self::Failed => "Please try again or contact support",
        }
    }
}

impl fmt::Display for CeremonyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text-safe (base64url) form of a credential's raw identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(String);

impl CredentialId {
    pub fn from_raw(raw_id: &[u8]) -> Self {
        Self(base64url_encode(raw_id))
    }

    /// Wraps an already encoded identifier; decoding is checked lazily by [`Self::to_raw`].
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn to_raw(&self) -> Result<Vec<u8>, UtilError> {
        base64url_decode(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The credential the ceremony holds between registration and assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeldCredential {
    /// Identifier returned by a successful registration in this session.
    Registered(CredentialId),
    /// Sentinel: a credential is assumed to exist but its identifier is unknown.
    AssumedExisting,
}

impl HeldCredential {
    pub const EXISTING_SENTINEL: &'static str = "existing-credential";

    pub fn as_str(&self) -> &str {
        match self {
            Self::Registered(id) => id.as_str(),
            Self::AssumedExisting => Self::EXISTING_SENTINEL,
        }
    }

    pub fn concrete(&self) -> Option<&CredentialId> {
        match self {
            Self::Registered(id) => Some(id),
            Self::AssumedExisting => None,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RelyingParty {
    pub name: String,
    pub id: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialUserEntity {
    #[serde(with = "base64url_bytes")]
    pub id: Vec<u8>,
    pub name: String,
    pub display_name: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PubKeyCredParam {
    #[serde(rename = "type")]
    pub type_: String,
    pub alg: i32,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    pub resident_key: String,
    pub user_verification: String,
}

/// Options for `navigator.credentials.create()`-style credential creation.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    #[serde(with = "base64url_bytes")]
    pub challenge: Vec<u8>,
    pub rp: RelyingParty,
    pub user: PublicKeyCredentialUserEntity,
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    pub authenticator_selection: AuthenticatorSelection,
    pub timeout: u32,
    pub attestation: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AllowCredential {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(with = "base64url_bytes")]
    pub id: Vec<u8>,
}

/// Options for `navigator.credentials.get()`-style assertion requests.
///
/// An empty `allow_credentials` lets the authenticator pick any credential it
/// holds for the relying party.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    #[serde(with = "base64url_bytes")]
    pub challenge: Vec<u8>,
    pub timeout: u32,
    pub rp_id: String,
    pub allow_credentials: Vec<AllowCredential>,
    pub user_verification: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAttestationResponse {
    #[serde(rename = "clientDataJSON", with = "base64url_bytes")]
    pub client_data_json: Vec<u8>,
    #[serde(with = "base64url_bytes")]
    pub attestation_object: Vec<u8>,
}

/// A newly created credential as returned by the credential provider.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: String,
    #[serde(with = "base64url_bytes")]
    pub raw_id: Vec<u8>,
    #[serde(rename = "type")]
    pub type_: String,
    pub response: AuthenticatorAttestationResponse,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAssertionResponse {
    #[serde(with = "base64url_bytes")]
    pub authenticator_data: Vec<u8>,
    #[serde(rename = "clientDataJSON", with = "base64url_bytes")]
    pub client_data_json: Vec<u8>,
    #[serde(with = "base64url_bytes")]
    pub signature: Vec<u8>,
    #[serde(default, with = "base64url_bytes_opt")]
    pub user_handle: Option<Vec<u8>>,
}

/// Proof of possession returned by the credential provider.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Assertion {
    pub id: String,
    #[serde(with = "base64url_bytes")]
    pub raw_id: Vec<u8>,
    #[serde(rename = "type")]
    pub type_: String,
    pub response: AuthenticatorAssertionResponse,
}

/// Assertion reshaped for the 3-D Secure authorization hand-off.
///
/// Built once per successful assertion, serialized, and dropped.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AssertionPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(with = "base64url_bytes")]
    pub raw_id: Vec<u8>,
    pub response: AuthenticatorAssertionResponse,
}

impl From<Assertion> for AssertionPayload {
    fn from(assertion: Assertion) -> Self {
        Self {
            id: assertion.id,
            type_: assertion.type_,
            raw_id: assertion.raw_id,
            response: assertion.response,
        }
    }
}

/// Why the ceremony landed in `failed` or `probing-failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Unsupported,
    Registration(RegistrationErrorKind),
    Assertion(AssertionErrorKind),
}

/// Troubleshooting guidance shown alongside every blocking error.
pub const TROUBLESHOOTING: [&str; 4] = [
    "Ensure you're using Chrome, Firefox, Safari, or Edge",
    "Make sure the site is loaded via HTTPS (or localhost)",
    "Check if your device supports biometric authentication",
    "Try using a USB security key if available",
];
