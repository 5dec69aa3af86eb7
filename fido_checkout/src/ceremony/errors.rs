use thiserror::Error;

use super::types::CeremonyStep;

/// Closed set of failures a credential provider can report.
///
/// Mirrors the platform exception categories a WebAuthn client surfaces, so the
/// flows never have to match on platform-specific error names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialErrorKind {
    /// The user dismissed the prompt, denied it, or it timed out.
    NotAllowed,
    /// The authenticator cannot satisfy the requested parameters.
    NotSupported,
    /// Registration: a credential already exists. Assertion: none is available.
    InvalidState,
    /// The calling context is not secure (e.g. not HTTPS).
    Security,
    Other,
}

/// Error returned by a [`CredentialProvider`](super::CredentialProvider).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct CredentialError {
    pub kind: CredentialErrorKind,
    pub message: String,
}

impl CredentialError {
    pub fn new(kind: CredentialErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationErrorKind {
    Unsupported,
    CancelledOrDenied,
    AlreadyExists,
    Other,
}

/// Failure of the registration flow, carrying the user-facing message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct RegistrationError {
    pub kind: RegistrationErrorKind,
    pub message: String,
}

impl RegistrationError {
    pub(crate) fn other(reason: &str) -> Self {
        Self {
            kind: RegistrationErrorKind::Other,
            message: format!(
                "Registration failed: {reason}. Please try again or use a different device."
            ),
        }
    }
}

impl From<CredentialError> for RegistrationError {
    fn from(err: CredentialError) -> Self {
        let (kind, message) = match err.kind {
            CredentialErrorKind::NotSupported => (
                RegistrationErrorKind::Unsupported,
                "FIDO is not supported on this device. Please try on a device with biometric authentication or use a security key.".to_string(),
            ),
            CredentialErrorKind::NotAllowed => (
                RegistrationErrorKind::CancelledOrDenied,
                "FIDO registration was cancelled. Please try again and allow the authentication when prompted.".to_string(),
            ),
            CredentialErrorKind::InvalidState => (
                RegistrationErrorKind::AlreadyExists,
                "A credential for this device already exists. Proceeding to authentication..."
                    .to_string(),
            ),
            CredentialErrorKind::Security | CredentialErrorKind::Other => {
                return Self::other(&err.message);
            }
        };
        Self { kind, message }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionErrorKind {
    CancelledOrTimeout,
    Unsupported,
    InsecureContext,
    NoCredentials,
    Other,
}

/// Failure of the assertion flow, carrying the user-facing message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct AssertionError {
    pub kind: AssertionErrorKind,
    pub message: String,
}

impl AssertionError {
    pub(crate) fn other(reason: &str) -> Self {
        Self {
            kind: AssertionErrorKind::Other,
            message: format!("Authentication failed: {reason}"),
        }
    }
}

impl From<CredentialError> for AssertionError {
    fn from(err: CredentialError) -> Self {
        let (kind, message) = match err.kind {
            CredentialErrorKind::NotAllowed => (
                AssertionErrorKind::CancelledOrTimeout,
                "Authentication was cancelled or timed out. Please try again.",
            ),
            CredentialErrorKind::NotSupported => (
                AssertionErrorKind::Unsupported,
                "FIDO authentication is not supported on this device.",
            ),
            CredentialErrorKind::Security => (
                AssertionErrorKind::InsecureContext,
                "Security error during authentication. Please ensure you're using HTTPS.",
            ),
            CredentialErrorKind::InvalidState => (
                AssertionErrorKind::NoCredentials,
                "No credentials available. Please register a FIDO key first.",
            ),
            CredentialErrorKind::Other => return Self::other(&err.message),
        };
        Self {
            kind,
            message: message.to_string(),
        }
    }
}

/// Errors from driving the ceremony itself (as opposed to flow failures,
/// which are states, not errors).
#[derive(Debug, Error)]
pub enum CeremonyError {
    /// The event is not defined for the current step
    #[error("Invalid transition: {event} is not accepted in step {step}")]
    InvalidTransition { step: CeremonyStep, event: String },

    /// The demo bypass edge is gated off by configuration
    #[error("Bypass is disabled for this ceremony")]
    BypassDisabled,

    /// The ceremony task has stopped (completed, cancelled or dropped)
    #[error("Ceremony is no longer running")]
    Closed,
}
