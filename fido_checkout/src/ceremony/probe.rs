use super::ports::CredentialProvider;

pub(super) const UNSUPPORTED_MESSAGE: &str = "FIDO/WebAuthn is not supported in this browser. Please use Chrome, Firefox, Safari, or Edge.";

/// Queries the credential subsystem once at ceremony start.
pub fn probe_support(provider: &dyn CredentialProvider) -> bool {
    let supported = provider.is_supported();
    if supported {
        tracing::debug!("Credential subsystem available");
    } else {
        tracing::warn!("Credential subsystem unavailable in this environment");
    }
    supported
}
