//! fido_checkout - simulated storefront checkout gated by a FIDO2/WebAuthn ceremony
//!
//! Checkout submission hands a [`TransactionContext`] to an authentication
//! ceremony that probes for a credential provider, registers a credential,
//! asserts it, and hands the transaction on to order confirmation. The
//! ceremony is a pure transition function ([`transition`]) driven by a tokio
//! task ([`start_ceremony`]) that owns every timer and pending request.

mod authenticator;
mod ceremony;
mod checkout;
mod config;
mod utils;

#[cfg(test)]
mod test_utils;

pub use config::{CHECKOUT_CEREMONY_PATH, CHECKOUT_CONFIRMATION_PATH};

pub use authenticator::SoftwareAuthenticator;

pub use ceremony::{
    AllowCredential, Assertion, AssertionError, AssertionErrorKind, AssertionPayload,
    AuthenticationOptions, AuthenticatorAssertionResponse, AuthenticatorAttestationResponse,
    AuthenticatorSelection, CHALLENGE_LEN, CeremonyError, CeremonyEvent, CeremonyHandle,
    CeremonyMachine, CeremonyPauses, CeremonyPorts, CeremonySettings, CeremonyState,
    CeremonyStep, CeremonyView, Clock, Credential, CredentialError, CredentialErrorKind,
    CredentialId, CredentialProvider, Effect, FailureKind, HeldCredential, PROGRESS_COMPLETE,
    ProgressMeter, PubKeyCredParam, PublicKeyCredentialUserEntity, RandomSource,
    RegistrationError, RegistrationErrorKind, RegistrationOptions, RelyingParty, SystemClock,
    SystemRandomSource, TROUBLESHOOTING, USER_HANDLE_LEN, probe_support, start_ceremony,
    transition,
};

pub use checkout::{
    Amount, CeremonyEntry, CheckoutError, CheckoutRedirect, ConfirmationHandoff, OrderTotals,
    PaymentMethod, PaymentReceipt, TransactionContext, calculate_shipping, calculate_tax,
    initiate_checkout, mock_process_payment,
};

pub use utils::UtilError;
