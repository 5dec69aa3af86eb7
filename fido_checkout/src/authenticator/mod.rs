//! Credential providers that run without a browser.

mod software;

pub use software::SoftwareAuthenticator;
