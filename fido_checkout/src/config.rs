//! Central configuration for the fido_checkout crate

use std::sync::LazyLock;

/// Path of the page that runs the authentication ceremony.
///
/// Checkout submission redirects here with the transaction parameters.
/// Default: "/fido-auth"
pub static CHECKOUT_CEREMONY_PATH: LazyLock<String> =
    LazyLock::new(|| path_from_env("CHECKOUT_CEREMONY_PATH", "/fido-auth"));

/// Path of the order confirmation page the ceremony hands off to.
/// Default: "/checkout/success"
pub static CHECKOUT_CONFIRMATION_PATH: LazyLock<String> =
    LazyLock::new(|| path_from_env("CHECKOUT_CONFIRMATION_PATH", "/checkout/success"));

/// Reads a page path from `var`, falling back to `default` when unset or not absolute.
fn path_from_env(var: &str, default: &str) -> String {
    match std::env::var(var) {
        Ok(path) if path.starts_with('/') => path,
        Ok(path) => {
            tracing::warn!("Ignoring {}={:?}: paths must start with '/'", var, path);
            default.to_string()
        }
        Err(_) => default.to_string(),
    }
}
