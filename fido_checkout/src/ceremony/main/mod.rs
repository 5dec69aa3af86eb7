mod auth;
mod challenge;
mod register;

pub use challenge::{CHALLENGE_LEN, USER_HANDLE_LEN};

pub(crate) use auth::authenticate_and_authorize;
pub(crate) use register::register_credential;

/// Callback the flows use to report progress milestones (0-100).
pub(crate) type ProgressFn<'a> = dyn Fn(f64) + Send + Sync + 'a;
