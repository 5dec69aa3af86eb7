use crate::ceremony::ports::RandomSource;
use crate::utils::UtilError;

/// Length of every registration and assertion challenge.
pub const CHALLENGE_LEN: usize = 32;

/// Length of the synthetic user handle created for each registration.
pub const USER_HANDLE_LEN: usize = 16;

/// Draws `len` fresh bytes and checks the source honoured the length.
///
/// Challenge material is never reused: every attempt calls this again.
pub(super) fn fresh_random(random: &dyn RandomSource, len: usize) -> Result<Vec<u8>, UtilError> {
    let bytes = random.random_bytes(len)?;
    if bytes.len() != len {
        return Err(UtilError::Crypto(format!(
            "Random source returned {} bytes, expected {}",
            bytes.len(),
            len
        )));
    }
    Ok(bytes)
}
