use bcrypt::{non_truncating_hash, non_truncating_verify, BcryptError};
use thiserror::Error;

pub use bcrypt::DEFAULT_COST;

/// bcrypt reads at most 72 bytes, one of which is the trailing NUL.
pub const MAX_PASSWORD_BYTES: usize = 71;

#[derive(Debug, Error)]
pub enum PasswordError {
    /// The plaintext does not match the stored hash.
    #[error("password does not match")]
    Mismatch,

    /// The stored hash is not a bcrypt hash.
    #[error("malformed password hash: {0}")]
    MalformedHash(String),

    /// Longer than [`MAX_PASSWORD_BYTES`]; bcrypt would silently ignore the rest.
    #[error("password is longer than {MAX_PASSWORD_BYTES} bytes")]
    TooLong,

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl From<BcryptError> for PasswordError {
    fn from(e: BcryptError) -> Self {
        match e {
            BcryptError::InvalidHash(_)
            | BcryptError::InvalidPrefix(_)
            | BcryptError::InvalidCost(_)
            | BcryptError::InvalidBase64(_) => PasswordError::MalformedHash(e.to_string()),
            BcryptError::Truncation(_) => PasswordError::TooLong,
            other => PasswordError::Hashing(other.to_string()),
        }
    }
}

/// Hash a plaintext password with the given bcrypt cost.
pub fn hash_password(plaintext: &str, cost: u32) -> Result<String, PasswordError> {
    non_truncating_hash(plaintext, cost).map_err(|e| match e {
        BcryptError::Truncation(_) => PasswordError::TooLong,
        other => PasswordError::Hashing(other.to_string()),
    })
}

/// Check a plaintext password against a stored bcrypt hash.
///
/// `Ok(())` on a match, `Err(PasswordError::Mismatch)` when the password is
/// wrong, any other error when the hash itself cannot be used.
pub fn verify_password(plaintext: &str, stored_hash: &str) -> Result<(), PasswordError> {
    if non_truncating_verify(plaintext, stored_hash)? {
        Ok(())
    } else {
        Err(PasswordError::Mismatch)
    }
}
