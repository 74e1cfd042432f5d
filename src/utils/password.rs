use argon2::{Argon2, password_hash::PasswordHasher, password_hash::SaltString, PasswordHash, PasswordVerifier};
use actix_web::http::header;
use actix_web::HttpRequest;
use rand;

pub const MIN_PASSWORD_LENGTH: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("stored password hash is malformed")]
    InvalidHash,
}

/// The slow comparison consulted on a cache miss.
pub trait HashComparer: Send + Sync {
    fn compare(&self, password: &str, hash: &str) -> Result<bool, PasswordError>;
}

/// Argon2 comparison using the parameters encoded in the PHC string.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Comparer;

impl HashComparer for Argon2Comparer {
    fn compare(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHash)?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(PasswordError::Hash(err.to_string())),
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| PasswordError::Hash(err.to_string()))
}

pub fn validate_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

/// Extracts the folder password from `Authorization: Bearer <password>`.
pub fn bearer_password(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|auth| auth.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::to_string)
}
