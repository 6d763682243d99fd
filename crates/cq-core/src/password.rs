use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand_core::OsRng;

pub fn hash_password(password: &str) -> Result<String> {
    if password.is_empty() {
        return Err(anyhow!("password is required"));
    }
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("argon2 hash failed: {}", err))?
        .to_string();
    Ok(hash)
}

/// `Ok(false)` means the password did not match; `Err` means the stored hash is unusable.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|err| anyhow!("invalid password hash: {}", err))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(anyhow!("argon2 verify failed: {}", err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_accepts_same_password() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret", &hash).unwrap());
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("s3cret").unwrap();
        assert!(!verify_password("guess", &hash).unwrap());
    }

    #[test]
    fn verify_errors_on_garbage_hash() {
        assert!(verify_password("s3cret", "not-a-phc-string").is_err());
    }

    #[test]
    fn hash_rejects_empty_password() {
        assert!(hash_password("").is_err());
    }
}
