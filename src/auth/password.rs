use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use tracing::error;

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Argon2id with the crate's default (fixed) cost parameters.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

lazy_static! {
    // Stands in for a missing stored hash so every login attempt pays for one verify.
    static ref DECOY_HASH: Option<String> = hash_password("decoy-never-matches").ok();
}

#[cfg(test)]
lazy_static! {
    /// Plaintexts seen by `verify_password`, so tests can tell a verify ran.
    pub(crate) static ref VERIFY_CALLS: std::sync::Mutex<Vec<String>> = Default::default();
}

/// Builds the decoy hash ahead of the first login instead of during it.
pub(crate) fn warm_up() {
    lazy_static::initialize(&DECOY_HASH);
}

/// Verifies against `stored`, or against the decoy when the account has no
/// password. A decoy check always reports a mismatch.
pub fn verify_or_decoy(plain: &str, stored: Option<&str>) -> anyhow::Result<bool> {
    match stored {
        Some(hash) => verify_password(plain, hash),
        None => {
            if let Some(decoy) = DECOY_HASH.as_deref() {
                verify_password(plain, decoy)?;
            }
            Ok(false)
        }
    }
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    #[cfg(test)]
    VERIFY_CALLS.lock().unwrap().push(plain.to_string());
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("secret1").expect("hashing should succeed");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("secret1", &hash).expect("verify should succeed"));
        assert!(!verify_password("secret2", &hash).expect("verify should not error"));
    }

    #[test]
    fn same_password_gets_a_fresh_salt() {
        let a = hash_password("secret1").unwrap();
        let b = hash_password("secret1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        assert!(verify_password("anything", "not-a-valid-hash").is_err());
    }

    #[test]
    fn decoy_never_matches_and_costs_the_same() {
        assert!(!verify_or_decoy("decoy-never-matches", None).unwrap());
        warm_up();
        let decoy = PasswordHash::new(DECOY_HASH.as_deref().expect("decoy hash")).unwrap();
        let real_hash = hash_password("secret1").unwrap();
        let real = PasswordHash::new(&real_hash).unwrap();
        assert_eq!(decoy.algorithm, real.algorithm);
        assert_eq!(decoy.params, real.params);
    }

    #[test]
    fn email_validation_and_normalization() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("a b@x.com"));
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }
}
