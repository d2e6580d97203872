use base64::{Engine, engine::general_purpose::STANDARD};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

fn salted_digest(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

/// Produces `base64(salt):base64(sha256(salt || password))`.
///
/// An empty password yields an empty string, which the user table reads as
/// "no password set" (a deactivated account).
pub fn hash_password(password: &str) -> String {
    if password.is_empty() {
        return String::new();
    }

    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let digest = salted_digest(&salt, password);

    format!("{}:{}", STANDARD.encode(salt), STANDARD.encode(digest))
}

/// Checks `candidate` against a stored hash. Malformed input is a mismatch,
/// never an error.
pub fn verify_password(stored: &str, candidate: &str) -> bool {
    if stored.is_empty() || candidate.is_empty() {
        return false;
    }

    let parts: Vec<&str> = stored.split(':').collect();
    if parts.len() != 2 {
        // legacy rows stored the password itself
        return constant_time_eq(stored.as_bytes(), candidate.as_bytes());
    }

    let (Ok(salt), Ok(expected)) = (STANDARD.decode(parts[0]), STANDARD.decode(parts[1])) else {
        return false;
    };

    constant_time_eq(&expected, &salted_digest(&salt, candidate))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        for password in ["hunter2", "correct horse battery staple", "ünïcødé", " "] {
            let stored = hash_password(password);
            assert!(verify_password(&stored, password));
        }
    }

    #[test]
    fn test_wrong_password_rejected() {
        let stored = hash_password("alpha");
        assert!(!verify_password(&stored, "beta"));
        assert!(!verify_password(&stored, "Alpha"));
        assert!(!verify_password(&stored, ""));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn test_empty_password_is_sentinel() {
        assert_eq!(hash_password(""), "");
        assert!(!verify_password("", "anything"));
    }

    #[test]
    fn test_hash_shape() {
        let stored = hash_password("shape");
        let (salt, digest) = stored.split_once(':').unwrap();
        assert_eq!(STANDARD.decode(salt).unwrap().len(), 16);
        assert_eq!(STANDARD.decode(digest).unwrap().len(), 32);
    }

    #[test]
    fn test_legacy_plaintext_and_malformed() {
        assert!(verify_password("plaintext", "plaintext"));
        assert!(!verify_password("plaintext", "other"));
        assert!(verify_password("a:b:c", "a:b:c"));
        assert!(!verify_password("a:b:c", "a:b"));
        assert!(!verify_password("!!notbase64:@@", "whatever"));
    }
}
