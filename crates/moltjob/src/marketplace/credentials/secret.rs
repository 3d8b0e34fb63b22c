use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use super::CredentialError;

type HmacSha256 = Hmac<Sha256>;

pub const SECRET_PREFIX: &str = "aj_live_";
const SECRET_BYTES: usize = 16;
const SALT_BYTES: usize = 16;

pub(crate) fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{SECRET_PREFIX}{}", hex::encode(bytes))
}

pub(crate) fn generate_salt() -> Vec<u8> {
    let mut salt = vec![0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// The plaintext lookup index: the scheme marker plus the first `hex_len`
/// characters of the random part. `None` when the secret is not one of ours.
pub(crate) fn lookup_prefix(secret: &str, hex_len: usize) -> Option<String> {
    let body = secret.strip_prefix(SECRET_PREFIX)?;
    let head = body.get(..hex_len)?;
    if !head.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("{SECRET_PREFIX}{head}"))
}

pub(crate) fn hash_secret(salt: &[u8], secret: &str) -> Result<Vec<u8>, CredentialError> {
    let mut mac = HmacSha256::new_from_slice(salt).map_err(|_| CredentialError::Hashing)?;
    mac.update(secret.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Constant-time comparison against a stored hash.
pub(crate) fn verify_secret(salt: &[u8], secret: &str, expected: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(salt) else {
        return false;
    };
    mac.update(secret.as_bytes());
    mac.verify_slice(expected).is_ok()
}
