//! Elevation password hashing.

use sha2::{Digest, Sha256};

/// SHA-256 of the password, lowercase hex. Only the hash goes over the wire.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}
