use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

pub const RESET_TOKEN_TTL: Duration = Duration::minutes(30);

/// A freshly issued reset token. `raw` leaves the process only inside the reset email.
pub struct IssuedResetToken {
    pub raw: String,
    pub hash: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

pub fn issue(user_id: Uuid, now: OffsetDateTime) -> IssuedResetToken {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let mut raw = String::with_capacity(64 + 32);
    for b in bytes {
        raw.push_str(&format!("{b:02x}"));
    }
    raw.push_str(&user_id.simple().to_string());

    IssuedResetToken {
        hash: hash_token(&raw),
        raw,
        created_at: now,
        expires_at: now + RESET_TOKEN_TTL,
    }
}

/// SHA-256 hex digest; deterministic so the stored value can be looked up.
pub fn hash_token(raw: &str) -> String {
    format!("{:x}", Sha256::digest(raw.as_bytes()))
}

pub fn reset_url(frontend_url: &str, raw: &str) -> String {
    format!("{}/resetpassword/{}", frontend_url.trim_end_matches('/'), raw)
}
