use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const DEFAULT_PHOTO: &str = "https://i.ibb.co/4pDNDk1/avatar.png";
pub const DEFAULT_PHONE: &str = "+237";
pub const DEFAULT_BIO: &str = "bio";
pub const MAX_BIO_LEN: usize = 250;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String, // Argon2 PHC string, never plaintext
    pub photo: String,
    pub phone: String,
    pub bio: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

/// The user-settable profile fields, already merged with stored values.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub name: String,
    pub phone: String,
    pub photo: String,
    pub bio: String,
}

/// Password reset token row; `token_hash` is the SHA-256 of the emailed token.
#[derive(Debug, Clone, FromRow)]
pub struct ResetToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}
