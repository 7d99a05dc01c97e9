//! Credential store over the `users` table.
//!
//! Passwords are stretched with iterated SHA-256 (100k rounds) and a
//! per-user random salt, stored as a single self-describing column value
//! (`sha256$<rounds>$<salt-hex>$<digest-hex>`) so the generic repository
//! can treat `password` like any other declared field. Plaintext is never
//! persisted or logged.

use crate::db::DbPool;
use anyhow::{bail, Result};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Salt byte length for password hashing.
const SALT_BYTES: usize = 16;

/// Number of SHA-256 iterations for password stretching.
const HASH_ITERATIONS: u32 = 100_000;

/// Hash-string prefix; rounds are encoded per hash so they can be raised
/// later without invalidating stored credentials.
const HASH_SCHEME: &str = "sha256";

/// A stored user row, hash included. For verification paths only — the
/// outbound API serialization never touches this type.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: Option<String>,
}

/// Profile fields accepted at registration.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub fullname: Option<String>,
    pub affiliation: Option<String>,
    pub note: Option<String>,
    pub role: Option<String>,
}

/// SQLite-backed credential store.
#[derive(Clone)]
pub struct CredentialStore {
    pool: DbPool,
}

impl CredentialStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Look up a user by exact username.
    pub fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let conn = self.pool.get()?;
        let row = conn.query_row(
            "SELECT id, username, password, role FROM users WHERE username = ?1",
            rusqlite::params![username],
            |row| {
                Ok(UserRecord {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                    role: row.get(3)?,
                })
            },
        );

        match row {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Create a user. The password is hashed here; the caller hands over
    /// plaintext exactly once. Returns the new row id.
    pub fn create(&self, user: &NewUser) -> Result<i64> {
        let username = user.username.trim();
        if username.is_empty() {
            bail!("Username cannot be empty");
        }
        if username.len() > 64 {
            bail!("Username too long (max 64 characters)");
        }
        if user.password.is_empty() {
            bail!("Password cannot be empty");
        }

        let password_hash = hash_password(&user.password);

        let conn = self.pool.get()?;
        let result = conn.execute(
            "INSERT INTO users (username, password, fullname, affiliation, note, role)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                username,
                password_hash,
                user.fullname,
                user.affiliation,
                user.note,
                user.role,
            ],
        );

        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                bail!("Username '{}' is already taken", username)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Verify a login attempt. `Ok(None)` covers both an unknown username
    /// and a wrong password; `Err` is reserved for store failures.
    ///
    /// On an unknown username a dummy hash is computed so the miss costs
    /// the same as a mismatch (no timing side-channel on enumeration).
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<UserRecord>> {
        match self.find_by_username(username.trim())? {
            Some(user) => {
                if verify_password(password, &user.password_hash) {
                    Ok(Some(user))
                } else {
                    Ok(None)
                }
            }
            None => {
                let _ = hash_with_salt(password, "00000000000000000000000000000000");
                Ok(None)
            }
        }
    }

    /// Seed the one-time `admin` account if it does not exist. Returns
    /// true when a row was inserted.
    pub fn seed_admin(&self) -> Result<bool> {
        if self.find_by_username("admin")?.is_some() {
            return Ok(false);
        }
        self.create(&NewUser {
            username: "admin".into(),
            password: "admin".into(),
            fullname: Some("Administrator".into()),
            affiliation: Some("LIMS Admin".into()),
            note: Some("Initial admin user".into()),
            role: Some("admin".into()),
        })?;
        tracing::warn!("Seeded default 'admin' user — change its password before going live");
        Ok(true)
    }

    pub fn user_count(&self) -> Result<u64> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

// ── Hashing helpers ─────────────────────────────────────────────────

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    hash_with_salt(password, &hex::encode(salt))
}

fn hash_with_salt(password: &str, salt_hex: &str) -> String {
    let mut hash = Sha256::new();
    hash.update(salt_hex.as_bytes());
    hash.update(password.as_bytes());
    let mut digest = hash.finalize();

    // Iterated hashing for key stretching
    for _ in 1..HASH_ITERATIONS {
        let mut h = Sha256::new();
        h.update(digest);
        h.update(salt_hex.as_bytes());
        digest = h.finalize();
    }

    format!("{HASH_SCHEME}${HASH_ITERATIONS}${salt_hex}${}", hex::encode(digest))
}

/// Check a plaintext password against a stored hash string.
///
/// Malformed stored values fail closed.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(rounds), Some(salt_hex), Some(digest_hex), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != HASH_SCHEME {
        return false;
    }
    let Ok(rounds) = rounds.parse::<u32>() else {
        return false;
    };

    let mut hash = Sha256::new();
    hash.update(salt_hex.as_bytes());
    hash.update(password.as_bytes());
    let mut digest = hash.finalize();
    for _ in 1..rounds {
        let mut h = Sha256::new();
        h.update(digest);
        h.update(salt_hex.as_bytes());
        digest = h.finalize();
    }

    constant_time_eq(hex::encode(digest).as_bytes(), digest_hex.as_bytes())
}

/// Constant-time byte comparison to prevent timing attacks.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

// ── Tests ───────────────────────────────────────────────────────────
