//! Identity store contract and SQLite implementation.
//!
//! # Invariants
//! - Emails are matched exactly; callers normalize before lookup.
//! - A duplicate email on insert surfaces as `RepoError::Duplicate("email")`.

use super::{bool_to_int, is_unique_violation, parse_flag, parse_uuid, RepoError, RepoResult};
use crate::credential;
use crate::model::user::User;
use crate::model::{EntityKind, UserId};
use rusqlite::{params, Connection, OptionalExtension, Row};

const USER_SELECT_SQL: &str = "SELECT id, name, email, password_hash, token, confirmed FROM users";

/// Lookup and persistence of user accounts.
pub trait IdentityStore {
    fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>>;
    fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Finds the account holding a pending confirmation/recovery token.
    fn find_by_token(&self, token: &str) -> RepoResult<Option<User>>;
    /// Loads several accounts, preserving the order of `ids` and skipping
    /// unknown ones.
    fn find_many(&self, ids: &[UserId]) -> RepoResult<Vec<User>>;
    fn create_user(&self, user: &User) -> RepoResult<()>;
    fn save_user(&self, user: &User) -> RepoResult<()>;

    /// Checks `plaintext` against the stored credential hash.
    fn verify_credential(&self, user: &User, plaintext: &str) -> bool {
        credential::verify_password(plaintext, &user.password_hash)
    }
}

/// SQLite-backed identity store.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn find_one(&self, clause: &str, value: &str) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{USER_SELECT_SQL} WHERE {clause} = ?1;"))?;
        let row = stmt.query_row([value], read_row).optional()?;
        row.map(into_user).transpose()
    }
}

impl IdentityStore for SqliteUserRepository<'_> {
    fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>> {
        self.find_one("id", &id.to_string())
    }

    fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.find_one("email", email)
    }

    fn find_by_token(&self, token: &str) -> RepoResult<Option<User>> {
        if token.is_empty() {
            return Ok(None);
        }
        self.find_one("token", token)
    }

    fn find_many(&self, ids: &[UserId]) -> RepoResult<Vec<User>> {
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = self.find_by_id(*id)? {
                users.push(user);
            }
        }
        Ok(users)
    }

    fn create_user(&self, user: &User) -> RepoResult<()> {
        let result = self.conn.execute(
            "INSERT INTO users (id, name, email, password_hash, token, confirmed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                user.id.to_string(),
                user.name,
                user.email,
                user.password_hash,
                user.token,
                bool_to_int(user.confirmed),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(RepoError::Duplicate("email")),
            Err(err) => Err(err.into()),
        }
    }

    fn save_user(&self, user: &User) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users
             SET
                name = ?2,
                email = ?3,
                password_hash = ?4,
                token = ?5,
                confirmed = ?6,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                user.id.to_string(),
                user.name,
                user.email,
                user.password_hash,
                user.token,
                bool_to_int(user.confirmed),
            ],
        );
        match result_changed(changed)? {
            0 => Err(RepoError::NotFound(EntityKind::User, user.id)),
            _ => Ok(()),
        }
    }
}

type UserRow = (String, String, String, String, Option<String>, i64);

fn read_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok((
        row.get("id")?,
        row.get("name")?,
        row.get("email")?,
        row.get("password_hash")?,
        row.get("token")?,
        row.get("confirmed")?,
    ))
}

fn into_user((id, name, email, password_hash, token, confirmed): UserRow) -> RepoResult<User> {
    Ok(User {
        id: parse_uuid(&id, "users.id")?,
        name,
        email,
        password_hash,
        token,
        confirmed: parse_flag(confirmed, "users.confirmed")?,
    })
}

fn result_changed(result: rusqlite::Result<usize>) -> RepoResult<usize> {
    match result {
        Ok(changed) => Ok(changed),
        Err(err) if is_unique_violation(&err) => Err(RepoError::Duplicate("email")),
        Err(err) => Err(err.into()),
    }
}
