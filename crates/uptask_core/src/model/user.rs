//! User account model.
//!
//! # Invariants
//! - `email` is stored trimmed and lowercased and is unique across accounts.
//! - `token` is single-use: it is cleared by confirmation and by password
//!   restore, and reissued by recovery.
//! - `password_hash` is never serialized into any view.

use super::UserId;
use uuid::Uuid;

/// Persisted user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// PHC-formatted credential hash.
    pub password_hash: String,
    /// Pending confirmation or recovery token.
    pub token: Option<String>,
    pub confirmed: bool,
}

impl User {
    /// Creates an unconfirmed account holding a fresh confirmation token.
    pub fn new(name: impl Into<String>, email: impl Into<String>, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            password_hash,
            token: Some(generate_token()),
            confirmed: false,
        }
    }

    /// Replaces any pending token with a new one and returns it.
    pub fn issue_token(&mut self) -> &str {
        self.token.insert(generate_token()).as_str()
    }

    /// Consumes the pending token and marks the account confirmed.
    pub fn confirm(&mut self) {
        self.token = None;
        self.confirmed = true;
    }

    /// Consumes the pending token and installs a new credential hash.
    pub fn restore_credential(&mut self, password_hash: String) {
        self.token = None;
        self.password_hash = password_hash;
    }
}

/// Generates an opaque single-use token.
pub fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()
}
