//! Account use-case service.
//!
//! # Responsibility
//! - Signup, confirmation, login, password recovery and restore.
//! - Hand single-use tokens to the mailer.
//!
//! # Invariants
//! - Plaintext passwords are hashed before they reach the identity store
//!   and never appear in logs.
//! - A token is consumed by exactly one confirm or restore.
//! - Unconfirmed accounts cannot log in.
//! - The identity store's unique email index is the final word on
//!   duplicates; a signup that loses a race still reports `Conflict`.

use super::error::{ServiceError, ServiceResult};
use crate::credential::hash_password;
use crate::mail::Mailer;
use crate::model::input::{LoginInput, RecoverInput, RestoreInput, SignupInput, TokenInput};
use crate::model::user::User;
use crate::model::validation::FieldErrors;
use crate::model::view::UserSummary;
use crate::model::{EntityKind, UserId};
use crate::repo::user_repo::IdentityStore;
use log::{info, warn};

/// Use-case service for account lifecycle operations.
pub struct AccountService<U: IdentityStore, M: Mailer> {
    users: U,
    mailer: M,
}

impl<U: IdentityStore, M: Mailer> AccountService<U, M> {
    pub fn new(users: U, mailer: M) -> Self {
        Self { users, mailer }
    }

    /// Registers an unconfirmed account and mails its confirmation token.
    pub fn signup(&self, input: &SignupInput) -> ServiceResult<UserSummary> {
        let fields = input.validate()?;
        if self.users.find_by_email(&fields.email)?.is_some() {
            return Err(ServiceError::Conflict(FieldErrors::single(
                "email",
                "email is already registered",
            )));
        }

        let user = User::new(fields.name, fields.email, hash_password(&fields.password)?);
        self.users.create_user(&user)?;

        let summary = UserSummary::from(&user);
        if let Some(token) = user.token.as_deref() {
            self.mailer.send_confirmation(&summary, token);
        }
        info!("event=account_signup module=service status=ok user_id={}", user.id);
        Ok(summary)
    }

    /// Confirms the account holding `token`.
    pub fn confirm(&self, input: &TokenInput) -> ServiceResult<UserSummary> {
        let mut user = self.user_by_token(input.token.as_deref())?;
        user.confirm();
        self.users.save_user(&user)?;
        info!("event=account_confirm module=service status=ok user_id={}", user.id);
        Ok(UserSummary::from(&user))
    }

    /// Checks credentials and returns the account to open a session for.
    ///
    /// Logging into an unconfirmed account reissues and mails a fresh
    /// confirmation token before refusing.
    pub fn login(&self, input: &LoginInput) -> ServiceResult<UserSummary> {
        let (email, password) = input.validate()?;
        let Some(mut user) = self.users.find_by_email(&email)? else {
            return Err(ServiceError::UnknownAccount(FieldErrors::single(
                "email",
                "user does not exist",
            )));
        };

        if !user.confirmed {
            let token = user.issue_token().to_string();
            self.users.save_user(&user)?;
            self.mailer.send_confirmation(&UserSummary::from(&user), &token);
            warn!("event=account_login module=service status=denied reason=unconfirmed user_id={}", user.id);
            return Err(ServiceError::AccountNotConfirmed(FieldErrors::single(
                "email",
                "account has not been confirmed; a new confirmation email was sent",
            )));
        }

        if !self.users.verify_credential(&user, &password) {
            warn!("event=account_login module=service status=denied reason=password user_id={}", user.id);
            return Err(ServiceError::InvalidCredentials(FieldErrors::single(
                "password",
                "password is incorrect",
            )));
        }

        info!("event=account_login module=service status=ok user_id={}", user.id);
        Ok(UserSummary::from(&user))
    }

    /// Issues a recovery token for the account and mails it.
    pub fn recover(&self, input: &RecoverInput) -> ServiceResult<()> {
        let email = input.validate()?;
        let Some(mut user) = self.users.find_by_email(&email)? else {
            return Err(ServiceError::UnknownAccount(FieldErrors::single(
                "email",
                "user does not exist",
            )));
        };

        let token = user.issue_token().to_string();
        self.users.save_user(&user)?;
        self.mailer.send_recovery(&UserSummary::from(&user), &token);
        info!("event=account_recover module=service status=ok user_id={}", user.id);
        Ok(())
    }

    /// Succeeds iff some account holds `token`.
    pub fn check_token(&self, input: &TokenInput) -> ServiceResult<()> {
        self.user_by_token(input.token.as_deref()).map(|_| ())
    }

    /// Installs a new password for the account holding `token`.
    pub fn restore(&self, input: &RestoreInput) -> ServiceResult<()> {
        let password = input.validate()?;
        let mut user = self.user_by_token(input.token.as_deref())?;
        user.restore_credential(hash_password(&password)?);
        self.users.save_user(&user)?;
        info!("event=account_restore module=service status=ok user_id={}", user.id);
        Ok(())
    }

    /// Public profile of a session user.
    pub fn profile(&self, user: UserId) -> ServiceResult<UserSummary> {
        self.users
            .find_by_id(user)?
            .map(|user| UserSummary::from(&user))
            .ok_or(ServiceError::NotFound(EntityKind::User))
    }

    fn user_by_token(&self, token: Option<&str>) -> ServiceResult<User> {
        let token = token.map(str::trim).unwrap_or_default();
        self.users
            .find_by_token(token)?
            .ok_or(ServiceError::InvalidToken)
    }
}
