//! Outbound account mail.
//!
//! Delivery is fire-and-forget: account flows never fail because a mail
//! could not be sent.

use crate::model::view::UserSummary;
use log::{debug, info};
use std::sync::Arc;

/// Sends account confirmation and recovery messages.
pub trait Mailer: Send + Sync {
    fn send_confirmation(&self, user: &UserSummary, token: &str);
    fn send_recovery(&self, user: &UserSummary, token: &str);
}

impl<M: Mailer + ?Sized> Mailer for Arc<M> {
    fn send_confirmation(&self, user: &UserSummary, token: &str) {
        (**self).send_confirmation(user, token);
    }

    fn send_recovery(&self, user: &UserSummary, token: &str) {
        (**self).send_recovery(user, token);
    }
}

/// Mailer that writes the links it would have sent to the log.
#[derive(Debug, Clone)]
pub struct LogMailer {
    frontend_url: String,
}

impl LogMailer {
    pub fn new(frontend_url: impl Into<String>) -> Self {
        let frontend_url = frontend_url.into().trim_end_matches('/').to_string();
        Self { frontend_url }
    }

    /// Link a user follows to confirm the account.
    pub fn confirmation_link(&self, token: &str) -> String {
        format!("{}/confirm/{token}", self.frontend_url)
    }

    /// Link a user follows to choose a new password.
    pub fn recovery_link(&self, token: &str) -> String {
        format!("{}/restore/{token}", self.frontend_url)
    }
}

impl Mailer for LogMailer {
    fn send_confirmation(&self, user: &UserSummary, token: &str) {
        info!("event=mail_send module=mail status=ok kind=confirmation user_id={}", user.id);
        debug!("event=mail_link module=mail kind=confirmation link={}", self.confirmation_link(token));
    }

    fn send_recovery(&self, user: &UserSummary, token: &str) {
        info!("event=mail_send module=mail status=ok kind=recovery user_id={}", user.id);
        debug!("event=mail_link module=mail kind=recovery link={}", self.recovery_link(token));
    }
}
