//! Use-case error shared by every service.

use crate::credential::CredentialError;
use crate::model::validation::FieldErrors;
use crate::model::{EntityKind, TaskId};
use crate::permission::PermissionError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error returned by account, project and task use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// One or more input fields failed validation.
    Validation(FieldErrors),
    /// The entity is absent or its id is malformed.
    NotFound(EntityKind),
    /// An account looked up by a client-supplied field does not exist.
    UnknownAccount(FieldErrors),
    /// The principal lacks the relation the action requires.
    Forbidden(PermissionError),
    /// The account exists but has not been confirmed yet.
    AccountNotConfirmed(FieldErrors),
    /// Duplicate membership or duplicate account.
    Conflict(FieldErrors),
    /// The supplied password does not match.
    InvalidCredentials(FieldErrors),
    /// A confirmation or recovery token does not match any account.
    InvalidToken,
    /// The task row was written but could not be attached to its project.
    PartialWrite { task: TaskId, source: RepoError },
    /// Task deletion left at least one of its two writes undone.
    CascadeIncomplete {
        task: TaskId,
        failures: Vec<RepoError>,
    },
    Repo(RepoError),
    Credential(CredentialError),
}

impl ServiceError {
    /// Field-keyed details, when the error carries any.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation(errors)
            | Self::UnknownAccount(errors)
            | Self::AccountNotConfirmed(errors)
            | Self::Conflict(errors)
            | Self::InvalidCredentials(errors) => Some(errors),
            _ => None,
        }
    }

    /// Stable short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) | Self::UnknownAccount(_) => "not_found",
            Self::Forbidden(_) | Self::AccountNotConfirmed(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::InvalidCredentials(_) | Self::InvalidToken => "unauthorized",
            Self::PartialWrite { .. } | Self::CascadeIncomplete { .. } => "partial_write",
            Self::Repo(_) => "repo",
            Self::Credential(_) => "credential",
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(errors) => write!(f, "{errors}"),
            Self::NotFound(kind) => write!(f, "{kind} not found"),
            Self::UnknownAccount(_) => write!(f, "user not found"),
            Self::Forbidden(err) => write!(f, "{err}"),
            Self::AccountNotConfirmed(_) => write!(f, "account has not been confirmed"),
            Self::Conflict(errors) => match errors.fields().next().and_then(|field| errors.get(field)) {
                Some(message) => write!(f, "{message}"),
                None => write!(f, "conflict"),
            },
            Self::InvalidCredentials(_) => write!(f, "invalid credentials"),
            Self::InvalidToken => write!(f, "invalid token"),
            Self::PartialWrite { task, source } => {
                write!(f, "task {task} was created but not attached to its project: {source}")
            }
            Self::CascadeIncomplete { task, failures } => write!(
                f,
                "task {task} deletion incomplete: {} write(s) failed",
                failures.len()
            ),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Credential(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Forbidden(err) => Some(err),
            Self::PartialWrite { source, .. } => Some(source),
            Self::CascadeIncomplete { failures, .. } => {
                failures.first().map(|err| err as &(dyn Error + 'static))
            }
            Self::Repo(err) => Some(err),
            Self::Credential(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FieldErrors> for ServiceError {
    fn from(value: FieldErrors) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(kind, _) => Self::NotFound(kind),
            RepoError::Duplicate("email") => {
                Self::Conflict(FieldErrors::single("email", "email is already registered"))
            }
            other => Self::Repo(other),
        }
    }
}

impl From<PermissionError> for ServiceError {
    fn from(value: PermissionError) -> Self {
        match value {
            PermissionError::AlreadyPartner(_) => {
                Self::Conflict(FieldErrors::single("email", "user is already a partner"))
            }
            PermissionError::CreatorCannotBePartner(_) => Self::Conflict(FieldErrors::single(
                "email",
                "the project creator cannot be a partner",
            )),
            other => Self::Forbidden(other),
        }
    }
}

impl From<CredentialError> for ServiceError {
    fn from(value: CredentialError) -> Self {
        Self::Credential(value)
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceError;
    use crate::model::EntityKind;
    use crate::permission::PermissionError;
    use crate::repo::RepoError;
    use uuid::Uuid;

    #[test]
    fn repo_not_found_hides_the_id() {
        let err = ServiceError::from(RepoError::NotFound(EntityKind::Task, Uuid::new_v4()));
        assert!(matches!(err, ServiceError::NotFound(EntityKind::Task)));
        assert_eq!(err.to_string(), "task not found");
    }

    #[test]
    fn duplicate_email_becomes_field_conflict() {
        let err = ServiceError::from(RepoError::Duplicate("email"));
        let errors = err.field_errors().expect("conflict carries field errors");
        assert_eq!(errors.get("email"), Some("email is already registered"));
        assert_eq!(err.kind(), "conflict");
    }

    #[test]
    fn partner_conflicts_are_not_forbidden() {
        let user = Uuid::new_v4();
        assert!(matches!(
            ServiceError::from(PermissionError::AlreadyPartner(user)),
            ServiceError::Conflict(_)
        ));
        assert!(matches!(
            ServiceError::from(PermissionError::CreatorCannotBePartner(user)),
            ServiceError::Conflict(_)
        ));
        assert!(matches!(
            ServiceError::from(PermissionError::Forbidden {
                user,
                action: "project.edit"
            }),
            ServiceError::Forbidden(_)
        ));
    }
}
